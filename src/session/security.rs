use super::*;

/// Security level used for SSH algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Strict modern algorithms.
    Secure,
    /// Modern algorithms plus what current RTX firmware needs.
    Balanced,
    /// Adds CBC ciphers and SHA-1 exchanges for old firmware.
    LegacyCompatible,
}

/// Connection security options for SSH establishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSecurityOptions {
    /// SSH algorithm policy.
    pub level: SecurityLevel,
    /// Server host key verification method.
    pub server_check: ServerCheckMethod,
}

impl Default for ConnectionSecurityOptions {
    fn default() -> Self {
        Self {
            level: SecurityLevel::Balanced,
            server_check: ServerCheckMethod::DefaultKnownHostsFile,
        }
    }
}

impl ConnectionSecurityOptions {
    /// Derives the options from a router's host key policy and security level.
    pub fn from_router(config: &RouterConfig) -> Result<Self, ConnectError> {
        let server_check = match &config.host_key {
            HostKeyPolicy::DefaultKnownHosts => ServerCheckMethod::DefaultKnownHostsFile,
            HostKeyPolicy::KnownHostsFile(path) => {
                let path = path.to_str().ok_or_else(|| {
                    ConnectError::InvalidConfig(format!(
                        "known hosts path is not valid UTF-8: {}",
                        path.display()
                    ))
                })?;
                ServerCheckMethod::KnownHostsFile(path.to_string())
            }
            HostKeyPolicy::PublicKey(key) => {
                if key.trim().is_empty() {
                    return Err(ConnectError::InvalidConfig(
                        "pinned host key is empty".to_string(),
                    ));
                }
                ServerCheckMethod::PublicKey(key.trim().to_string())
            }
            HostKeyPolicy::Skip => ServerCheckMethod::NoCheck,
        };
        Ok(Self {
            level: config.security_level,
            server_check,
        })
    }

    pub(super) fn preferred(&self) -> Preferred {
        match self.level {
            SecurityLevel::Secure => Preferred {
                kex: Cow::Borrowed(config::SECURE_KEX_ORDER),
                key: Cow::Borrowed(config::SECURE_KEY_TYPES),
                cipher: Cow::Borrowed(config::SECURE_CIPHERS),
                mac: Cow::Borrowed(config::SECURE_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SecurityLevel::Balanced => Preferred {
                kex: Cow::Borrowed(config::BALANCED_KEX_ORDER),
                key: Cow::Borrowed(config::BALANCED_KEY_TYPES),
                cipher: Cow::Borrowed(config::BALANCED_CIPHERS),
                mac: Cow::Borrowed(config::BALANCED_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
            SecurityLevel::LegacyCompatible => Preferred {
                kex: Cow::Borrowed(config::LEGACY_KEX_ORDER),
                key: Cow::Borrowed(config::LEGACY_KEY_TYPES),
                cipher: Cow::Borrowed(config::LEGACY_CIPHERS),
                mac: Cow::Borrowed(config::LEGACY_MAC_ALGORITHMS),
                compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionSecurityOptions, SecurityLevel};
    use crate::config::{HostKeyPolicy, RouterConfig};
    use crate::error::ConnectError;
    use async_ssh2_tokio::ServerCheckMethod;
    use russh::{cipher, kex, mac};

    fn router(host_key: HostKeyPolicy, level: SecurityLevel) -> RouterConfig {
        RouterConfig {
            host: "192.168.100.1".to_string(),
            port: 22,
            username: "admin".to_string(),
            password: "pw".to_string(),
            admin_password: None,
            timeout_secs: 60,
            host_key,
            security_level: level,
        }
    }

    #[test]
    fn skip_policy_maps_to_no_check() {
        let options = ConnectionSecurityOptions::from_router(&router(
            HostKeyPolicy::Skip,
            SecurityLevel::LegacyCompatible,
        ))
        .expect("options");
        assert_eq!(options.level, SecurityLevel::LegacyCompatible);
        assert!(matches!(options.server_check, ServerCheckMethod::NoCheck));
    }

    #[test]
    fn known_hosts_file_policy_keeps_path() {
        let options = ConnectionSecurityOptions::from_router(&router(
            HostKeyPolicy::KnownHostsFile("/etc/rtx/known_hosts".into()),
            SecurityLevel::Secure,
        ))
        .expect("options");
        assert_eq!(
            options.server_check,
            ServerCheckMethod::KnownHostsFile("/etc/rtx/known_hosts".to_string())
        );
    }

    #[test]
    fn empty_pinned_key_is_rejected() {
        let err = match ConnectionSecurityOptions::from_router(&router(
            HostKeyPolicy::PublicKey("  ".to_string()),
            SecurityLevel::Balanced,
        )) {
            Ok(_) => panic!("empty key should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, ConnectError::InvalidConfig(_)));
    }

    #[test]
    fn secure_profile_excludes_weak_algorithms() {
        let options = ConnectionSecurityOptions {
            level: SecurityLevel::Secure,
            ..ConnectionSecurityOptions::default()
        };
        let preferred = options.preferred();

        assert!(preferred.kex.iter().all(|alg| *alg != kex::NONE));
        assert!(preferred.kex.iter().all(|alg| *alg != kex::DH_G1_SHA1));
        assert!(preferred.cipher.iter().all(|alg| *alg != cipher::AES_128_CBC));
        assert!(preferred.mac.iter().all(|alg| *alg != mac::HMAC_SHA1));
    }

    #[test]
    fn legacy_profile_keeps_old_firmware_algorithms() {
        let options = ConnectionSecurityOptions {
            level: SecurityLevel::LegacyCompatible,
            ..ConnectionSecurityOptions::default()
        };
        let preferred = options.preferred();

        assert!(preferred.kex.contains(&kex::DH_G1_SHA1));
        assert!(preferred.cipher.contains(&cipher::AES_128_CBC));
        assert!(preferred.mac.contains(&mac::HMAC_SHA1));
    }
}
