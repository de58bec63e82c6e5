//! Router, pool and retry configuration.
//!
//! Settings are plain serde structs so they can be loaded from JSON. The SSH
//! algorithm lists at the bottom back the [`SecurityLevel`] profiles; the
//! legacy list keeps the CBC ciphers and SHA-1 exchanges that older RTX
//! firmware still negotiates.
//!
//! [`SecurityLevel`]: crate::session::SecurityLevel

use std::path::PathBuf;
use std::time::Duration;

use russh::keys::{Algorithm, EcdsaCurve, HashAlg};
use russh::{cipher, compression, kex, mac};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConnectError;
use crate::parser::WrapConfig;
use crate::session::SecurityLevel;

/// How the router's SSH host key is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum HostKeyPolicy {
    /// Check against `~/.ssh/known_hosts`.
    #[default]
    DefaultKnownHosts,
    /// Check against the given known hosts file.
    KnownHostsFile(PathBuf),
    /// Accept only this base64 encoded public key.
    PublicKey(String),
    /// Accept any host key.
    Skip,
}

/// Connection parameters for one router.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RouterConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Password for the `administrator` exchange. Falls back to `password`.
    #[serde(default)]
    pub admin_password: Option<String>,
    /// Per-command timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub host_key: HostKeyPolicy,
    #[serde(default = "default_security_level")]
    pub security_level: SecurityLevel,
}

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_security_level() -> SecurityLevel {
    SecurityLevel::Balanced
}

impl RouterConfig {
    /// Loads a router configuration from JSON and validates it.
    pub fn from_json(text: &str) -> Result<Self, ConnectError> {
        let config: RouterConfig = serde_json::from_str(text)
            .map_err(|err| ConnectError::InvalidConfig(format!("router config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConnectError> {
        if self.host.trim().is_empty() {
            return Err(ConnectError::InvalidConfig("host is empty".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(ConnectError::InvalidConfig("username is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConnectError::InvalidConfig(
                "timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Address used as the log prefix for this router.
    pub fn device_addr(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn admin_password(&self) -> &str {
        self.admin_password.as_deref().unwrap_or(&self.password)
    }
}

/// Limits for the connection pool.
///
/// Defaults match what RTX firmware tolerates: two concurrent SSH sessions,
/// five minutes of idle time and thirty seconds of waiting for a free slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Interval of the idle sweep. Zero disables the background sweep.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_max_connections() -> usize {
    2
}

fn default_idle_timeout_secs() -> u64 {
    5 * 60
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            idle_timeout_secs: default_idle_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), ConnectError> {
        if self.max_connections == 0 {
            return Err(ConnectError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.acquire_timeout_secs == 0 {
            return Err(ConnectError::InvalidConfig(
                "acquire_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }
}

/// Exponential backoff for retryable executor failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Relative jitter applied to every delay, 0.0 to 1.0.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_jitter() -> f64 {
    0.1
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Everything needed to manage one router, as loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManagerConfig {
    pub router: RouterConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub wrap: WrapConfig,
    /// Lifetime of a cached configuration dump in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Read the dump with `show config` when the SFTP download fails.
    #[serde(default = "default_sftp_fallback")]
    pub sftp_fallback: bool,
}

fn default_cache_ttl_secs() -> u64 {
    5 * 60
}

fn default_sftp_fallback() -> bool {
    true
}

impl ManagerConfig {
    pub fn from_json(text: &str) -> Result<Self, ConnectError> {
        let config: ManagerConfig = serde_json::from_str(text)
            .map_err(|err| ConnectError::InvalidConfig(format!("manager config: {err}")))?;
        config.router.validate()?;
        config.pool.validate()?;
        Ok(config)
    }
}

pub const SECURE_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
    kex::DH_G16_SHA512,
    kex::DH_G14_SHA256,
];

pub const BALANCED_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::DH_G14_SHA256,
    kex::DH_GEX_SHA256,
    kex::DH_G14_SHA1,
];

/// Older RTX firmware only offers the SHA-1 group exchanges.
pub const LEGACY_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::ECDH_SHA2_NISTP256,
    kex::DH_G14_SHA256,
    kex::DH_GEX_SHA256,
    kex::DH_G14_SHA1,
    kex::DH_GEX_SHA1,
    kex::DH_G1_SHA1,
];

pub const SECURE_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
];

pub const BALANCED_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
    cipher::AES_256_CBC,
];

pub const LEGACY_CIPHERS: &[cipher::Name] = &[
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
    cipher::AES_256_CBC,
    cipher::AES_192_CBC,
    cipher::AES_128_CBC,
];

pub const SECURE_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512,
    mac::HMAC_SHA256,
];

pub const BALANCED_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512,
    mac::HMAC_SHA256,
    mac::HMAC_SHA1,
];

pub const LEGACY_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA256,
    mac::HMAC_SHA512,
    mac::HMAC_SHA1,
    mac::HMAC_SHA1_ETM,
];

pub const DEFAULT_COMPRESSION_ALGORITHMS: &[compression::Name] = &[compression::NONE];

pub const SECURE_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
];

pub const BALANCED_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa { hash: None },
];

pub const LEGACY_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa { hash: None },
    Algorithm::Dsa,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ed25519,
];

#[cfg(test)]
mod tests {
    use super::{HostKeyPolicy, ManagerConfig, PoolConfig, RouterConfig};
    use crate::error::ConnectError;
    use crate::session::SecurityLevel;
    use std::time::Duration;

    #[test]
    fn router_config_applies_defaults() {
        let config = RouterConfig::from_json(
            r#"{"host":"192.168.100.1","username":"admin","password":"pw"}"#,
        )
        .expect("router config should parse");

        assert_eq!(config.port, 22);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.host_key, HostKeyPolicy::DefaultKnownHosts);
        assert_eq!(config.security_level, SecurityLevel::Balanced);
        assert_eq!(config.admin_password(), "pw");
        assert_eq!(config.device_addr(), "admin@192.168.100.1:22");
    }

    #[test]
    fn router_config_rejects_empty_host() {
        let err = match RouterConfig::from_json(r#"{"host":" ","username":"a","password":"b"}"#) {
            Ok(_) => panic!("empty host should be rejected"),
            Err(err) => err,
        };
        assert!(matches!(err, ConnectError::InvalidConfig(_)));
    }

    #[test]
    fn host_key_policy_is_tagged() {
        let config = RouterConfig::from_json(
            r#"{"host":"r1","username":"a","password":"b","admin_password":"c",
                "host_key":{"kind":"known_hosts_file","value":"/tmp/kh"}}"#,
        )
        .expect("router config should parse");
        assert_eq!(
            config.host_key,
            HostKeyPolicy::KnownHostsFile("/tmp/kh".into())
        );
        assert_eq!(config.admin_password(), "c");
    }

    #[test]
    fn pool_defaults_match_router_session_limit() {
        let pool = PoolConfig::default();
        assert_eq!(pool.max_connections, 2);
        assert_eq!(pool.idle_timeout(), Duration::from_secs(300));
        assert_eq!(pool.acquire_timeout(), Duration::from_secs(30));
        assert_eq!(pool.cleanup_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_cleanup_interval_disables_sweep() {
        let pool = PoolConfig {
            cleanup_interval_secs: 0,
            ..PoolConfig::default()
        };
        assert_eq!(pool.cleanup_interval(), None);
    }

    #[test]
    fn manager_config_falls_back_to_show_config_by_default() {
        let config =
            ManagerConfig::from_json(r#"{"router":{"host":"r1","username":"a","password":"b"}}"#)
                .expect("manager config should parse");
        assert!(config.sftp_fallback);
        assert_eq!(config.cache_ttl_secs, 300);
    }

    #[test]
    fn manager_config_rejects_zero_pool_size() {
        let err = match ManagerConfig::from_json(
            r#"{"router":{"host":"r1","username":"a","password":"b"},
                "pool":{"max_connections":0}}"#,
        ) {
            Ok(_) => panic!("zero pool size should be rejected"),
            Err(err) => err,
        };
        assert!(matches!(err, ConnectError::InvalidConfig(_)));
    }
}
