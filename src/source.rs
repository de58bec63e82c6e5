//! Where configuration dumps come from.
//!
//! A [`ConfigSource`] produces the full text of a router's configuration.
//! [`SftpConfigSource`] downloads the boot config file over a separate SFTP
//! connection and falls back to the command session when that fails.
//! [`SessionConfigSource`] reads it over the router's command session;
//! [`StaticConfigSource`] serves fixed text, for replaying a saved dump.

use std::future::Future;
use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ManagerConfig;
use crate::error::ConnectError;
use crate::executor::SessionExecutor;
use crate::session::{FileTransfer, SessionFactory, SftpTransfer};

/// Config file used when `show environment` names none.
pub const DEFAULT_CONFIG_PATH: &str = "/system/config0";

const SHOW_CONFIG_COMMAND: &str = "show config";
const SHOW_ENVIRONMENT_COMMAND: &str = "show environment";

static DEFAULT_CONFIG_FILE: Lazy<Regex> = Lazy::new(|| {
    match Regex::new(r"(?i)default\s+config\s+file:\s*config(\d+)") {
        Ok(re) => re,
        Err(err) => panic!("invalid config file regex: {err}"),
    }
});

/// Resolves the active config file from `show environment` output.
pub fn config_file_path(environment: &str) -> String {
    match DEFAULT_CONFIG_FILE
        .captures(environment)
        .and_then(|caps| caps.get(1))
    {
        Some(number) => format!("/system/config{}", number.as_str()),
        None => DEFAULT_CONFIG_PATH.to_string(),
    }
}

/// Produces the complete configuration text of one router.
pub trait ConfigSource: Send + Sync {
    /// Identifies the router the text belongs to.
    fn key(&self) -> &str;

    fn fetch(&self) -> impl Future<Output = Result<String, ConnectError>> + Send;
}

/// Reads the running configuration with `show config`.
///
/// The command needs administrator mode, which the executor enters once per
/// pooled connection.
pub struct SessionConfigSource<F: SessionFactory> {
    executor: Arc<SessionExecutor<F>>,
    key: String,
}

impl<F: SessionFactory> SessionConfigSource<F> {
    pub fn new(executor: Arc<SessionExecutor<F>>, key: impl Into<String>) -> Self {
        Self {
            executor,
            key: key.into(),
        }
    }

    pub fn executor(&self) -> &Arc<SessionExecutor<F>> {
        &self.executor
    }

    /// Path of the config file the router boots from.
    pub async fn config_path(&self) -> Result<String, ConnectError> {
        let environment = self
            .executor
            .run_with_retry(&[SHOW_ENVIRONMENT_COMMAND], false)
            .await?;
        let path = config_file_path(&environment);
        debug!("{} config file is {}", self.key, path);
        Ok(path)
    }
}

impl<F: SessionFactory> ConfigSource for SessionConfigSource<F> {
    fn key(&self) -> &str {
        &self.key
    }

    async fn fetch(&self) -> Result<String, ConnectError> {
        debug!("{} fetching configuration", self.key);
        let text = self
            .executor
            .run_with_retry(&[SHOW_CONFIG_COMMAND], true)
            .await?;
        debug!("{} received {} bytes of configuration", self.key, text.len());
        Ok(text)
    }
}

/// Downloads the config file named by `show environment` over SFTP.
///
/// The path lookup runs on the command session. When the download fails
/// and fallback is enabled, the dump is read in-band with `show config`.
pub struct SftpConfigSource<F: SessionFactory, T: FileTransfer = SftpTransfer> {
    session: SessionConfigSource<F>,
    transfer: T,
    fallback: bool,
}

impl<F: SessionFactory> SftpConfigSource<F, SftpTransfer> {
    pub fn from_config(
        executor: Arc<SessionExecutor<F>>,
        config: &ManagerConfig,
    ) -> Result<Self, ConnectError> {
        let transfer = SftpTransfer::new(config.router.clone())?;
        let session = SessionConfigSource::new(executor, config.router.device_addr());
        Ok(Self::new(session, transfer, config.sftp_fallback))
    }
}

impl<F: SessionFactory, T: FileTransfer> SftpConfigSource<F, T> {
    pub fn new(session: SessionConfigSource<F>, transfer: T, fallback: bool) -> Self {
        Self {
            session,
            transfer,
            fallback,
        }
    }

    pub fn session(&self) -> &SessionConfigSource<F> {
        &self.session
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    async fn download(&self) -> Result<String, ConnectError> {
        let path = self.session.config_path().await?;
        debug!("{} downloading {}", self.key(), path);
        let bytes = self.transfer.download(&path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl<F: SessionFactory, T: FileTransfer> ConfigSource for SftpConfigSource<F, T> {
    fn key(&self) -> &str {
        self.session.key()
    }

    async fn fetch(&self) -> Result<String, ConnectError> {
        match self.download().await {
            Ok(text) => Ok(text),
            Err(err) if self.fallback => {
                debug!(
                    "{} SFTP download failed, reading in-band: {}",
                    self.key(),
                    err
                );
                self.session.fetch().await
            }
            Err(err) => Err(err),
        }
    }
}

/// Serves the same text on every fetch.
#[derive(Debug, Clone)]
pub struct StaticConfigSource {
    key: String,
    text: String,
}

impl StaticConfigSource {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

impl ConfigSource for StaticConfigSource {
    fn key(&self) -> &str {
        &self.key
    }

    async fn fetch(&self) -> Result<String, ConnectError> {
        Ok(self.text.clone())
    }
}
