//! Error types for router sessions, the connection pool and configuration parsing.
//!
//! [`ConnectError`] covers everything that happens on the wire or in the pool.
//! [`ConfigError`] covers turning configuration text into records and back.

use std::time::Duration;

use russh_sftp::client::error::Error as SftpClientError;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

/// Errors raised while connecting to a router, executing commands or
/// managing pooled connections.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The SSH channel was disconnected while waiting for a prompt.
    ///
    /// This typically happens when the router closes the connection
    /// unexpectedly during login or command execution.
    #[error("channel disconnect on wait prompt")]
    ChannelDisconnectError,

    /// The SSH connection has been closed.
    #[error("connect closed")]
    ConnectClosedError,

    /// Command execution timed out.
    ///
    /// The error contains the partial output received before the timeout.
    #[error("exec command timeout: {0}")]
    ExecTimeout(String),

    /// The router never presented a prompt after login.
    #[error("init timeout: {0}")]
    InitTimeout(String),

    /// An error occurred in the async-ssh2-tokio library.
    #[error("async ssh2 error: {0}")]
    Ssh2Error(#[from] async_ssh2_tokio::Error),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    RusshError(#[from] russh::Error),

    /// Failed to send data through the channel.
    #[error("Failed to send data: {0}")]
    SendDataError(#[from] SendError<String>),

    /// The SFTP subsystem refused or failed a file transfer.
    #[error("sftp error: {0}")]
    SftpError(#[from] SftpClientError),

    /// The administrator password exchange was refused.
    ///
    /// The session state is unknown after a rejected escalation, so the
    /// connection carrying it must not be reused.
    #[error("administrator login rejected: {0}")]
    PrivilegeRejected(String),

    /// The router accepted the command line but reported an error for it.
    #[error("command '{command}' rejected: {output}")]
    CommandRejected { command: String, output: String },

    /// No pooled connection became available within the acquire timeout.
    #[error("timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(Duration),

    /// The pool has been closed and hands out no more connections.
    #[error("connection pool closed")]
    PoolClosed,

    /// Invalid router, pool or host key configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConnectError {
    /// Whether a fresh attempt on a new connection may succeed.
    ///
    /// Transport failures and pool exhaustion are retryable. Rejected
    /// privilege exchanges, rejected commands, a closed pool and bad
    /// configuration are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectError::ChannelDisconnectError
            | ConnectError::ConnectClosedError
            | ConnectError::ExecTimeout(_)
            | ConnectError::InitTimeout(_)
            | ConnectError::Ssh2Error(_)
            | ConnectError::RusshError(_)
            | ConnectError::SendDataError(_)
            | ConnectError::PoolTimeout(_) => true,
            ConnectError::SftpError(err) => {
                matches!(err, SftpClientError::IO(_) | SftpClientError::Timeout)
            }
            ConnectError::PrivilegeRejected(_)
            | ConnectError::CommandRejected { .. }
            | ConnectError::PoolClosed
            | ConnectError::InvalidConfig(_) => false,
        }
    }

    /// Whether the connection that produced this error can no longer be trusted.
    ///
    /// Such connections are discarded instead of returned to the pool.
    pub fn poisons_connection(&self) -> bool {
        !matches!(
            self,
            ConnectError::CommandRejected { .. }
                | ConnectError::SftpError(_)
                | ConnectError::PoolTimeout(_)
                | ConnectError::PoolClosed
                | ConnectError::InvalidConfig(_)
        )
    }
}

/// Errors raised while extracting records from configuration text or
/// building commands from records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A line matched an entity's command prefix but failed field validation.
    #[error("line {line_no}: {reason}: '{line}'")]
    Parse {
        line_no: usize,
        line: String,
        reason: String,
    },

    /// A token produced by joining a wrapped line without a separator
    /// failed numeric range validation, so the join was probably wrong.
    #[error("line {line_no}: rejoined token '{token}' outside {min}..={max}, check line wrapping")]
    SuspectReassembly {
        line_no: usize,
        token: String,
        min: u64,
        max: u64,
    },

    /// A record could not be rendered into commands.
    #[error("cannot build {entity} command: {reason}")]
    Build { entity: &'static str, reason: String },

    /// No codec is registered for the requested entity kind.
    #[error("no codec registered for {0}")]
    UnknownEntity(String),
}

impl ConfigError {
    pub(crate) fn build(entity: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Build {
            entity,
            reason: reason.into(),
        }
    }
}
