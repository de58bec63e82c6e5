//! Interactive shell sessions on RTX routers.
//!
//! An RTX router allows exactly one command session per SSH connection. A
//! [`CommandSession`] is that one session: it runs line-oriented commands,
//! performs the administrator password exchange and closes cleanly. The
//! [`SessionFactory`] trait is the seam the connection pool dials through, so
//! the pool can be driven by scripted sessions in tests.
//!
//! # Main Components
//!
//! - [`RtxSession`] - SSH shell session with prompt tracking
//! - [`SshSessionFactory`] - Dials [`RtxSession`]s for one router
//! - [`SftpTransfer`] - Downloads router files over a separate SFTP connection
//! - [`Output`] - Command execution results

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use log::{debug, trace};
use russh::{ChannelMsg, Preferred};
use russh_sftp::client::SftpSession;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::config::{self, HostKeyPolicy, RouterConfig};
use crate::device::{IGNORE_START_LINE, RtxShellHandler, clean_output};
use crate::error::ConnectError;

pub use client::{RtxSession, SshSessionFactory};
pub use security::{ConnectionSecurityOptions, SecurityLevel};
pub use sftp::SftpTransfer;

/// The output result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// False when the router printed an error line for the command.
    pub success: bool,
    /// Output without the echoed command and the trailing prompt.
    pub content: String,
    /// Everything received, echo and prompt included.
    pub all: String,
    /// Prompt the router printed after the command.
    pub prompt: Option<String>,
}

/// One live command session on a router.
///
/// Implementations are driven by a single owner at a time; the pool never
/// hands the same session to two callers.
pub trait CommandSession: Send + 'static {
    /// Runs one command line and waits for the next prompt.
    fn execute(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<Output, ConnectError>> + Send;

    /// Switches the session into administrator mode.
    fn escalate(&mut self, password: &str)
    -> impl Future<Output = Result<(), ConnectError>> + Send;

    /// Leaves the session and releases the transport.
    fn close(&mut self) -> impl Future<Output = Result<(), ConnectError>> + Send;

    /// Whether the underlying transport is still usable.
    fn is_connected(&self) -> bool;
}

/// Creates new sessions for the connection pool.
pub trait SessionFactory: Send + Sync + 'static {
    type Session: CommandSession;

    fn connect(&self) -> impl Future<Output = Result<Self::Session, ConnectError>> + Send;
}

/// Reads whole files from the router outside the command session.
pub trait FileTransfer: Send + Sync + 'static {
    fn download(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, ConnectError>> + Send;
}

mod client;
mod security;
mod sftp;
