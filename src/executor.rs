//! The single entry point for running commands on a router.
//!
//! [`SessionExecutor`] borrows a connection from the pool, enters
//! administrator mode when the commands need it and the connection has not
//! done so yet, runs the commands in order and hands the connection back.
//! Connections whose transport failed or whose escalation was refused are
//! discarded; connections on which the router merely rejected a command are
//! released, because the session is still in sync.

use log::debug;

use crate::config::{ManagerConfig, RetryPolicy};
use crate::error::ConnectError;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::retry::with_retry;
use crate::session::{CommandSession, Output, SessionFactory, SshSessionFactory};

pub struct SessionExecutor<F: SessionFactory> {
    pool: ConnectionPool<F>,
    admin_password: Option<String>,
    retry: RetryPolicy,
}

impl SessionExecutor<SshSessionFactory> {
    /// Builds an SSH backed executor from a loaded configuration.
    pub fn from_config(config: &ManagerConfig) -> Result<Self, ConnectError> {
        let factory = SshSessionFactory::new(config.router.clone())?;
        let pool = ConnectionPool::new(factory, config.pool.clone())?;
        Ok(SessionExecutor::new(
            pool,
            Some(config.router.admin_password().to_string()),
        )
        .with_retry_policy(config.retry.clone()))
    }
}

impl<F: SessionFactory> SessionExecutor<F> {
    pub fn new(pool: ConnectionPool<F>, admin_password: Option<String>) -> Self {
        Self {
            pool,
            admin_password,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pool(&self) -> &ConnectionPool<F> {
        &self.pool
    }

    /// Runs `commands` on one connection and returns their joined output.
    pub async fn run<S: AsRef<str>>(
        &self,
        commands: &[S],
        requires_privileged: bool,
    ) -> Result<String, ConnectError> {
        let outputs = self.run_batch(commands, requires_privileged).await?;
        Ok(outputs
            .iter()
            .map(|output| output.content.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Runs a single command.
    pub async fn run_one(
        &self,
        command: &str,
        requires_privileged: bool,
    ) -> Result<String, ConnectError> {
        self.run(&[command], requires_privileged).await
    }

    /// Runs `commands` on one connection with one escalation and returns
    /// every command's output.
    ///
    /// Stops at the first failing command.
    pub async fn run_batch<S: AsRef<str>>(
        &self,
        commands: &[S],
        requires_privileged: bool,
    ) -> Result<Vec<Output>, ConnectError> {
        let mut conn = self.pool.acquire().await?;
        let result = self
            .execute_on(&mut conn, commands, requires_privileged)
            .await;

        match result {
            Ok(outputs) => {
                self.pool.release(conn).await;
                Ok(outputs)
            }
            Err(err) if err.poisons_connection() => {
                debug!("{} failed, discarding: {}", conn.pool_id(), err);
                self.pool.discard(conn).await;
                Err(err)
            }
            Err(err) => {
                self.pool.release(conn).await;
                Err(err)
            }
        }
    }

    /// [`run`](Self::run) retried with backoff on transport failures and
    /// pool timeouts. Each retry acquires a fresh connection.
    pub async fn run_with_retry<S: AsRef<str>>(
        &self,
        commands: &[S],
        requires_privileged: bool,
    ) -> Result<String, ConnectError> {
        with_retry(&self.retry, |_| self.run(commands, requires_privileged)).await
    }

    async fn execute_on<S: AsRef<str>>(
        &self,
        conn: &mut PooledConnection<F::Session>,
        commands: &[S],
        requires_privileged: bool,
    ) -> Result<Vec<Output>, ConnectError> {
        if requires_privileged && !conn.is_privileged() {
            let password = self.admin_password.as_deref().ok_or_else(|| {
                ConnectError::InvalidConfig("administrator password is not configured".to_string())
            })?;
            debug!("{} entering administrator mode", conn.pool_id());
            conn.session_mut().escalate(password).await?;
            conn.mark_privileged();
        }

        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            let command = command.as_ref();
            debug!("{} exec: {}", conn.pool_id(), command);
            let output = conn.session_mut().execute(command).await?;
            if !output.success {
                return Err(ConnectError::CommandRejected {
                    command: command.to_string(),
                    output: output.content,
                });
            }
            outputs.push(output);
        }
        Ok(outputs)
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::SessionExecutor;
    use crate::config::{PoolConfig, RetryPolicy};
    use crate::error::ConnectError;
    use crate::pool::ConnectionPool;
    use crate::session::{CommandSession, Output, SessionFactory};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Journal {
        escalations: AtomicUsize,
        created: AtomicUsize,
        closed: AtomicUsize,
        commands: Mutex<Vec<String>>,
    }

    struct ScriptSession {
        journal: Arc<Journal>,
        admin: bool,
    }

    impl CommandSession for ScriptSession {
        async fn execute(&mut self, command: &str) -> Result<Output, ConnectError> {
            self.journal
                .commands
                .lock()
                .expect("journal lock")
                .push(command.to_string());
            match command {
                "drop" => Err(ConnectError::ChannelDisconnectError),
                "bad" => Ok(Output {
                    success: false,
                    content: "Error: Invalid parameter".to_string(),
                    all: String::new(),
                    prompt: None,
                }),
                "whoami" => Ok(Output {
                    success: true,
                    content: if self.admin { "admin" } else { "user" }.to_string(),
                    all: String::new(),
                    prompt: None,
                }),
                _ => Ok(Output {
                    success: true,
                    content: format!("ok {command}"),
                    all: String::new(),
                    prompt: None,
                }),
            }
        }

        async fn escalate(&mut self, password: &str) -> Result<(), ConnectError> {
            self.journal.escalations.fetch_add(1, Ordering::SeqCst);
            if password != "secret" {
                return Err(ConnectError::PrivilegeRejected(
                    "Password incorrect".to_string(),
                ));
            }
            self.admin = true;
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ConnectError> {
            self.journal.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    struct ScriptFactory {
        journal: Arc<Journal>,
    }

    impl SessionFactory for ScriptFactory {
        type Session = ScriptSession;

        async fn connect(&self) -> Result<ScriptSession, ConnectError> {
            self.journal.created.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptSession {
                journal: self.journal.clone(),
                admin: false,
            })
        }
    }

    fn executor(password: Option<&str>) -> (SessionExecutor<ScriptFactory>, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        let pool = ConnectionPool::new(
            ScriptFactory {
                journal: journal.clone(),
            },
            PoolConfig {
                max_connections: 1,
                acquire_timeout_secs: 1,
                cleanup_interval_secs: 0,
                ..PoolConfig::default()
            },
        )
        .expect("pool");
        let executor = SessionExecutor::new(pool, password.map(str::to_string)).with_retry_policy(
            RetryPolicy {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 2,
                jitter: 0.0,
            },
        );
        (executor, journal)
    }

    #[tokio::test]
    async fn escalates_once_per_connection() {
        let (executor, journal) = executor(Some("secret"));

        let out = executor.run(&["whoami"], true).await.expect("first run");
        assert_eq!(out, "admin");
        let out = executor.run(&["whoami"], true).await.expect("second run");
        assert_eq!(out, "admin");

        assert_eq!(journal.escalations.load(Ordering::SeqCst), 1);
        assert_eq!(journal.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unprivileged_run_skips_escalation() {
        let (executor, journal) = executor(Some("secret"));
        let out = executor
            .run(&["show status", "whoami"], false)
            .await
            .expect("run");
        assert_eq!(out, "ok show status\nuser");
        assert_eq!(journal.escalations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transport_failure_discards_connection() {
        let (executor, journal) = executor(Some("secret"));

        let err = match executor.run(&["drop"], false).await {
            Ok(_) => panic!("transport failure expected"),
            Err(err) => err,
        };
        assert!(err.is_retryable());
        assert_eq!(journal.closed.load(Ordering::SeqCst), 1);
        assert_eq!(executor.pool().stats().available, 0);

        executor.run(&["whoami"], false).await.expect("fresh connection");
        assert_eq!(journal.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_privilege_discards_connection() {
        let (executor, journal) = executor(Some("wrong"));
        let err = match executor.run(&["whoami"], true).await {
            Ok(_) => panic!("escalation should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, ConnectError::PrivilegeRejected(_)));
        assert_eq!(journal.closed.load(Ordering::SeqCst), 1);
        assert!(journal.commands.lock().expect("journal lock").is_empty());
    }

    #[tokio::test]
    async fn missing_admin_password_is_a_config_error() {
        let (executor, journal) = executor(None);
        let err = match executor.run(&["whoami"], true).await {
            Ok(_) => panic!("no password configured"),
            Err(err) => err,
        };
        assert!(matches!(err, ConnectError::InvalidConfig(_)));
        assert_eq!(journal.closed.load(Ordering::SeqCst), 0);
        assert_eq!(executor.pool().stats().available, 1);
    }

    #[tokio::test]
    async fn rejected_command_releases_connection() {
        let (executor, journal) = executor(Some("secret"));
        let err = match executor.run(&["ok1", "bad", "never"], false).await {
            Ok(_) => panic!("command should be rejected"),
            Err(err) => err,
        };
        match err {
            ConnectError::CommandRejected { command, output } => {
                assert_eq!(command, "bad");
                assert!(output.contains("Invalid parameter"));
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(journal.closed.load(Ordering::SeqCst), 0);
        assert_eq!(executor.pool().stats().available, 1);
        assert_eq!(
            *journal.commands.lock().expect("journal lock"),
            vec!["ok1".to_string(), "bad".to_string()]
        );
    }

    #[tokio::test]
    async fn retry_gives_up_on_persistent_transport_failure() {
        let (executor, journal) = executor(Some("secret"));
        let err = match executor.run_with_retry(&["drop"], false).await {
            Ok(_) => panic!("every attempt fails"),
            Err(err) => err,
        };
        assert!(matches!(err, ConnectError::ChannelDisconnectError));
        assert_eq!(journal.created.load(Ordering::SeqCst), 3);
        assert_eq!(journal.closed.load(Ordering::SeqCst), 3);
    }
}
