use super::*;

const TERMINAL_TYPE: &str = "vt100";
const TERMINAL_COLUMNS: u32 = 80;
const TERMINAL_ROWS: u32 = 40;

/// Switches the router's console output to plain ASCII.
const ASCII_CONSOLE_COMMAND: &str = "console character en.ascii";

/// Reply fragments (lowercased) that mean the administrator password was refused.
const PRIVILEGE_FAILURE_MARKERS: &[&str] = &["incorrect", "failed", "invalid"];

/// An interactive shell session on one SSH connection.
pub struct RtxSession {
    client: Client,
    sender: Sender<String>,
    recv: Receiver<String>,
    handler: RtxShellHandler,
    prompt: String,
    device_addr: String,
    timeout: Duration,
}

/// Opens an authenticated SSH connection to the router.
pub(crate) async fn connect_client(
    router: &RouterConfig,
    security_options: &ConnectionSecurityOptions,
) -> Result<Client, ConnectError> {
    let config = Config {
        preferred: security_options.preferred(),
        inactivity_timeout: Some(Duration::from_secs(60)),
        ..Default::default()
    };

    let client = Client::connect_with_config(
        (router.host.clone(), router.port),
        &router.username,
        AuthMethod::with_password(&router.password),
        security_options.server_check.clone(),
        config,
    )
    .await?;
    debug!("{} TCP connection successful", router.device_addr());
    Ok(client)
}

impl RtxSession {
    /// Dials the router, opens the shell and waits for the login prompt.
    pub async fn connect(
        router: &RouterConfig,
        security_options: &ConnectionSecurityOptions,
    ) -> Result<RtxSession, ConnectError> {
        let device_addr = router.device_addr();
        let client = connect_client(router, security_options).await?;

        let mut channel = client.get_channel().await?;
        channel
            .request_pty(
                false,
                TERMINAL_TYPE,
                TERMINAL_COLUMNS,
                TERMINAL_ROWS,
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(false).await?;
        debug!("{} Shell request successful", device_addr);

        let (sender_to_shell, mut receiver_from_user) = mpsc::channel::<String>(256);
        let (sender_to_user, receiver_from_shell) = mpsc::channel::<String>(256);

        let io_task_device_addr = device_addr.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(data) = receiver_from_user.recv() => {
                        if let Err(e) = channel.data(data.as_bytes()).await {
                            debug!("{} Failed to send data to shell: {:?}", io_task_device_addr, e);
                            break;
                        }
                    },
                    Some(msg) = channel.wait() => {
                        match msg {
                            ChannelMsg::Data { ref data } => {
                                let text = String::from_utf8_lossy(data).into_owned();
                                if sender_to_user.send(text).await.is_err() {
                                    debug!("{} Shell output receiver dropped. Closing task.", io_task_device_addr);
                                    break;
                                }
                            }
                            ChannelMsg::ExitStatus { exit_status } => {
                                debug!("{} Shell exited with status code: {}", io_task_device_addr, exit_status);
                                let _ = channel.eof().await;
                                break;
                            }
                            ChannelMsg::Eof => {
                                debug!("{} Shell sent EOF.", io_task_device_addr);
                                break;
                            }
                            _ => {}
                        }
                    }
                    else => break,
                }
            }
            debug!("{} SSH I/O task ended.", io_task_device_addr);
        });

        let mut session = RtxSession {
            client,
            sender: sender_to_shell,
            recv: receiver_from_shell,
            handler: RtxShellHandler::new(),
            prompt: String::new(),
            device_addr,
            timeout: router.command_timeout(),
        };

        session.wait_initial_prompt().await?;

        let output = session.write(ASCII_CONSOLE_COMMAND).await?;
        if !output.success {
            debug!(
                "{} '{}' was refused: {}",
                session.device_addr, ASCII_CONSOLE_COMMAND, output.content
            );
        }

        Ok(session)
    }

    async fn wait_initial_prompt(&mut self) -> Result<(), ConnectError> {
        let handler = &mut self.handler;
        let recv = &mut self.recv;
        let prompt = &mut self.prompt;
        let mut buffer = String::new();
        let mut initial_output = String::new();

        let init_result: Result<Result<(), ConnectError>, _> =
            tokio::time::timeout(self.timeout, async {
                loop {
                    let Some(data) = recv.recv().await else {
                        return Err(ConnectError::ChannelDisconnectError);
                    };
                    trace!("{:?}", data);
                    let data = clean_output(&data);
                    buffer.push_str(&data);
                    initial_output.push_str(&data);

                    while let Some(newline_pos) = buffer.find('\n') {
                        let line = buffer.drain(..=newline_pos).collect::<String>();
                        handler.read(line.trim_end());
                    }

                    if !buffer.is_empty() {
                        let pending = IGNORE_START_LINE.replace(&buffer, "").to_string();
                        if handler.read_prompt(&pending) {
                            *prompt = pending;
                            return Ok(());
                        }
                    }
                }
            })
            .await;

        match init_result {
            Ok(Ok(())) => {
                debug!("{} Initial prompt: {:?}", self.device_addr, self.prompt);
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ConnectError::InitTimeout(if initial_output.is_empty() {
                "waiting for initial prompt".to_string()
            } else {
                initial_output
            })),
        }
    }

    /// Checks if the underlying SSH connection and its I/O task are alive.
    pub fn is_connected(&self) -> bool {
        !self.client.is_closed() && !self.sender.is_closed()
    }

    /// Whether the session currently sits at the administrator prompt.
    pub fn is_administrator(&self) -> bool {
        self.handler.is_administrator()
    }

    /// Executes a command with the session's default timeout.
    pub async fn write(&mut self, command: &str) -> Result<Output, ConnectError> {
        self.write_with_timeout(command, self.timeout).await
    }

    /// Executes a command and waits for the full output by matching the prompt.
    pub async fn write_with_timeout(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Output, ConnectError> {
        self.exchange(command, timeout, None).await
    }

    /// Sends one line and collects output until the next prompt, answering
    /// pager, save and password questions on the way.
    async fn exchange(
        &mut self,
        command: &str,
        timeout: Duration,
        admin_password: Option<&str>,
    ) -> Result<Output, ConnectError> {
        let handler = &mut self.handler;
        let recv = &mut self.recv;
        let sender = &self.sender;
        let prompt = &mut self.prompt;

        // 1. Clear any residual data in the receiver
        while recv.try_recv().is_ok() {}
        handler.begin_exchange();

        // 2. Send command to remote shell
        sender.send(format!("{}\r", command)).await?;

        // 3. Receive data
        let mut clean_lines = String::new();
        let mut line_buffer = String::new();

        let result: Result<Result<(), ConnectError>, _> = tokio::time::timeout(timeout, async {
            loop {
                let Some(data) = recv.recv().await else {
                    return Err(ConnectError::ChannelDisconnectError);
                };
                line_buffer.push_str(&clean_output(&data));

                while let Some(newline_pos) = line_buffer.find('\n') {
                    let line = line_buffer.drain(..=newline_pos).collect::<String>();
                    let trim_start = IGNORE_START_LINE.replace(&line, "");
                    let trimmed_line = trim_start.trim_end();
                    handler.read(trimmed_line);
                    clean_lines.push_str(trimmed_line);
                    clean_lines.push('\n');
                }

                // The prompt and interactive questions arrive without a newline.
                if !line_buffer.is_empty() {
                    let pending = IGNORE_START_LINE.replace(&line_buffer, "").to_string();
                    if handler.read_prompt(&pending) {
                        clean_lines.push_str(&pending);
                        *prompt = pending;
                        return Ok(());
                    }
                    if let Some(answer) = handler.read_need_write(&pending, admin_password)? {
                        trace!("Input required at state {:?}", handler.current_state());
                        clean_lines.push_str(pending.trim_end());
                        clean_lines.push('\n');
                        line_buffer.clear();
                        sender.send(answer).await?;
                    }
                }
            }
        })
        .await;

        match result {
            Err(_) => return Err(ConnectError::ExecTimeout(clean_lines)),
            Ok(Err(err)) => return Err(err),
            Ok(Ok(())) => {}
        }

        let all = clean_lines;
        let mut content = all.as_str();

        // Remove the echoed command from the beginning of the output
        if !command.is_empty() && content.starts_with(command) {
            content = content
                .strip_prefix(command)
                .unwrap_or(content)
                .trim_start_matches(['\n', '\r']);
        }

        // Remove the trailing prompt
        let content = match content.rfind('\n') {
            Some(pos) => &content[..pos],
            None => "",
        };

        Ok(Output {
            success: !self.handler.error(),
            content: content.to_string(),
            all: all.clone(),
            prompt: self.handler.current_prompt().map(|v| v.to_string()),
        })
    }

    /// Runs `administrator` and answers the password request.
    pub async fn enter_administrator(&mut self, password: &str) -> Result<(), ConnectError> {
        if self.handler.is_administrator() {
            return Ok(());
        }
        let output = self
            .exchange("administrator", self.timeout, Some(password))
            .await?;
        let reply = output.content.to_ascii_lowercase();
        if PRIVILEGE_FAILURE_MARKERS
            .iter()
            .any(|marker| reply.contains(marker))
            || !self.handler.is_administrator()
        {
            debug!("{} Administrator login rejected", self.device_addr);
            return Err(ConnectError::PrivilegeRejected(output.content));
        }
        debug!("{} Administrator mode entered", self.device_addr);
        Ok(())
    }

    /// Leaves administrator mode without saving, exits the shell and
    /// disconnects.
    pub async fn shutdown(&mut self) -> Result<(), ConnectError> {
        debug!("{} Closing RTX session...", self.device_addr);

        if self.is_connected() {
            if self.handler.is_administrator() {
                // The save question is answered with "N" by the handler.
                if let Err(e) = self.exchange("exit", Duration::from_secs(5), None).await {
                    debug!("{} Failed to leave administrator mode: {}", self.device_addr, e);
                }
            }
            if let Err(e) = self.sender.send("exit\r".to_string()).await {
                debug!("{} Failed to send exit command: {:?}", self.device_addr, e);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        self.recv.close();
        if let Err(e) = self.client.disconnect().await {
            debug!("{} Disconnect reported: {}", self.device_addr, e);
        }

        debug!("{} SSH connection safely closed", self.device_addr);
        Ok(())
    }
}

impl CommandSession for RtxSession {
    async fn execute(&mut self, command: &str) -> Result<Output, ConnectError> {
        self.write(command).await
    }

    async fn escalate(&mut self, password: &str) -> Result<(), ConnectError> {
        self.enter_administrator(password).await
    }

    async fn close(&mut self) -> Result<(), ConnectError> {
        self.shutdown().await
    }

    fn is_connected(&self) -> bool {
        RtxSession::is_connected(self)
    }
}

/// Dials [`RtxSession`]s for one router.
#[derive(Debug, Clone)]
pub struct SshSessionFactory {
    router: RouterConfig,
    security_options: ConnectionSecurityOptions,
}

impl SshSessionFactory {
    pub fn new(router: RouterConfig) -> Result<Self, ConnectError> {
        router.validate()?;
        let security_options = ConnectionSecurityOptions::from_router(&router)?;
        Ok(Self {
            router,
            security_options,
        })
    }

    pub fn router(&self) -> &RouterConfig {
        &self.router
    }
}

impl SessionFactory for SshSessionFactory {
    type Session = RtxSession;

    async fn connect(&self) -> Result<RtxSession, ConnectError> {
        RtxSession::connect(&self.router, &self.security_options).await
    }
}
