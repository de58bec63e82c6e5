use super::*;
use super::client::connect_client;

const SFTP_SUBSYSTEM: &str = "sftp";

/// Downloads files from the router over SFTP.
///
/// Every download dials its own SSH connection, so transfers never occupy a
/// pooled command session. The router must list the client's interface in
/// `sftpd host`.
#[derive(Debug, Clone)]
pub struct SftpTransfer {
    router: RouterConfig,
    security_options: ConnectionSecurityOptions,
}

impl SftpTransfer {
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

impl FileTransfer for SftpTransfer {
    async fn download(&self, path: &str) -> Result<Vec<u8>, ConnectError> {
        let device_addr = self.router.device_addr();
        let timeout = self.router.command_timeout();

        let transfer = async {
            let client = connect_client(&self.router, &self.security_options).await?;
            let result = read_file(&client, path).await;
            if let Err(e) = client.disconnect().await {
                debug!("{} SFTP disconnect reported: {}", device_addr, e);
            }
            result
        };

        let contents = match tokio::time::timeout(timeout, transfer).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ConnectError::ExecTimeout(format!(
                    "sftp download of {path}"
                )));
            }
        };
        debug!(
            "{} Downloaded {} over SFTP ({} bytes)",
            device_addr,
            path,
            contents.len()
        );
        Ok(contents)
    }
}

async fn read_file(client: &Client, path: &str) -> Result<Vec<u8>, ConnectError> {
    let channel = client.get_channel().await?;
    channel.request_subsystem(true, SFTP_SUBSYSTEM).await?;
    let sftp = SftpSession::new(channel.into_stream()).await?;

    let contents = sftp.read(path).await;
    if let Err(e) = sftp.close().await {
        trace!("SFTP session close reported: {}", e);
    }
    Ok(contents?)
}
