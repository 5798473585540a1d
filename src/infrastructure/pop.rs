use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;
use tracing::{debug, info};

use crate::services::source::storage::{MailFlag, MailStorage, RawMail};

trait PopStream: AsyncRead + AsyncWrite + Send + Sync + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin> PopStream for T {}

/// One authenticated POP3 session over a plain or TLS stream.
struct PopConnection {
    reader: BufReader<ReadHalf<Box<dyn PopStream>>>,
    writer: WriteHalf<Box<dyn PopStream>>,
}

impl PopConnection {
    async fn command(&mut self, line: &str) -> Result<String> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        self.read_status_line().await
    }

    async fn read_status_line(&mut self) -> Result<String> {
        let line = self.read_line_bytes().await?;
        let line = String::from_utf8_lossy(&line).into_owned();
        if line.starts_with("+OK") {
            Ok(line)
        } else {
            bail!("POP3 server replied: {line}")
        }
    }

    async fn read_line_bytes(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let read = self.reader.read_until(b'\n', &mut line).await?;
        if read == 0 {
            bail!("connection closed by POP3 server");
        }
        if line.ends_with(b"\n") {
            line.pop();
        }
        if line.ends_with(b"\r") {
            line.pop();
        }
        Ok(line)
    }

    /// Reads a multi-line response body up to the terminating dot line,
    /// undoing the POP3 dot-stuffing.
    async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        loop {
            let line = self.read_line_bytes().await?;
            if line == b"." {
                break;
            }
            body.extend_from_slice(unstuff_line(&line));
            body.extend_from_slice(b"\r\n");
        }
        Ok(body)
    }
}

fn unstuff_line(line: &[u8]) -> &[u8] {
    if line.first() == Some(&b'.') {
        &line[1..]
    } else {
        line
    }
}

/// Parses the message count out of a `+OK <count> <octets>` STAT response.
fn parse_stat_count(status: &str) -> Result<u32> {
    status
        .split_whitespace()
        .nth(1)
        .with_context(|| format!("malformed STAT response: {status}"))?
        .parse()
        .with_context(|| format!("malformed STAT response: {status}"))
}

/// POP3 storage backend.
///
/// Speaks the minimal command set (USER/PASS/STAT/RETR/QUIT) this crate
/// needs; POP3 has neither folders nor flags, so those operations are a
/// rejection and a no-op respectively.
pub struct PopStorage {
    server: String,
    port: u16,
    username: String,
    password: String,
    use_tls: bool,
    connection: Option<PopConnection>,
}

impl PopStorage {
    pub fn new(
        server: String,
        port: u16,
        username: String,
        password: String,
        use_tls: bool,
    ) -> Self {
        Self {
            server,
            port,
            username,
            password,
            use_tls,
            connection: None,
        }
    }

    fn connection(&mut self) -> Result<&mut PopConnection> {
        self.connection
            .as_mut()
            .context("POP3 session not connected")
    }
}

#[async_trait]
impl MailStorage for PopStorage {
    async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        info!("Connecting to POP3 server {}:{}", self.server, self.port);
        let tcp_stream = TcpStream::connect((self.server.as_str(), self.port))
            .await
            .context("failed to connect to POP3 server (TCP)")?;

        let stream: Box<dyn PopStream> = if self.use_tls {
            let native_tls = native_tls::TlsConnector::builder()
                .build()
                .context("failed to create TLS connector")?;
            let connector = TlsConnector::from(native_tls);
            Box::new(
                connector
                    .connect(&self.server, tcp_stream)
                    .await
                    .context("failed to establish TLS connection")?,
            )
        } else {
            Box::new(tcp_stream)
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let mut connection = PopConnection {
            reader: BufReader::new(read_half),
            writer: write_half,
        };

        connection
            .read_status_line()
            .await
            .context("POP3 server greeting failed")?;
        connection
            .command(&format!("USER {}", self.username))
            .await
            .context("POP3 USER rejected")?;
        connection
            .command(&format!("PASS {}", self.password))
            .await
            .context("POP3 authentication failed")?;

        info!("Connected to POP3 server {}", self.server);
        self.connection = Some(connection);
        Ok(())
    }

    async fn count_messages(&mut self) -> Result<u32> {
        let status = self.connection()?.command("STAT").await?;
        parse_stat_count(&status)
    }

    async fn fetch_message(&mut self, sequence: u32) -> Result<RawMail> {
        let connection = self.connection()?;
        connection
            .command(&format!("RETR {sequence}"))
            .await
            .with_context(|| format!("failed to retrieve message {sequence}"))?;
        let body = connection.read_multiline().await?;
        Ok(RawMail {
            sequence,
            flags: Vec::new(),
            body,
        })
    }

    async fn set_flags(&mut self, sequence: u32, _flags: &[MailFlag]) -> Result<()> {
        debug!("POP3 has no flags, ignoring flag update for message {}", sequence);
        Ok(())
    }

    async fn select_folder(&mut self, folder: &str) -> Result<()> {
        bail!("POP3 has no folders (requested '{folder}')")
    }

    async fn logout(&mut self) -> Result<()> {
        if let Some(mut connection) = self.connection.take() {
            connection.command("QUIT").await.context("POP3 QUIT failed")?;
        }
        Ok(())
    }
}
