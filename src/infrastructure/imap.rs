use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;
use tracing::{debug, info};

use crate::services::source::storage::{MailFlag, MailStorage, RawMail};

type TlsSession = async_imap::Session<tokio_native_tls::TlsStream<TcpStream>>;
type PlainSession = async_imap::Session<TcpStream>;

/// One logged-in IMAP session, encrypted or plain.
enum ImapSession {
    Tls(TlsSession),
    Plain(PlainSession),
}

impl ImapSession {
    async fn select(&mut self, folder: &str) -> Result<async_imap::types::Mailbox> {
        let mailbox = match self {
            Self::Tls(session) => session.select(folder).await,
            Self::Plain(session) => session.select(folder).await,
        }
        .with_context(|| format!("failed to select mailbox '{folder}'"))?;
        Ok(mailbox)
    }

    async fn fetch(
        &mut self,
        sequence_set: &str,
        query: &str,
    ) -> Result<BoxStream<'_, async_imap::error::Result<async_imap::types::Fetch>>> {
        Ok(match self {
            Self::Tls(session) => session.fetch(sequence_set, query).await?.boxed(),
            Self::Plain(session) => session.fetch(sequence_set, query).await?.boxed(),
        })
    }

    async fn store(&mut self, sequence_set: &str, query: &str) -> Result<()> {
        match self {
            Self::Tls(session) => {
                let mut stream = session.store(sequence_set, query).await?;
                while let Some(item) = stream.next().await {
                    item?;
                }
            }
            Self::Plain(session) => {
                let mut stream = session.store(sequence_set, query).await?;
                while let Some(item) = stream.next().await {
                    item?;
                }
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        match self {
            Self::Tls(session) => session.logout().await?,
            Self::Plain(session) => session.logout().await?,
        }
        Ok(())
    }
}

/// IMAP storage backend delegating the wire protocol to `async-imap`.
pub struct ImapStorage {
    server: String,
    port: u16,
    username: String,
    password: String,
    use_tls: bool,
    session: Option<ImapSession>,
    message_count: Option<u32>,
}

impl ImapStorage {
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
            session: None,
            message_count: None,
        }
    }

    fn session(&mut self) -> Result<&mut ImapSession> {
        self.session.as_mut().context("IMAP session not connected")
    }
}

#[async_trait]
impl MailStorage for ImapStorage {
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        info!("Connecting to IMAP server {}:{}", self.server, self.port);
        let tcp_stream = TcpStream::connect((self.server.as_str(), self.port))
            .await
            .context("failed to connect to IMAP server (TCP)")?;

        let session = if self.use_tls {
            let native_tls = native_tls::TlsConnector::builder()
                .build()
                .context("failed to create TLS connector")?;
            let connector = TlsConnector::from(native_tls);
            let tls_stream = connector
                .connect(&self.server, tcp_stream)
                .await
                .context("failed to establish TLS connection")?;
            let client = async_imap::Client::new(tls_stream);
            ImapSession::Tls(
                client
                    .login(&self.username, &self.password)
                    .await
                    .map_err(|e| e.0)
                    .context("IMAP authentication failed")?,
            )
        } else {
            let client = async_imap::Client::new(tcp_stream);
            ImapSession::Plain(
                client
                    .login(&self.username, &self.password)
                    .await
                    .map_err(|e| e.0)
                    .context("IMAP authentication failed")?,
            )
        };

        info!("Connected to IMAP server {}", self.server);
        self.session = Some(session);
        Ok(())
    }

    async fn count_messages(&mut self) -> Result<u32> {
        self.message_count.context("no mailbox selected")
    }

    async fn fetch_message(&mut self, sequence: u32) -> Result<RawMail> {
        let session = self.session()?;
        let mut fetched = None;
        {
            let mut stream = session
                .fetch(&sequence.to_string(), "(FLAGS RFC822)")
                .await
                .with_context(|| format!("failed to fetch message {sequence}"))?;
            while let Some(item) = stream.next().await {
                let fetch = item.with_context(|| format!("failed to read fetch result for message {sequence}"))?;
                let flags = fetch.flags().filter_map(flag_from_imap).collect();
                let body = fetch.body().map(|body| body.to_vec());
                fetched = Some((flags, body));
            }
        }

        match fetched {
            Some((flags, Some(body))) => Ok(RawMail {
                sequence,
                flags,
                body,
            }),
            Some((_, None)) => bail!("no body returned for message {sequence}"),
            None => bail!("no data returned for message {sequence}"),
        }
    }

    async fn set_flags(&mut self, sequence: u32, flags: &[MailFlag]) -> Result<()> {
        let query = format!(
            "+FLAGS ({})",
            flags
                .iter()
                .map(flag_to_imap)
                .collect::<Vec<_>>()
                .join(" ")
        );
        debug!("Storing '{}' on message {}", query, sequence);
        self.session()?
            .store(&sequence.to_string(), &query)
            .await
            .with_context(|| format!("failed to update flags of message {sequence}"))
    }

    async fn select_folder(&mut self, folder: &str) -> Result<()> {
        let mailbox = self.session()?.select(folder).await?;
        debug!("Selected mailbox '{}' ({} messages)", folder, mailbox.exists);
        self.message_count = Some(mailbox.exists);
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.logout().await.context("failed to logout")?;
        }
        Ok(())
    }
}

fn flag_from_imap(flag: async_imap::types::Flag<'_>) -> Option<MailFlag> {
    match flag {
        async_imap::types::Flag::Seen => Some(MailFlag::Seen),
        async_imap::types::Flag::Recent => Some(MailFlag::Recent),
        async_imap::types::Flag::Deleted => Some(MailFlag::Deleted),
        _ => None,
    }
}

fn flag_to_imap(flag: &MailFlag) -> &'static str {
    match flag {
        MailFlag::Seen => "\\Seen",
        MailFlag::Recent => "\\Recent",
        MailFlag::Deleted => "\\Deleted",
    }
}
