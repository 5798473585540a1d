use anyhow::Result;
use async_trait::async_trait;

use crate::core::error::ProxyError;
use crate::services::source::config::SourceConfig;

/// Message flags understood by the storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailFlag {
    Seen,
    Recent,
    Deleted,
}

/// One raw message as fetched from a remote mailbox.
#[derive(Debug, Clone)]
pub struct RawMail {
    pub sequence: u32,
    pub flags: Vec<MailFlag>,
    pub body: Vec<u8>,
}

/// Narrow interface over one remote mailbox connection.
///
/// The processing core only ever talks to a mailbox through this trait; the
/// wire protocols live in the `infrastructure` backends.
#[async_trait]
pub trait MailStorage: Send + Sync {
    async fn connect(&mut self) -> Result<()>;
    async fn count_messages(&mut self) -> Result<u32>;
    async fn fetch_message(&mut self, sequence: u32) -> Result<RawMail>;
    async fn set_flags(&mut self, sequence: u32, flags: &[MailFlag]) -> Result<()>;
    async fn select_folder(&mut self, folder: &str) -> Result<()>;
    async fn logout(&mut self) -> Result<()>;
}

/// Creates the storage backend matching a resolved source configuration.
///
/// Injected into the source factory so that tests can substitute in-memory
/// mailboxes for real network backends.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn open(&self, config: &SourceConfig) -> Result<Box<dyn MailStorage>, ProxyError>;
}
