use async_trait::async_trait;

use crate::core::error::ProxyError;
use crate::infrastructure::imap::ImapStorage;
use crate::infrastructure::pop::PopStorage;
use crate::services::source::config::{SourceConfig, SourceType};
use crate::services::source::storage::{MailStorage, StorageConnector};

/// Default connector: hands out the network storage backend matching the
/// source type. Connection establishment happens later, on `connect`.
pub struct NetworkConnector;

#[async_trait]
impl StorageConnector for NetworkConnector {
    async fn open(&self, config: &SourceConfig) -> Result<Box<dyn MailStorage>, ProxyError> {
        let use_tls = config.crypt_protocol.is_some();
        Ok(match config.kind {
            SourceType::Imap => Box::new(ImapStorage::new(
                config.host.clone(),
                config.port,
                config.username.clone(),
                config.password.clone(),
                use_tls,
            )),
            SourceType::Pop => Box::new(PopStorage::new(
                config.host.clone(),
                config.port,
                config.username.clone(),
                config.password.clone(),
                use_tls,
            )),
        })
    }
}
