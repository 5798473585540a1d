use std::sync::Arc;

use tracing::info;

use crate::core::config::{GlobalParams, SourceParams};
use crate::core::error::ProxyError;
use crate::services::source::config::{
    CryptProtocol, SourceConfig, SourceFilter, SourceStatus, SourceType,
};
use crate::services::source::storage::StorageConnector;
use crate::services::source::{ImapAccount, PopAccount, Source};

/// Builds connected sources from raw configuration entries.
pub struct SourceFactory {
    connector: Arc<dyn StorageConnector>,
}

impl SourceFactory {
    pub fn new(connector: Arc<dyn StorageConnector>) -> Self {
        Self { connector }
    }

    /// Resolves the configuration for one source and opens its connection.
    ///
    /// The returned source is ready to iterate: for IMAP the configured
    /// folder filter (INBOX by default) has already been selected.
    pub async fn build(
        &self,
        kind: &str,
        name: &str,
        params: &SourceParams,
        global: Option<&GlobalParams>,
    ) -> Result<Source, ProxyError> {
        let config = resolve_source_config(kind, name, params, global)?;

        let mut storage = self.connector.open(&config).await?;
        storage
            .connect()
            .await
            .map_err(|e| ProxyError::SourceConnection {
                source_name: name.to_string(),
                reason: e.to_string(),
            })?;

        if config.kind == SourceType::Imap {
            let folder = config.filter.folder.clone().unwrap_or_else(|| "INBOX".to_string());
            storage
                .select_folder(&folder)
                .await
                .map_err(|e| ProxyError::SourceConnection {
                    source_name: name.to_string(),
                    reason: e.to_string(),
                })?;
        }

        info!("Source '{}' connected: {}", name, config.identity());

        Ok(match config.kind {
            SourceType::Imap => Source::Imap(ImapAccount::new(config, storage)),
            SourceType::Pop => Source::Pop(PopAccount::new(config, storage)),
        })
    }
}

/// Merges per-source and global parameters into a resolved [`SourceConfig`].
///
/// `host`, `port` and `ssl` fall back to the global section; `username` and
/// `password` must be local to the source.
pub fn resolve_source_config(
    kind: &str,
    name: &str,
    params: &SourceParams,
    global: Option<&GlobalParams>,
) -> Result<SourceConfig, ProxyError> {
    let kind = SourceType::parse(kind).ok_or_else(|| ProxyError::UnknownSourceType {
        source_name: name.to_string(),
        value: kind.to_string(),
    })?;

    let missing = |field: &'static str| ProxyError::MissingConfigField {
        source_name: name.to_string(),
        field,
    };

    let connection = params.connection.as_ref().ok_or_else(|| missing("connection"))?;

    let host = connection
        .host
        .clone()
        .or_else(|| global.and_then(|g| g.host.clone()))
        .ok_or_else(|| missing("host"))?;

    let port = connection
        .port
        .or_else(|| global.and_then(|g| g.port))
        .ok_or_else(|| missing("port"))?;

    let ssl = connection
        .ssl
        .clone()
        .or_else(|| global.and_then(|g| g.ssl.clone()))
        .ok_or_else(|| missing("ssl"))?;
    let crypt_protocol =
        CryptProtocol::parse(&ssl).map_err(|_| ProxyError::UnsupportedCryptoProtocol {
            source_name: name.to_string(),
            value: ssl.clone(),
        })?;

    let username = connection.username.clone().ok_or_else(|| missing("username"))?;
    let password = connection.password.clone().ok_or_else(|| missing("password"))?;

    let filter = connection
        .filter
        .as_ref()
        .map(|filter| SourceFilter {
            message_status: filter.message_status.clone(),
            folder: filter.folder.clone(),
        })
        .unwrap_or_default();

    Ok(SourceConfig {
        name: name.to_string(),
        host,
        port,
        username,
        password,
        crypt_protocol,
        kind,
        filter,
        status: SourceStatus::parse(params.status.as_deref()),
    })
}
