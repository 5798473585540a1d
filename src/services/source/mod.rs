pub mod config;
pub mod factory;
pub mod parse;
pub mod storage;

use tracing::{debug, warn};

use crate::core::error::ProxyError;
use crate::services::resource::{Resource, ResourceKind};
use crate::services::source::config::{SourceConfig, SourceType};
use crate::services::source::parse::ParseResult;
use crate::services::source::storage::{MailFlag, MailStorage};

/// A configured connection to one remote mailbox account.
///
/// Closed over the two supported protocols; the factory is the only
/// constructor, so a source is always fully configured and connected.
pub enum Source {
    Imap(ImapAccount),
    Pop(PopAccount),
}

impl Source {
    pub fn name(&self) -> &str {
        &self.config().name
    }

    pub fn kind(&self) -> SourceType {
        self.config().kind
    }

    pub fn config(&self) -> &SourceConfig {
        match self {
            Self::Imap(account) => &account.config,
            Self::Pop(account) => &account.config,
        }
    }

    /// Human-readable identity for logs and aggregated error messages.
    pub fn identity(&self) -> String {
        self.config().identity()
    }

    /// Fetches the current batch of messages as resources, in mailbox order.
    ///
    /// The batch reflects the mailbox at call time; calling again re-queries
    /// the mailbox, whose flags may have changed in between.
    pub async fn content_iterator(&mut self) -> Result<Vec<Resource>, ProxyError> {
        match self {
            Self::Imap(account) => account.content_iterator().await,
            Self::Pop(account) => account.content_iterator().await,
        }
    }

    /// Per-message acknowledgement hook, run after each resource has been
    /// persisted (or has failed to persist).
    pub async fn post_parse_unit_action(&mut self, resource_id: u32, success: bool) -> ParseResult {
        match self {
            Self::Imap(account) => account.post_parse_unit_action(resource_id, success).await,
            Self::Pop(_) => ParseResult::success(),
        }
    }

    /// Batch-level hook, run once after all resources of this source.
    pub async fn post_parse_global_action(&mut self, success: bool) -> ParseResult {
        debug!(
            "Post parse global action for source '{}' (success: {})",
            self.name(),
            success
        );
        ParseResult::success()
    }

    /// Logs out of the underlying mailbox connection.
    pub async fn shutdown(&mut self) {
        let storage = match self {
            Self::Imap(account) => &mut account.storage,
            Self::Pop(account) => &mut account.storage,
        };
        if let Err(e) = storage.logout().await {
            warn!("Failed to close the connection cleanly: {}", e);
        }
    }
}

/// IMAP account source. Supports the `unread_only` message-status filter and
/// a `folder` filter applied when the connection is opened.
pub struct ImapAccount {
    config: SourceConfig,
    storage: Box<dyn MailStorage>,
    unread_only: bool,
}

impl ImapAccount {
    pub fn new(config: SourceConfig, storage: Box<dyn MailStorage>) -> Self {
        let unread_only = config.filter.unread_only();
        Self {
            config,
            storage,
            unread_only,
        }
    }

    async fn content_iterator(&mut self) -> Result<Vec<Resource>, ProxyError> {
        let count = self
            .storage
            .count_messages()
            .await
            .map_err(|e| self.content_error(e))?;

        let mut resources = Vec::new();
        for sequence in 1..=count {
            let mail = self
                .storage
                .fetch_message(sequence)
                .await
                .map_err(|e| self.content_error(e))?;
            if self.unread_only && mail.flags.contains(&MailFlag::Seen) {
                debug!(
                    "Skipping already seen message {} of source '{}'",
                    sequence, self.config.name
                );
                continue;
            }
            resources.push(Resource::new(
                ResourceKind::ImapMessage,
                self.config.name.clone(),
                sequence,
                mail.body,
            ));
        }
        Ok(resources)
    }

    async fn post_parse_unit_action(&mut self, resource_id: u32, success: bool) -> ParseResult {
        // Successfully handled messages are flagged as seen; failed ones are
        // marked recent so a later run picks them up again.
        let flags = if success {
            [MailFlag::Seen]
        } else {
            [MailFlag::Recent]
        };
        match self.storage.set_flags(resource_id, &flags).await {
            Ok(()) => ParseResult::success(),
            Err(e) => ParseResult::failure(
                format!("failed to update flags of message {resource_id}: {e}"),
                "FLAG_UPDATE_FAILED",
            ),
        }
    }

    fn content_error(&self, e: anyhow::Error) -> ProxyError {
        ProxyError::SourceGetContent {
            source_name: self.config.identity(),
            reason: e.to_string(),
        }
    }
}

/// POP account source. POP has no filters and no flag semantics, so the
/// per-message acknowledgement is a no-op.
pub struct PopAccount {
    config: SourceConfig,
    storage: Box<dyn MailStorage>,
}

impl PopAccount {
    pub fn new(config: SourceConfig, storage: Box<dyn MailStorage>) -> Self {
        Self { config, storage }
    }

    async fn content_iterator(&mut self) -> Result<Vec<Resource>, ProxyError> {
        let count = self
            .storage
            .count_messages()
            .await
            .map_err(|e| self.content_error(e))?;

        let mut resources = Vec::with_capacity(count as usize);
        for sequence in 1..=count {
            let mail = self
                .storage
                .fetch_message(sequence)
                .await
                .map_err(|e| self.content_error(e))?;
            resources.push(Resource::new(
                ResourceKind::PopMessage,
                self.config.name.clone(),
                sequence,
                mail.body,
            ));
        }
        Ok(resources)
    }

    fn content_error(&self, e: anyhow::Error) -> ProxyError {
        ProxyError::SourceGetContent {
            source_name: self.config.identity(),
            reason: e.to_string(),
        }
    }
}
