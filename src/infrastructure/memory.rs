use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::core::error::ProxyError;
use crate::services::source::config::SourceConfig;
use crate::services::source::storage::{
    MailFlag, MailStorage, RawMail, StorageConnector,
};

/// One message held by an in-memory mailbox.
#[derive(Debug, Clone)]
pub struct MemoryMessage {
    pub body: Vec<u8>,
    pub flags: Vec<MailFlag>,
}

impl MemoryMessage {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            flags: Vec::new(),
        }
    }

    pub fn with_flags(body: impl Into<Vec<u8>>, flags: &[MailFlag]) -> Self {
        Self {
            body: body.into(),
            flags: flags.to_vec(),
        }
    }
}

/// Shared state of an in-memory mailbox, inspectable after a run.
#[derive(Debug, Default)]
pub struct MemoryMailbox {
    pub messages: Vec<MemoryMessage>,
    pub selected_folder: Option<String>,
    /// Message sequences whose flag updates are rejected.
    pub fail_flag_updates: HashSet<u32>,
    pub logged_out: bool,
}

impl MemoryMailbox {
    pub fn new(messages: Vec<MemoryMessage>) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            messages,
            ..Self::default()
        }))
    }
}

/// In-memory storage backend for tests and dry runs.
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryMailbox>>,
}

impl MemoryStorage {
    pub fn new(state: Arc<Mutex<MemoryMailbox>>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl MailStorage for MemoryStorage {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn count_messages(&mut self) -> Result<u32> {
        Ok(self.state.lock().unwrap().messages.len() as u32)
    }

    async fn fetch_message(&mut self, sequence: u32) -> Result<RawMail> {
        let state = self.state.lock().unwrap();
        let message = state
            .messages
            .get(sequence as usize - 1)
            .with_context(|| format!("no message with sequence {sequence}"))?;
        Ok(RawMail {
            sequence,
            flags: message.flags.clone(),
            body: message.body.clone(),
        })
    }

    async fn set_flags(&mut self, sequence: u32, flags: &[MailFlag]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_flag_updates.contains(&sequence) {
            bail!("flag update rejected for message {sequence}");
        }
        let message = state
            .messages
            .get_mut(sequence as usize - 1)
            .with_context(|| format!("no message with sequence {sequence}"))?;
        for flag in flags {
            if !message.flags.contains(flag) {
                message.flags.push(*flag);
            }
        }
        Ok(())
    }

    async fn select_folder(&mut self, folder: &str) -> Result<()> {
        debug!("[Memory] Selecting folder {}", folder);
        self.state.lock().unwrap().selected_folder = Some(folder.to_string());
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.state.lock().unwrap().logged_out = true;
        Ok(())
    }
}

/// Connector handing out [`MemoryStorage`] handles for registered accounts.
///
/// Keeps a count of opened connections so tests can assert that construction
/// failures happen before any connection attempt.
#[derive(Default)]
pub struct MemoryConnector {
    accounts: HashMap<String, Arc<Mutex<MemoryMailbox>>>,
    opened: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, mailbox: Arc<Mutex<MemoryMailbox>>) {
        self.accounts.insert(name.into(), mailbox);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageConnector for MemoryConnector {
    async fn open(&self, config: &SourceConfig) -> Result<Box<dyn MailStorage>, ProxyError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let mailbox = self
            .accounts
            .get(&config.name)
            .ok_or_else(|| ProxyError::SourceConnection {
                source_name: config.name.clone(),
                reason: "no such account registered".to_string(),
            })?;
        Ok(Box::new(MemoryStorage::new(Arc::clone(mailbox))))
    }
}
