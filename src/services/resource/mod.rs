use std::path::{Path, PathBuf};

use chrono::Utc;
use mail_parser::{MessageParser, MimeHeaders};
use tracing::{debug, info};

use crate::core::error::ProxyError;

/// Kind of a fetched resource, deciding output subfolder and name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ImapMessage,
    PopMessage,
    Message,
}

impl ResourceKind {
    pub fn subfolder(&self) -> &'static str {
        match self {
            Self::ImapMessage => "imap",
            Self::PopMessage => "pop",
            Self::Message => "message",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::ImapMessage => "imap_resource_",
            Self::PopMessage => "pop_resource_",
            Self::Message => "message_resource_",
        }
    }
}

const ATTACHMENTS_SUB_FOLDER: &str = "attachments";

/// One fetched message, wrapped with its identity and persistence behavior.
///
/// Created fresh for every item yielded by a source and discarded after
/// persistence and acknowledgement.
#[derive(Debug, Clone)]
pub struct Resource {
    kind: ResourceKind,
    source_id: String,
    resource_id: u32,
    body: Vec<u8>,
    identity: String,
}

impl Resource {
    pub fn new(
        kind: ResourceKind,
        source_id: impl Into<String>,
        resource_id: u32,
        body: Vec<u8>,
    ) -> Self {
        let source_id = source_id.into();
        // Computed once; identity() hands out the same string for the
        // lifetime of the resource.
        let identity = format!("{}{}_{}", kind.prefix(), source_id, resource_id);
        Self {
            kind,
            source_id,
            resource_id,
            body,
            identity,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn resource_id(&self) -> u32 {
        self.resource_id
    }

    /// File-safe identity used in output file names.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Writes the message content, and the first attachment when one is
    /// present, under the given output root.
    ///
    /// Content goes to `<root>/<kind>/`, attachments to
    /// `<root>/<kind>/attachments/`. Directories are created on demand and
    /// existing destination files are never overwritten.
    pub fn persist(&self, output_root: &Path) -> Result<bool, ProxyError> {
        let timestamp = Utc::now().timestamp();
        let parsed = MessageParser::default().parse(&self.body);

        // First text part is the content; a message that does not parse as
        // MIME is written raw.
        let content: Vec<u8> = match parsed.as_ref().and_then(|message| message.body_text(0)) {
            Some(text) => text.into_owned().into_bytes(),
            None => self.body.clone(),
        };

        if let Some(message) = parsed.as_ref() {
            if let Some((file_name, data)) = first_attachment(message) {
                let attachment_path =
                    self.attachment_file_path(output_root, &file_name, timestamp);
                self.write_new(&attachment_path, &data)?;
                info!(
                    "Saved attachment '{}' for resource '{}' to {}",
                    file_name,
                    self.identity,
                    attachment_path.display()
                );
            }
        }

        let content_path = self.content_file_path(output_root, timestamp);
        self.write_new(&content_path, &content)?;
        debug!(
            "Saved content of resource '{}' to {}",
            self.identity,
            content_path.display()
        );

        Ok(true)
    }

    fn content_file_folder(&self, output_root: &Path) -> PathBuf {
        output_root.join(self.kind.subfolder())
    }

    fn attachment_file_folder(&self, output_root: &Path) -> PathBuf {
        self.content_file_folder(output_root)
            .join(ATTACHMENTS_SUB_FOLDER)
    }

    fn content_file_path(&self, output_root: &Path, timestamp: i64) -> PathBuf {
        self.content_file_folder(output_root)
            .join(format!("{}_{}", self.identity, timestamp))
    }

    fn attachment_file_path(
        &self,
        output_root: &Path,
        original_name: &str,
        timestamp: i64,
    ) -> PathBuf {
        let original = Path::new(original_name);
        let stem = original
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or("attachment");
        let file_name = match original.extension().and_then(|ext| ext.to_str()) {
            Some(extension) => {
                format!("{}_{}_{}.{}", stem, self.identity, timestamp, extension)
            }
            None => format!("{}_{}_{}", stem, self.identity, timestamp),
        };
        self.attachment_file_folder(output_root).join(file_name)
    }

    fn write_new(&self, path: &Path, bytes: &[u8]) -> Result<(), ProxyError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|io| self.persist_error(path, io))?;
        }
        if path.exists() {
            // Collision with an earlier write; refuse instead of overwriting.
            return Err(self.persist_error(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "destination file already exists",
                ),
            ));
        }
        std::fs::write(path, bytes).map_err(|io| self.persist_error(path, io))
    }

    fn persist_error(&self, path: &Path, io: std::io::Error) -> ProxyError {
        ProxyError::ResourcePersist {
            resource: self.identity.clone(),
            path: path.to_path_buf(),
            io,
        }
    }
}

/// Returns the name and decoded bytes of the first attachment part, walking
/// every part instead of assuming a fixed multipart layout.
fn first_attachment(message: &mail_parser::Message) -> Option<(String, Vec<u8>)> {
    for part in &message.parts {
        if part.is_text() {
            continue;
        }
        if let Some(file_name) = part.attachment_name() {
            return Some((file_name.to_string(), part.contents().to_vec()));
        }
    }
    None
}
