use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for proxy construction and resource processing.
///
/// Configuration and connectivity variants are fatal at construction time.
/// Per-item failures are collected into `PostParse` (one per source) and
/// `GlobalProcess` (one per run) instead of aborting the processing loops.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("missing global or local parameter '{field}' for source configuration '{source_name}'")]
    MissingConfigField {
        source_name: String,
        field: &'static str,
    },

    #[error("unrecognized cryptographic protocol '{value}' for source '{source_name}'. Accepted values are: 'SSL', 'TLS'")]
    UnsupportedCryptoProtocol { source_name: String, value: String },

    #[error("unrecognized source type '{value}' for source '{source_name}'. Accepted values are: 'imap', 'pop'")]
    UnknownSourceType { source_name: String, value: String },

    #[error("missing parameters table 'sources' for remote source configuration")]
    MissingSourcesConfig,

    #[error("bad proxy configuration: {0}")]
    BadProxyConfiguration(String),

    #[error("failed to open the connection for source '{source_name}': {reason}")]
    SourceConnection { source_name: String, reason: String },

    #[error("error while reading the content of source '{source_name}': {reason}")]
    SourceGetContent { source_name: String, reason: String },

    #[error("failed to persist resource '{resource}' under '{}': {io}", .path.display())]
    ResourcePersist {
        resource: String,
        path: PathBuf,
        #[source]
        io: std::io::Error,
    },

    #[error("{} error(s) while running post unit and global actions for source '{source_name}': {}", .errors.len(), .errors.join("; "))]
    PostParse {
        source_name: String,
        errors: Vec<String>,
    },

    #[error("{} error(s) while processing the sources of proxy '{proxy}': {}", .errors.len(), .errors.join("; "))]
    GlobalProcess { proxy: String, errors: Vec<String> },

    #[error("no source configured with the name '{0}'")]
    SourceNotFound(String),
}

pub type ProxyResult<T> = Result<T, ProxyError>;
