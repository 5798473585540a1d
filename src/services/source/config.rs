use std::fmt;

/// Source type tag selecting the concrete source variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Imap,
    Pop,
}

impl SourceType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "imap" => Some(Self::Imap),
            "pop" => Some(Self::Pop),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imap => write!(f, "imap"),
            Self::Pop => write!(f, "pop"),
        }
    }
}

/// Cryptographic protocol requested for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptProtocol {
    Ssl,
    Tls,
}

impl CryptProtocol {
    /// Parses a configured `ssl` value. `"none"` (any case) means no
    /// encryption and maps to `Ok(None)`; anything else must be SSL or TLS.
    pub fn parse(value: &str) -> Result<Option<Self>, ()> {
        if value.eq_ignore_ascii_case("ssl") {
            Ok(Some(Self::Ssl))
        } else if value.eq_ignore_ascii_case("tls") {
            Ok(Some(Self::Tls))
        } else if value.eq_ignore_ascii_case("none") {
            Ok(None)
        } else {
            Err(())
        }
    }
}

impl fmt::Display for CryptProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssl => write!(f, "SSL"),
            Self::Tls => write!(f, "TLS"),
        }
    }
}

/// Whether a configured source takes part in processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceStatus {
    #[default]
    Enabled,
    Disabled,
}

impl SourceStatus {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("disabled") => Self::Disabled,
            _ => Self::Enabled,
        }
    }
}

/// Resolved filter settings for a source.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub message_status: Option<String>,
    pub folder: Option<String>,
}

impl SourceFilter {
    pub const UNREAD_ONLY: &'static str = "unread_only";

    pub fn unread_only(&self) -> bool {
        self.message_status
            .as_deref()
            .is_some_and(|status| status == Self::UNREAD_ONLY)
    }
}

/// Fully resolved configuration for one source, produced by the factory
/// after merging per-source and global parameters.
#[derive(Clone)]
pub struct SourceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub crypt_protocol: Option<CryptProtocol>,
    pub kind: SourceType,
    pub filter: SourceFilter,
    pub status: SourceStatus,
}

impl SourceConfig {
    /// Stable human-readable identity for logs. Never used for storage paths.
    pub fn identity(&self) -> String {
        format!(
            "{} Source [host:'{}'][port:'{}'][user:'{}']",
            match self.kind {
                SourceType::Imap => "Imap",
                SourceType::Pop => "Pop",
            },
            self.host,
            self.port,
            self.username
        )
    }
}

// Manual Debug so the password never reaches the logs.
impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("crypt_protocol", &self.crypt_protocol)
            .field("kind", &self.kind)
            .field("filter", &self.filter)
            .field("status", &self.status)
            .finish()
    }
}
