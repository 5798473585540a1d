use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Top-level configuration consumed by proxy construction.
///
/// Both sections are optional at the parsing layer so that the proxy can
/// report missing pieces as configuration errors instead of opaque
/// deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    pub global: Option<GlobalParams>,
    pub sources: Option<SourceMap>,
}

/// Global fallback parameters shared by all sources.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ssl: Option<String>,
    pub output_folder: Option<PathBuf>,
}

/// Raw per-source configuration entry, before field resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub connection: Option<ConnectionParams>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ssl: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub filter: Option<FilterParams>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub message_status: Option<String>,
    pub folder: Option<String>,
}

/// Named source entries in configuration-file order.
///
/// Processing order must follow the document, so the map is kept as a vector
/// of `(name, params)` pairs instead of a hash map.
#[derive(Debug, Clone, Default)]
pub struct SourceMap(pub Vec<(String, SourceParams)>);

impl SourceMap {
    pub fn iter(&self) -> impl Iterator<Item = &(String, SourceParams)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SourceMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SourceMapVisitor;

        impl<'de> Visitor<'de> for SourceMapVisitor {
            type Value = SourceMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of source name to source parameters")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, params)) = access.next_entry::<String, SourceParams>()? {
                    entries.push((name, params));
                }
                Ok(SourceMap(entries))
            }
        }

        deserializer.deserialize_map(SourceMapVisitor)
    }
}

/// Loads a proxy configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<ProxyConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {}", path.display()))?;
    let config: ProxyConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse configuration file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: ProxyConfig = serde_json::from_value(serde_json::json!({
            "global": { "host": "mail.example.com", "port": 993, "ssl": "SSL", "output_folder": "out" },
            "sources": {
                "imap.main": {
                    "type": "imap",
                    "connection": {
                        "username": "user@example.com",
                        "password": "secret",
                        "filter": { "message_status": "unread_only", "folder": "INBOX" }
                    }
                }
            }
        }))
        .unwrap();

        let global = config.global.unwrap();
        assert_eq!(global.host.as_deref(), Some("mail.example.com"));
        assert_eq!(global.port, Some(993));
        assert_eq!(global.output_folder, Some(PathBuf::from("out")));

        let sources = config.sources.unwrap();
        assert_eq!(sources.len(), 1);
        let (name, params) = &sources.0[0];
        assert_eq!(name, "imap.main");
        assert_eq!(params.kind.as_deref(), Some("imap"));
        let connection = params.connection.as_ref().unwrap();
        assert_eq!(connection.username.as_deref(), Some("user@example.com"));
        let filter = connection.filter.as_ref().unwrap();
        assert_eq!(filter.message_status.as_deref(), Some("unread_only"));
    }

    #[test]
    fn test_sources_keep_document_order() {
        let config: ProxyConfig = serde_json::from_value(serde_json::json!({
            "sources": {
                "second": { "type": "pop" },
                "first": { "type": "imap" },
                "third": { "type": "imap" }
            }
        }))
        .unwrap();

        let sources = config.sources.unwrap();
        let names: Vec<&str> = sources
            .0
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["second", "first", "third"]);
    }

    #[test]
    fn test_missing_sections_parse_to_none() {
        let config: ProxyConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(config.global.is_none());
        assert!(config.sources.is_none());
    }
}
