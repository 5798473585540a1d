use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::config::ProxyConfig;
use crate::core::error::ProxyError;
use crate::infrastructure::connector::NetworkConnector;
use crate::services::source::config::SourceStatus;
use crate::services::source::factory::SourceFactory;
use crate::services::source::storage::StorageConnector;
use crate::services::source::Source;

/// Orchestrates the fetch, persist and acknowledge loop over all configured
/// sources.
///
/// The source collection is populated once at construction and never mutated
/// afterwards; processing walks it in configuration order.
pub struct Proxy {
    name: String,
    output_folder: PathBuf,
    sources: Vec<Source>,
    by_name: HashMap<String, usize>,
    cursor: usize,
}

impl Proxy {
    /// Builds a proxy whose sources connect over the network.
    pub async fn new(name: impl Into<String>, config: ProxyConfig) -> Result<Self, ProxyError> {
        Self::with_connector(name, config, Arc::new(NetworkConnector)).await
    }

    /// Builds a proxy with an injected storage connector.
    ///
    /// Fails fast: any source that cannot be configured or connected aborts
    /// the whole construction. The output folder is validated before any
    /// connection is attempted.
    pub async fn with_connector(
        name: impl Into<String>,
        config: ProxyConfig,
        connector: Arc<dyn StorageConnector>,
    ) -> Result<Self, ProxyError> {
        let name = name.into();

        let global = config.global;
        let output_folder = global
            .as_ref()
            .and_then(|g| g.output_folder.clone())
            .ok_or_else(|| {
                ProxyError::BadProxyConfiguration(
                    "missing parameter 'output_folder' for proxy configuration".to_string(),
                )
            })?;

        let source_map = config.sources.ok_or(ProxyError::MissingSourcesConfig)?;

        let factory = SourceFactory::new(connector);
        let mut sources = Vec::with_capacity(source_map.len());
        let mut by_name = HashMap::with_capacity(source_map.len());

        for (source_name, params) in source_map.iter() {
            let kind = params.kind.as_deref().ok_or_else(|| {
                ProxyError::BadProxyConfiguration(format!(
                    "missing parameter 'type' for remote source configuration '{source_name}'"
                ))
            })?;

            if SourceStatus::parse(params.status.as_deref()) == SourceStatus::Disabled {
                info!("Source '{}' is disabled, skipping", source_name);
                continue;
            }

            let source = factory
                .build(kind, source_name, params, global.as_ref())
                .await
                .map_err(|e| {
                    ProxyError::BadProxyConfiguration(format!(
                        "failed to build the source object for source '{source_name}': {e}"
                    ))
                })?;

            by_name.insert(source_name.clone(), sources.len());
            sources.push(source);
        }

        info!(
            "Proxy '{}' ready with {} source(s), output folder {}",
            name,
            sources.len(),
            output_folder.display()
        );

        Ok(Self {
            name,
            output_folder,
            sources,
            by_name,
            cursor: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.name())
    }

    pub fn source_by_name(&self, name: &str) -> Option<&Source> {
        self.by_name.get(name).map(|&index| &self.sources[index])
    }

    /// Processes every source in configuration order.
    ///
    /// A failing source never stops the remaining ones; all failures are
    /// collected and reported together at the end of the run.
    pub async fn process_resources(&mut self) -> Result<(), ProxyError> {
        let output_folder = self.output_folder.clone();
        let mut errors = Vec::new();

        for source in &mut self.sources {
            let source_name = source.name().to_string();
            info!("Processing source '{}'", source_name);
            match process_source(source, &output_folder).await {
                Ok(_) => info!("Source '{}' processed without errors", source_name),
                Err(e @ ProxyError::PostParse { .. }) => {
                    error!("Source '{}' finished with errors: {}", source_name, e);
                    errors.push(e.to_string());
                }
                Err(e) => {
                    error!("Source '{}' failed: {}", source_name, e);
                    errors.push(format!(
                        "general proxy error caught for source '{source_name}': {e}"
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProxyError::GlobalProcess {
                proxy: self.name.clone(),
                errors,
            })
        }
    }

    /// Processes the single source with the given name.
    pub async fn process_resources_by_source_name(
        &mut self,
        source_name: &str,
    ) -> Result<bool, ProxyError> {
        let index = *self
            .by_name
            .get(source_name)
            .ok_or_else(|| ProxyError::SourceNotFound(source_name.to_string()))?;
        let output_folder = self.output_folder.clone();
        process_source(&mut self.sources[index], &output_folder).await
    }

    /// Current source of the manual iteration cursor.
    pub fn current_source(&self) -> Option<&Source> {
        self.sources.get(self.cursor)
    }

    /// True while the manual iteration cursor has sources left.
    pub fn has_more_sources(&self) -> bool {
        self.cursor < self.sources.len()
    }

    /// Moves the manual iteration cursor to the next source.
    pub fn advance(&mut self) {
        if self.cursor < self.sources.len() {
            self.cursor += 1;
        }
    }

    /// Closes every source's mailbox connection.
    pub async fn shutdown(&mut self) {
        for source in &mut self.sources {
            source.shutdown().await;
        }
    }
}

/// Runs the per-source pass: fetch the content batch, persist every resource,
/// acknowledge each one, then run the batch-level hook.
///
/// Item failures are collected as formatted messages and never abort the
/// loop; a non-empty collection turns into one `PostParse` error naming the
/// source.
async fn process_source(source: &mut Source, output_folder: &Path) -> Result<bool, ProxyError> {
    let resources = source.content_iterator().await?;
    let identity = source.identity();
    info!(
        "Fetched {} resource(s) from source '{}'",
        resources.len(),
        source.name()
    );

    let mut global_success = true;
    let mut post_parse_errors = Vec::new();

    for resource in &resources {
        let success = match resource.persist(output_folder) {
            Ok(ok) => ok,
            Err(e) => {
                warn!("Failed to persist resource '{}': {}", resource.identity(), e);
                post_parse_errors.push(format!(
                    "persist error for source '{identity}': {e}"
                ));
                false
            }
        };
        if !success {
            global_success = false;
        }

        let result = source
            .post_parse_unit_action(resource.resource_id(), success)
            .await;
        if !result.result {
            post_parse_errors.push(format!(
                "post parse error for source '{identity}': {}",
                result.message
            ));
        }
    }

    let result = source.post_parse_global_action(global_success).await;
    if !result.result {
        post_parse_errors.push(format!(
            "post global parse error for source '{identity}': {}",
            result.message
        ));
    }

    if post_parse_errors.is_empty() {
        Ok(true)
    } else {
        Err(ProxyError::PostParse {
            source_name: identity,
            errors: post_parse_errors,
        })
    }
}
