use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use mail_proxy::core::cli::{Cli, Commands};
use mail_proxy::core::config::load_config;
use mail_proxy::infrastructure::logging::init_logging;
use mail_proxy::services::proxy::Proxy;
use mail_proxy::services::source::factory::resolve_source_config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging("mail-proxy")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            name,
            source,
        } => run(&config, &name, source.as_deref()).await,
        Commands::Check { config } => check(&config),
    }
}

async fn run(config_path: &str, proxy_name: &str, source_name: Option<&str>) -> Result<()> {
    let config = load_config(Path::new(config_path))?;
    let mut proxy = Proxy::new(proxy_name, config).await?;

    let outcome = match source_name {
        Some(source_name) => {
            info!("Processing single source '{}'", source_name);
            proxy
                .process_resources_by_source_name(source_name)
                .await
                .map(|_| ())
        }
        None => proxy.process_resources().await,
    };
    proxy.shutdown().await;

    match outcome {
        Ok(()) => {
            info!(
                "All resources persisted under {}",
                proxy.output_folder().display()
            );
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}

fn check(config_path: &str) -> Result<()> {
    let config = load_config(Path::new(config_path))?;

    let global = config.global.as_ref();
    match global.and_then(|g| g.output_folder.as_ref()) {
        Some(folder) => println!("output folder: {}", folder.display()),
        None => println!("output folder: MISSING"),
    }

    let Some(sources) = config.sources.as_ref() else {
        println!("sources: MISSING");
        return Ok(());
    };

    for (name, params) in sources.iter() {
        match params.kind.as_deref() {
            Some(kind) => match resolve_source_config(kind, name, params, global) {
                Ok(resolved) => println!("source '{}': {}", name, resolved.identity()),
                Err(e) => println!("source '{}': INVALID ({})", name, e),
            },
            None => println!("source '{}': INVALID (missing 'type')", name),
        }
    }

    Ok(())
}
