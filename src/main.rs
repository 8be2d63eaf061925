mod cli;
mod collector;
mod command;
mod config;
mod error;
mod kubernetes;
mod paths;
mod runner;
mod types;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

use cli::{Cli, Commands};
use collector::Collector;
use command::{build_command, render_command};
use config::Config;
use kubernetes::{KubeCsvSource, StaticVersion, client_for_context};
use paths::prepare_item_directory;
use runner::ProcessRunner;
use types::{CollectionKind, CollectionRequest, TestIdentity, TimeWindow};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(cli.base_dir.clone(), cli.test_root.clone());
    debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::PrepareDir {
            source,
            test_name,
            class,
        } => {
            let ctx = config.context()?;
            let identity = item_identity(source, test_name, class, &config);
            let dir = prepare_item_directory(&identity, ctx.base_directory())?;
            println!("{}", dir.display());
        }
        Commands::Collect {
            kind,
            target_dir,
            source,
            test_name,
            class,
            since,
            since_start,
            no_save_output,
            csv_version,
            context,
        } => {
            let target_dir = match (target_dir, source, test_name) {
                (Some(dir), _, _) => dir,
                (None, Some(source), Some(test_name)) => {
                    let mut ctx = config.context()?;
                    let identity = item_identity(source, test_name, class, &config);
                    ctx.set_collector_directory(&identity)?.to_path_buf()
                }
                _ => config.context()?.collector_dir().to_path_buf(),
            };
            let since = match (since, since_start) {
                (Some(value), _) => cli::parse_since(kind, &value)?,
                (None, Some(start)) => TimeWindow::since_start(start, chrono::Utc::now()),
                (None, None) => TimeWindow::default(),
            };

            let collector =
                Collector::new(ProcessRunner).with_image_repository(config.image_repository.clone());
            let save_output = !no_save_output;

            let result = match (kind, csv_version) {
                (CollectionKind::Rhoai, None) => {
                    let client = client_for_context(context.as_deref()).await?;
                    let versions = KubeCsvSource::new(
                        client,
                        config.operator_namespace.clone(),
                        config.csv_name_prefix.clone(),
                    );
                    collector
                        .collect(kind, &target_dir, since, save_output, &versions)
                        .await?
                }
                (_, version) => {
                    collector
                        .collect(
                            kind,
                            &target_dir,
                            since,
                            save_output,
                            &version.map(StaticVersion),
                        )
                        .await?
                }
            };

            if let Some(log) = &result.log_file {
                info!("Collection output saved to {}", log.display());
            }
            println!("{}", result.output_dir.display());
        }
        Commands::Gather {
            image,
            dest_dir,
            since,
            component,
            namespaces,
            dry_run,
        } => {
            // configured namespaces only apply when no component is given
            let namespaces = match &component {
                Some(_) => namespaces,
                None => namespaces.or_else(|| config.namespaces.clone()),
            };
            let mut request = CollectionRequest::new();
            if let Some(image) = image {
                request = request.image(image);
            }
            if let Some(dir) = dest_dir {
                request = request.target_dir(dir);
            }
            if let Some(since) = since {
                request = request.since(since);
            }
            if let Some(component) = component {
                request = request.component(component);
            }
            if let Some(namespaces) = namespaces {
                request = request.namespaces(namespaces);
            }

            if dry_run {
                println!("{}", render_command(&build_command(&request)?));
                return Ok(());
            }

            let collector = Collector::new(ProcessRunner);
            let output = collector.gather(&request).await?;
            print!("{}", output.output);
            if !output.success {
                info!("must-gather exited with {:?}", output.exit_code);
            }
        }
    }

    Ok(())
}

fn item_identity(
    source: PathBuf,
    test_name: String,
    class: Option<String>,
    config: &Config,
) -> TestIdentity {
    let mut identity = TestIdentity::new(source, test_name);
    if let Some(root) = &config.test_root {
        identity = identity.with_test_root(root.clone());
    }
    if let Some(class) = class {
        identity = identity.with_class(class);
    }
    identity
}
