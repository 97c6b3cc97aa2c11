use anyhow::Result;
use cadence_flow::config::Blueprint;
use cadence_flow::directory::EntityIndex;
use cadence_flow::script::EngineRegistry;
use cadence_flow::{Entity, EntityRef, ExecutionContext, Location};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Cadence - run control-flow blueprints over managed entity trees
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the blueprint's root entity and report the resulting states
    Run {
        /// Blueprint file
        blueprint: PathBuf,

        /// Start locations (defaults to the blueprint's own)
        #[arg(short, long = "location", value_name = "NAME")]
        locations: Vec<String>,

        /// Stop the tree after it has started
        #[arg(long)]
        stop: bool,
    },
    /// Parse and instantiate a blueprint without starting it
    Check {
        /// Blueprint file
        blueprint: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Check { blueprint } => {
            let blueprint = Blueprint::load(&blueprint)?;
            let index = Arc::new(EntityIndex::new());
            let root = blueprint.instantiate(&build_context(&index), &index)?;
            print_tree(&root, 0);
        }
        Commands::Run {
            blueprint,
            locations,
            stop,
        } => {
            let blueprint = Blueprint::load(&blueprint)?;
            let index = Arc::new(EntityIndex::new());
            let context = build_context(&index);
            let root = blueprint.instantiate(&context, &index)?;

            let locations: Vec<Location> = if locations.is_empty() {
                blueprint.locations.clone()
            } else {
                locations.into_iter().map(Location::new).collect()
            };

            let cancel_context = context.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling pending waits");
                    cancel_context.cancel();
                }
            });

            let Some(startable) = root.as_startable() else {
                anyhow::bail!("root entity '{}' has no lifecycle", root.id());
            };

            info!(root = root.id(), "Starting blueprint");
            let started = startable.start(&locations).await;
            print_tree(&root, 0);
            started?;

            if stop {
                info!(root = root.id(), "Stopping blueprint");
                let stopped = startable.stop().await;
                print_tree(&root, 0);
                stopped?;
            }
        }
    }

    Ok(())
}

fn build_context(index: &Arc<EntityIndex>) -> Arc<ExecutionContext> {
    Arc::new(ExecutionContext::new(
        Arc::new(EngineRegistry::with_defaults()),
        index.clone(),
    ))
}

fn print_tree(entity: &EntityRef, depth: usize) {
    let state = entity
        .sensors()
        .service_state()
        .map(|s| s.as_str())
        .unwrap_or("-");
    println!(
        "{}{} [{}] {}",
        "  ".repeat(depth),
        entity.display_name(),
        entity.id(),
        state
    );
    for child in entity.children() {
        print_tree(child, depth + 1);
    }
}
