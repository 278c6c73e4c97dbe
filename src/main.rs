// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use collection_tracker::{
    CatalogStore, Config, DirectoryLoader, FilterState, GroupSelection, OwnershipState,
    OwnershipTracker, QueryEvaluator, WeightBucket,
};

#[derive(Parser, Debug)]
#[command(name = "collection-tracker", version, about = "Browse and track a collectible catalog")]
struct Cli {
    /// JSON configuration file (defaults to $COLLECTION_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive terminal browser (default)
    Tui,

    /// Print the entries matching the given filters
    List {
        #[arg(long)]
        group: Option<String>,

        #[arg(long, default_value = "")]
        search: String,

        #[arg(long = "type")]
        types: Vec<String>,

        #[arg(long = "rotation")]
        rotations: Vec<String>,

        /// Weight bucket: 0-20, 20-40, 40-60 or 60+
        #[arg(long = "weight")]
        weights: Vec<WeightBucket>,

        #[arg(long, conflicts_with = "not_owned")]
        owned: bool,

        #[arg(long)]
        not_owned: bool,
    },

    /// Owned/total counts per group
    Stats,

    /// Flip one acquisition channel for an entry
    Toggle { name: String, channel: String },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The TUI owns the terminal; keep logs quiet unless asked
    let interactive = matches!(cli.command, None | Some(Command::Tui));
    init_tracing(if interactive { "warn" } else { "info" });

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let loader = DirectoryLoader::new(&config.data_dir);
    let catalog = CatalogStore::load_with_timeout(&loader, &config.partitions, config.partition_timeout())
        .await
        .with_context(|| format!("Failed to load catalog from {:?}", config.data_dir))?;

    let store = config.open_store()?;
    let mut tracker = OwnershipTracker::with_channels(store, config.channels.clone())
        .context("Failed to open ownership store")?;

    match cli.command.unwrap_or(Command::Tui) {
        Command::Tui => run_ui_mode(catalog, tracker, config.partitions.clone())?,
        Command::List {
            group,
            search,
            types,
            rotations,
            weights,
            owned,
            not_owned,
        } => {
            let mut state = FilterState::new();
            if let Some(group) = group {
                state.set_group(GroupSelection::from(group.as_str()));
            }
            state.set_search(&search);
            state.types.extend(types);
            state.rotations.extend(rotations);
            state.weights.extend(weights);
            if owned {
                state.toggle_ownership(OwnershipState::Owned);
            }
            if not_owned {
                state.toggle_ownership(OwnershipState::NotOwned);
            }

            let results = QueryEvaluator::evaluate(&catalog, &state, &tracker);
            for entry in &results {
                let flags: Vec<String> = tracker
                    .channels()
                    .iter()
                    .filter(|c| tracker.has(&entry.name, c))
                    .cloned()
                    .collect();
                println!(
                    "{:<28} {:<8} {:<10} {:<7} {:>4}g  {}",
                    entry.name,
                    entry.group,
                    entry.kind,
                    entry.rotation,
                    entry.weight,
                    flags.join(", ")
                );
            }
            println!("\n{} / {} entries", results.len(), catalog.len());
        }
        Command::Stats => {
            let summary = tracker.summary(&catalog, &config.partitions);
            println!("{:<10} {}", "Toutes", summary.all);
            for (group, count) in &summary.groups {
                println!("{:<10} {}", group, count);
            }
        }
        Command::Toggle { name, channel } => {
            if catalog.get(&name).is_none() {
                anyhow::bail!("No entry named '{}' in the catalog", name);
            }
            let value = tracker.toggle(&name, &channel)?;
            println!(
                "✓ {} / {}: {}",
                name,
                channel,
                if value { "possédée" } else { "non possédée" }
            );
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(catalog: CatalogStore, tracker: OwnershipTracker, groups: Vec<String>) -> Result<()> {
    let mut app = ui::App::new(catalog, tracker, groups);
    ui::run_ui(&mut app)?;

    if app.tracker.is_dirty() {
        app.tracker.flush().context("Failed to save ownership state")?;
    }

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_catalog: CatalogStore, _tracker: OwnershipTracker, _groups: Vec<String>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: collection-tracker list / stats / toggle");
    std::process::exit(1);
}
