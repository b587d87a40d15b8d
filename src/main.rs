use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use anyhow::Result;
use packwright::config::PackContext;
use packwright::core::logging;
use packwright::migrations::{MigrationRunner, RunSummary};
use packwright::pack::build::{build_packs, BuildOptions};
use packwright::pack::extract::{extract_packs, ExtractOptions};

#[derive(Parser)]
#[command(name = "packwright", version, about = "Compendium pack build/extract/migrate pipeline")]
struct Cli {
    /// Repository root containing packs.json
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build packs from the source tree into the storage engine
    Build {
        /// Pack name, or "all"
        #[arg(default_value = "all")]
        pack: String,
        /// Write a flat JSON bundle per pack instead of the storage engine
        #[arg(long)]
        json: bool,
    },
    /// Extract built packs back into the source tree
    Extract {
        /// Pack name, or "all"
        #[arg(default_value = "all")]
        pack: String,
        /// Skip the canonical reordering of NPC/Hazard embedded items
        #[arg(long)]
        no_presort: bool,
        /// Silence extraction warnings
        #[arg(long)]
        no_warnings: bool,
    },
    /// Apply pending data migrations to the pack source tree in place
    Migrate,
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = PackContext::load(&cli.root)?;

    match cli.command {
        Command::Build { pack, json } => {
            let summary = build_packs(&pack, &BuildOptions { as_json: json }, &ctx).await?;
            info!(
                "built {} documents across {} packs",
                summary.documents, summary.packs
            );
        }
        Command::Extract {
            pack,
            no_presort,
            no_warnings,
        } => {
            let opts = ExtractOptions {
                presort: !no_presort,
                warnings: !no_warnings,
            };
            let summary = extract_packs(&pack, &opts, &ctx).await?;
            info!(
                "extracted {} documents across {} packs",
                summary.documents, summary.packs
            );
        }
        Command::Migrate => {
            let runner = MigrationRunner::latest();
            let mut total = RunSummary::default();
            for meta in &ctx.manifest.packs {
                let dir = ctx.paths.pack_source(meta);
                if !dir.is_dir() {
                    continue;
                }
                let summary = runner.run_dir(&dir)?;
                total.scanned += summary.scanned;
                total.rewritten += summary.rewritten;
            }
            info!(
                "migrations complete: {} files scanned, {} rewritten",
                total.scanned, total.rewritten
            );
        }
    }
    Ok(())
}
