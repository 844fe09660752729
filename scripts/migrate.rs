#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "migrate", about = "Larder schema maintenance helper")]
struct Cli {
    /// Optional explicit DB path
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List migrations and show applied/pending
    List,
    /// Apply pending migrations
    Up,
}

#[tokio::main]
async fn main() -> Result<()> {
    larder::logging::init();

    let cli = Cli::parse();
    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };

    let pool = larder::db::open_pool(&db_path)
        .await
        .with_context(|| format!("open database at {}", db_path.display()))?;

    match cli.cmd {
        Cmd::List => {
            for (version, applied) in larder::migrate::status(&pool).await? {
                let state = if applied { "applied" } else { "pending" };
                println!("{state:8} {version}");
            }
        }
        Cmd::Up => {
            larder::migrate::apply_migrations(&pool)
                .await
                .context("apply migrations")?;
            println!("migrations up to date");
        }
    }

    pool.close().await;
    Ok(())
}

fn default_db_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("no platform data directory")?;
    Ok(base.join("larder").join("larder.sqlite3"))
}
