//! Schema migration tool for the task manager database.

use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sqlx::{migrate::Migrate, PgConnection, PgPool};
use tracing::info;

use task_manager::db::postgres::MIGRATOR;

#[derive(Parser)]
#[command(name = "migrate", about = "Manage the task manager database schema", version)]
struct Cli {
    /// Overrides DATABASE_URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the database to the most recent version available
    Up,
    /// Migrate the database up to and including VERSION
    UpTo { version: i64 },
    /// Roll back the latest applied version
    Down,
    /// Roll back every version newer than VERSION
    DownTo { version: i64 },
    /// Roll back the latest applied version and apply it again
    Redo,
    /// Dump the migration status for the current database
    Status,
    /// Print the current version of the database
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "migrate=info,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let pool = PgPool::connect(&cli.database_url)
        .await
        .context("connect to database")?;

    let result = run(&pool, cli.command).await;
    pool.close().await;
    result
}

async fn run(pool: &PgPool, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Up => {
            MIGRATOR.run(pool).await.context("apply migrations")?;
            info!("database is up to date");
        }
        Commands::UpTo { version } => up_to(pool, version).await?,
        Commands::Down => {
            let applied = applied_versions(pool).await?;
            let Some((latest, previous)) = latest_and_previous(&applied) else {
                info!("no applied migration to roll back");
                return Ok(());
            };
            MIGRATOR.undo(pool, previous).await.context("roll back")?;
            info!(version = latest, "rolled back");
        }
        Commands::DownTo { version } => {
            MIGRATOR.undo(pool, version).await.context("roll back")?;
            info!(version, "rolled back to version");
        }
        Commands::Redo => {
            let applied = applied_versions(pool).await?;
            let Some((latest, previous)) = latest_and_previous(&applied) else {
                bail!("no applied migration to redo");
            };
            MIGRATOR.undo(pool, previous).await.context("roll back")?;
            up_to(pool, latest).await?;
            info!(version = latest, "redone");
        }
        Commands::Status => {
            let applied = applied_versions(pool).await?;
            println!("{:<16} {:<8} description", "version", "state");
            for m in MIGRATOR.iter().filter(|m| !m.migration_type.is_down_migration()) {
                let state = match applied.get(&m.version) {
                    Some(true) => "applied",
                    Some(false) => "failed",
                    None => "pending",
                };
                println!("{:<16} {:<8} {}", m.version, state, m.description);
            }
        }
        Commands::Version => {
            let applied = applied_versions(pool).await?;
            let current = latest_and_previous(&applied).map_or(0, |(latest, _)| latest);
            println!("version {current}");
        }
    }
    Ok(())
}

/// Apply pending up migrations with a version no greater than `target`.
async fn up_to(pool: &PgPool, target: i64) -> anyhow::Result<()> {
    let mut conn = pool.acquire().await.context("acquire connection")?;
    conn.lock().await.context("take migration lock")?;
    let result = apply_up_to(&mut conn, target).await;
    conn.unlock().await.context("release migration lock")?;
    result
}

async fn apply_up_to(conn: &mut PgConnection, target: i64) -> anyhow::Result<()> {
    conn.ensure_migrations_table().await?;
    if let Some(version) = conn.dirty_version().await? {
        bail!("migration {version} is partially applied; fix the database first");
    }

    let applied: HashSet<i64> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();

    for m in MIGRATOR.iter().filter(|m| {
        !m.migration_type.is_down_migration()
            && m.version <= target
            && !applied.contains(&m.version)
    }) {
        let elapsed = conn
            .apply(m)
            .await
            .with_context(|| format!("apply migration {}", m.version))?;
        info!(version = m.version, description = %m.description, ?elapsed, "applied");
    }
    Ok(())
}

/// Highest successfully applied version and the one below it (0 when there is
/// none).
fn latest_and_previous(applied: &BTreeMap<i64, bool>) -> Option<(i64, i64)> {
    let mut ok = applied.iter().filter(|(_, ok)| **ok).map(|(v, _)| *v).rev();
    let latest = ok.next()?;
    Some((latest, ok.next().unwrap_or(0)))
}

/// Versions recorded by the migrator, with their success flag. Empty when the
/// database has never been migrated.
async fn applied_versions(pool: &PgPool) -> anyhow::Result<BTreeMap<i64, bool>> {
    let exists: bool =
        sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_one(pool)
            .await
            .context("inspect migrations table")?;
    if !exists {
        return Ok(BTreeMap::new());
    }

    let rows: Vec<(i64, bool)> =
        sqlx::query_as("SELECT version, success FROM _sqlx_migrations ORDER BY version")
            .fetch_all(pool)
            .await
            .context("read migrations table")?;
    Ok(rows.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_and_previous_skip_failed_versions() {
        let applied = BTreeMap::from([(1, true), (2, true), (3, false)]);
        assert_eq!(latest_and_previous(&applied), Some((2, 1)));

        let single = BTreeMap::from([(20240101000000, true)]);
        assert_eq!(latest_and_previous(&single), Some((20240101000000, 0)));

        assert_eq!(latest_and_previous(&BTreeMap::new()), None);
    }

    #[test]
    fn every_migration_is_reversible() {
        let ups: Vec<i64> = MIGRATOR
            .iter()
            .filter(|m| !m.migration_type.is_down_migration())
            .map(|m| m.version)
            .collect();
        let downs: Vec<i64> = MIGRATOR
            .iter()
            .filter(|m| m.migration_type.is_down_migration())
            .map(|m| m.version)
            .collect();
        assert!(!ups.is_empty());
        assert_eq!(ups, downs);
    }

    #[test]
    fn cli_parses_rollback_commands() {
        let cli = Cli::try_parse_from(["migrate", "--database-url", "postgres://x", "down-to", "0"])
            .unwrap();
        assert!(matches!(cli.command, Commands::DownTo { version: 0 }));

        let cli = Cli::try_parse_from(["migrate", "--database-url", "postgres://x", "up-to", "7"])
            .unwrap();
        assert!(matches!(cli.command, Commands::UpTo { version: 7 }));

        let cli = Cli::try_parse_from(["migrate", "--database-url", "postgres://x", "redo"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Redo));
    }
}
