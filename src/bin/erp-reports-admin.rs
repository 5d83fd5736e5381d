use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use erp_reports::audit::SqliteAccessLogStore;
use erp_reports::authz::{AuthzError, PermissionGraph, SqlitePermissionGraph};

#[derive(Parser, Debug)]
#[command(author, version, about = "erp-reports administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Answer "can this user perform this operation"
    CheckAccess {
        #[arg(long)]
        user_id: i64,
        /// Operation code, e.g. sales_230.export
        #[arg(long)]
        operation: String,
    },
    /// Print the most recent report access attempts
    RecentLogs {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        user_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try CWD first, then the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();
    let pool = get_pool().await?;

    match cli.command {
        Commands::MigrateRun => {
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::CheckAccess { user_id, operation } => {
            let graph = SqlitePermissionGraph::new(pool);
            match graph.has_access(user_id, &operation).await {
                Ok(true) => println!("user {} may perform {}", user_id, operation),
                Ok(false) => println!("user {} may NOT perform {}", user_id, operation),
                Err(AuthzError::NotFound(code)) => anyhow::bail!("unknown operation: {}", code),
                Err(err) => return Err(err).context("permission check failed"),
            }
        }
        Commands::RecentLogs { limit, user_id } => {
            let store = SqliteAccessLogStore::new(pool);
            let logs = store.recent(limit, user_id).await?;

            println!("{:<6} {:<8} {:<10} {:<8} {:<26} {:<16} {}", "Id", "User", "Operation", "Status", "Time", "Ip", "Params");
            for log in logs {
                println!(
                    "{:<6} {:<8} {:<10} {:<8} {:<26} {:<16} {}",
                    log.id,
                    log.user_id,
                    log.operation_id,
                    log.status,
                    log.access_time.format("%Y-%m-%d %H:%M:%S"),
                    log.ip_address.as_deref().unwrap_or("-"),
                    log.search_params.as_deref().unwrap_or(""),
                );
            }
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;

    let applied_versions: HashSet<i64> = if table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate-local folder
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
