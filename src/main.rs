use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use goshenpay::log_format::CompactFormat;
use goshenpay::oauth_state::OauthStateCache;
use goshenpay::stripe_client::StripeConfig;
use goshenpay::web::{AppState, PgPool, start_web_server};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Parser)]
#[command(name = "goshenpay", about = "GoshenPay donation-processing API server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server
    Serve {
        /// Interface to bind
        #[arg(long, default_value = "0.0.0.0")]
        interface: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

fn build_pool(database_url: &str) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(10)
        .build(manager)
        .context("Failed to create database connection pool")
}

fn run_migrations(pool: &PgPool) -> Result<()> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
    for migration in &applied {
        info!("Applied migration {}", migration);
    }
    info!("Database migrations are up to date");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let _sentry_guard = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(CompactFormat)
                .with_filter(filter),
        )
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = build_pool(&database_url)?;

    match cli.command {
        Command::Migrate => {
            run_migrations(&pool)?;
        }
        Command::Serve { interface, port } => {
            run_migrations(&pool)?;

            goshenpay::metrics::init_metrics();

            let stripe_config = match StripeConfig::from_env() {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!(error = %e, "Stripe is not configured; payment routes are disabled");
                    None
                }
            };

            let app_state = AppState {
                pool,
                stripe_config,
                oauth_states: OauthStateCache::new(),
            };

            start_web_server(interface, port, app_state).await?;
        }
    }

    Ok(())
}
