//! CLI module for the ReTrade binary.
//!
//! Without a subcommand (or with `serve`) the server starts; that path is
//! handled in main.rs. The remaining subcommands are one-shot maintenance
//! tasks:
//! - `migrate` - Apply pending database migrations
//! - `seed` - Insert demo accounts and listings
//! - `prune-images` - Remove uploads no listing uses
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, StorageBackend};
use crate::db;
use crate::storage;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "retrade")]
#[command(author, version, about = "A marketplace for used goods", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "RETRADE_CONFIG", default_value = "retrade.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Skip startup self-checks (for development only)
    #[arg(long)]
    pub skip_checks: bool,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_serve(&self) -> bool {
        matches!(self.command, None | Some(Commands::Serve))
    }
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the web server (default)
    Serve,

    /// Apply pending database migrations and exit
    Migrate,

    /// Insert demo accounts and listings
    Seed,

    /// Remove uploaded images that no listing references
    PruneImages {
        /// Only remove files older than this many hours
        #[arg(long, default_value_t = 24)]
        min_age_hours: u32,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Config subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Run a maintenance command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Migrate) => cmd_migrate(cli).await,
        Some(Commands::Seed) => cmd_seed(cli).await,
        Some(Commands::PruneImages { min_age_hours }) => cmd_prune_images(cli, *min_age_hours).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        // Starting the server is handled in main.rs
        Some(Commands::Serve) | None => Ok(()),
    }
}

async fn cmd_migrate(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let pool = db::connect(&config.database).await?;
    db::run_migrations(&pool).await?;
    println!("[OK] Database schema is up to date");
    Ok(())
}

async fn cmd_seed(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let pool = db::init(&config.database).await?;
    db::seed_demo_data(&pool).await?;

    println!("[OK] Demo data ready");
    println!();
    println!("  Seller: {} / {}", db::DEMO_SELLER_EMAIL, db::DEMO_PASSWORD);
    println!("  Buyer:  {} / {}", db::DEMO_BUYER_EMAIL, db::DEMO_PASSWORD);
    Ok(())
}

async fn cmd_prune_images(cli: &Cli, min_age_hours: u32) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let pool = db::connect(&config.database).await?;
    let images = storage::build_store(&config).await?;

    let referenced = db::products::referenced_images(&pool)
        .await
        .context("Failed to read listing images")?;
    let cutoff = Utc::now() - chrono::Duration::hours(i64::from(min_age_hours));
    let removed = storage::prune_unreferenced(images.as_ref(), &referenced, cutoff)
        .await
        .context("Failed to prune images")?;

    println!(
        "[OK] Removed {} unreferenced image(s) older than {}h",
        removed, min_age_hours
    );
    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "Enabled"
    } else {
        "Disabled"
    }
}

/// Settings that work but deserve attention
fn config_warnings(config: &Config) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.auth.cookie_secure {
        warnings.push("Session cookies are not marked Secure - enable auth.cookie_secure behind HTTPS");
    }
    if !config.rate_limit.enabled {
        warnings.push("Rate limiting is disabled - sign-in attempts are not throttled");
    }
    if config.storage.backend == StorageBackend::S3
        && (config.storage.s3.access_key.is_none() || config.storage.s3.secret_key.is_none())
    {
        warnings.push("No S3 access keys configured - the default AWS credential chain will be used");
    }

    warnings
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        println!("Sessions will not survive restarts unless auth.session_secret is set.");
        return Ok(());
    }

    let config = match Config::load(config_path).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Invalid configuration file");
        }
    };

    println!("[OK] Configuration file is valid!");
    println!();
    println!("=== Configuration Summary ===");
    println!();
    println!("Server:");
    println!("  Address:      {}", config.bind_addr());
    println!("  Data Dir:     {}", config.server.data_dir.display());
    println!();
    println!("Database:");
    println!("  Connections:  {}", config.database.max_connections);
    println!();
    println!("Storage:");
    println!("  Backend:      {:?}", config.storage.backend);
    if let Some(bucket) = &config.storage.s3.bucket {
        println!("  Bucket:       {}", bucket);
    }
    println!(
        "  Limits:       {} images, {} MB each",
        config.storage.max_images,
        config.storage.max_file_bytes / (1024 * 1024)
    );
    println!();
    println!("Security:");
    println!("  Rate Limiting: {}", enabled(config.rate_limit.enabled));
    println!("  Secure Cookie: {}", enabled(config.auth.cookie_secure));
    println!("  Session Days:  {}", config.auth.session_days);
    println!();

    let warnings = config_warnings(&config);
    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in warnings {
            println!("  [!] {}", warning);
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::try_parse_from(["retrade"]).unwrap();
        assert!(cli.is_serve());
        assert_eq!(cli.config, PathBuf::from("retrade.toml"));
        assert!(!cli.skip_checks);
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["retrade", "--config", "prod.toml", "migrate"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Migrate));
        assert!(!cli.is_serve());
        assert_eq!(cli.config, PathBuf::from("prod.toml"));

        let cli = Cli::try_parse_from(["retrade", "prune-images"]).unwrap();
        assert_eq!(cli.command, Some(Commands::PruneImages { min_age_hours: 24 }));
        let cli = Cli::try_parse_from(["retrade", "prune-images", "--min-age-hours", "2"]).unwrap();
        assert_eq!(cli.command, Some(Commands::PruneImages { min_age_hours: 2 }));

        let cli = Cli::try_parse_from(["retrade", "config", "check"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Config(ConfigCommands::Check)));

        let cli = Cli::try_parse_from(["retrade", "-l", "debug", "serve"]).unwrap();
        assert!(cli.is_serve());
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["retrade", "deploy"]).is_err());
    }

    #[test]
    fn test_config_warnings() {
        let mut config = Config::default();
        config.auth.cookie_secure = true;
        assert!(config_warnings(&config).is_empty());

        config.rate_limit.enabled = false;
        config.storage.backend = StorageBackend::S3;
        assert_eq!(config_warnings(&config).len(), 2);
    }

    #[tokio::test]
    async fn test_config_check_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: dir.path().join("absent.toml"),
            log_level: None,
            skip_checks: false,
            command: Some(Commands::Config(ConfigCommands::Check)),
        };
        assert!(run_command(&cli).await.is_ok());
    }
}
