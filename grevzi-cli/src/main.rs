//! GREVZI CLI
//!
//! Runs the drop storefront and inspects its catalog.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use grevzi_core::{read_supply, ContractProvider, DropRegistry, StorefrontConfig};
use grevzi_web::AppState;

#[derive(Parser)]
#[command(name = "grevzi")]
#[command(about = "GREVZI - NFT drop storefront")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the storefront web server
    Serve {
        /// Configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to bind, overrides the configuration
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// List the collections in the catalog
    Collections {
        /// Configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Serve { config, bind } => cmd_serve(config, bind),
        Commands::Collections { config } => cmd_collections(config),
        Commands::Config { config } => cmd_config(config),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<StorefrontConfig> {
    StorefrontConfig::load_or_default(path.as_deref()).context("Failed to load configuration")
}

fn cmd_serve(config: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    let state = AppState::from_config(&config).context("Failed to build storefront")?;
    tracing::info!(
        "Serving {} drop contract(s) from the {} catalog",
        config.drops.len(),
        state.content.name()
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(grevzi_web::serve(Arc::new(state), &config.server.bind))
        .with_context(|| format!("Server on {} stopped", config.server.bind))?;
    Ok(())
}

fn cmd_collections(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let content = config.content.build().context("Failed to open catalog")?;
    let registry = DropRegistry::from_config(&config.drops);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let collections = content
            .fetch_collections()
            .await
            .context("Failed to fetch collections")?;

        println!("\n  COLLECTIONS ({})", content.name());
        println!("  ===========\n");

        if collections.is_empty() {
            println!("  No collections.");
            return Ok(());
        }

        println!("  {:<24} {:<28} {:<16} ADDRESS", "SLUG", "TITLE", "SUPPLY");
        for collection in &collections {
            let supply = match registry.contract_for(&collection.address) {
                Some(contract) => match read_supply(contract.as_ref()).await {
                    Ok(supply) => format!("{} / {}", supply.claimed(), supply.total()),
                    Err(e) => {
                        tracing::warn!("Supply read for {} failed: {}", collection.slug, e);
                        "unavailable".to_string()
                    }
                },
                None => "no contract".to_string(),
            };
            println!(
                "  {:<24} {:<28} {:<16} {}",
                collection.slug.as_str(),
                collection.title,
                supply,
                collection.address
            );
        }
        println!();
        Ok(())
    })
}

/// Names the file the effective config came from, or `# defaults`
fn config_header(explicit: Option<&Path>, default: &Path) -> String {
    match explicit {
        Some(path) => format!("# {}", path.display()),
        None if default.exists() => format!("# {}", default.display()),
        None => "# defaults".to_string(),
    }
}

fn cmd_config(config: Option<PathBuf>) -> Result<()> {
    let header = config_header(config.as_deref(), &StorefrontConfig::default_path());
    let config = load_config(config)?;

    println!("{}", header);
    print!("{}", config.to_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["grevzi", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        match cli.command {
            Commands::Serve { config, bind } => {
                assert!(config.is_none());
                assert_eq!(bind.as_deref(), Some("0.0.0.0:8080"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_collections_with_config() {
        let cli = Cli::try_parse_from(["grevzi", "collections", "-c", "store.yaml"]).unwrap();
        match cli.command {
            Commands::Collections { config } => {
                assert_eq!(config, Some(PathBuf::from("store.yaml")));
            }
            _ => panic!("expected collections"),
        }
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server: [not, a, map]").unwrap();

        assert!(load_config(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_load_config_rejects_oversold_drop() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "drops:\n  - address: \"0x01\"\n    name: Broken\n    total_supply: 5\n    claimed: 6\n    price: \"0.01\""
        )
        .unwrap();

        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(format!("{:#}", err).contains("exceeds total supply"));
    }

    #[test]
    fn test_config_header_names_the_file_read() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let missing = file.path().with_extension("absent.yaml");

        assert_eq!(
            config_header(Some(file.path()), &missing),
            format!("# {}", file.path().display())
        );
        assert_eq!(
            config_header(None, file.path()),
            format!("# {}", file.path().display())
        );
    }

    #[test]
    fn test_config_header_without_a_file_says_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.yaml");

        assert_eq!(config_header(None, &missing), "# defaults");
    }
}
