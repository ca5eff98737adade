use clap::{Args, Parser, Subcommand};
use news_match::Result;
use news_match::commands::{QueryInput, build_embeddings, lookup, partition_source, search};
use news_match::config::{Config, get_config_dir, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "news-match")]
#[command(about = "Find related news articles by embedding similarity")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.news-match)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or initialize the configuration
    Config {
        /// Write the default configuration if none exists
        #[arg(long)]
        init: bool,
    },
    /// Split a source article CSV into numbered partitions
    Partition {
        /// CSV with text, link, headline, short_description and date columns
        source: PathBuf,
        /// Split into this many partitions instead of using the configured partition size
        #[arg(long)]
        partitions: Option<usize>,
        /// Delete the partition directory before writing
        #[arg(long)]
        clean: bool,
    },
    /// Encode the partitioned corpus into the embedding cache
    Build {
        /// Rebuild even if the cache already exists
        #[arg(long)]
        force: bool,
    },
    /// Find articles related to a passage or a news URL
    Search(SearchArgs),
    /// Print the metadata stored for corpus rows
    Lookup {
        /// 0-based corpus row indices
        #[arg(required = true)]
        indices: Vec<usize>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SearchArgs {
    /// Text passage to match
    #[arg(long)]
    text: Option<String>,
    /// URL of a news article to match
    #[arg(long)]
    url: Option<String>,
}

impl SearchArgs {
    fn into_input(self) -> Option<QueryInput> {
        self.text
            .map(QueryInput::Passage)
            .or_else(|| self.url.map(QueryInput::Url))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| news_match::NewsError::Config(e.to_string()))?,
    };
    let mut config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { init } => {
            if init && !config.config_file_path().exists() {
                config.save()?;
                println!("Wrote {}", config.config_file_path().display());
            }
            show_config(&config)?;
        }
        Commands::Partition {
            source,
            partitions,
            clean,
        } => {
            partition_source(&mut config, &source, partitions, clean)?;
        }
        Commands::Build { force } => {
            build_embeddings(&config, force)?;
        }
        Commands::Search(args) => {
            if let Some(input) = args.into_input() {
                search(&config, input)?;
            }
        }
        Commands::Lookup { indices } => {
            lookup(&config, &indices)?;
        }
    }

    Ok(())
}
