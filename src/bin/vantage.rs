use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::Level;
use vantage::{StateLens, StateQuery, VantageConfig, VantageDatabase};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.vantage/vantage.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the BGP routing state of one or more prefixes
    State {
        /// IP prefixes or addresses to resolve
        #[clap(required = true)]
        resources: Vec<String>,

        /// Restrict the query to specific collector ids, e.g. -r 3,12
        #[clap(short = 'r', long, value_delimiter = ',')]
        collectors: Vec<u32>,

        /// Filter returned routes by community tags, e.g. -C 100:200
        #[clap(short = 'C', long, value_delimiter = ',')]
        communities: Vec<String>,

        /// Resolve at a historical time (RFC3339, unix timestamp, ...)
        #[clap(short, long)]
        timestamp: Option<String>,

        /// Register the resolved state for continuous monitoring
        #[clap(long)]
        live: bool,

        /// Pretty-print the JSON output
        #[clap(long)]
        pretty: bool,
    },

    /// Inspect or clear the local state cache
    Cache {
        #[clap(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached resource states
    List,
    /// Remove all cached resource states
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let config = VantageConfig::new(&cli.config)?;
    let db = VantageDatabase::open_in_dir(&config.data_dir)?;

    match cli.command {
        Commands::State {
            resources,
            collectors,
            communities,
            timestamp,
            live,
            pretty,
        } => {
            let mut query = StateQuery::new(resources)
                .with_collectors(collectors)
                .with_communities(communities)
                .with_live(live);

            if let Some(ts) = timestamp {
                let parsed = dateparser::parse(&ts)
                    .map_err(|e| anyhow!("Unable to parse timestamp '{}': {}", ts, e))?;
                query = query.with_timestamp(parsed.with_timezone(&Utc));
            }

            let lens = StateLens::from_config(&db, &config);
            let state = lens.resolve(&query)?;

            let output = if pretty {
                serde_json::to_string_pretty(&state)?
            } else {
                serde_json::to_string(&state)?
            };
            println!("{}", output);
        }

        Commands::Cache { command } => match command {
            CacheCommands::List => {
                for state in db.states().list()? {
                    println!(
                        "{}\t{}\tcollectors=[{}]\troutes={}\tprepends={}\tqueried_at={}\tlive={}",
                        state.id.unwrap_or_default(),
                        state.resources.join(","),
                        state
                            .collectors
                            .iter()
                            .map(|c| c.to_string())
                            .collect::<Vec<_>>()
                            .join(","),
                        state.routes.len(),
                        state.prepends,
                        state.queried_at.to_rfc3339(),
                        state.live,
                    );
                }
            }
            CacheCommands::Clear => {
                let removed = db.states().clear()?;
                println!("Removed {} cached state(s)", removed);
            }
        },
    }

    Ok(())
}
