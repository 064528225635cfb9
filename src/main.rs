use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cbb_scout::config::Settings;
use cbb_scout::models::Metric;
use cbb_scout::{api, cli};

#[derive(Parser)]
#[command(name = "cbb-scout")]
#[command(about = "College basketball team ratings, comparisons and scouting reports")]
struct Cli {
    /// Season to load (defaults to DEFAULT_SEASON or the current year)
    #[arg(short, long, global = true)]
    year: Option<i32>,

    /// Read the feed from a local CSV file, or a directory of `{season}_team_results.csv`
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List every team in the season
    Teams {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show a team's full record
    Team {
        name: String,
        #[arg(long)]
        exact: bool,
    },
    /// Substring search over team names
    Search { query: String },
    /// Head-to-head metric comparison
    Compare {
        team1: String,
        team2: String,
        /// Comma-separated metric keys, e.g. barthag,adjoe,adjde
        #[arg(short, long, value_delimiter = ',')]
        metrics: Vec<Metric>,
    },
    /// Scouting report with strengths, weaknesses and a game plan
    Scout { name: String },
    /// Conference summary (all teams when no name is given)
    Conference { name: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let cli = Cli::parse();
    let file = cli.file.as_deref();
    let year = cli.year;

    match cli.command {
        Some(Commands::Serve { port }) => {
            let mut settings = settings;
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(year) = year {
                settings.default_season = year;
            }
            tracing::info!("Starting CBB scout API server on port {}", settings.port);
            let source = cli::build_source(&settings, file)?;
            api::serve(settings, source).await?;
        }
        Some(Commands::Teams { limit }) => {
            cli::list_teams(&settings, file, year, limit).await?;
        }
        Some(Commands::Team { name, exact }) => {
            tracing::info!("Querying team: {}", name);
            cli::query_team(&settings, file, year, &name, exact).await?;
        }
        Some(Commands::Search { query }) => {
            cli::search_teams(&settings, file, year, &query).await?;
        }
        Some(Commands::Compare { team1, team2, metrics }) => {
            cli::compare(&settings, file, year, &team1, &team2, &metrics).await?;
        }
        Some(Commands::Scout { name }) => {
            tracing::info!("Scouting team: {}", name);
            cli::scout(&settings, file, year, &name).await?;
        }
        Some(Commands::Conference { name }) => {
            cli::conference(&settings, file, year, name.as_deref()).await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting CBB scout API server on port {}", settings.port);
            let source = cli::build_source(&settings, file)?;
            api::serve(settings, source).await?;
        }
    }

    Ok(())
}
