mod cli;
mod core;
mod server;

use clap::{Parser, Subcommand};

use crate::cli::ingest_cmd::SampleArgs;

#[derive(Parser)]
#[command(name = "dialcost", about = "Weekly dialer cost tracker and dashboard feed", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct SampleFlags {
    /// Cost so far today, e.g. 12.50 or "R$ 1.234,56"
    #[arg(short, long)]
    daily_cost: String,

    /// Account balance, same formats as --daily-cost
    #[arg(short, long)]
    balance: Option<String>,

    /// Collection time (ISO-8601); defaults to now
    #[arg(long)]
    at: Option<String>,
}

impl From<SampleFlags> for SampleArgs {
    fn from(flags: SampleFlags) -> Self {
        Self {
            daily_cost: flags.daily_cost,
            balance: flags.balance,
            at: flags.at,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP ingestion/dashboard server
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply one sample directly to the local store
    Ingest(SampleFlags),
    /// Send one sample to a running server
    Push {
        #[command(flatten)]
        sample: SampleFlags,

        /// Ingestion endpoint (default: push.url from config)
        #[arg(long)]
        url: Option<String>,
    },
    /// Show the dashboard snapshot
    Show,
    /// Show the raw weekly accumulator state
    State,
    /// Format a raw scraper payload without storing it
    Preview {
        /// JSON file to read (default: stdin)
        path: Option<std::path::PathBuf>,
    },
    /// Clear the stored weekly state and snapshot
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
}

/// Initializes the tracing subscriber; `RUST_LOG` takes precedence.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dialcost={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = crate::core::config::AppConfig::load()
        .map(|c| c.settings)
        .unwrap_or_default();

    let output_opts = cli::output::OutputOptions {
        format: if cli.json {
            cli::output::OutputFormat::Json
        } else {
            match cli.format.as_deref().unwrap_or(settings.default_format.as_str()) {
                "json" => cli::output::OutputFormat::Json,
                _ => cli::output::OutputFormat::Text,
            }
        },
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color, &settings.color),
        verbose: cli.verbose,
    };

    match cli.command {
        None | Some(Commands::Show) => cli::show_cmd::show(&output_opts)?,
        Some(Commands::Serve { host, port }) => {
            cli::serve_cmd::run(host, port, &output_opts).await?
        }
        Some(Commands::Ingest(flags)) => cli::ingest_cmd::ingest(&flags.into(), &output_opts)?,
        Some(Commands::Push { sample, url }) => {
            cli::ingest_cmd::push(&sample.into(), url, &output_opts).await?
        }
        Some(Commands::State) => cli::show_cmd::state(&output_opts)?,
        Some(Commands::Preview { path }) => cli::show_cmd::preview(path, &output_opts)?,
        Some(Commands::Reset { yes }) => cli::show_cmd::reset(yes, &output_opts)?,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&output_opts)?,
        },
    }

    Ok(())
}
