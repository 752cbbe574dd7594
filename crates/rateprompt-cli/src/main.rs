use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "rateprompt-cli", version, about = "rateprompt CLI")]
struct Cli {
    /// Application version the counters belong to
    /// [default: $RATEPROMPT_APP_VERSION, then the CLI version]
    #[arg(long, global = true)]
    app_version: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count an app session
    Session,
    /// Count a significant event
    Event {
        /// Event weight
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        weight: i64,
    },
    /// Request a rating prompt, subject to the policy
    Evaluate(commands::evaluate::EvaluateArgs),
    /// Print counters and the policy verdict as JSON
    Status,
    /// Reset session, event and first-open counters
    Reset,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RATEPROMPT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let app_version = commands::resolve_app_version(cli.app_version);
    let result = match cli.command {
        Commands::Session => commands::counters::session(&app_version),
        Commands::Event { weight } => commands::counters::event(&app_version, weight),
        Commands::Evaluate(args) => commands::evaluate::run(&app_version, args),
        Commands::Status => commands::counters::status(&app_version),
        Commands::Reset => commands::counters::reset(&app_version),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
