use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ruleforge::cli::commands::{self, extract::ExtractArgs};
use ruleforge::cli::ui::Output;

#[derive(Parser)]
#[command(name = "ruleforge")]
#[command(
    version,
    about = "Extract business rules and domain knowledge from requirement documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract knowledge from a text or markdown file
    Extract {
        #[arg(help = "Document to read")]
        file: PathBuf,
        #[arg(
            long,
            short,
            default_value = "business_rule",
            help = "Schema: business_rule, entity, api_contract, user_journey, glossary"
        )]
        schema: String,
        #[arg(long, help = "Chunk the document and extract each chunk")]
        batch: bool,
        #[arg(long = "no-llm", help = "Use regex extraction only")]
        no_llm: bool,
        #[arg(long = "no-fallback", help = "Fail instead of falling back to regex")]
        no_fallback: bool,
        #[arg(long, help = "Hide rules below this confidence (0.0-1.0)")]
        min_confidence: Option<f64>,
        #[arg(long, help = "Print the result as JSON")]
        json: bool,
        #[arg(long, short, help = "Write the JSON result to a file")]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Print as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cached response
    Clear,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mruleforge encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Output::new().error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Extract {
            file,
            schema,
            batch,
            no_llm,
            no_fallback,
            min_confidence,
            json,
            output,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::extract::run(ExtractArgs {
                file,
                schema,
                batch,
                no_llm,
                no_fallback,
                min_confidence,
                json,
                output,
            }))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => commands::config::show(json)?,
            ConfigAction::Path => commands::config::path()?,
            ConfigAction::Init { global, force } => commands::config::init(global, force)?,
        },
        Commands::Cache { action } => match action {
            CacheAction::Clear => commands::cache::clear()?,
        },
    }

    Ok(())
}
