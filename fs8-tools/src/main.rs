use clap::{Parser, Subcommand};
use tracing::Level;

use fs8_tools::commands::{self, extract::ExtractArgs, pack::PackArgs};

#[derive(Parser)]
#[command(
    name = "fs8",
    about = "Build and extract FS8 compressed resource packs",
    version,
    long_about = "Tools for the FS8 read-only resource pack format: pack a directory \
                  or an explicit file list into a signed archive, or extract files \
                  back out of one."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Pack files into an FS8 archive
    Pack(PackArgs),

    /// Extract files from an FS8 archive
    Extract(ExtractArgs),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Pack(args) => commands::pack::handle(args),
        Commands::Extract(args) => commands::extract::handle(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
