pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use goalboard_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "goalboard",
    about = "Goalboard operator CLI",
    long_about = "Record realized sales per business unit and month, and report goal attainment.",
    after_help = "Examples:\n  goalboard migrate\n  goalboard set --bu o2_tax --month mar --year 2026 --value 350\n  goalboard report --year 2026\n  goalboard doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, goal coverage, DB connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Aggregate a year of realized sales and measure it against the goals")]
    Report {
        #[arg(long, help = "Calendar year to report on")]
        year: i32,
    },
    #[command(about = "Record the realized value of one business unit and month")]
    Set {
        #[arg(long, help = "Business unit key (modelo_atual, o2_tax, oxy_hacker, franquia)")]
        bu: String,
        #[arg(long, help = "Month key (jan..dez) or number (1..12)")]
        month: String,
        #[arg(long)]
        year: i32,
        #[arg(long, help = "Non-negative decimal amount", allow_hyphen_values = true)]
        value: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    logging::init(&logging);

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Report { year } => commands::report::run(year),
        Command::Set { bu, month, year, value } => {
            commands::set::run(commands::set::SetArgs { bu, month, year, value })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
