//! mnemo CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "mnemo",
    version,
    about = "Learning analytics and spaced-repetition scheduling"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an analytics report for a learner
    Report {
        /// Learner identifier
        #[arg(long)]
        learner: String,

        /// Days of history to analyze (default from config)
        #[arg(long)]
        window_days: Option<u32>,

        /// Forecast horizon in days (default from config)
        #[arg(long)]
        horizon: Option<u32>,

        /// Evaluate as of this RFC 3339 time instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Also save the report as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Record an attempt and update the learner's review card
    Record {
        #[arg(long)]
        learner: String,

        /// Knowledge unit identifier
        #[arg(long)]
        unit: String,

        /// Subject the unit belongs to
        #[arg(long, default_value = "")]
        subject: String,

        /// The answer was correct
        #[arg(long)]
        correct: bool,

        /// The answer was incorrect
        #[arg(long)]
        incorrect: bool,

        /// Difficulty tier, 1 to 5
        #[arg(long, default_value = "1")]
        difficulty: u8,

        /// Seconds spent on the attempt
        #[arg(long, default_value = "0")]
        duration: f64,

        /// Attempt time in RFC 3339 (default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List cards due for review
    Due {
        #[arg(long)]
        learner: String,

        /// Evaluate as of this RFC 3339 time instead of now
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Reset a review card to its first stage
    Reset {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        unit: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare mastery between two saved reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Minimum mastery score change, in points
        #[arg(long, default_value = "5")]
        threshold: f64,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Check a config file for problems
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter mnemo.toml
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "mnemo=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Report {
            learner,
            window_days,
            horizon,
            now,
            format,
            output,
            config,
        } => {
            commands::report::execute(learner, window_days, horizon, now, format, output, config)
                .await
        }
        Commands::Record {
            learner,
            unit,
            subject,
            correct,
            incorrect,
            difficulty,
            duration,
            at,
            config,
        } => {
            commands::record::execute(
                learner, unit, subject, correct, incorrect, difficulty, duration, at, config,
            )
            .await
        }
        Commands::Due {
            learner,
            now,
            config,
        } => commands::due::execute(learner, now, config).await,
        Commands::Reset {
            learner,
            unit,
            config,
        } => commands::reset::execute(learner, unit, config).await,
        Commands::Compare {
            baseline,
            current,
            threshold,
            format,
        } => commands::compare::execute(baseline, current, threshold, format),
        Commands::Validate { config } => commands::validate::execute(config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
