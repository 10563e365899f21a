//! lexiloop CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lexiloop", version, about = "Spaced-repetition vocabulary review")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store snapshot path (overrides `store_path` from the config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Learner whose data is read and written
    #[arg(long, global = true, default_value = "default")]
    learner: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and an empty store
    Init,

    /// Add a vocabulary item
    Add {
        /// Word or phrase to learn
        term: String,

        /// Meaning or translation
        meaning: String,

        /// Deck to file the item under (created if missing)
        #[arg(long)]
        deck: Option<String>,
    },

    /// Grade one item
    Review {
        /// Item id
        item: String,

        /// Rating token (again/hard/good, or forgot/hard/good/easy)
        rating: String,

        /// Rating alphabet: legacy, four-level
        #[arg(long, default_value = "legacy")]
        scheme: String,
    },

    /// Show the interval each rating would produce
    Preview {
        /// Item id
        item: String,

        /// Rating alphabet: legacy, four-level
        #[arg(long, default_value = "legacy")]
        scheme: String,
    },

    /// Show what to review now
    Queue {
        /// Restrict to one deck
        #[arg(long)]
        deck: Option<String>,

        /// Zero-based group index (requires --group-size)
        #[arg(long, requires = "group_size")]
        group: Option<usize>,

        /// Items per group
        #[arg(long)]
        group_size: Option<usize>,

        /// Max due items (defaults to config)
        #[arg(long)]
        review_limit: Option<usize>,

        /// Max new items (defaults to config)
        #[arg(long)]
        new_limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show reviews per day for a month
    Activity {
        /// Year (defaults to the current local year)
        #[arg(long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current local month)
        #[arg(long)]
        month: Option<u32>,

        /// Minutes east of UTC
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset_minutes: i32,
    },

    /// Get or generate today's practice story
    Daily {
        /// Story date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Story length: short, medium, long
        #[arg(long, default_value = "medium")]
        length: String,

        /// CEFR level: A1..C2
        #[arg(long, default_value = "A2")]
        level: String,

        /// Terms to feature (comma-separated)
        #[arg(long)]
        terms: Option<String>,

        /// Story topic
        #[arg(long)]
        topic: Option<String>,

        /// Provider name from the config (defaults to `default_provider`)
        #[arg(long)]
        provider: Option<String>,

        /// Minutes east of UTC, for deciding what "today" is
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset_minutes: i32,
    },

    /// Mark a daily story as saved
    SaveDaily {
        /// Story date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Minutes east of UTC, for deciding what "today" is
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset_minutes: i32,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lexiloop=info".parse().expect("static directive")),
        )
        .init();

    let cli = Cli::parse();
    let global = cli.global;

    let result = match cli.command {
        Commands::Init => commands::init::execute(&global).await,
        Commands::Add {
            term,
            meaning,
            deck,
        } => commands::add::execute(&global, term, meaning, deck).await,
        Commands::Review {
            item,
            rating,
            scheme,
        } => commands::review::execute(&global, item, rating, scheme).await,
        Commands::Preview { item, scheme } => {
            commands::review::preview(&global, item, scheme).await
        }
        Commands::Queue {
            deck,
            group,
            group_size,
            review_limit,
            new_limit,
            json,
        } => {
            commands::queue::execute(
                &global,
                deck,
                group.zip(group_size),
                review_limit,
                new_limit,
                json,
            )
            .await
        }
        Commands::Activity {
            year,
            month,
            offset_minutes,
        } => commands::activity::execute(&global, year, month, offset_minutes).await,
        Commands::Daily {
            date,
            length,
            level,
            terms,
            topic,
            provider,
            offset_minutes,
        } => {
            commands::daily::execute(
                &global,
                commands::daily::DailyArgs {
                    date,
                    length,
                    level,
                    terms,
                    topic,
                    provider,
                    offset_minutes,
                },
            )
            .await
        }
        Commands::SaveDaily {
            date,
            offset_minutes,
        } => commands::daily::save(&global, date, offset_minutes).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
