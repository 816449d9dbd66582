mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_consumption_range, cmd_consumption_set, cmd_entry_add, cmd_entry_delete, cmd_entry_list,
    cmd_food_add, cmd_food_list, cmd_food_seed, cmd_food_top, cmd_log_meal, cmd_profile_set,
    cmd_profile_show, cmd_progress,
};
use crate::config::Config;
use nutrilog_core::NutritionService;

#[derive(Parser)]
#[command(
    name = "nutrilog",
    version,
    about = "A personal calorie tracker: daily totals, food log, and progress against your goal"
)]
struct Cli {
    /// User to act as (created locally on first use)
    #[arg(short, long, global = true, default_value = "1")]
    user: i64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or update your profile and daily calorie goal
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Daily calorie totals
    Consumption {
        #[command(subcommand)]
        command: ConsumptionCommands,
    },
    /// Manage the food catalog
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Individual food consumption entries
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Log a meal and update the day's total
    Log {
        /// Items as FOOD_ID:GRAMS (e.g. 12:150 4:200)
        #[arg(required = true)]
        items: Vec<String>,
        /// Date to log for (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show progress against your goal for a date range
    Progress {
        #[command(flatten)]
        window: WindowArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the procedure server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(clap::Args)]
struct WindowArgs {
    /// First day (YYYY-MM-DD); overrides --days
    #[arg(long)]
    start: Option<String>,
    /// Last day (YYYY-MM-DD or today/yesterday, default: today)
    #[arg(long)]
    end: Option<String>,
    /// Number of days ending at --end
    #[arg(short, long, default_value = "7")]
    days: u32,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile (defaults apply to unset fields)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update one or more profile fields
    Set {
        /// Age in years
        #[arg(long)]
        age: Option<i64>,
        /// Height in centimetres
        #[arg(long)]
        height: Option<i64>,
        /// Current weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Target weight in kg
        #[arg(long)]
        target: Option<f64>,
        /// Daily calorie goal in kcal
        #[arg(long)]
        goal: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConsumptionCommands {
    /// Set the calorie total for a day (replaces any previous value)
    Set {
        /// Calories consumed
        consumed: i64,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List daily totals, oldest first
    Range {
        #[command(flatten)]
        window: WindowArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// List the catalog
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a food to the catalog
    Add {
        /// Food name
        name: String,
        /// Display icon (default: 🍽️)
        #[arg(long)]
        icon: Option<String>,
        /// Calories per 100g (omit if unknown)
        #[arg(long)]
        calories: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load the built-in list of common foods (skips names already present)
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Most frequently logged foods
    Top {
        #[command(flatten)]
        window: WindowArgs,
        /// Number of foods to show (default: 5)
        #[arg(short, long)]
        limit: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum EntryCommands {
    /// List entries, newest first
    List {
        #[command(flatten)]
        window: WindowArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Append one entry without touching the day's total
    Add {
        /// Food ID
        food_id: i64,
        /// Quantity in grams (default: 1)
        #[arg(short, long)]
        quantity: Option<f64>,
        /// Calories to record (default: computed from the catalog)
        #[arg(long)]
        calories: Option<i64>,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one of your entries
    Delete {
        /// Entry ID
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(if matches!(cli.command, Commands::Serve { .. }) {
        "nutrilog=info"
    } else {
        "nutrilog=warn"
    });

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = NutritionService::connect(&config.db_path, config.read_mode)?
        .with_thresholds(config.thresholds);
    let user = cli.user;

    if !matches!(cli.command, Commands::Serve { .. }) && svc.is_available() {
        svc.ensure_local_user(user)?;
    }

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&svc, user, json),
            ProfileCommands::Set {
                age,
                height,
                weight,
                target,
                goal,
                json,
            } => cmd_profile_set(&svc, user, age, height, weight, target, goal, json),
        },
        Commands::Consumption { command } => match command {
            ConsumptionCommands::Set {
                consumed,
                date,
                json,
            } => cmd_consumption_set(&svc, user, consumed, date.as_deref(), json),
            ConsumptionCommands::Range { window, json } => cmd_consumption_range(
                &svc,
                user,
                window.start.as_deref(),
                window.end.as_deref(),
                window.days,
                json,
            ),
        },
        Commands::Food { command } => match command {
            FoodCommands::List { json } => cmd_food_list(&svc, json),
            FoodCommands::Add {
                name,
                icon,
                calories,
                json,
            } => cmd_food_add(&svc, &name, icon, calories, json),
            FoodCommands::Seed { json } => cmd_food_seed(&svc, json),
            FoodCommands::Top {
                window,
                limit,
                json,
            } => cmd_food_top(
                &svc,
                user,
                window.start.as_deref(),
                window.end.as_deref(),
                window.days,
                limit,
                json,
            ),
        },
        Commands::Entry { command } => match command {
            EntryCommands::List { window, json } => cmd_entry_list(
                &svc,
                user,
                window.start.as_deref(),
                window.end.as_deref(),
                window.days,
                json,
            ),
            EntryCommands::Add {
                food_id,
                quantity,
                calories,
                date,
                json,
            } => cmd_entry_add(&svc, user, food_id, quantity, calories, date.as_deref(), json),
            EntryCommands::Delete { entry_id, json } => {
                cmd_entry_delete(&svc, user, entry_id, json)
            }
        },
        Commands::Log { items, date, json } => {
            cmd_log_meal(&svc, user, &items, date.as_deref(), json)
        }
        Commands::Progress { window, json } => cmd_progress(
            &svc,
            user,
            window.start.as_deref(),
            window.end.as_deref(),
            window.days,
            json,
        ),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?)
            };
            server::start_server(svc, port, &bind, api_key).await
        }
    }
}
