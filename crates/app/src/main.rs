use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{Currency, Engine, TripCode};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use crate::{
    error::Result,
    settings::{Overrides, Settings},
};

mod commands;
mod error;
mod settings;

#[derive(Parser, Debug)]
#[command(name = "tripsplit")]
#[command(about = "Shared trip expenses: who paid, who owes, who pays whom")]
struct Cli {
    /// Settings file, extension optional (default `settings`).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Database connection string (overrides `TRIPSPLIT_DATABASE_URL`).
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Log level (overrides `TRIPSPLIT_LEVEL`).
    #[arg(long, global = true)]
    level: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage users.
    User(UserArgs),
    /// Manage trips.
    Trip(TripArgs),
    /// Manage trip members.
    Member(MemberArgs),
    /// Record expenses.
    Expense(ExpenseArgs),
    /// Outstanding balance of every member.
    Balances { code: TripCode },
    /// Transfers that settle the outstanding balances.
    Plan { code: TripCode },
    /// Mark an expense as settled.
    Settle {
        expense_id: Uuid,
        #[arg(long)]
        by: String,
    },
    /// Mark a single expense item as settled.
    SettleItem {
        item_id: Uuid,
        #[arg(long)]
        by: String,
    },
}

#[derive(Args, Debug)]
struct UserArgs {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    username: String,
    #[arg(long)]
    display_name: Option<String>,
    #[arg(long)]
    avatar_url: Option<String>,
}

#[derive(Args, Debug)]
struct TripArgs {
    #[command(subcommand)]
    command: TripCommand,
}

#[derive(Subcommand, Debug)]
enum TripCommand {
    Create(TripCreateArgs),
    /// Trip header, members and every expense, settled ones included.
    Show { code: TripCode },
}

#[derive(Args, Debug)]
struct TripCreateArgs {
    name: String,
    #[arg(long)]
    place: Option<String>,
    /// Defaults to the `currency` setting.
    #[arg(long)]
    currency: Option<Currency>,
}

#[derive(Args, Debug)]
struct MemberArgs {
    #[command(subcommand)]
    command: MemberCommand,
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    Add { code: TripCode, username: String },
}

#[derive(Args, Debug)]
struct ExpenseArgs {
    #[command(subcommand)]
    command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    Add(ExpenseAddArgs),
}

#[derive(Args, Debug)]
struct ExpenseAddArgs {
    code: TripCode,
    /// Username of the member who paid.
    #[arg(long)]
    payer: String,
    /// Total, in the trip currency (e.g. `12.50`).
    #[arg(long)]
    amount: String,
    #[arg(long)]
    description: String,
    /// Usernames sharing the expense equally (default: every member).
    #[arg(long, value_delimiter = ',', conflicts_with = "share")]
    among: Vec<String>,
    /// `user=amount` for a fixed share, bare `user` for an equal part of
    /// the rest. Repeatable.
    #[arg(long)]
    share: Vec<String>,
    /// When the expense happened, RFC 3339 (default: now).
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

async fn connect_db(database_url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;
    tracing::debug!(%database_url, "database ready");
    Ok(db)
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(
        cli.config.as_deref(),
        Overrides {
            database_url: cli.database_url,
            level: cli.level,
        },
    )?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tripsplit={level},engine={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let db = connect_db(&settings.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;
    commands::run(&engine, &settings, cli.json, cli.command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}
