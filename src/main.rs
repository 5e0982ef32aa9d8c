use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use simple_bank::{open_account, AccountStore, BankConfig, Session};

/// Issue bank cards and move money between them
#[derive(Parser, Debug)]
#[command(name = "simple-bank", version)]
struct Cli {
    /// SQLite database file (created if missing)
    #[arg(long, global = true, default_value = "card.s3db")]
    db: PathBuf,

    /// Issuer prefix for newly created cards
    #[arg(long, global = true, default_value = "400000")]
    prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and print its card number and PIN
    Create,
    /// Show the balance of a card
    Balance(Credentials),
    /// Add income to a card
    Deposit {
        #[command(flatten)]
        credentials: Credentials,
        amount: i64,
    },
    /// Transfer money to another card
    Transfer {
        #[command(flatten)]
        credentials: Credentials,
        /// Recipient card number
        to: String,
        amount: i64,
    },
    /// List recorded events for a card
    History(Credentials),
    /// Close the account
    Close(Credentials),
}

#[derive(clap::Args, Debug)]
struct Credentials {
    #[arg(long)]
    card: String,
    #[arg(long)]
    pin: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = BankConfig::default()
        .with_database_path(cli.db.clone())
        .with_issuer_prefix(cli.prefix.clone());

    let store = AccountStore::open(&config)
        .with_context(|| format!("Failed to open database {}", cli.db.display()))?;

    run(&store, cli.command)?;

    store.close().context("Failed to close database")?;
    Ok(())
}

fn run(store: &AccountStore, command: Command) -> Result<()> {
    match command {
        Command::Create => {
            let account = open_account(store).context("Failed to create account")?;
            println!("Your card has been created");
            println!("Your card number:\n{}", account.number);
            println!("Your card PIN:\n{}", account.pin);
        }
        Command::Balance(creds) => {
            let session = login(store, &creds)?;
            println!("Balance: {}", session.balance()?);
        }
        Command::Deposit { credentials, amount } => {
            let session = login(store, &credentials)?;
            let balance = session.add_income(amount).context("Deposit failed")?;
            println!("Income was added! Balance: {}", balance);
        }
        Command::Transfer { credentials, to, amount } => {
            let session = login(store, &credentials)?;
            session.transfer(&to, amount).context("Transfer failed")?;
            println!("Success!");
        }
        Command::History(creds) => {
            let session = login(store, &creds)?;
            for event in session.history()? {
                println!(
                    "{}  {:<12}  {:>10}  {}",
                    event.timestamp.to_rfc3339(),
                    event.event_type.as_str(),
                    event.amount,
                    event.counterparty.as_deref().unwrap_or("")
                );
            }
        }
        Command::Close(creds) => {
            let session = login(store, &creds)?;
            session.close().context("Failed to close account")?;
            println!("The account has been closed!");
        }
    }
    Ok(())
}

fn login<'s>(store: &'s AccountStore, creds: &Credentials) -> Result<Session<'s>> {
    Session::login(store, &creds.card, &creds.pin).context("Login failed")
}
