//! WalaDaw CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (schema + session table)
//! waladaw-cli migrate
//!
//! # Create an admin account
//! waladaw-cli user create-admin -e admin@example.com -n "Admin" -p 's3cret-pass'
//!
//! # Give an existing account the admin role
//! waladaw-cli user promote -e ana@example.com
//!
//! # Replace a forgotten password
//! waladaw-cli user reset-password -e ana@example.com -p 'new-pass-123'
//!
//! # Load demo users and listings
//! waladaw-cli seed demo.yaml
//! ```
//!
//! All commands read `WALADAW_DATABASE_URL` (a `.env` file is honored).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "waladaw-cli")]
#[command(author, version, about = "WalaDaw CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Seed demo users and products from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new admin account
    CreateAdmin {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
    /// Give an existing account the admin role
    Promote {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
    /// Set a new password for an existing account
    ResetPassword {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// New password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::CreateAdmin {
                email,
                name,
                password,
            } => {
                commands::user::create_admin(&email, &name, &password).await?;
            }
            UserAction::Promote { email } => commands::user::promote(&email).await?,
            UserAction::ResetPassword { email, password } => {
                commands::user::reset_password(&email, &password).await?;
            }
        },
        Commands::Seed { file } => commands::seed::run(&file).await?,
    }
    Ok(())
}
