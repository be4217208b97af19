use clap::{Parser, Subcommand};

/// hubrelay — GitHub App webhook relay
#[derive(Parser)]
#[command(name = "hubrelay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook server (default)
    Serve {
        /// Port to bind, overrides HUBRELAY_PORT
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the installations of the GitHub App
    Installations,

    /// Manage stored personal tokens
    UserToken {
        #[command(subcommand)]
        command: UserTokenCommands,
    },
}

#[derive(Subcommand)]
pub enum UserTokenCommands {
    /// Remove the stored token of a user
    Remove {
        #[arg(long)]
        username: String,
    },
}
