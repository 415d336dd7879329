use super::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    /// Identity of the signed-in user.
    #[arg(long, default_value = "guest")]
    pub user: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one remote operation and print its reply.
    Call {
        operation: String,
        /// JSON payload.
        #[arg(default_value = "null")]
        payload: String,
    },
    /// Apply relationship notifications read from stdin, one JSON frame per
    /// line, then print the pending requests.
    Listen,
}
