use crate::batch::{run_score_pending, ScorePendingArgs};
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use ecochain::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "EcoChain",
    about = "Score supplier sustainability and serve recommendations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score embedded suppliers from a table export and derive recommendations
    ScorePending(ScorePendingArgs),
    /// Run an end-to-end walkthrough with built-in models and in-memory collaborators
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::ScorePending(args) => run_score_pending(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_pending_parses_limit() {
        let cli = Cli::try_parse_from(["ecochain", "score-pending", "--limit", "25"])
            .expect("arguments parse");
        match cli.command {
            Some(Command::ScorePending(args)) => {
                assert_eq!(args.limit, 25);
                assert!(args.suppliers_csv.is_none());
            }
            other => panic!("expected score-pending, got {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["ecochain"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
