use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rehome-worker")]
#[command(about = "Placeholder user contribution reassignment")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run database migrations
    Migrate,
    /// Check that every registered user reference column is indexed
    VerifyRegistry,
    /// Replay placeholder references of one source user
    Replay(ReplayArgs),
    /// Sweep registered tables for rows still owned by a placeholder user
    Direct(DirectArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ReplayArgs {
    #[arg(long)]
    pub source_user_id: i64,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DirectArgs {
    #[arg(long)]
    pub placeholder_user_id: i64,
    #[arg(long)]
    pub reassign_to_user_id: i64,
    #[arg(long)]
    pub source_user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Migrate,
    VerifyRegistry,
    Replay(ReplayArgs),
    Direct(DirectArgs),
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Migrate => "migrate",
            Self::VerifyRegistry => "verify-registry",
            Self::Replay(_) => "replay",
            Self::Direct(_) => "direct",
        }
    }
}

impl From<Cli> for RunMode {
    fn from(cli: Cli) -> Self {
        match cli.command {
            Command::Migrate => Self::Migrate,
            Command::VerifyRegistry => Self::VerifyRegistry,
            Command::Replay(args) => Self::Replay(args),
            Command::Direct(args) => Self::Direct(args),
        }
    }
}

pub fn parse_args() -> RunMode {
    Cli::parse().into()
}
