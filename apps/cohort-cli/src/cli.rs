use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cohort")]
#[command(about = "Time-bound accountability groups: chat and a shared checklist")]
pub struct Cli {
    /// Identity config file (defaults to ~/.cohort/config.json)
    #[arg(long, env = "COHORT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(flatten)]
    Local(LocalCommand),
    /// Run an in-memory two-member walkthrough
    Demo,
}

/// Commands that use the local database and identity file.
#[derive(Subcommand)]
pub enum LocalCommand {
    /// Sign in (creates your profile on first use)
    Login {
        /// Display name shown to other members
        #[arg(long)]
        name: String,

        /// Email (optional)
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in identity
    Whoami,
    /// Create a cohort
    Create {
        #[arg(long)]
        name: String,

        /// Shared goal
        #[arg(long)]
        goal: String,

        /// End time, RFC 3339 (e.g. 2025-03-01T00:00:00Z)
        #[arg(long)]
        ends: String,
    },
    /// List cohorts you belong to
    List,
    /// Show a cohort with its feed and checklist
    Show {
        /// Cohort ID
        cohort_id: String,
    },
    /// Join a cohort
    Join {
        /// Cohort ID
        cohort_id: String,
    },
    /// Send a message to a cohort
    Send {
        /// Cohort ID
        cohort_id: String,
        /// Message text
        text: String,
    },
    /// Checklist commands
    Task {
        #[command(subcommand)]
        task_cmd: TaskCommand,
    },
    /// Print the join link for a cohort
    Link {
        /// Cohort ID
        cohort_id: String,
    },
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Add a task
    Add {
        /// Cohort ID
        cohort_id: String,
        /// Task text
        text: String,
    },
    /// Flip a task between done and not done
    Toggle {
        /// Cohort ID
        cohort_id: String,
        /// Task ID
        task_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_task_command() {
        let cli = Cli::try_parse_from(["cohort", "task", "toggle", "c-1", "t-1"]).unwrap();
        match cli.command {
            Command::Local(LocalCommand::Task {
                task_cmd: TaskCommand::Toggle { cohort_id, task_id },
            }) => {
                assert_eq!(cohort_id, "c-1");
                assert_eq!(task_id, "t-1");
            }
            _ => panic!("expected task toggle"),
        }
    }

    #[test]
    fn login_requires_name() {
        assert!(Cli::try_parse_from(["cohort", "login"]).is_err());
        let cli = Cli::try_parse_from(["cohort", "login", "--name", "Ana"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Local(LocalCommand::Login { ref name, email: None }) if name == "Ana"
        ));
    }

    #[test]
    fn demo_is_separate_from_local_commands() {
        let cli = Cli::try_parse_from(["cohort", "demo"]).unwrap();
        assert!(matches!(cli.command, Command::Demo));

        let cli = Cli::try_parse_from(["cohort", "list"]).unwrap();
        assert!(matches!(cli.command, Command::Local(LocalCommand::List)));
    }
}
