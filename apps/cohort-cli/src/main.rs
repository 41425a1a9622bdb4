mod cli;
mod commands;
mod context;

use clap::Parser;
use cli::{Cli, Command, LocalCommand, TaskCommand};
use cohort_config::SyncConfig;
use commands::*;
use context::Context;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        // Runs entirely in memory: no database or identity file is touched.
        Command::Demo => cmd_demo(&SyncConfig::from_env()?).await?,
        Command::Local(command) => {
            let ctx = Context::open(cli.config).await?;
            run(&ctx, command).await?;
        }
    }

    Ok(())
}

async fn run(ctx: &Context, command: LocalCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        LocalCommand::Login { name, email } => cmd_login(ctx, &name, email.as_deref()).await?,
        LocalCommand::Logout => cmd_logout(ctx).await?,
        LocalCommand::Whoami => cmd_whoami(ctx)?,
        LocalCommand::Create { name, goal, ends } => {
            cmd_create(ctx, &name, &goal, &ends).await?
        }
        LocalCommand::List => cmd_list(ctx).await?,
        LocalCommand::Show { cohort_id } => cmd_show(ctx, &cohort_id).await?,
        LocalCommand::Join { cohort_id } => cmd_join(ctx, &cohort_id).await?,
        LocalCommand::Send { cohort_id, text } => cmd_send(ctx, &cohort_id, &text).await?,
        LocalCommand::Task { task_cmd } => match task_cmd {
            TaskCommand::Add { cohort_id, text } => {
                cmd_task_add(ctx, &cohort_id, &text).await?
            }
            TaskCommand::Toggle { cohort_id, task_id } => {
                cmd_task_toggle(ctx, &cohort_id, &task_id).await?
            }
        },
        LocalCommand::Link { cohort_id } => cmd_link(ctx, &cohort_id).await?,
    }
    Ok(())
}
