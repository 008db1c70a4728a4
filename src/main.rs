// PurpleDrill - Adversary Emulation Orchestrator
//
// Runs parametrized MITRE ATT&CK techniques through an external technique
// runner, sequences them into playbooks, and drives a local network
// escalation flow with auditable cleanup. For authorized exercises only.

mod actions;
mod cli;
mod commands;
mod config;
mod escalate;
mod executor;
mod index;
mod invocation;
mod listener;
mod logger;
mod playbook;
mod prompt;
mod runner;
mod tools;
mod utils;

use clap::Parser;
use cli::{Cli, Commands, ConfigCommands, ListCommands, PlaybookCommands};
use log::{error, info};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logger::init_logger(cli.debug);
    debug_assert!(playbook::catalog_is_valid(), "playbook catalog is malformed");

    info!(
        "Starting PurpleDrill v{} - Adversary Emulation Orchestrator",
        env!("CARGO_PKG_VERSION")
    );

    match run_command(cli).await {
        Ok(_) => {
            info!("PurpleDrill v{} completed successfully", env!("CARGO_PKG_VERSION"));
            process::exit(0);
        }
        Err(e) => {
            error!("PurpleDrill failed: {e}");
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Run {
            technique,
            test_numbers,
            mode,
            session,
            interactive,
            timeout,
            any_os,
        } => {
            commands::run_technique(
                technique,
                test_numbers,
                mode.into(),
                session,
                interactive,
                timeout,
                any_os,
            )
            .await
        }
        Commands::Playbook { command } => match command {
            PlaybookCommands::Run {
                name,
                mode,
                session,
            } => commands::playbook_run(name, mode.into(), session).await,
            PlaybookCommands::Info { name } => commands::playbook_info(&name),
            PlaybookCommands::Guidance { name } => commands::playbook_guidance(&name),
        },
        Commands::List { command } => match command {
            ListCommands::Tests { filter } => commands::list_tests(filter).await,
            ListCommands::Details { technique, full } => {
                commands::list_details(&technique, full).await
            }
            ListCommands::Playbooks => commands::list_playbooks(),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config_show(),
            ConfigCommands::Get { key } => commands::config_get(&key),
            ConfigCommands::SetRunnerPath { path } => commands::config_set_runner_path(&path),
            ConfigCommands::SetIndexRoot { path } => commands::config_set_index_root(&path),
            ConfigCommands::SetTimeout { seconds } => commands::config_set_timeout(seconds),
        },
        Commands::Escalate {
            target,
            userlist,
            passlist,
        } => commands::escalate(target, userlist, passlist).await,
        Commands::Listen { bind } => commands::listen(&bind).await,
    }
}
