// PurpleDrill - Adversary Emulation Orchestrator
// One handler per CLI subcommand; presentation lives here, behavior in the
// core modules

use crate::config::ToolConfig;
use crate::escalate::EscalationFlow;
use crate::index::{TechniqueIndex, TechniqueSummary};
use crate::invocation::{DetailLevel, RunMode, TechniqueInvocation};
use crate::listener;
use crate::playbook;
use crate::prompt::StdinPrompter;
use crate::runner::TechniqueRunner;
use crate::utils;
use colored::*;
use log::info;
use std::path::Path;

/// Execute one technique through the technique runner
#[allow(clippy::too_many_arguments)]
pub async fn run_technique(
    technique: String,
    test_numbers: Option<Vec<u32>>,
    mode: RunMode,
    session: Option<String>,
    interactive: bool,
    timeout: Option<u64>,
    any_os: bool,
) -> Result<(), String> {
    let config = ToolConfig::load()?;
    let runner = TechniqueRunner::new(config);

    let mut invocation = TechniqueInvocation::new(&technique, mode);
    invocation.test_numbers = test_numbers;
    invocation.session = session;
    invocation.interactive = interactive;
    invocation.any_os = any_os;
    invocation.detail = DetailLevel::Brief;

    println!("\n{}", "Technique Run".bold().underline());
    println!("{}: {}", "Technique ID".bold(), invocation.technique_id.yellow());
    println!("{}: {}", "Mode".bold(), mode.describe());
    if let Some(numbers) = &invocation.test_numbers {
        let joined = numbers
            .iter()
            .map(|number| number.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{}: {}", "Test Numbers".bold(), joined);
    }
    if let Some(session) = &invocation.session {
        println!("{}: Using runner session '{session}'", "Remote Execution".bold());
    }
    if interactive {
        println!(
            "{}: Enabled (output will be displayed in console)",
            "Interactive Mode".bold()
        );
    }

    println!("\n{}", "Executing...".bold());
    let result = runner.run(&invocation, timeout).await;

    if result.success {
        println!("\n{}", "Test execution completed successfully".bold().green());
        if !result.output.trim().is_empty() {
            println!("{}", result.output);
        }
        Ok(())
    } else {
        println!("\n{}", "Test execution failed".bold().red());
        println!("{}", result.output);
        Err(format!("technique {} run failed", invocation.technique_id))
    }
}

/// Execute every test in a playbook and print the per-test breakdown. The
/// breakdown is shown even when the overall run failed.
pub async fn playbook_run(
    name: String,
    mode: RunMode,
    session: Option<String>,
) -> Result<(), String> {
    let config = ToolConfig::load()?;
    let runner = TechniqueRunner::new(config);

    println!("\n{}", format!("Executing Playbook: {name}").bold().underline());
    println!("{}: {}", "Mode".bold(), mode.describe());
    println!("{}", "=".repeat(50));

    let run = playbook::execute_playbook(&runner, &name, mode, session.as_deref()).await;

    println!("\n{}", "Playbook Summary".bold().underline());
    let mut success_count = 0;
    let mut failure_count = 0;
    for (position, result) in run.results.iter().enumerate() {
        let status = if result.success {
            success_count += 1;
            "PASS".green().bold()
        } else {
            failure_count += 1;
            "FAIL".red().bold()
        };
        let id = if result.technique_id.is_empty() {
            "-".to_string()
        } else {
            result.technique_id.clone()
        };
        println!(
            "{:>3}. [{}] {} - {}",
            position + 1,
            status,
            id.yellow(),
            result.description
        );
    }
    println!("Successful: {}", success_count.to_string().green());
    println!(
        "Failed: {}",
        if failure_count > 0 {
            failure_count.to_string().red()
        } else {
            failure_count.to_string().normal()
        }
    );

    if run.overall_success {
        println!("\n{}", "Playbook completed successfully".bold().green());
        Ok(())
    } else {
        println!("\n{}", "Playbook completed with failures".bold().red());
        Err(format!("playbook '{name}' had failing tests"))
    }
}

/// Show a playbook's tests and its defender guidance
pub fn playbook_info(name: &str) -> Result<(), String> {
    let Some(playbook) = playbook::get_playbook(name) else {
        return Err(unknown_playbook(name));
    };

    println!("\n{}", format!("Playbook: {}", playbook.name).bold().underline());
    println!("{}: {}", "Description".bold(), playbook.description);
    println!("\n{}", "Tests:".bold());
    for (position, test) in playbook.tests.iter().enumerate() {
        let numbers = match test.test_numbers {
            Some(numbers) => format!(
                " (tests: {})",
                numbers
                    .iter()
                    .map(|number| number.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            None => String::new(),
        };
        println!(
            "{:>3}. {}{} - {}",
            position + 1,
            test.technique_id.yellow(),
            numbers,
            test.description
        );
    }
    println!("\n{}", "Defender Guidance:".bold());
    println!("{}", playbook.guidance);
    Ok(())
}

/// Show only the defender guidance for a playbook
pub fn playbook_guidance(name: &str) -> Result<(), String> {
    let Some(playbook) = playbook::get_playbook(name) else {
        return Err(unknown_playbook(name));
    };

    println!(
        "\n{}",
        format!("Defender Guidance: {}", playbook.name).bold().underline()
    );
    println!("{}", playbook.guidance);
    Ok(())
}

fn unknown_playbook(name: &str) -> String {
    format!(
        "Playbook '{name}' not found. Use 'purpledrill list playbooks' to see available playbooks."
    )
}

/// List techniques from the local index, optionally filtered by substring
pub async fn list_tests(filter: Option<String>) -> Result<(), String> {
    let config = ToolConfig::load()?;
    let mut index = TechniqueIndex::new(config);

    println!("\n{}", "Available Techniques".bold().underline());
    println!("{}", "Fetching the technique listing, this can take a moment...".italic());

    let entries = index.entries().await?;
    let total = entries.len();

    let shown: Vec<&TechniqueSummary> = match &filter {
        Some(filter) => {
            let wanted = filter.to_lowercase();
            entries
                .iter()
                .filter(|entry| {
                    entry.id.to_lowercase().contains(&wanted)
                        || entry.name.to_lowercase().contains(&wanted)
                })
                .collect()
        }
        None => entries.iter().collect(),
    };

    println!();
    for entry in &shown {
        // Pad before colouring; escape codes would break the alignment
        println!("  {} {}", format!("{:<12}", entry.id).cyan(), entry.name);
    }

    match &filter {
        Some(filter) => println!(
            "\nShowing {} of {} techniques matching '{}'",
            shown.len(),
            total,
            filter
        ),
        None => println!("\n{total} techniques available"),
    }
    Ok(())
}

/// Show the runner's detail output for one technique
pub async fn list_details(technique: &str, full: bool) -> Result<(), String> {
    let config = ToolConfig::load()?;
    let index = TechniqueIndex::new(config);

    println!(
        "\n{}",
        format!("Technique Details: {technique}").bold().underline()
    );
    let details = index.test_details(technique, full).await?;
    println!("{details}");
    Ok(())
}

/// List the built-in playbooks
pub fn list_playbooks() -> Result<(), String> {
    println!("\n{}", "Available Playbooks".bold().underline());
    for playbook in playbook::PLAYBOOKS {
        println!(
            "  {} {}",
            format!("{:<20}", playbook.name).cyan(),
            playbook.description
        );
    }
    println!("\nUse 'purpledrill playbook info <name>' for tests and guidance");
    Ok(())
}

/// Print the whole stored configuration
pub fn config_show() -> Result<(), String> {
    let config = ToolConfig::load()?;

    println!("\n{}", "Current Configuration".bold().underline());
    println!("{}: {}", "runner-path".bold(), config.runner_path);
    println!(
        "{}: {}",
        "index-root".bold(),
        if config.index_root.is_empty() {
            "Not set".italic().to_string()
        } else {
            config.index_root.clone()
        }
    );
    println!("{}: {} seconds", "timeout".bold(), config.timeout_seconds);
    println!("\nStored at {}", crate::config::config_file_path().display());
    Ok(())
}

/// Print one configuration value by key
pub fn config_get(key: &str) -> Result<(), String> {
    let config = ToolConfig::load()?;
    match config.get(key) {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => Err(format!(
            "Unknown configuration key '{key}'. Known keys: {}",
            ToolConfig::known_keys().join(", ")
        )),
    }
}

pub fn config_set_runner_path(path: &Path) -> Result<(), String> {
    let mut config = ToolConfig::load()?;
    config.set_runner_path(&path.display().to_string())?;
    config.save()?;
    println!("{} {}", "Runner path set to:".bold().green(), path.display());
    Ok(())
}

pub fn config_set_index_root(path: &Path) -> Result<(), String> {
    let mut config = ToolConfig::load()?;
    config.set_index_root(&path.display().to_string())?;
    config.save()?;
    println!("{} {}", "Index root set to:".bold().green(), path.display());
    Ok(())
}

pub fn config_set_timeout(seconds: i64) -> Result<(), String> {
    let mut config = ToolConfig::load()?;
    config.set_timeout_seconds(seconds)?;
    config.save()?;
    println!("{} {} seconds", "Timeout set to:".bold().green(), seconds);
    Ok(())
}

/// Interactive network escalation run
pub async fn escalate(
    target: Option<String>,
    userlist: std::path::PathBuf,
    passlist: std::path::PathBuf,
) -> Result<(), String> {
    let config = ToolConfig::load()?;
    let target = match target {
        Some(target) => target,
        None => utils::local_target_addr().await,
    };
    info!("Escalation run starting against {target}");

    println!("\n{}", "Network Escalation".bold().underline());
    println!("{}: {}", "Target".bold(), target.yellow());
    println!("{}: {}", "User wordlist".bold(), userlist.display());
    println!("{}: {}", "Password wordlist".bold(), passlist.display());

    let prompter = StdinPrompter;
    let mut flow = EscalationFlow::new(
        &prompter,
        target,
        userlist,
        passlist,
        config.timeout_seconds,
    );
    let summary = flow.run().await?;
    println!("\n{summary}");
    Ok(())
}

/// Passive TCP listener for exercise callbacks
pub async fn listen(bind: &str) -> Result<(), String> {
    listener::run_listener(bind).await
}
