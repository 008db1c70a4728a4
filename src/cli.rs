// PurpleDrill - Adversary Emulation Orchestrator
// CLI command interface

use crate::invocation::RunMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "purpledrill",
    about = "PurpleDrill - Adversary Emulation Orchestrator",
    version,
    long_about = "Orchestrates adversary emulation for purple-team exercises: runs parametrized MITRE ATT&CK techniques through an external technique runner, sequences them into playbooks with defender guidance, and drives a network escalation flow with auditable cleanup. Use only against systems you are authorized to test."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single technique through the technique runner
    Run {
        /// The MITRE ATT&CK technique ID (e.g., T1003 or T1003.001)
        technique: String,

        /// Specific test numbers to run, comma-separated (all tests when omitted)
        #[arg(short = 'n', long, value_delimiter = ',')]
        test_numbers: Option<Vec<u32>>,

        /// What to do with the technique
        #[arg(long, value_enum, default_value_t = ModeArg::Execute)]
        mode: ModeArg,

        /// Named runner session to execute in
        #[arg(long)]
        session: Option<String>,

        /// Give the command the console directly (GUI tests, prompts)
        #[arg(short, long, default_value_t = false)]
        interactive: bool,

        /// Override the configured timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Allow techniques for platforms other than the current one
        #[arg(long, default_value_t = false)]
        any_os: bool,
    },

    /// Run or inspect multi-step playbooks
    Playbook {
        #[command(subcommand)]
        command: PlaybookCommands,
    },

    /// List techniques, technique details, and playbooks
    List {
        #[command(subcommand)]
        command: ListCommands,
    },

    /// Show or change the stored configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Interactive network escalation: scan, pick a service, test credentials
    Escalate {
        /// Target address (the local network address is used when omitted)
        #[arg(short, long)]
        target: Option<String>,

        /// Username wordlist for credential attempts
        #[arg(long, default_value = "users.txt")]
        userlist: PathBuf,

        /// Password wordlist for credential attempts
        #[arg(long, default_value = "passwords.txt")]
        passlist: PathBuf,
    },

    /// Passive TCP listener for exercise callbacks
    Listen {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:9999")]
        bind: String,
    },
}

#[derive(Subcommand)]
pub enum PlaybookCommands {
    /// Execute every test in a playbook, in declared order
    Run {
        /// Playbook name (see 'list playbooks')
        name: String,

        /// What to do with each technique
        #[arg(long, value_enum, default_value_t = ModeArg::Execute)]
        mode: ModeArg,

        /// Named runner session to execute in
        #[arg(long)]
        session: Option<String>,
    },

    /// Show a playbook's tests and defender guidance
    Info {
        /// Playbook name
        name: String,
    },

    /// Show only a playbook's defender guidance
    Guidance {
        /// Playbook name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// List the techniques known to the local index
    Tests {
        /// Only show techniques whose ID or name contains this text
        filter: Option<String>,
    },

    /// Show the runner's detail output for one technique
    Details {
        /// The MITRE ATT&CK technique ID
        technique: String,

        /// Full command detail instead of the brief form
        #[arg(long, default_value_t = false)]
        full: bool,
    },

    /// List the built-in playbooks
    Playbooks,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the whole configuration
    Show,

    /// Print one configuration value
    Get {
        /// One of: runner-path, index-root, timeout
        key: String,
    },

    /// Set the technique runner executable
    SetRunnerPath {
        /// Path to the runner executable
        path: PathBuf,
    },

    /// Set the technique index root directory
    SetIndexRoot {
        /// Path to the index root directory
        path: PathBuf,
    },

    /// Set the default command timeout
    SetTimeout {
        /// Timeout in seconds (must be positive)
        seconds: i64,
    },
}

/// Operation applied to a technique or playbook run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Execute the technique's commands
    Execute,
    /// Check whether prerequisites are satisfied
    CheckPrereqs,
    /// Install missing prerequisites
    GetPrereqs,
    /// Run the technique's cleanup commands
    Cleanup,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Execute => RunMode::Execute,
            ModeArg::CheckPrereqs => RunMode::CheckPrereqs,
            ModeArg::GetPrereqs => RunMode::GetPrereqs,
            ModeArg::Cleanup => RunMode::Cleanup,
        }
    }
}
