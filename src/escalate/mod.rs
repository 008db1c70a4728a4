pub mod brute;
pub mod scan;
pub mod services;

use crate::actions::{Action, ActionLog, CleanupOutcome};
use crate::executor::{ProcessLauncher, SystemLauncher};
use crate::prompt::Prompter;
use crate::tools::{self, ToolSpec};
use colored::Colorize;
use log::debug;
use scan::DiscoveredService;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    Discovering,
    AwaitingAction,
    BruteForcing,
    CleaningUp,
    Reporting,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscalationError {
    #[error("invalid escalation state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: EscalationState,
        to: EscalationState,
    },
}

impl EscalationState {
    /// The flow only ever moves forward: discovery feeds the menu, the menu
    /// feeds one attempt or cleanup, and everything drains into Reporting.
    /// A failed attempt is the single edge that loops back to the menu.
    pub fn can_transition_to(self, next: EscalationState) -> bool {
        use EscalationState::*;
        matches!(
            (self, next),
            (Discovering, AwaitingAction)
                | (AwaitingAction, BruteForcing)
                | (AwaitingAction, CleaningUp)
                | (AwaitingAction, Reporting)
                | (BruteForcing, AwaitingAction)
                | (BruteForcing, Reporting)
                | (CleaningUp, Reporting)
        )
    }
}

/// How one credential attempt ended short of completion
enum AttemptError {
    /// The current attempt is aborted; the operator returns to the menu
    Recoverable(String),
    /// The whole flow cannot proceed
    Fatal(String),
}

/// One interactive escalation run: scan, operator-driven attempts, cleanup,
/// report. Owns the run's Action Log; no two runs share one.
pub struct EscalationFlow<'a> {
    prompter: &'a dyn Prompter,
    launcher: Box<dyn ProcessLauncher>,
    scanner_spec: ToolSpec,
    cracker_spec: ToolSpec,
    cracker_path: Option<PathBuf>,
    target: String,
    userlist: PathBuf,
    passlist: PathBuf,
    timeout_seconds: u64,
    state: EscalationState,
    log: ActionLog,
    services: Vec<DiscoveredService>,
    attempts: u32,
    credentials_found: bool,
}

impl<'a> EscalationFlow<'a> {
    pub fn new(
        prompter: &'a dyn Prompter,
        target: String,
        userlist: PathBuf,
        passlist: PathBuf,
        timeout_seconds: u64,
    ) -> Self {
        EscalationFlow {
            prompter,
            launcher: Box::new(SystemLauncher),
            scanner_spec: tools::scanner(),
            cracker_spec: tools::cracker(),
            cracker_path: None,
            target,
            userlist,
            passlist,
            timeout_seconds,
            state: EscalationState::Discovering,
            log: ActionLog::new(),
            services: Vec::new(),
            attempts: 0,
            credentials_found: false,
        }
    }

    /// Drive the run to completion and return its summary. `Err` means the
    /// run aborted before reaching the menu loop's natural end: scanner or
    /// cracker unavailable, or the scan process itself failed.
    pub async fn run(&mut self) -> Result<String, String> {
        let scanner = tools::resolve(&self.scanner_spec, self.prompter)
            .await
            .ok_or_else(|| {
                format!("Required tool '{}' is not available.", self.scanner_spec.name)
            })?;

        println!(
            "{}",
            format!(
                "Scanning {} (all ports, service detection). This can take a while...",
                self.target
            )
            .bold()
        );
        self.services = scan::run_scan(
            self.launcher.as_ref(),
            &scanner,
            &self.target,
            self.timeout_seconds,
        )
        .await?;

        self.transition(EscalationState::AwaitingAction)?;
        self.drive().await?;
        Ok(self.summary())
    }

    /// Menu loop for the AwaitingAction state
    async fn drive(&mut self) -> Result<(), String> {
        loop {
            self.present_services();
            let choice = self
                .prompter
                .select_line("Select a service by number, 'c' to undo recorded actions, or 'q' to quit: ")
                .await?;

            match choice.to_lowercase().as_str() {
                "q" => {
                    self.transition(EscalationState::Reporting)?;
                    return Ok(());
                }
                "c" => {
                    self.transition(EscalationState::CleaningUp)?;
                    self.run_cleanup().await;
                    self.transition(EscalationState::Reporting)?;
                    return Ok(());
                }
                other => {
                    let Some(service) = self.lookup_selection(other) else {
                        println!("{}", format!("'{other}' is not a valid selection.").yellow());
                        continue;
                    };
                    match self.attempt_service(&service).await {
                        Ok(true) => {
                            println!("{}", "Credentials discovered. See output above.".green().bold());
                            self.transition(EscalationState::Reporting)?;
                            return Ok(());
                        }
                        Ok(false) => {
                            println!(
                                "{}",
                                "Attempt completed with no credentials discovered.".yellow()
                            );
                            self.transition(EscalationState::Reporting)?;
                            return Ok(());
                        }
                        Err(AttemptError::Recoverable(message)) => {
                            println!("{}", message.yellow());
                        }
                        Err(AttemptError::Fatal(message)) => {
                            return Err(message);
                        }
                    }
                }
            }
        }
    }

    /// One credential attempt against a chosen service. `Ok` means the
    /// cracker ran to a clean exit; the bool says whether it found anything.
    async fn attempt_service(
        &mut self,
        service: &DiscoveredService,
    ) -> Result<bool, AttemptError> {
        let Some(module) = services::module_for(&service.service_name) else {
            return Err(AttemptError::Recoverable(format!(
                "No compatible module for service '{}' on port {}.",
                service.service_name, service.port
            )));
        };

        // Wordlists are checked before any state moves so a missing file
        // aborts only this attempt
        if !self.userlist.is_file() {
            return Err(AttemptError::Recoverable(format!(
                "User wordlist not found: {}",
                self.userlist.display()
            )));
        }
        if !self.passlist.is_file() {
            return Err(AttemptError::Recoverable(format!(
                "Password wordlist not found: {}",
                self.passlist.display()
            )));
        }

        let cracker = match self.resolve_cracker().await {
            Some(path) => path,
            None => {
                return Err(AttemptError::Fatal(format!(
                    "Required tool '{}' is not available.",
                    self.cracker_spec.name
                )))
            }
        };

        self.transition(EscalationState::BruteForcing)
            .map_err(AttemptError::Fatal)?;

        let target_reference = services::target_reference(module, &self.target, service.port);
        println!(
            "{}",
            format!("Attempting {module} credentials against {target_reference}...").bold()
        );

        let outcome =
            brute::run_brute(&cracker, &target_reference, &self.userlist, &self.passlist).await;
        self.attempts += 1;

        match outcome {
            Ok(found) => {
                self.credentials_found |= found;
                self.log.record(Action::BruteForceAttempt {
                    target: target_reference,
                    module: module.to_string(),
                    credentials_found: found,
                });
                Ok(found)
            }
            Err(message) => {
                self.log.record(Action::BruteForceAttempt {
                    target: target_reference,
                    module: module.to_string(),
                    credentials_found: false,
                });
                self.transition(EscalationState::AwaitingAction)
                    .map_err(AttemptError::Fatal)?;
                Err(AttemptError::Recoverable(message))
            }
        }
    }

    async fn resolve_cracker(&mut self) -> Option<PathBuf> {
        if let Some(path) = &self.cracker_path {
            return Some(path.clone());
        }
        let path = tools::resolve(&self.cracker_spec, self.prompter).await?;
        self.cracker_path = Some(path.clone());
        Some(path)
    }

    fn transition(&mut self, next: EscalationState) -> Result<(), String> {
        if !self.state.can_transition_to(next) {
            return Err(EscalationError::InvalidStateTransition {
                from: self.state,
                to: next,
            }
            .to_string());
        }
        debug!("Escalation state {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn lookup_selection(&self, raw: &str) -> Option<DiscoveredService> {
        let index: usize = raw.trim().parse().ok()?;
        if index == 0 {
            return None;
        }
        self.services.get(index - 1).cloned()
    }

    fn present_services(&self) {
        println!();
        if self.services.is_empty() {
            println!("{}", "No open ports were found on the target.".yellow());
            println!("You can still undo recorded actions ('c') or quit ('q').");
            return;
        }
        println!("{}", "Discovered services".bold());
        println!("{}", "=".repeat(50));
        for (index, service) in self.services.iter().enumerate() {
            println!(
                "  {:>2}. {:<9} {}",
                index + 1,
                format!("{}/tcp", service.port),
                service.service_name
            );
        }
        println!("{}", "=".repeat(50));
    }

    async fn run_cleanup(&mut self) {
        if self.log.is_empty() {
            println!("{}", "No recorded actions to undo.".yellow());
            return;
        }
        println!("Undoing {} recorded action(s)...", self.log.len());
        let reports = self.log.cleanup().await;
        for report in &reports {
            let label = match &report.outcome {
                CleanupOutcome::Undone => "undone".green(),
                CleanupOutcome::NothingToUndo => "nothing to undo".normal(),
                CleanupOutcome::Skipped(_) => "skipped".yellow(),
                CleanupOutcome::Failed(_) => "FAILED".red(),
            };
            println!("  [{}] {}", label, report.action.describe());
            match &report.outcome {
                CleanupOutcome::Failed(reason) | CleanupOutcome::Skipped(reason) => {
                    println!("        {reason}");
                }
                _ => {}
            }
        }
    }

    fn summary(&self) -> String {
        let mut lines = vec!["Escalation run summary".to_string(), "=".repeat(50)];
        lines.push(format!("Target:              {}", self.target));
        lines.push(format!("Open services found: {}", self.services.len()));
        lines.push(format!("Credential attempts: {}", self.attempts));
        lines.push(format!(
            "Credentials found:   {}",
            if self.credentials_found { "yes" } else { "no" }
        ));
        if !self.log.is_empty() {
            lines.push(format!("Recorded actions:    {}", self.log.len()));
            for action in self.log.entries() {
                lines.push(format!("  - {}", action.describe()));
            }
        }
        lines.push("=".repeat(50));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    #[cfg(unix)]
    use tempfile::tempdir;

    struct ScriptedPrompter {
        lines: Mutex<VecDeque<String>>,
    }

    impl ScriptedPrompter {
        fn with_lines(lines: &[&str]) -> Self {
            ScriptedPrompter {
                lines: Mutex::new(lines.iter().map(|line| line.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl Prompter for ScriptedPrompter {
        async fn confirm(&self, _question: &str) -> Result<bool, String> {
            Ok(false)
        }

        async fn select_line(&self, _prompt: &str) -> Result<String, String> {
            self.lines
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| "prompt script exhausted".to_string())
        }
    }

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, body).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    #[cfg(unix)]
    fn write_wordlists(dir: &std::path::Path) -> (PathBuf, PathBuf) {
        let users = dir.join("users.txt");
        let passwords = dir.join("passwords.txt");
        std::fs::write(&users, "root\n").expect("write users");
        std::fs::write(&passwords, "toor\n").expect("write passwords");
        (users, passwords)
    }

    fn menu_flow<'a>(
        prompter: &'a dyn Prompter,
        services: Vec<DiscoveredService>,
    ) -> EscalationFlow<'a> {
        EscalationFlow {
            prompter,
            launcher: Box::new(SystemLauncher),
            scanner_spec: tools::scanner(),
            cracker_spec: tools::cracker(),
            cracker_path: None,
            target: "192.0.2.7".to_string(),
            userlist: PathBuf::from("users.txt"),
            passlist: PathBuf::from("passwords.txt"),
            timeout_seconds: 30,
            state: EscalationState::AwaitingAction,
            log: ActionLog::new(),
            services,
            attempts: 0,
            credentials_found: false,
        }
    }

    fn ssh_service() -> DiscoveredService {
        DiscoveredService {
            port: 22,
            service_name: "ssh".to_string(),
        }
    }

    #[test]
    fn test_transition_matrix_allows_the_documented_edges() {
        use EscalationState::*;
        assert!(Discovering.can_transition_to(AwaitingAction));
        assert!(AwaitingAction.can_transition_to(BruteForcing));
        assert!(AwaitingAction.can_transition_to(CleaningUp));
        assert!(AwaitingAction.can_transition_to(Reporting));
        assert!(BruteForcing.can_transition_to(AwaitingAction));
        assert!(BruteForcing.can_transition_to(Reporting));
        assert!(CleaningUp.can_transition_to(Reporting));
    }

    #[test]
    fn test_transition_matrix_rejects_everything_else() {
        use EscalationState::*;
        assert!(!Discovering.can_transition_to(BruteForcing));
        assert!(!Discovering.can_transition_to(Reporting));
        assert!(!CleaningUp.can_transition_to(AwaitingAction));
        assert!(!Reporting.can_transition_to(Discovering));
        assert!(!Reporting.can_transition_to(AwaitingAction));
        assert!(!BruteForcing.can_transition_to(CleaningUp));
    }

    #[test]
    fn test_invalid_transition_error_names_both_states() {
        let error = EscalationError::InvalidStateTransition {
            from: EscalationState::Reporting,
            to: EscalationState::Discovering,
        };

        let message = error.to_string();
        assert!(message.contains("Reporting"));
        assert!(message.contains("Discovering"));
    }

    #[tokio::test]
    async fn test_quit_ends_the_run_without_attempts() {
        let prompter = ScriptedPrompter::with_lines(&["q"]);
        let mut flow = menu_flow(&prompter, vec![ssh_service()]);

        flow.drive().await.expect("drive should finish");

        assert_eq!(flow.state, EscalationState::Reporting);
        assert_eq!(flow.attempts, 0);
        assert!(flow.log.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_choice_drains_the_log() {
        let prompter = ScriptedPrompter::with_lines(&["c"]);
        let mut flow = menu_flow(&prompter, vec![ssh_service()]);
        flow.log.record(Action::BruteForceAttempt {
            target: "ssh://192.0.2.7:22".to_string(),
            module: "ssh".to_string(),
            credentials_found: false,
        });

        flow.drive().await.expect("drive should finish");

        assert_eq!(flow.state, EscalationState::Reporting);
        assert!(flow.log.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_works_with_no_discovered_services() {
        let prompter = ScriptedPrompter::with_lines(&["c"]);
        let mut flow = menu_flow(&prompter, Vec::new());

        flow.drive().await.expect("drive should finish");

        assert_eq!(flow.state, EscalationState::Reporting);
    }

    #[tokio::test]
    async fn test_invalid_selections_return_to_the_menu() {
        let prompter = ScriptedPrompter::with_lines(&["99", "abc", "0", "q"]);
        let mut flow = menu_flow(&prompter, vec![ssh_service()]);

        flow.drive().await.expect("drive should finish");

        assert_eq!(flow.state, EscalationState::Reporting);
        assert_eq!(flow.attempts, 0);
    }

    #[tokio::test]
    async fn test_unmapped_service_is_recoverable() {
        let prompter = ScriptedPrompter::with_lines(&["1", "q"]);
        let services = vec![DiscoveredService {
            port: 8080,
            service_name: "foobar-svc".to_string(),
        }];
        let mut flow = menu_flow(&prompter, services);

        flow.drive().await.expect("drive should finish");

        assert_eq!(flow.state, EscalationState::Reporting);
        assert_eq!(flow.attempts, 0);
        assert!(flow.log.is_empty());
    }

    #[tokio::test]
    async fn test_missing_wordlists_abort_only_the_attempt() {
        let prompter = ScriptedPrompter::with_lines(&["1", "q"]);
        let mut flow = menu_flow(&prompter, vec![ssh_service()]);
        flow.userlist = PathBuf::from("/nonexistent/users.txt");

        flow.drive().await.expect("drive should finish");

        assert_eq!(flow.state, EscalationState::Reporting);
        assert_eq!(flow.attempts, 0);
        assert!(flow.log.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_completed_attempt_is_terminal_and_recorded() {
        let dir = tempdir().expect("tempdir");
        let (users, passwords) = write_wordlists(dir.path());
        let cracker = write_script(
            dir.path(),
            "fake-cracker",
            "#!/bin/sh\necho \"Discovered credentials on ssh://192.0.2.7:22\"\nexit 0\n",
        );

        let prompter = ScriptedPrompter::with_lines(&["1"]);
        let mut flow = menu_flow(&prompter, vec![ssh_service()]);
        flow.userlist = users;
        flow.passlist = passwords;
        flow.cracker_path = Some(cracker);

        flow.drive().await.expect("drive should finish");

        assert_eq!(flow.state, EscalationState::Reporting);
        assert_eq!(flow.attempts, 1);
        assert!(flow.credentials_found);
        assert_eq!(flow.log.len(), 1);
        assert!(matches!(
            flow.log.entries()[0],
            Action::BruteForceAttempt {
                credentials_found: true,
                ..
            }
        ));
        assert!(flow.summary().contains("Credentials found:   yes"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_attempt_returns_to_the_menu() {
        let dir = tempdir().expect("tempdir");
        let (users, passwords) = write_wordlists(dir.path());
        let cracker = write_script(dir.path(), "fake-cracker", "#!/bin/sh\nexit 1\n");

        let prompter = ScriptedPrompter::with_lines(&["1", "q"]);
        let mut flow = menu_flow(&prompter, vec![ssh_service()]);
        flow.userlist = users;
        flow.passlist = passwords;
        flow.cracker_path = Some(cracker);

        flow.drive().await.expect("drive should finish");

        assert_eq!(flow.state, EscalationState::Reporting);
        assert_eq!(flow.attempts, 1);
        assert!(!flow.credentials_found);
        // A failed attempt is still an auditable log entry
        assert_eq!(flow.log.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_scans_then_hands_control_to_the_operator() {
        let dir = tempdir().expect("tempdir");
        let scanner = write_script(
            dir.path(),
            "fake-scanner",
            "#!/bin/sh\necho \"22/tcp open ssh\"\necho \"80/tcp open http\"\nexit 0\n",
        );

        let prompter = ScriptedPrompter::with_lines(&["q"]);
        let mut flow = menu_flow(&prompter, Vec::new());
        flow.state = EscalationState::Discovering;
        flow.scanner_spec = ToolSpec {
            name: "fake-scanner",
            binary: "fake-scanner",
            well_known_paths: vec![scanner],
            package: "fake-scanner",
            installer_url: "https://192.0.2.1/fake-scanner-setup.exe",
        };

        let summary = flow.run().await.expect("run should finish");

        assert_eq!(flow.services.len(), 2);
        assert_eq!(flow.services[0].port, 22);
        assert!(summary.contains("Open services found: 2"));
        assert!(summary.contains("Credential attempts: 0"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_fails_terminally_when_the_scan_fails() {
        let dir = tempdir().expect("tempdir");
        let scanner = write_script(
            dir.path(),
            "fake-scanner",
            "#!/bin/sh\necho \"22/tcp open ssh\"\nexit 1\n",
        );

        let prompter = ScriptedPrompter::with_lines(&[]);
        let mut flow = menu_flow(&prompter, Vec::new());
        flow.state = EscalationState::Discovering;
        flow.scanner_spec = ToolSpec {
            name: "fake-scanner",
            binary: "fake-scanner",
            well_known_paths: vec![scanner],
            package: "fake-scanner",
            installer_url: "https://192.0.2.1/fake-scanner-setup.exe",
        };

        let error = flow.run().await.expect_err("run should fail");

        // No partial results are trusted from a failed scan
        assert!(flow.services.is_empty());
        assert!(error.contains("failed"));
    }
}
