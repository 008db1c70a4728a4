use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tokio::process::Command;

/// A host-state mutation performed during an escalation run, carrying enough
/// data to invert it later
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateFile {
        path: PathBuf,
    },
    CreateDirectory {
        path: PathBuf,
    },
    ModifyRegistry {
        key: String,
        value_name: String,
    },
    StartService {
        service_name: String,
    },
    DisableFirewallRule {
        rule_name: String,
    },
    /// Audit record of a credential attempt; the target is remote state this
    /// process never created, so there is nothing to invert
    BruteForceAttempt {
        target: String,
        module: String,
        credentials_found: bool,
    },
}

impl Action {
    pub fn describe(&self) -> String {
        match self {
            Action::CreateFile { path } => format!("created file {}", path.display()),
            Action::CreateDirectory { path } => format!("created directory {}", path.display()),
            Action::ModifyRegistry { key, value_name } => {
                format!("set registry value {value_name} under {key}")
            }
            Action::StartService { service_name } => format!("started service {service_name}"),
            Action::DisableFirewallRule { rule_name } => {
                format!("disabled firewall rule {rule_name}")
            }
            Action::BruteForceAttempt {
                target,
                credentials_found,
                ..
            } => {
                if *credentials_found {
                    format!("credential attempt against {target} (credentials discovered)")
                } else {
                    format!("credential attempt against {target} (no credentials)")
                }
            }
        }
    }
}

/// What happened when one recorded action was inverted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CleanupOutcome {
    /// The inverse operation succeeded
    Undone,
    /// The inverse was attempted but the target was already gone
    NothingToUndo,
    /// No inverse applies, with the reason
    Skipped(String),
    /// The inverse failed; later undo steps still run
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub action: Action,
    pub outcome: CleanupOutcome,
}

/// Append-only record of mutations for one escalation run. Drained only by
/// `cleanup`, which empties the log no matter how individual inverses fare.
#[derive(Debug, Default)]
pub struct ActionLog {
    actions: Vec<Action>,
}

impl ActionLog {
    pub fn new() -> Self {
        ActionLog::default()
    }

    pub fn record(&mut self, action: Action) {
        info!("Recorded action: {}", action.describe());
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn entries(&self) -> &[Action] {
        &self.actions
    }

    /// Invert every recorded action in reverse insertion order, reporting a
    /// per-action outcome. The log is cleared unconditionally: cleanup is
    /// best effort and never leaves entries behind for a retry.
    pub async fn cleanup(&mut self) -> Vec<CleanupReport> {
        let recorded = std::mem::take(&mut self.actions);
        let mut reports = Vec::with_capacity(recorded.len());

        for action in recorded.into_iter().rev() {
            let outcome = invert(&action).await;
            match &outcome {
                CleanupOutcome::Undone => info!("Undid: {}", action.describe()),
                CleanupOutcome::NothingToUndo => {
                    debug!("Nothing to undo for: {}", action.describe())
                }
                CleanupOutcome::Skipped(reason) => {
                    debug!("Skipped undo of {}: {reason}", action.describe())
                }
                CleanupOutcome::Failed(reason) => {
                    warn!("Failed to undo {}: {reason}", action.describe())
                }
            }
            reports.push(CleanupReport { action, outcome });
        }
        reports
    }
}

async fn invert(action: &Action) -> CleanupOutcome {
    match action {
        Action::CreateFile { path } => {
            if !path.exists() {
                return CleanupOutcome::NothingToUndo;
            }
            match fs::remove_file(path) {
                Ok(()) => CleanupOutcome::Undone,
                Err(e) => CleanupOutcome::Failed(format!(
                    "failed to remove file {}: {e}",
                    path.display()
                )),
            }
        }
        Action::CreateDirectory { path } => {
            if !path.exists() {
                return CleanupOutcome::NothingToUndo;
            }
            match fs::remove_dir_all(path) {
                Ok(()) => CleanupOutcome::Undone,
                Err(e) => CleanupOutcome::Failed(format!(
                    "failed to remove directory {}: {e}",
                    path.display()
                )),
            }
        }
        Action::ModifyRegistry { key, value_name } => {
            if !cfg!(target_os = "windows") {
                return CleanupOutcome::Skipped(
                    "registry cleanup is only supported on Windows".to_string(),
                );
            }
            run_inverse("reg", &["delete", key, "/v", value_name, "/f"]).await
        }
        Action::StartService { service_name } => {
            if cfg!(target_os = "windows") {
                run_inverse("sc", &["stop", service_name]).await
            } else {
                run_inverse("systemctl", &["stop", service_name]).await
            }
        }
        Action::DisableFirewallRule { rule_name } => {
            if !cfg!(target_os = "windows") {
                return CleanupOutcome::Skipped(
                    "firewall rule cleanup is only supported on Windows".to_string(),
                );
            }
            let name_arg = format!("name={rule_name}");
            run_inverse(
                "netsh",
                &[
                    "advfirewall",
                    "firewall",
                    "set",
                    "rule",
                    &name_arg,
                    "new",
                    "enable=yes",
                ],
            )
            .await
        }
        Action::BruteForceAttempt { .. } => {
            CleanupOutcome::Skipped("informational entry, no host state to undo".to_string())
        }
    }
}

async fn run_inverse(program: &str, args: &[&str]) -> CleanupOutcome {
    match Command::new(program).args(args).output().await {
        Ok(output) if output.status.success() => CleanupOutcome::Undone,
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            CleanupOutcome::Failed(format!(
                "{program} exited with code {}: {detail}",
                output.status.code().unwrap_or(-1)
            ))
        }
        Err(e) => CleanupOutcome::Failed(format!("failed to run {program}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_cleanup_runs_in_reverse_insertion_order() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("dropped.txt");
        let nested = dir.path().join("staging");
        fs::write(&file, "payload").expect("write");
        fs::create_dir(&nested).expect("mkdir");

        let mut log = ActionLog::new();
        log.record(Action::CreateFile { path: file.clone() });
        log.record(Action::CreateDirectory {
            path: nested.clone(),
        });

        let reports = log.cleanup().await;

        assert_eq!(reports.len(), 2);
        // Last recorded is first undone
        assert_eq!(
            reports[0].action,
            Action::CreateDirectory { path: nested.clone() }
        );
        assert_eq!(reports[0].outcome, CleanupOutcome::Undone);
        assert_eq!(reports[1].action, Action::CreateFile { path: file.clone() });
        assert_eq!(reports[1].outcome, CleanupOutcome::Undone);

        assert!(!file.exists());
        assert!(!nested.exists());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_one_failing_inverse_does_not_stop_the_rest() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("first.txt");
        let third = dir.path().join("third.txt");
        fs::write(&first, "a").expect("write");
        fs::write(&third, "c").expect("write");

        // Recorded as a directory but actually a file, so its inverse fails
        let broken = dir.path().join("broken");
        fs::write(&broken, "not a directory").expect("write");

        let mut log = ActionLog::new();
        log.record(Action::CreateFile {
            path: first.clone(),
        });
        log.record(Action::CreateDirectory {
            path: broken.clone(),
        });
        log.record(Action::CreateFile {
            path: third.clone(),
        });

        let reports = log.cleanup().await;

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].outcome, CleanupOutcome::Undone);
        assert!(matches!(reports[1].outcome, CleanupOutcome::Failed(_)));
        assert_eq!(reports[2].outcome, CleanupOutcome::Undone);

        assert!(!first.exists());
        assert!(!third.exists());
        // The log is emptied even though one inverse failed
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_absent_targets_are_not_errors() {
        let dir = tempdir().expect("tempdir");

        let mut log = ActionLog::new();
        log.record(Action::CreateFile {
            path: dir.path().join("never-created.txt"),
        });
        log.record(Action::CreateDirectory {
            path: dir.path().join("never-created-dir"),
        });

        let reports = log.cleanup().await;

        assert!(reports
            .iter()
            .all(|report| report.outcome == CleanupOutcome::NothingToUndo));
    }

    #[tokio::test]
    async fn test_brute_force_attempt_is_informational_only() {
        let mut log = ActionLog::new();
        log.record(Action::BruteForceAttempt {
            target: "ssh://192.0.2.10:22".to_string(),
            module: "ssh".to_string(),
            credentials_found: true,
        });

        let reports = log.cleanup().await;

        assert_eq!(reports.len(), 1);
        assert!(matches!(reports[0].outcome, CleanupOutcome::Skipped(_)));
        assert!(log.is_empty());
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn test_windows_only_inverses_are_skipped_elsewhere() {
        let mut log = ActionLog::new();
        log.record(Action::ModifyRegistry {
            key: r"HKCU\Software\Run".to_string(),
            value_name: "updater".to_string(),
        });
        log.record(Action::DisableFirewallRule {
            rule_name: "File and Printer Sharing".to_string(),
        });

        let reports = log.cleanup().await;

        assert!(reports
            .iter()
            .all(|report| matches!(report.outcome, CleanupOutcome::Skipped(_))));
    }

    #[tokio::test]
    async fn test_empty_log_cleanup_is_a_no_op() {
        let mut log = ActionLog::new();
        let reports = log.cleanup().await;

        assert!(reports.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_record_appends_in_order() {
        let mut log = ActionLog::new();
        log.record(Action::StartService {
            service_name: "spooler".to_string(),
        });
        log.record(Action::DisableFirewallRule {
            rule_name: "rule-a".to_string(),
        });

        assert_eq!(log.len(), 2);
        assert!(matches!(log.entries()[0], Action::StartService { .. }));
        assert!(matches!(
            log.entries()[1],
            Action::DisableFirewallRule { .. }
        ));
    }
}
