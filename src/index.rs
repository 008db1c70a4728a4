use crate::config::ToolConfig;
use crate::executor::{ExecRequest, OutputPolicy, ProcessLauncher, SystemLauncher};
use crate::invocation::{self, DetailLevel, RunMode, TechniqueInvocation};
use log::{debug, info};
use regex::Regex;
use std::path::PathBuf;

const LISTING_EXPRESSION: &str = "Invoke-AtomicTest -ListTechniques";
const LISTING_LINE_PATTERN: &str = r"^\s*(T\d{4}(?:\.\d{3})?)\s*-\s*(.+)$";

/// One technique as reported by the runner's listing output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueSummary {
    pub id: String,
    pub name: String,
}

/// Cached view of the technique catalog.
///
/// The cache is owned and explicit: `entries` fills it on first use,
/// `reload` refreshes it from the runner, and `invalidate` empties it so the
/// next read reloads. Callers that change configuration call `reload`
/// themselves; there is no ambient refresh.
pub struct TechniqueIndex {
    config: ToolConfig,
    launcher: Box<dyn ProcessLauncher>,
    cache: Option<Vec<TechniqueSummary>>,
}

impl TechniqueIndex {
    pub fn new(config: ToolConfig) -> Self {
        Self::with_launcher(config, Box::new(SystemLauncher))
    }

    pub fn with_launcher(config: ToolConfig, launcher: Box<dyn ProcessLauncher>) -> Self {
        TechniqueIndex {
            config,
            launcher,
            cache: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    pub fn invalidate(&mut self) {
        debug!("Technique index invalidated");
        self.cache = None;
    }

    fn index_root_checked(&self) -> Result<PathBuf, String> {
        if self.config.index_root.is_empty() {
            return Err(
                "Index root is not configured. Use 'purpledrill config set-index-root <path>' to set it."
                    .to_string(),
            );
        }
        let root = PathBuf::from(&self.config.index_root);
        if !root.is_dir() {
            return Err(format!(
                "Index root directory not found at '{}'.",
                root.display()
            ));
        }
        Ok(root)
    }

    /// Refresh the cache from the runner's listing output. Returns the number
    /// of techniques parsed.
    pub async fn reload(&mut self) -> Result<usize, String> {
        let root = self.index_root_checked()?;

        let request = ExecRequest {
            program: self.config.runner_path.clone(),
            args: vec!["-Command".to_string(), LISTING_EXPRESSION.to_string()],
            working_dir: Some(root),
            timeout_seconds: self.config.timeout_seconds,
            output: OutputPolicy::Captured,
        };
        let result = self.launcher.launch(&request).await;
        if !result.success {
            return Err(format!("Failed to list techniques: {}", result.output));
        }

        let entries = parse_technique_listing(&result.output);
        let count = entries.len();
        info!("Technique index loaded: {count} techniques");
        self.cache = Some(entries);
        Ok(count)
    }

    /// The cached technique list, loading it first if needed
    pub async fn entries(&mut self) -> Result<&[TechniqueSummary], String> {
        if self.cache.is_none() {
            self.reload().await?;
        }
        Ok(self.cache.as_deref().unwrap_or(&[]))
    }

    /// Detail output for one technique, brief by default
    pub async fn test_details(&self, technique_id: &str, full: bool) -> Result<String, String> {
        if !invocation::validate_technique_id(technique_id) {
            return Err(format!(
                "Invalid technique ID format: {technique_id}. Expected format: T1234 or T1234.001"
            ));
        }
        let root = self.index_root_checked()?;

        let mut detail_invocation = TechniqueInvocation::new(technique_id, RunMode::Execute);
        detail_invocation.detail = if full {
            DetailLevel::Full
        } else {
            DetailLevel::Brief
        };

        let request = ExecRequest {
            program: self.config.runner_path.clone(),
            args: invocation::build_args(&detail_invocation),
            working_dir: Some(root),
            timeout_seconds: self.config.timeout_seconds,
            output: OutputPolicy::Captured,
        };
        let result = self.launcher.launch(&request).await;
        if !result.success {
            return Err(format!("Error getting test details: {}", result.output));
        }
        Ok(result.output)
    }
}

/// Parse `T1234 - Name` lines out of the runner's listing output, keeping
/// their order
pub fn parse_technique_listing(output: &str) -> Vec<TechniqueSummary> {
    let Ok(pattern) = Regex::new(LISTING_LINE_PATTERN) else {
        return Vec::new();
    };
    output
        .lines()
        .filter_map(|line| {
            let captures = pattern.captures(line)?;
            Some(TechniqueSummary {
                id: captures.get(1)?.as_str().to_string(),
                name: captures.get(2)?.as_str().trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    const LISTING_FIXTURE: &str = "\
PathToAtomicsFolder = /tmp/atomics

T1003 - OS Credential Dumping
  T1003.001 - LSASS Memory
T1016 - System Network Configuration Discovery
not a technique line
T1552.001 - Credentials In Files
";

    struct FixtureLauncher {
        launches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProcessLauncher for FixtureLauncher {
        async fn launch(&self, _request: &ExecRequest) -> ExecutionResult {
            self.launches.fetch_add(1, Ordering::SeqCst);
            ExecutionResult::completed(LISTING_FIXTURE.to_string(), Some(0))
        }
    }

    fn fixture_index(index_root: &str) -> (TechniqueIndex, Arc<AtomicUsize>) {
        let launches = Arc::new(AtomicUsize::new(0));
        let launcher = FixtureLauncher {
            launches: Arc::clone(&launches),
        };
        let mut config = ToolConfig::default();
        config.index_root = index_root.to_string();
        (
            TechniqueIndex::with_launcher(config, Box::new(launcher)),
            launches,
        )
    }

    #[test]
    fn test_parse_technique_listing_extracts_id_and_name() {
        let entries = parse_technique_listing(LISTING_FIXTURE);

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].id, "T1003");
        assert_eq!(entries[0].name, "OS Credential Dumping");
        assert_eq!(entries[1].id, "T1003.001");
        assert_eq!(entries[1].name, "LSASS Memory");
        assert_eq!(entries[3].id, "T1552.001");
    }

    #[test]
    fn test_parse_technique_listing_ignores_unrelated_lines() {
        let entries = parse_technique_listing("no techniques here\njust text\n");
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_entries_loads_once_and_serves_the_cache() {
        let dir = tempdir().expect("tempdir");
        let (mut index, launches) = fixture_index(dir.path().to_str().expect("utf8 path"));

        assert!(!index.is_loaded());
        let first_len = index.entries().await.expect("entries").len();
        assert_eq!(first_len, 4);
        let second_len = index.entries().await.expect("entries").len();
        assert_eq!(second_len, 4);

        assert!(index.is_loaded());
        assert_eq!(launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_a_reload() {
        let dir = tempdir().expect("tempdir");
        let (mut index, launches) = fixture_index(dir.path().to_str().expect("utf8 path"));

        index.entries().await.expect("entries");
        index.invalidate();
        assert!(!index.is_loaded());
        index.entries().await.expect("entries");

        assert_eq!(launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_index_root_is_a_descriptive_error() {
        let (mut index, launches) = fixture_index("");

        let error = index.entries().await.expect_err("should fail");
        assert!(error.contains("set-index-root"));
        assert_eq!(launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_index_root_directory_is_an_error() {
        let (mut index, _launches) = fixture_index("/does/not/exist/atomics");

        let error = index.entries().await.expect_err("should fail");
        assert!(error.contains("not found"));
    }

    #[tokio::test]
    async fn test_test_details_rejects_invalid_ids() {
        let dir = tempdir().expect("tempdir");
        let (index, launches) = fixture_index(dir.path().to_str().expect("utf8 path"));

        let error = index.test_details("T12", false).await.expect_err("invalid");
        assert!(error.contains("Invalid technique ID format"));
        assert_eq!(launches.load(Ordering::SeqCst), 0);
    }
}
