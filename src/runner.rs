use crate::config::ToolConfig;
use crate::executor::{
    ErrorKind, ExecRequest, ExecutionResult, OutputPolicy, ProcessLauncher, SystemLauncher,
};
use crate::invocation::{self, DetailLevel, TechniqueInvocation};
use log::{debug, warn};

/// Public "run one technique" operation: validates the identifier, applies
/// configured defaults, and delegates to the invocation builder and the
/// execution engine.
pub struct TechniqueRunner {
    config: ToolConfig,
    launcher: Box<dyn ProcessLauncher>,
}

impl TechniqueRunner {
    pub fn new(config: ToolConfig) -> Self {
        Self::with_launcher(config, Box::new(SystemLauncher))
    }

    pub fn with_launcher(config: ToolConfig, launcher: Box<dyn ProcessLauncher>) -> Self {
        TechniqueRunner { config, launcher }
    }

    /// Run one technique invocation. Invalid technique IDs are rejected here
    /// and never reach the execution engine.
    pub async fn run(
        &self,
        invocation: &TechniqueInvocation,
        timeout_override: Option<u64>,
    ) -> ExecutionResult {
        if !invocation::validate_technique_id(&invocation.technique_id) {
            warn!(
                "Rejected invalid technique ID '{}'",
                invocation.technique_id
            );
            return ExecutionResult::failure(
                ErrorKind::Validation,
                format!(
                    "Error: Invalid technique ID format: {}. Expected format: T1234 or T1234.001",
                    invocation.technique_id
                ),
                None,
            );
        }

        let timeout_seconds = timeout_override.unwrap_or(self.config.timeout_seconds);
        let output_policy = if invocation.interactive {
            OutputPolicy::Inherited
        } else {
            OutputPolicy::Captured
        };

        // Detail flags only make sense when output is captured
        let mut effective = invocation.clone();
        if output_policy == OutputPolicy::Inherited {
            effective.detail = DetailLevel::None;
        }

        let request = ExecRequest {
            program: self.config.runner_path.clone(),
            args: invocation::build_args(&effective),
            working_dir: None,
            timeout_seconds,
            output: output_policy,
        };
        debug!("Runner request: {} {:?}", request.program, request.args);

        let result = self.launcher.launch(&request).await;
        self.describe_failure(result, timeout_seconds)
    }

    /// Attach the user-visible message for each failure class, keeping the
    /// raw diagnostic text from the external tool where there is any
    fn describe_failure(&self, result: ExecutionResult, timeout_seconds: u64) -> ExecutionResult {
        if result.success {
            return result;
        }

        let message = match result.error_kind {
            ErrorKind::NotFound => format!(
                "Error: Runner executable not found at '{}'.",
                self.config.runner_path
            ),
            ErrorKind::NonzeroExit => {
                let code = result.exit_code.unwrap_or(-1);
                if result.output.trim().is_empty() {
                    format!("Error: Command failed with exit code {code}.")
                } else {
                    format!(
                        "Error: Command failed with exit code {code}.\n{}",
                        result.output
                    )
                }
            }
            ErrorKind::Timeout => {
                format!("Error: Command timed out after {timeout_seconds} seconds.")
            }
            ErrorKind::Unexpected => {
                format!("An unexpected error occurred: {}", result.output)
            }
            ErrorKind::Validation | ErrorKind::None => return result,
        };

        ExecutionResult {
            output: message,
            ..result
        }
    }
}
