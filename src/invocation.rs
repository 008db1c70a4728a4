use regex::Regex;

const TECHNIQUE_ID_PATTERN: &str = r"^T\d{4}(\.\d{3})?$";

/// Operational intent for a single runner invocation. Exactly one variant is
/// active, so conflicting flag combinations cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Execute,
    CheckPrereqs,
    GetPrereqs,
    Cleanup,
}

impl RunMode {
    /// The runner flag for this mode, if the mode carries one
    pub fn runner_flag(&self) -> Option<&'static str> {
        match self {
            RunMode::Execute => None,
            RunMode::CheckPrereqs => Some("-CheckPrereqs"),
            RunMode::GetPrereqs => Some("-GetPrereqs"),
            RunMode::Cleanup => Some("-Cleanup"),
        }
    }

    /// Short operator-facing description of what this mode does
    pub fn describe(&self) -> &'static str {
        match self {
            RunMode::Execute => "Executing test",
            RunMode::CheckPrereqs => "Checking prerequisites only",
            RunMode::GetPrereqs => "Installing prerequisites",
            RunMode::Cleanup => "Running cleanup commands",
        }
    }
}

/// How much detail the runner should print about each test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    None,
    Brief,
    Full,
}

/// One executable technique request, fully described.
///
/// `interactive` is not consumed by the argument builder; the runner maps it
/// to the execution engine's output policy.
#[derive(Debug, Clone)]
pub struct TechniqueInvocation {
    pub technique_id: String,
    pub test_numbers: Option<Vec<u32>>,
    pub mode: RunMode,
    pub session: Option<String>,
    pub any_os: bool,
    pub detail: DetailLevel,
    pub interactive: bool,
}

impl TechniqueInvocation {
    pub fn new(technique_id: &str, mode: RunMode) -> Self {
        TechniqueInvocation {
            technique_id: technique_id.to_string(),
            test_numbers: None,
            mode,
            session: None,
            any_os: false,
            detail: DetailLevel::None,
            interactive: false,
        }
    }
}

/// Check a technique ID against the strict T1234 / T1234.001 format
pub fn validate_technique_id(technique_id: &str) -> bool {
    Regex::new(TECHNIQUE_ID_PATTERN)
        .map(|pattern| pattern.is_match(technique_id))
        .unwrap_or(false)
}

/// Build the ordered argument list for the external runner binary.
///
/// Pure transformation: no I/O, never fails. Malformed technique IDs are
/// rejected upstream by validation and must not reach this point.
pub fn build_args(invocation: &TechniqueInvocation) -> Vec<String> {
    vec!["-Command".to_string(), build_runner_expression(invocation)]
}

/// Compose the runner expression handed to the runner's -Command argument
pub fn build_runner_expression(invocation: &TechniqueInvocation) -> String {
    let mut expression = format!(
        "Invoke-AtomicTest -AtomicTechnique {}",
        invocation.technique_id
    );

    // Test numbers are joined in their given order; duplicates are the
    // caller's responsibility
    if let Some(numbers) = &invocation.test_numbers {
        if !numbers.is_empty() {
            let joined = numbers
                .iter()
                .map(|number| number.to_string())
                .collect::<Vec<_>>()
                .join(",");
            expression.push_str(&format!(" -TestNumbers {joined}"));
        }
    }

    if let Some(flag) = invocation.mode.runner_flag() {
        expression.push(' ');
        expression.push_str(flag);
    }

    match invocation.detail {
        DetailLevel::Full => expression.push_str(" -ShowDetails"),
        DetailLevel::Brief => expression.push_str(" -ShowDetailsBrief"),
        DetailLevel::None => {}
    }

    if invocation.any_os {
        expression.push_str(" -AnyOS");
    }

    if let Some(session) = &invocation.session {
        expression.push_str(&format!(" -Session ${session}"));
    }

    expression
}
