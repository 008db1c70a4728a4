use crate::executor::{ErrorKind, ExecRequest, OutputPolicy, ProcessLauncher};
use log::{debug, info};
use regex::Regex;
use serde::Serialize;
use std::path::Path;

/// One open TCP port as reported by the scanner. Produced fresh on every
/// scan and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredService {
    pub port: u16,
    pub service_name: String,
}

/// Only `<port>/tcp open <service>` lines carry signal; everything else the
/// scanner prints is ignored
const PORT_LINE_PATTERN: &str = r"^(\d+)/tcp\s+open\s+(\S+)";

/// Run a full-port service-version scan against the target. Any process
/// failure is terminal for this run; partial output from a failed scan is
/// never parsed.
pub async fn run_scan(
    launcher: &dyn ProcessLauncher,
    scanner: &Path,
    target: &str,
    timeout_seconds: u64,
) -> Result<Vec<DiscoveredService>, String> {
    info!("Scanning {target} with {}", scanner.display());

    let request = ExecRequest {
        program: scanner.display().to_string(),
        args: vec!["-p-".to_string(), "-sV".to_string(), target.to_string()],
        working_dir: None,
        timeout_seconds,
        output: OutputPolicy::Captured,
    };
    let result = launcher.launch(&request).await;

    if !result.success {
        return Err(match result.error_kind {
            ErrorKind::NotFound => {
                format!("Scanner executable not found at '{}'.", scanner.display())
            }
            ErrorKind::Timeout => {
                format!("Scan of {target} timed out after {timeout_seconds} seconds.")
            }
            _ => format!("Scan of {target} failed: {}", result.output.trim()),
        });
    }

    let services = parse_scan_output(&result.output);
    debug!("Scan of {target} found {} open service(s)", services.len());
    Ok(services)
}

/// Extract open services from raw scanner output, sorted by port ascending.
/// Duplicate port/name pairs are kept as separate entries in scan order.
pub fn parse_scan_output(raw: &str) -> Vec<DiscoveredService> {
    let pattern = match Regex::new(PORT_LINE_PATTERN) {
        Ok(pattern) => pattern,
        Err(_) => return Vec::new(),
    };

    let mut services: Vec<DiscoveredService> = raw
        .lines()
        .filter_map(|line| {
            let captures = pattern.captures(line.trim())?;
            let port = captures.get(1)?.as_str().parse::<u16>().ok()?;
            let service_name = captures.get(2)?.as_str().to_string();
            Some(DiscoveredService { port, service_name })
        })
        .collect();

    // sort_by_key is stable, so same-port entries keep their scan order
    services.sort_by_key(|service| service.port);
    services
}
