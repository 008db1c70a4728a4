use crate::executor;
use log::{info, warn};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Output line fragment the cracker prints when it lands a hit
pub const CREDENTIALS_MARKER: &str = "Discovered credentials";

/// Run the cracker against a `module://host:port` reference, streaming its
/// output live to the console. Returns whether credentials were discovered;
/// exit code 0 with no marker line means the run completed but found
/// nothing. There is no time bound here, the read loop runs until the
/// cracker closes its output stream. Lines are read as raw bytes and
/// converted lossily: crackers echo wordlist entries that need not be valid
/// UTF-8. The child never outlives this call; any abort path kills and
/// reaps it first.
pub async fn run_brute(
    cracker: &Path,
    target_reference: &str,
    userlist: &Path,
    passlist: &Path,
) -> Result<bool, String> {
    info!("Starting credential attempt against {target_reference}");

    let mut child = Command::new(cracker)
        .arg("-U")
        .arg(userlist)
        .arg("-P")
        .arg(passlist)
        .arg(target_reference)
        .args(["-vv", "-T4", "--connection-limit", "5"])
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| format!("Failed to run cracker '{}': {e}", cracker.display()))?;

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            executor::terminate(&mut child).await;
            return Err("Failed to capture cracker output".to_string());
        }
    };
    let mut reader = BufReader::new(stdout);
    let mut buffer = Vec::new();
    let mut credentials_found = false;

    loop {
        buffer.clear();
        let read = match reader.read_until(b'\n', &mut buffer).await {
            Ok(read) => read,
            Err(e) => {
                executor::terminate(&mut child).await;
                return Err(format!("Failed to read cracker output: {e}"));
            }
        };
        if read == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buffer);
        let line = line.trim_end_matches(['\r', '\n']);
        println!("{line}");
        if line.contains(CREDENTIALS_MARKER) {
            credentials_found = true;
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| format!("Failed to wait for cracker: {e}"))?;

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        warn!("Cracker exited with code {code}");
        return Err(format!("Cracker exited with code {code}."));
    }

    Ok(credentials_found)
}
