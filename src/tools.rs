use crate::prompt::Prompter;
use crate::utils;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, Instant};

const REVERIFY_INTERVAL_SECS: u64 = 2;
const REVERIFY_TIMEOUT_SECS: u64 = 30;

/// An external binary the escalation flow depends on, with everything needed
/// to find or install it
pub struct ToolSpec {
    pub name: &'static str,
    /// Command name for the system lookup fallback
    pub binary: &'static str,
    /// Checked in order before any system lookup
    pub well_known_paths: Vec<PathBuf>,
    /// Package name for Unix package managers
    pub package: &'static str,
    /// Official installer, used on Windows
    pub installer_url: &'static str,
}

/// The network scanner used by the discovery phase
pub fn scanner() -> ToolSpec {
    let well_known_paths = if cfg!(target_os = "windows") {
        vec![
            PathBuf::from(r"C:\Program Files (x86)\Nmap\nmap.exe"),
            PathBuf::from(r"C:\Program Files\Nmap\nmap.exe"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/nmap"),
            PathBuf::from("/usr/local/bin/nmap"),
            PathBuf::from("/opt/homebrew/bin/nmap"),
        ]
    };
    ToolSpec {
        name: "nmap",
        binary: "nmap",
        well_known_paths,
        package: "nmap",
        installer_url: "https://nmap.org/dist/nmap-7.95-setup.exe",
    }
}

/// The credential cracker used by the brute-force phase
pub fn cracker() -> ToolSpec {
    let well_known_paths = if cfg!(target_os = "windows") {
        vec![
            PathBuf::from(r"C:\Program Files (x86)\Ncrack\ncrack.exe"),
            PathBuf::from(r"C:\Program Files\Ncrack\ncrack.exe"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/bin/ncrack"),
            PathBuf::from("/usr/local/bin/ncrack"),
        ]
    };
    ToolSpec {
        name: "ncrack",
        binary: "ncrack",
        well_known_paths,
        package: "ncrack",
        installer_url: "https://nmap.org/ncrack/dist/ncrack-0.7-setup.exe",
    }
}

/// Find the tool: well-known install locations first, system lookup second
pub async fn detect(spec: &ToolSpec) -> Option<PathBuf> {
    for path in &spec.well_known_paths {
        if path.is_file() {
            debug!("{} found at well-known path {}", spec.name, path.display());
            return Some(path.clone());
        }
    }
    match utils::lookup_command(spec.binary).await {
        Some(path) => {
            debug!("{} found via system lookup at {path}", spec.name);
            Some(PathBuf::from(path))
        }
        None => None,
    }
}

/// Detect the tool, driving an operator-confirmed install cycle if it is
/// absent. `None` means the caller must not proceed past a hard dependency
/// on this tool.
pub async fn resolve(spec: &ToolSpec, prompter: &dyn Prompter) -> Option<PathBuf> {
    if let Some(path) = detect(spec).await {
        info!("{} available at {}", spec.name, path.display());
        return Some(path);
    }
    match install(spec, prompter).await {
        Ok(path) => Some(path),
        Err(reason) => {
            warn!("{} unavailable: {reason}", spec.name);
            None
        }
    }
}

/// Guarded install: operator confirmation, elevation check, installer run,
/// then detection re-runs on a fixed interval until the overall timeout
pub async fn install(spec: &ToolSpec, prompter: &dyn Prompter) -> Result<PathBuf, String> {
    let approved = prompter
        .confirm(&format!(
            "{} is required but was not found. Download and install it now?",
            spec.name
        ))
        .await?;
    if !approved {
        return Err("installation declined by operator".to_string());
    }

    if !utils::is_elevated().await {
        return Err(format!(
            "installing {} requires elevated privileges; re-run from an elevated shell",
            spec.name
        ));
    }

    run_installer(spec).await?;
    confirm_available(spec).await
}

async fn run_installer(spec: &ToolSpec) -> Result<(), String> {
    if cfg!(target_os = "windows") {
        let installer = download_installer(spec).await?;
        info!("Running installer for {} silently", spec.name);
        let status = Command::new(&installer)
            .arg("/S")
            .status()
            .await
            .map_err(|e| format!("failed to run installer: {e}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!(
                "installer exited with code {}",
                status.code().unwrap_or(-1)
            ))
        }
    } else {
        for manager in ["apt-get", "dnf"] {
            if utils::lookup_command(manager).await.is_none() {
                continue;
            }
            info!("Installing {} via {manager}", spec.package);
            let status = Command::new(manager)
                .args(["install", "-y", spec.package])
                .status()
                .await
                .map_err(|e| format!("failed to run {manager}: {e}"))?;
            if status.success() {
                return Ok(());
            }
            warn!("{manager} install {} failed", spec.package);
        }
        Err(format!(
            "no supported package manager found; install {} manually and re-run",
            spec.name
        ))
    }
}

/// Fetch the official installer over HTTPS into a unique temp path
async fn download_installer(spec: &ToolSpec) -> Result<PathBuf, String> {
    let curl = utils::lookup_command("curl")
        .await
        .ok_or_else(|| "curl is required to download the installer but was not found".to_string())?;

    let download_path = std::env::temp_dir().join(format!(
        "{}-installer-{}.exe",
        spec.name,
        uuid::Uuid::new_v4()
    ));
    info!(
        "Downloading {} installer from {}",
        spec.name, spec.installer_url
    );

    let status = Command::new(curl)
        .args(["-fsSL", "-o"])
        .arg(&download_path)
        .arg(spec.installer_url)
        .status()
        .await
        .map_err(|e| format!("failed to start curl: {e}"))?;
    if !status.success() {
        return Err(format!(
            "installer download failed with exit code {}",
            status.code().unwrap_or(-1)
        ));
    }

    match std::fs::metadata(&download_path) {
        Ok(metadata) if metadata.len() > 0 => Ok(download_path),
        Ok(_) => Err("downloaded installer is empty".to_string()),
        Err(e) => Err(format!("downloaded installer is missing: {e}")),
    }
}

/// Poll detection until the tool shows up or the reverify window closes
async fn confirm_available(spec: &ToolSpec) -> Result<PathBuf, String> {
    let deadline = Instant::now() + Duration::from_secs(REVERIFY_TIMEOUT_SECS);
    loop {
        if let Some(path) = detect(spec).await {
            info!("{} confirmed available at {}", spec.name, path.display());
            return Ok(path);
        }
        if Instant::now() >= deadline {
            return Err(format!(
                "{} did not become available within {REVERIFY_TIMEOUT_SECS} seconds of installation",
                spec.name
            ));
        }
        sleep(Duration::from_secs(REVERIFY_INTERVAL_SECS)).await;
    }
}
