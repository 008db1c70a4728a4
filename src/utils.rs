use log::debug;
use tokio::process::Command;

/// Whether the current process runs with the privileges needed for
/// system-wide installs
#[cfg(unix)]
pub async fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub async fn is_elevated() -> bool {
    // `net session` only succeeds from an elevated shell
    match Command::new("net").args(["session"]).output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Resolve a command name to a path via the system lookup, if it is on PATH
pub async fn lookup_command(command: &str) -> Option<String> {
    let finder = if cfg!(target_os = "windows") {
        "where.exe"
    } else {
        "which"
    };

    let output = match Command::new(finder).arg(command).output().await {
        Ok(output) => output,
        Err(e) => {
            debug!("Command lookup via {finder} failed: {e}");
            return None;
        }
    };
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

/// Best local address for scanning the surrounding network: the address a
/// datagram socket would source from, falling back to loopback offline
pub async fn local_target_addr() -> String {
    let fallback = "127.0.0.1".to_string();

    let socket = match tokio::net::UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => socket,
        Err(_) => return fallback,
    };
    if socket.connect("8.8.8.8:80").await.is_err() {
        return fallback;
    }
    match socket.local_addr() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => fallback,
    }
}
