use chrono::Local;
use colored::Colorize;
use log::{debug, error, info};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

fn stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Passive TCP listener used during exercises to catch callbacks from
/// simulated payloads. Prints whatever it receives and shares no state with
/// the orchestration flows. Runs until the process is interrupted.
pub async fn run_listener(bind: &str) -> Result<(), String> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| format!("Failed to bind listener on {bind}: {e}"))?;

    println!(
        "[{}] {}",
        stamp(),
        format!("Listener started on {bind}").green().bold()
    );
    println!("[{}] Waiting for connections. Press Ctrl+C to stop.", stamp());

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| format!("Failed to accept connection: {e}"))?;
        info!("Connection from {peer}");
        println!("[{}] {}", stamp(), format!("Connection from {peer}").cyan());
        tokio::spawn(handle_client(stream));
    }
}

async fn handle_client(mut stream: TcpStream) {
    let peer = match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(_) => "unknown".to_string(),
    };
    let mut buffer = [0u8; 1024];

    loop {
        match stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(read) => {
                let received = String::from_utf8_lossy(&buffer[..read]);
                let message = received.trim();
                if message.is_empty() {
                    continue;
                }
                println!("[{}] Data from {peer}", stamp());
                println!("[{}] {message}", stamp());
                println!("[{}] {}", stamp(), "=".repeat(50));
            }
            Err(e) => {
                error!("Error reading from {peer}: {e}");
                break;
            }
        }
    }

    debug!("Disconnected from {peer}");
    println!("[{}] {}", stamp(), format!("Disconnected from {peer}").yellow());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_handle_client_reads_until_peer_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.expect("connect");
            stream
                .write_all(b"callback test payload")
                .await
                .expect("write");
            stream.shutdown().await.expect("shutdown");
        });

        let (stream, _) = listener.accept().await.expect("accept");
        let handler = tokio::spawn(handle_client(stream));

        tokio::time::timeout(Duration::from_secs(5), async {
            client.await.expect("client task");
            handler.await.expect("handler task");
        })
        .await
        .expect("handler should finish after disconnect");
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let error = run_listener("999.999.999.999:0")
            .await
            .expect_err("bind should fail");

        assert!(error.contains("Failed to bind"));
    }
}
