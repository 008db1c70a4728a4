use async_trait::async_trait;
use std::io::Write;

/// Operator interaction seam. The escalation flow and the tool resolver ask
/// questions through this trait so tests can script the answers.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Yes/no question; anything but an explicit yes is a refusal
    async fn confirm(&self, question: &str) -> Result<bool, String>;

    /// Free-form single-line answer, trimmed
    async fn select_line(&self, prompt: &str) -> Result<String, String>;
}

/// The real prompter, reading from the attached terminal
pub struct StdinPrompter;

#[async_trait]
impl Prompter for StdinPrompter {
    async fn confirm(&self, question: &str) -> Result<bool, String> {
        let answer = self.select_line(&format!("{question} [y/N]: ")).await?;
        Ok(answer.to_lowercase() == "y")
    }

    async fn select_line(&self, prompt: &str) -> Result<String, String> {
        print!("{prompt}");
        std::io::stdout()
            .flush()
            .map_err(|e| format!("Failed to flush stdout: {e}"))?;

        let line = tokio::task::spawn_blocking(|| {
            let mut input = String::new();
            std::io::stdin().read_line(&mut input).map(|_| input)
        })
        .await
        .map_err(|e| format!("Prompt task failed: {e}"))?
        .map_err(|e| format!("Failed to read input: {e}"))?;

        Ok(line.trim().to_string())
    }
}
