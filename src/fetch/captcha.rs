use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaResolution {
    Resolved,
    Cancelled,
}

/// A pending request for a human to clear a bot check.
#[derive(Debug)]
pub struct CaptchaPrompt {
    pub url: String,
    pub attempt: u32,
    pub screenshot: PathBuf,
    reply: oneshot::Sender<CaptchaResolution>,
}

impl CaptchaPrompt {
    pub fn resolve(self, resolution: CaptchaResolution) {
        // The fetcher may have timed out and gone away already.
        let _ = self.reply.send(resolution);
    }
}

/// Suspension point between the fetcher and whoever solves CAPTCHAs.
#[derive(Debug, Clone)]
pub struct CaptchaGate {
    prompts: Option<mpsc::Sender<CaptchaPrompt>>,
    timeout: Duration,
}

impl CaptchaGate {
    pub fn channel(timeout: Duration) -> (Self, mpsc::Receiver<CaptchaPrompt>) {
        let (tx, rx) = mpsc::channel(4);
        (
            Self {
                prompts: Some(tx),
                timeout,
            },
            rx,
        )
    }

    /// A gate with no operator: every prompt is cancelled immediately.
    pub fn disabled() -> Self {
        Self {
            prompts: None,
            timeout: Duration::ZERO,
        }
    }

    /// Ask the operator to solve the CAPTCHA on `url` and wait for the answer.
    ///
    /// No operator, a dropped reply, or the timeout elapsing all count as cancelled.
    pub async fn wait_for_operator(
        &self,
        url: &str,
        attempt: u32,
        screenshot: PathBuf,
    ) -> CaptchaResolution {
        let Some(prompts) = &self.prompts else {
            tracing::warn!("Manual CAPTCHA requested but no operator is attached");
            return CaptchaResolution::Cancelled;
        };

        let (reply, answer) = oneshot::channel();
        let prompt = CaptchaPrompt {
            url: url.to_string(),
            attempt,
            screenshot,
            reply,
        };
        if prompts.send(prompt).await.is_err() {
            tracing::warn!("CAPTCHA operator channel closed");
            return CaptchaResolution::Cancelled;
        }

        match tokio::time::timeout(self.timeout, answer).await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(_)) => CaptchaResolution::Cancelled,
            Err(_) => {
                tracing::warn!(
                    "No CAPTCHA resolution for {url} within {:?}, abandoning attempt",
                    self.timeout
                );
                CaptchaResolution::Cancelled
            }
        }
    }
}

/// Serve prompts from the terminal: Enter resolves, `c`/`cancel` gives up.
pub async fn console_operator(mut prompts: mpsc::Receiver<CaptchaPrompt>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(prompt) = prompts.recv().await {
        tracing::warn!(
            "CAPTCHA detected on {} (attempt {}). Screenshot: {}. Solve it in the browser window, then press Enter (or type 'c' to cancel).",
            prompt.url,
            prompt.attempt + 1,
            prompt.screenshot.display()
        );

        let resolution = match lines.next_line().await {
            Ok(Some(line)) if matches!(line.trim(), "c" | "cancel") => CaptchaResolution::Cancelled,
            Ok(Some(_)) => CaptchaResolution::Resolved,
            Ok(None) | Err(_) => {
                prompt.resolve(CaptchaResolution::Cancelled);
                break;
            }
        };
        prompt.resolve(resolution);
    }

    tracing::info!("CAPTCHA operator stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_gate_cancels() {
        let gate = CaptchaGate::disabled();
        let outcome = gate
            .wait_for_operator("https://x", 0, PathBuf::from("shot.png"))
            .await;
        assert_eq!(outcome, CaptchaResolution::Cancelled);
    }

    #[tokio::test]
    async fn operator_answer_is_returned() {
        let (gate, mut prompts) = CaptchaGate::channel(Duration::from_secs(30));
        tokio::spawn(async move {
            let prompt = prompts.recv().await.unwrap();
            assert_eq!(prompt.attempt, 1);
            assert_eq!(prompt.screenshot, PathBuf::from("captcha_detected_1.png"));
            prompt.resolve(CaptchaResolution::Resolved);
        });

        let outcome = gate
            .wait_for_operator("https://x", 1, PathBuf::from("captcha_detected_1.png"))
            .await;
        assert_eq!(outcome, CaptchaResolution::Resolved);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_operator_times_out() {
        let (gate, _prompts) = CaptchaGate::channel(Duration::from_secs(300));
        let outcome = gate
            .wait_for_operator("https://x", 0, PathBuf::from("shot.png"))
            .await;
        assert_eq!(outcome, CaptchaResolution::Cancelled);
    }
}
