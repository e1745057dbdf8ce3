use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::generator::TextGenerator;
use crate::models::{FeedbackRequest, Priority};
use crate::prompts::{self, Prompt};

#[derive(Debug)]
pub struct FeedbackOutcome {
    pub generation: u64,
    pub priority: Priority,
    pub result: Result<String>,
}

/// Runs one generator call bounded by `limit`.
pub async fn generate(generator: &dyn TextGenerator, prompt: &Prompt, limit: Duration) -> Result<String> {
    match tokio::time::timeout(limit, generator.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit)),
    }
}

pub struct FeedbackDispatcher {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    outcomes_tx: mpsc::UnboundedSender<FeedbackOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<FeedbackOutcome>,
    in_flight: usize,
}

impl FeedbackDispatcher {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            generator,
            timeout,
            outcomes_tx,
            outcomes_rx,
            in_flight: 0,
        }
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Spawns the generator call and returns immediately.
    pub fn submit(&mut self, request: FeedbackRequest) {
        let generator = Arc::clone(&self.generator);
        let outcomes_tx = self.outcomes_tx.clone();
        let limit = self.timeout;
        self.in_flight += 1;

        tokio::spawn(async move {
            let prompt = prompts::feedback_prompt(&request);
            let result = generate(generator.as_ref(), &prompt, limit).await;
            if let Err(e) = &result {
                warn!(
                    priority = %request.priority,
                    issued_at = ?request.issued_at,
                    generator = generator.name(),
                    "feedback generation failed, skipping: {e}"
                );
            }

            let outcome = FeedbackOutcome {
                generation: request.generation,
                priority: request.priority,
                result,
            };
            if outcomes_tx.send(outcome).is_err() {
                debug!("dispatcher dropped before feedback arrived");
            }
        });
    }

    /// Outcomes that have already arrived; never waits.
    pub fn try_collect(&mut self) -> Vec<FeedbackOutcome> {
        let mut ready = Vec::new();
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            ready.push(outcome);
        }
        ready
    }

    /// Waits for in-flight requests to finish, giving up after `limit`.
    pub async fn settle(&mut self, limit: Duration) -> Vec<FeedbackOutcome> {
        let deadline = tokio::time::Instant::now() + limit;
        let mut ready = Vec::new();
        while self.in_flight > 0 {
            match tokio::time::timeout_at(deadline, self.outcomes_rx.recv()).await {
                Ok(Some(outcome)) => {
                    self.in_flight -= 1;
                    ready.push(outcome);
                }
                _ => break,
            }
        }
        ready
    }
}
