use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use crate::models::Priority;

const WORDS_PER_MINUTE: u64 = 165;

pub trait SpeechSink: Send + Sync {
    /// Queues a line without waiting for playback.
    fn speak(&self, text: &str, priority: Priority);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub priority: Priority,
}

#[derive(Debug, Default)]
pub struct SpeechQueue {
    pending: VecDeque<Utterance>,
}

impl SpeechQueue {
    pub fn push(&mut self, utterance: Utterance) {
        if utterance.priority == Priority::Urgent {
            let at = self
                .pending
                .iter()
                .take_while(|queued| queued.priority == Priority::Urgent)
                .count();
            self.pending.insert(at, utterance);
        } else {
            self.pending.push_back(utterance);
        }
    }

    pub fn pop(&mut self) -> Option<Utterance> {
        self.pending.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Strips markdown emphasis and surrounding quotes so the line reads well aloud.
pub fn clean_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '#'))
        .collect();
    let joined = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    joined
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

pub fn speaking_time(text: &str) -> Duration {
    let words = text.split_whitespace().count() as u64;
    Duration::from_millis(words * 60_000 / WORDS_PER_MINUTE)
}

/// Prints lines to the terminal, pausing for roughly as long as speaking them takes.
pub struct ConsoleSpeaker {
    queue: Arc<Mutex<SpeechQueue>>,
    notify: Arc<Notify>,
    speaking: Arc<AtomicBool>,
}

impl ConsoleSpeaker {
    /// Starts the playback task on the current tokio runtime.
    pub fn spawn() -> Self {
        let queue = Arc::new(Mutex::new(SpeechQueue::default()));
        let notify = Arc::new(Notify::new());
        let speaking = Arc::new(AtomicBool::new(false));

        let worker_queue = Arc::clone(&queue);
        let worker_notify = Arc::clone(&notify);
        let worker_speaking = Arc::clone(&speaking);
        tokio::spawn(async move {
            loop {
                let next = worker_queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop();
                match next {
                    Some(utterance) => {
                        worker_speaking.store(true, Ordering::SeqCst);
                        println!("🔊 [{}] {}", utterance.priority, utterance.text);
                        info!(priority = %utterance.priority, "spoke: {}", utterance.text);
                        tokio::time::sleep(speaking_time(&utterance.text)).await;
                        worker_speaking.store(false, Ordering::SeqCst);
                    }
                    None => worker_notify.notified().await,
                }
            }
        });

        Self {
            queue,
            notify,
            speaking,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.speaking.load(Ordering::SeqCst)
            && self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty()
    }

    /// Waits until everything queued has been played, up to `limit`.
    pub async fn wait_idle(&self, limit: Duration) {
        let deadline = tokio::time::Instant::now() + limit;
        while !self.is_idle() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl SpeechSink for ConsoleSpeaker {
    fn speak(&self, text: &str, priority: Priority) {
        let text = clean_text(text);
        if text.is_empty() {
            return;
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Utterance { text, priority });
        self.notify.notify_one();
    }
}
