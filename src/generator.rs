use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::CoachConfig;
use crate::error::{Error, Result};
use crate::models::Priority;
use crate::prompts::{Prompt, PromptPurpose};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct GroqGenerator {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GroqGenerator {
    pub fn from_config(config: &CoachConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("GROQ_API_KEY is not set".to_string()))?;
        let client = Client::builder()
            .timeout(config.generator_timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn parse_error(status: reqwest::StatusCode, body: &str) -> Error {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|response| response.error.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        Error::Generator(format!("Groq API error ({status}): {message}"))
    }
}

#[async_trait]
impl TextGenerator for GroqGenerator {
    fn name(&self) -> &str {
        "groq"
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.7,
            max_tokens: prompt.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Generator(format!("unreadable Groq response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| Error::Generator("Groq returned an empty completion".to_string()))?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}

const URGENT_LINES: &[&str] = &[
    "Careful! Reset your form before the next rep.",
    "Stop and fix your position, safety first.",
];

const MILESTONE_LINES: &[&str] = &[
    "Strong rep! Next one!",
    "Perfect! One more!",
    "Excellent work, keep that rhythm!",
];

const TECHNIQUE_LINES: &[&str] = &[
    "Control the movement, stay tight through the core.",
    "Slow and steady, own every inch.",
    "Breathe out as you drive up.",
];

const ENCOURAGEMENT_LINES: &[&str] = &[
    "You're doing awesome!",
    "Looking good! Keep going!",
    "Solid form! Push through!",
    "Great form! Keep it up!",
];

#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    cursor: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines(priority: Priority) -> &'static [&'static str] {
        match priority {
            Priority::Urgent => URGENT_LINES,
            Priority::Milestone => MILESTONE_LINES,
            Priority::Technique => TECHNIQUE_LINES,
            Priority::Encouragement => ENCOURAGEMENT_LINES,
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        match prompt.purpose {
            PromptPurpose::Feedback(priority) => {
                let lines = Self::lines(priority);
                let index = self.cursor.fetch_add(1, Ordering::Relaxed) % lines.len();
                Ok(lines[index].to_string())
            }
            PromptPurpose::Report => Err(Error::Generator(
                "scripted generator does not write reports".to_string(),
            )),
        }
    }
}
