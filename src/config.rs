use std::time::Duration;

use anyhow::Context;

use crate::models::Priority;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone)]
pub struct CoachConfig {
    pub urgent_cooldown: Duration,
    pub milestone_cooldown: Duration,
    pub technique_cooldown: Duration,
    pub encouragement_cooldown: Duration,
    /// Upper bound on a single text generation call.
    pub generator_timeout: Duration,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            urgent_cooldown: Duration::from_secs(3),
            milestone_cooldown: Duration::from_secs(6),
            technique_cooldown: Duration::from_secs(6),
            encouragement_cooldown: Duration::from_secs(12),
            generator_timeout: Duration::from_secs(4),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
        }
    }
}

impl CoachConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            urgent_cooldown: secs_from_env("FORM_COACH_URGENT_COOLDOWN_SECS", defaults.urgent_cooldown)?,
            milestone_cooldown: secs_from_env(
                "FORM_COACH_MILESTONE_COOLDOWN_SECS",
                defaults.milestone_cooldown,
            )?,
            technique_cooldown: secs_from_env(
                "FORM_COACH_TECHNIQUE_COOLDOWN_SECS",
                defaults.technique_cooldown,
            )?,
            encouragement_cooldown: secs_from_env(
                "FORM_COACH_ENCOURAGEMENT_COOLDOWN_SECS",
                defaults.encouragement_cooldown,
            )?,
            generator_timeout: secs_from_env("FORM_COACH_TIMEOUT_SECS", defaults.generator_timeout)?,
            model: std::env::var("FORM_COACH_MODEL").unwrap_or(defaults.model),
            api_base: std::env::var("FORM_COACH_API_BASE").unwrap_or(defaults.api_base),
            api_key: std::env::var("GROQ_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn cooldown(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Urgent => self.urgent_cooldown,
            Priority::Milestone => self.milestone_cooldown,
            Priority::Technique => self.technique_cooldown,
            Priority::Encouragement => self.encouragement_cooldown,
        }
    }
}

fn secs_from_env(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(name) {
        Ok(value) => {
            let secs: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("{name} must be a number of seconds"))?;
            Duration::try_from_secs_f64(secs)
                .with_context(|| format!("{name} must be a non-negative number of seconds"))
        }
        Err(_) => Ok(default),
    }
}
