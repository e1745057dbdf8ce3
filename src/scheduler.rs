use std::time::Duration;

use tracing::debug;

use crate::config::CoachConfig;
use crate::models::{FeedbackContext, FeedbackRequest, MilestoneKind, Priority, StageTransition};

#[derive(Debug, Clone, Copy)]
pub struct TierRule {
    pub priority: Priority,
    pub cooldown: Duration,
    trigger: fn(&StageTransition) -> bool,
}

fn has_warning(event: &StageTransition) -> bool {
    event.warning.is_some()
}

fn rep_completed(event: &StageTransition) -> bool {
    event.rep_completed
}

fn stage_changed(event: &StageTransition) -> bool {
    event.stage_changed
}

fn any_event(_: &StageTransition) -> bool {
    true
}

/// Earliest timestamp at which each tier may fire again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CooldownLedger {
    next_allowed: [Duration; 4],
}

impl CooldownLedger {
    pub fn is_open(&self, priority: Priority, now: Duration) -> bool {
        now >= self.next_allowed[priority.index()]
    }

    pub fn next_allowed(&self, priority: Priority) -> Duration {
        self.next_allowed[priority.index()]
    }

    /// Only ever moves a tier's deadline forward.
    pub fn consume(&mut self, priority: Priority, now: Duration, cooldown: Duration) {
        let slot = &mut self.next_allowed[priority.index()];
        let until = now + cooldown;
        if until > *slot {
            *slot = until;
        }
    }

    pub fn reset(&mut self) {
        self.next_allowed = [Duration::ZERO; 4];
    }
}

#[derive(Debug)]
pub struct CoachingScheduler {
    ladder: Vec<TierRule>,
    ledger: CooldownLedger,
    last_spoken: Option<String>,
    warnings_seen: u32,
    emitted: [u32; 4],
    generation: u64,
}

impl CoachingScheduler {
    pub fn new(config: &CoachConfig) -> Self {
        let rule = |priority: Priority, trigger: fn(&StageTransition) -> bool| TierRule {
            priority,
            cooldown: config.cooldown(priority),
            trigger,
        };

        Self {
            ladder: vec![
                rule(Priority::Urgent, has_warning),
                rule(Priority::Milestone, rep_completed),
                rule(Priority::Technique, stage_changed),
                rule(Priority::Encouragement, any_event),
            ],
            ledger: CooldownLedger::default(),
            last_spoken: None,
            warnings_seen: 0,
            emitted: [0; 4],
            generation: 0,
        }
    }

    #[cfg(test)]
    pub fn ledger(&self) -> &CooldownLedger {
        &self.ledger
    }

    /// Identity of the current session; bumped on every reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn warnings_seen(&self) -> u32 {
        self.warnings_seen
    }

    pub fn emitted(&self, priority: Priority) -> u32 {
        self.emitted[priority.index()]
    }

    /// First matching tier with an open cooldown wins. The cooldown is consumed
    /// on issue, whether or not generation later succeeds.
    pub fn decide(&mut self, event: &StageTransition) -> Option<FeedbackRequest> {
        if event.warning.is_some() {
            self.warnings_seen += 1;
        }

        let now = event.timestamp;
        let rule = self
            .ladder
            .iter()
            .find(|rule| (rule.trigger)(event) && self.ledger.is_open(rule.priority, now))
            .copied()?;

        self.ledger.consume(rule.priority, now, rule.cooldown);
        self.emitted[rule.priority.index()] += 1;
        debug!(
            priority = %rule.priority,
            at = ?now,
            next_allowed = ?self.ledger.next_allowed(rule.priority),
            "feedback scheduled"
        );

        Some(FeedbackRequest {
            priority: rule.priority,
            context: build_context(event, rule.priority),
            issued_at: now,
            generation: self.generation,
        })
    }

    /// Records text about to be spoken; false when it repeats the last line.
    pub fn remember_spoken(&mut self, text: &str) -> bool {
        if self.last_spoken.as_deref() == Some(text) {
            return false;
        }
        self.last_spoken = Some(text.to_string());
        true
    }

    pub fn reset(&mut self) {
        self.ledger.reset();
        self.last_spoken = None;
        self.warnings_seen = 0;
        self.emitted = [0; 4];
        self.generation += 1;
    }
}

pub fn milestone_kind(event: &StageTransition) -> MilestoneKind {
    if event.session_completed {
        return MilestoneKind::WorkoutComplete;
    }
    if event.set_completed {
        return MilestoneKind::SetComplete;
    }

    let goal = event.progress.goal.reps;
    match event.rep_number.unwrap_or(event.progress.current_rep) {
        1 => MilestoneKind::FirstRep,
        rep if rep == goal / 2 => MilestoneKind::Halfway,
        rep if rep + 1 == goal => MilestoneKind::OneToGo,
        _ => MilestoneKind::Rep,
    }
}

fn build_context(event: &StageTransition, priority: Priority) -> FeedbackContext {
    let progress = &event.progress;
    let set = if event.set_completed {
        progress.current_set
    } else {
        progress.current_set + 1
    };

    FeedbackContext {
        exercise: progress.exercise,
        rep: event.rep_number.unwrap_or(progress.current_rep),
        goal_reps: progress.goal.reps,
        set,
        goal_sets: progress.goal.sets,
        stage: event.to_stage,
        reading: event.reading,
        warning: event.warning.clone(),
        milestone: (priority == Priority::Milestone).then(|| milestone_kind(event)),
    }
}
