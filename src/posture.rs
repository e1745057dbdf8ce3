use std::time::Duration;

use tracing::debug;

use crate::machine::ExerciseStateMachine;
use crate::models::{AngleSample, ExerciseType, SessionGoal, StageTransition};

/// Clean reps in a row needed before the workout may start.
pub const READY_STREAK: u32 = 3;
/// An unchanged correction is repeated after this long.
pub const CORRECTION_REPEAT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostureStatus {
    pub clean_streak: u32,
    pub last_errors: Option<String>,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostureUpdate {
    pub event: StageTransition,
    /// Corrective line to speak now, if any.
    pub correction: Option<String>,
    pub clean_streak: u32,
    pub ready: bool,
}

/// Warm-up that coaches form without counting toward the workout goal.
#[derive(Debug)]
pub struct PostureCheck {
    machine: ExerciseStateMachine,
    clean_streak: u32,
    rep_clean: bool,
    last_errors: Option<String>,
    last_correction_at: Option<Duration>,
    ready: bool,
}

impl PostureCheck {
    pub fn new(exercise: ExerciseType) -> Self {
        // Open-ended goal; the check never completes on its own.
        let goal = SessionGoal {
            reps: u32::MAX,
            sets: 1,
        };
        Self {
            machine: ExerciseStateMachine::new(exercise, goal),
            clean_streak: 0,
            rep_clean: true,
            last_errors: None,
            last_correction_at: None,
            ready: false,
        }
    }

    pub fn status(&self) -> PostureStatus {
        PostureStatus {
            clean_streak: self.clean_streak,
            last_errors: self.last_errors.clone(),
            ready: self.ready,
        }
    }

    pub fn process(&mut self, sample: &AngleSample) -> Option<PostureUpdate> {
        let event = self.machine.process(sample)?;
        let mut correction = None;

        if let Some(errors) = &event.warning {
            self.clean_streak = 0;
            self.rep_clean = false;

            let changed = self.last_errors.as_deref() != Some(errors.as_str());
            let due = self
                .last_correction_at
                .map_or(true, |at| event.timestamp.saturating_sub(at) >= CORRECTION_REPEAT);
            if changed || due {
                correction = Some(errors.clone());
                self.last_correction_at = Some(event.timestamp);
            }
            self.last_errors = Some(errors.clone());
        }

        if event.rep_completed {
            if self.rep_clean {
                self.clean_streak += 1;
                if self.clean_streak >= READY_STREAK {
                    self.ready = true;
                }
            }
            self.rep_clean = true;
            debug!(streak = self.clean_streak, ready = self.ready, "warm-up rep");
        }

        Some(PostureUpdate {
            event,
            correction,
            clean_streak: self.clean_streak,
            ready: self.ready,
        })
    }
}
