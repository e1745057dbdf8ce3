use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::coach::{FeedbackDispatcher, FeedbackOutcome};
use crate::config::CoachConfig;
use crate::error::Result;
use crate::generator::TextGenerator;
use crate::machine::ExerciseStateMachine;
use crate::models::{
    AngleSample, ExerciseType, Priority, SessionGoal, SessionReport, StageTransition, WorkoutRecord,
};
use crate::posture::{PostureCheck, PostureStatus};
use crate::report;
use crate::scheduler::CoachingScheduler;
use crate::speech::SpeechSink;

const READY_LINE: &str = "Form looks solid, starting your workout now.";

#[derive(Debug)]
pub struct SessionOutcome {
    pub report: SessionReport,
    pub record: WorkoutRecord,
}

/// Single writer for the state machine and scheduler; feed samples in
/// timestamp order. Feedback from an older generation is dropped.
pub struct WorkoutSession {
    id: Uuid,
    machine: ExerciseStateMachine,
    scheduler: CoachingScheduler,
    dispatcher: FeedbackDispatcher,
    speaker: Arc<dyn SpeechSink>,
    posture: Option<PostureCheck>,
    first_sample_at: Option<Duration>,
    last_sample_at: Duration,
}

impl WorkoutSession {
    /// Validates the goal before any tracking state exists.
    pub fn start(
        exercise: ExerciseType,
        reps: u32,
        sets: u32,
        config: &CoachConfig,
        generator: Arc<dyn TextGenerator>,
        speaker: Arc<dyn SpeechSink>,
    ) -> Result<Self> {
        let goal = SessionGoal::new(reps, sets)?;
        let session = Self {
            id: Uuid::new_v4(),
            machine: ExerciseStateMachine::new(exercise, goal),
            scheduler: CoachingScheduler::new(config),
            dispatcher: FeedbackDispatcher::new(generator, config.generator_timeout),
            speaker,
            posture: None,
            first_sample_at: None,
            last_sample_at: Duration::ZERO,
        };
        info!(
            session = %session.id,
            exercise = %exercise,
            reps,
            sets,
            generator = session.dispatcher.generator().name(),
            "workout started"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn machine(&self) -> &ExerciseStateMachine {
        &self.machine
    }

    pub fn scheduler(&self) -> &CoachingScheduler {
        &self.scheduler
    }

    pub fn is_complete(&self) -> bool {
        self.machine.is_complete()
    }

    /// Coaches form on warm-up reps until enough clean reps in a row are seen.
    /// Warm-up reps do not count toward the goal.
    pub fn begin_posture_check(&mut self) {
        self.posture = Some(PostureCheck::new(self.machine.exercise()));
        info!(session = %self.id, exercise = %self.machine.exercise(), "posture check started");
    }

    pub fn in_posture_check(&self) -> bool {
        self.posture.is_some()
    }

    pub fn posture_status(&self) -> Option<PostureStatus> {
        self.posture.as_ref().map(PostureCheck::status)
    }

    pub fn ingest(&mut self, sample: AngleSample) -> Option<StageTransition> {
        self.deliver_ready();

        if let Some(check) = self.posture.as_mut() {
            let update = check.process(&sample)?;
            if let Some(correction) = &update.correction {
                self.speaker.speak(correction, Priority::Urgent);
            }
            if update.ready {
                info!(session = %self.id, streak = update.clean_streak, "posture check passed");
                self.speaker.speak(READY_LINE, Priority::Milestone);
                self.posture = None;
            }
            return Some(update.event);
        }

        let event = self.machine.process(&sample)?;
        self.first_sample_at.get_or_insert(sample.timestamp);
        self.last_sample_at = sample.timestamp;

        if let Some(request) = self.scheduler.decide(&event) {
            self.dispatcher.submit(request);
        }
        Some(event)
    }

    /// Waits up to `limit` for in-flight feedback and speaks what arrives.
    pub async fn settle_feedback(&mut self, limit: Duration) {
        let outcomes = self.dispatcher.settle(limit).await;
        self.deliver(outcomes);
    }

    /// Starts over with a new exercise or goal; pending feedback is discarded.
    pub fn restart(&mut self, exercise: ExerciseType, reps: u32, sets: u32) -> Result<()> {
        let goal = SessionGoal::new(reps, sets)?;
        self.scheduler.reset();
        self.posture = None;
        self.machine = ExerciseStateMachine::new(exercise, goal);
        self.first_sample_at = None;
        self.last_sample_at = Duration::ZERO;
        self.id = Uuid::new_v4();
        info!(session = %self.id, exercise = %exercise, reps, sets, "workout restarted");
        Ok(())
    }

    pub fn elapsed(&self) -> Duration {
        self.first_sample_at
            .map(|first| self.last_sample_at.saturating_sub(first))
            .unwrap_or_default()
    }

    /// Ends the session, builds the report and the record for the workout log.
    pub async fn finish(mut self) -> SessionOutcome {
        self.deliver_ready();

        let summary = report::summarize(&self.machine, self.elapsed());
        let report = report::build_report(
            &summary,
            self.dispatcher.generator(),
            self.dispatcher.timeout(),
        )
        .await;
        self.speaker.speak(&report.summary, Priority::Milestone);

        let record = workout_record(&self.machine, summary.duration);
        info!(
            session = %self.id,
            reps = record.total_reps,
            sets = record.sets,
            warnings = record.warnings,
            warnings_coached = self.scheduler.warnings_seen(),
            "workout finished"
        );
        SessionOutcome { report, record }
    }

    fn deliver_ready(&mut self) {
        let outcomes = self.dispatcher.try_collect();
        self.deliver(outcomes);
    }

    fn deliver(&mut self, outcomes: Vec<FeedbackOutcome>) {
        for outcome in outcomes {
            if outcome.generation != self.scheduler.generation() {
                debug!(
                    priority = %outcome.priority,
                    generation = outcome.generation,
                    "discarding feedback from a previous session"
                );
                continue;
            }
            let Ok(text) = outcome.result else {
                continue;
            };
            if self.scheduler.remember_spoken(&text) {
                self.speaker.speak(&text, outcome.priority);
            } else {
                debug!(priority = %outcome.priority, "skipping repeated feedback line");
            }
        }
    }
}

fn to_i32(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Sets include a partial set with reps; reps is the per-set average.
pub fn workout_record(machine: &ExerciseStateMachine, duration: Duration) -> WorkoutRecord {
    let total_reps = machine.total_reps();
    let sets = machine.sets_with_work();
    let reps = if sets > 0 { total_reps / sets } else { 0 };

    WorkoutRecord {
        id: Uuid::new_v4(),
        exercise: machine.exercise(),
        sets: to_i32(u64::from(sets)),
        reps: to_i32(u64::from(reps)),
        total_reps: to_i32(u64::from(total_reps)),
        warnings: to_i32(u64::from(machine.warning_count())),
        duration_seconds: to_i32(duration.as_secs()),
        completed_at: Utc::now(),
    }
}
