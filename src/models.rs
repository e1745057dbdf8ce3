use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    PushUp,
    HammerCurl,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Squat => "squat",
            ExerciseType::PushUp => "push_up",
            ExerciseType::HammerCurl => "hammer_curl",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ExerciseType::Squat => "Squat",
            ExerciseType::PushUp => "Push Up",
            ExerciseType::HammerCurl => "Hammer Curl",
        }
    }

    pub fn is_two_limb(&self) -> bool {
        matches!(self, ExerciseType::HammerCurl)
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "squat" => Ok(ExerciseType::Squat),
            "push_up" | "pushup" => Ok(ExerciseType::PushUp),
            "hammer_curl" | "curl" => Ok(ExerciseType::HammerCurl),
            other => Err(Error::Config(format!("unknown exercise type '{other}'"))),
        }
    }
}

/// Feedback tiers, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Urgent,
    Milestone,
    Technique,
    Encouragement,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Urgent,
        Priority::Milestone,
        Priority::Technique,
        Priority::Encouragement,
    ];

    /// Position in `ALL`; lower means more urgent.
    pub fn index(&self) -> usize {
        match self {
            Priority::Urgent => 0,
            Priority::Milestone => 1,
            Priority::Technique => 2,
            Priority::Encouragement => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::Milestone => "milestone",
            Priority::Technique => "technique",
            Priority::Encouragement => "encouragement",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Starting,
    Descent,
    Bottom,
    Ascent,
    Extended,
    Curling,
    Peak,
    Lowering,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Starting => "Starting Position",
            Stage::Descent => "Descent",
            Stage::Bottom => "Bottom",
            Stage::Ascent => "Ascent",
            Stage::Extended => "Extended",
            Stage::Curling => "Curling",
            Stage::Peak => "Peak",
            Stage::Lowering => "Lowering",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of the whole body for one-limb exercises, or of each arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Single(Stage),
    Pair { right: Stage, left: Stage },
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageState::Single(stage) => write!(f, "{stage}"),
            StageState::Pair { right, left } => write!(f, "right {right}, left {left}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGoal {
    pub reps: u32,
    pub sets: u32,
}

impl SessionGoal {
    pub fn new(reps: u32, sets: u32) -> crate::error::Result<Self> {
        if reps == 0 {
            return Err(Error::Config("goal reps must be at least 1".to_string()));
        }
        if sets == 0 {
            return Err(Error::Config("goal sets must be at least 1".to_string()));
        }
        Ok(Self { reps, sets })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Single(f64),
    Pair { right: f64, left: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSample {
    pub reading: Reading,
    /// Offset from the start of capture; samples arrive in increasing order.
    pub timestamp: Duration,
}

impl AngleSample {
    pub fn single(angle: f64, timestamp: Duration) -> Self {
        Self {
            reading: Reading::Single(angle),
            timestamp,
        }
    }

    pub fn pair(right: f64, left: f64, timestamp: Duration) -> Self {
        Self {
            reading: Reading::Pair { right, left },
            timestamp,
        }
    }
}

/// Counters as they stand after an event has been applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub exercise: ExerciseType,
    pub current_rep: u32,
    pub current_set: u32,
    pub goal: SessionGoal,
    pub warning_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageTransition {
    pub from_stage: StageState,
    pub to_stage: StageState,
    pub stage_changed: bool,
    pub rep_completed: bool,
    /// Number of the rep that just finished, counted within its set.
    pub rep_number: Option<u32>,
    pub set_completed: bool,
    pub session_completed: bool,
    pub warning: Option<String>,
    pub reading: Reading,
    pub timestamp: Duration,
    pub progress: Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneKind {
    FirstRep,
    Halfway,
    OneToGo,
    Rep,
    SetComplete,
    WorkoutComplete,
}

impl MilestoneKind {
    pub fn describe(&self) -> &'static str {
        match self {
            MilestoneKind::FirstRep => "First rep done - set the tone",
            MilestoneKind::Halfway => "Halfway through the set",
            MilestoneKind::OneToGo => "One rep to go in this set",
            MilestoneKind::Rep => "New rep completed - encourage and check form",
            MilestoneKind::SetComplete => "Set complete - praise and cue rest",
            MilestoneKind::WorkoutComplete => "Workout complete - celebrate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackContext {
    pub exercise: ExerciseType,
    pub rep: u32,
    pub goal_reps: u32,
    /// One-based set the user is working on.
    pub set: u32,
    pub goal_sets: u32,
    pub stage: StageState,
    pub reading: Reading,
    pub warning: Option<String>,
    pub milestone: Option<MilestoneKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRequest {
    pub priority: Priority,
    pub context: FeedbackContext,
    pub issued_at: Duration,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub exercise: ExerciseType,
    pub summary: String,
    pub strength: String,
    pub improvement_area: String,
    pub tip: String,
    pub total_reps: u32,
    pub total_sets: u32,
    pub total_warnings: u32,
    #[serde(rename = "duration_seconds", serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub dominant_warning: Option<String>,
    pub source: ReportSource,
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

/// Finalized workout handed to the workout log.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub id: Uuid,
    pub exercise: ExerciseType,
    pub sets: i32,
    pub reps: i32,
    pub total_reps: i32,
    pub warnings: i32,
    pub duration_seconds: i32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WorkoutHistoryRow {
    pub exercise_type: String,
    pub sets: i32,
    pub reps: i32,
    pub warnings: i32,
    pub duration_seconds: i32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DailyStat {
    pub day: NaiveDate,
    pub workout_count: i64,
    pub total_reps: i64,
}

#[derive(Debug, Clone)]
pub struct ExerciseCount {
    pub exercise_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub total_workouts: i64,
    pub total_reps: i64,
    /// Consecutive days with a workout, ending today.
    pub streak_days: u32,
}
