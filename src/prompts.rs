use std::fmt::Write;

use crate::angles;
use crate::models::{ExerciseType, FeedbackRequest, Priority, Reading};
use crate::report::SessionSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    Feedback(Priority),
    Report,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub purpose: PromptPurpose,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

const COACH_RULES: &str = "You are a personal trainer who knows biomechanics and injury prevention. \
You receive live posture data and answer with one spoken coaching line.

Order of concerns:
1. A warning is a safety issue; address it first.
2. At the starting position, cue the next movement phase.
3. Mid-movement, check form quality.
4. On a finished rep, give brief encouragement or a correction.

Voice rules: at most 15 words, action verbs, name the body part, vary your wording.";

fn exercise_notes(exercise: ExerciseType) -> &'static str {
    match exercise {
        ExerciseType::Squat => {
            "Squat, knee angle in degrees. Under 70 stresses the knee joint. \
85 to 95 at the bottom is ideal depth. Standing is about 170. \
Cues: push hips back on the way down, drive through the heels, squeeze glutes on the way up."
        }
        ExerciseType::PushUp => {
            "Push-up, elbow angle in degrees. 70 to 90 at the bottom is good depth; \
under 70 means the chest is collapsing. Top position is above 160. \
Cues: brace the core, keep hips level, elbows at forty-five degrees, press to full extension."
        }
        ExerciseType::HammerCurl => {
            "Hammer curl, elbow flexion per arm in degrees. Under 47 is a full curl, \
above 155 is extended. Arms more than 20 degrees apart are out of sync. \
Cues: pin elbows to the sides, no swinging, squeeze at the top, resist on the way down."
        }
    }
}

fn priority_banner(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "SAFETY ISSUE DETECTED - address it immediately.",
        Priority::Milestone => "Rep milestone reached.",
        Priority::Technique => "Movement phase changed - give a technique cue.",
        Priority::Encouragement => "Steady work - keep the user motivated.",
    }
}

fn zone_hint(exercise: ExerciseType, angle: f64) -> String {
    match angles::interpret(exercise, angle) {
        (label, true) => format!("{label}, risk zone"),
        (label, false) => label.to_string(),
    }
}

pub fn feedback_prompt(request: &FeedbackRequest) -> Prompt {
    let context = &request.context;
    let mut user = String::new();

    let _ = writeln!(user, "Exercise: {}", context.exercise.display_name());
    let _ = writeln!(user, "Priority: {}", request.priority);
    let _ = writeln!(user, "{}", priority_banner(request.priority));
    if let Some(milestone) = context.milestone {
        let _ = writeln!(user, "Milestone: {}", milestone.describe());
    }
    let _ = writeln!(user, "Rep: {}/{}", context.rep, context.goal_reps);
    let _ = writeln!(user, "Set: {}/{}", context.set, context.goal_sets);
    let _ = writeln!(user, "Stage: {}", context.stage);

    match context.reading {
        Reading::Single(angle) => {
            let _ = writeln!(user, "Angle: {angle:.1}° ({})", zone_hint(context.exercise, angle));
        }
        Reading::Pair { right, left } => {
            let _ = writeln!(
                user,
                "Right arm angle: {right:.1}° ({})",
                zone_hint(context.exercise, right)
            );
            let _ = writeln!(
                user,
                "Left arm angle: {left:.1}° ({})",
                zone_hint(context.exercise, left)
            );
        }
    }
    if let Some(warning) = &context.warning {
        let _ = writeln!(user, "Warning: {warning}");
    }
    let _ = writeln!(user);
    let _ = write!(user, "Give one brief coaching line (max 15 words).");

    Prompt {
        purpose: PromptPurpose::Feedback(request.priority),
        system: format!("{COACH_RULES}\n\n{}", exercise_notes(context.exercise)),
        user,
        max_tokens: 150,
    }
}

pub fn report_prompt(summary: &SessionSummary) -> Prompt {
    let mut user = String::new();

    let _ = writeln!(user, "Workout summary:");
    let _ = writeln!(user, "- Exercise: {}", summary.exercise.display_name());
    let _ = writeln!(
        user,
        "- Sets completed: {} of {}",
        summary.total_sets, summary.goal.sets
    );
    let _ = writeln!(user, "- Total reps: {}", summary.total_reps);
    let _ = writeln!(user, "- Duration: {} seconds", summary.duration.as_secs());
    let _ = writeln!(user, "- Form warnings: {}", summary.total_warnings);
    if let Some((category, count)) = &summary.dominant_warning {
        let _ = writeln!(user, "- Most frequent warning: {category} ({count} times)");
    }
    let _ = writeln!(user);
    let _ = writeln!(user, "Answer with exactly four lines:");
    let _ = writeln!(user, "SUMMARY: one sentence on the session");
    let _ = writeln!(user, "STRENGTH: one key strength");
    let _ = writeln!(user, "IMPROVEMENT: one area to improve");
    let _ = write!(user, "TIP: one specific tip for next session");

    Prompt {
        purpose: PromptPurpose::Report,
        system: "You are a professional fitness coach writing a short, motivating post-workout analysis."
            .to_string(),
        user,
        max_tokens: 300,
    }
}
