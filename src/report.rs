use std::fmt::Write;
use std::time::Duration;

use tracing::{info, warn};

use crate::coach;
use crate::generator::TextGenerator;
use crate::machine::ExerciseStateMachine;
use crate::models::{ExerciseType, ReportSource, SessionGoal, SessionReport};
use crate::prompts;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub exercise: ExerciseType,
    pub goal: SessionGoal,
    pub total_reps: u32,
    pub total_sets: u32,
    pub total_warnings: u32,
    pub duration: Duration,
    /// Most frequent warning category and how often it fired.
    pub dominant_warning: Option<(String, u32)>,
}

#[derive(Debug, Default, PartialEq)]
pub struct Narrative {
    pub summary: Option<String>,
    pub strength: Option<String>,
    pub improvement_area: Option<String>,
    pub tip: Option<String>,
}

impl Narrative {
    fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.strength.is_none()
            && self.improvement_area.is_none()
            && self.tip.is_none()
    }
}

pub fn summarize(machine: &ExerciseStateMachine, duration: Duration) -> SessionSummary {
    let dominant_warning = machine
        .warnings_by_category()
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(category, count)| (category.clone(), *count));

    SessionSummary {
        exercise: machine.exercise(),
        goal: machine.goal(),
        total_reps: machine.total_reps(),
        total_sets: machine.sets_with_work(),
        total_warnings: machine.warning_count(),
        duration,
        dominant_warning,
    }
}

/// Reads `LABEL: text` lines; list markers and markdown emphasis are ignored.
pub fn parse_narrative(text: &str) -> Narrative {
    let mut narrative = Narrative::default();

    for raw in text.lines() {
        let line = raw
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ' '))
            .replace("**", "");
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let slot = match label.trim().to_ascii_uppercase().as_str() {
            "SUMMARY" => &mut narrative.summary,
            "STRENGTH" => &mut narrative.strength,
            "IMPROVEMENT" | "IMPROVEMENT AREA" | "AREA FOR IMPROVEMENT" => {
                &mut narrative.improvement_area
            }
            "TIP" => &mut narrative.tip,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }

    narrative
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn exercise_tip(exercise: ExerciseType) -> &'static str {
    match exercise {
        ExerciseType::Squat => "Next time, pause for a beat at the bottom and drive up through your heels.",
        ExerciseType::PushUp => "Next time, keep your elbows at forty-five degrees and your hips level.",
        ExerciseType::HammerCurl => "Next time, pin your elbows to your sides and lower both arms together.",
    }
}

fn counted(count: u32, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

fn template_narrative(summary: &SessionSummary) -> [String; 4] {
    let name = summary.exercise.display_name().to_lowercase();
    let overview = format!(
        "Great work on your {name} session: {} across {} in {}.",
        counted(summary.total_reps, "rep", "reps"),
        counted(summary.total_sets, "set", "sets"),
        format_duration(summary.duration)
    );

    let strength = if summary.total_sets >= summary.goal.sets && summary.total_reps > 0 {
        "You finished every set you planned.".to_string()
    } else if summary.total_reps > 0 {
        format!(
            "You kept moving and logged {}.",
            counted(summary.total_reps, "rep", "reps")
        )
    } else {
        "You showed up and started the session.".to_string()
    };

    let improvement = match &summary.dominant_warning {
        Some((category, count)) => {
            format!(
                "Watch for \"{category}\"; it came up {}.",
                counted(*count, "time", "times")
            )
        }
        None => "Keep the same controlled tempo on every rep.".to_string(),
    };

    [
        overview,
        strength,
        improvement,
        exercise_tip(summary.exercise).to_string(),
    ]
}

fn assemble(summary: &SessionSummary, narrative: Narrative, source: ReportSource) -> SessionReport {
    let [overview, strength, improvement, tip] = template_narrative(summary);
    SessionReport {
        exercise: summary.exercise,
        summary: narrative.summary.unwrap_or(overview),
        strength: narrative.strength.unwrap_or(strength),
        improvement_area: narrative.improvement_area.unwrap_or(improvement),
        tip: narrative.tip.unwrap_or(tip),
        total_reps: summary.total_reps,
        total_sets: summary.total_sets,
        total_warnings: summary.total_warnings,
        duration: summary.duration,
        dominant_warning: summary
            .dominant_warning
            .as_ref()
            .map(|(category, _)| category.clone()),
        source,
    }
}

/// Templated report used when the text generator is unavailable.
pub fn fallback_report(summary: &SessionSummary) -> SessionReport {
    assemble(summary, Narrative::default(), ReportSource::Fallback)
}

pub async fn build_report(
    summary: &SessionSummary,
    generator: &dyn TextGenerator,
    limit: Duration,
) -> SessionReport {
    let prompt = prompts::report_prompt(summary);
    match coach::generate(generator, &prompt, limit).await {
        Ok(text) => {
            let narrative = parse_narrative(&text);
            if narrative.is_empty() {
                warn!("report text had no labelled lines, using fallback report");
                return fallback_report(summary);
            }
            info!(exercise = %summary.exercise, "session report generated");
            assemble(summary, narrative, ReportSource::Generated)
        }
        Err(e) => {
            warn!(generator = generator.name(), "report generation failed, using fallback: {e}");
            fallback_report(summary)
        }
    }
}

pub fn render_markdown(report: &SessionReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {} Session Report", report.exercise.display_name());
    let _ = writeln!(output);
    let _ = writeln!(output, "{}", report.summary);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Totals");
    let _ = writeln!(output, "- Reps: {}", report.total_reps);
    let _ = writeln!(output, "- Sets: {}", report.total_sets);
    let _ = writeln!(output, "- Form warnings: {}", report.total_warnings);
    let _ = writeln!(output, "- Duration: {}", format_duration(report.duration));
    if let Some(category) = &report.dominant_warning {
        let _ = writeln!(output, "- Most frequent warning: {category}");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Coaching Notes");
    let _ = writeln!(output, "- Strength: {}", report.strength);
    let _ = writeln!(output, "- Improve: {}", report.improvement_area);
    let _ = writeln!(output, "- Tip: {}", report.tip);

    if report.source == ReportSource::Fallback {
        let _ = writeln!(output);
        let _ = writeln!(output, "_Coach notes generated offline._");
    }

    output
}
