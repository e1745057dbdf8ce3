use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{AngleSample, Reading};
use crate::posture;
use crate::session::WorkoutSession;

#[derive(Debug, Deserialize)]
struct SampleRow {
    seconds: f64,
    angle: f64,
    left_angle: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub samples: usize,
    /// Samples spent in the posture check before the workout began.
    pub warmup_samples: usize,
    pub events: usize,
    pub completed: bool,
}

pub fn load_samples(path: &Path) -> anyhow::Result<Vec<AngleSample>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open capture {}", path.display()))?;
    read_samples(file).with_context(|| format!("failed to read capture {}", path.display()))
}

/// Parses `seconds,angle,left_angle` rows. Rows that step back in time are
/// dropped; a present `left_angle` makes the row a two-arm reading.
pub fn read_samples<R: Read>(reader: R) -> anyhow::Result<Vec<AngleSample>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut samples: Vec<AngleSample> = Vec::new();

    for (index, result) in reader.deserialize::<SampleRow>().enumerate() {
        let row = result.with_context(|| format!("row {}", index + 1))?;
        if !row.seconds.is_finite() || row.seconds < 0.0 {
            bail!("row {}: seconds must be a non-negative number", index + 1);
        }

        let timestamp = Duration::from_secs_f64(row.seconds);
        if samples.last().is_some_and(|last| timestamp < last.timestamp) {
            warn!(row = index + 1, "sample out of order, skipping");
            continue;
        }

        samples.push(match row.left_angle {
            Some(left) => AngleSample::pair(row.angle, left, timestamp),
            None => AngleSample::single(row.angle, timestamp),
        });
    }

    Ok(samples)
}

fn pause_between(previous: Duration, next: Duration, speed: f64) -> Option<Duration> {
    if speed <= 0.0 || !speed.is_finite() {
        return None;
    }
    let gap = next.saturating_sub(previous);
    Duration::try_from_secs_f64(gap.as_secs_f64() / speed)
        .ok()
        .filter(|pause| !pause.is_zero())
}

fn describe(reading: Reading) -> String {
    match reading {
        Reading::Single(angle) => format!("{angle:.0}°"),
        Reading::Pair { right, left } => format!("R {right:.0}° / L {left:.0}°"),
    }
}

/// Feeds samples into the session, stopping once the goal is reached.
/// A `speed` of zero or less replays without pauses.
pub async fn replay(session: &mut WorkoutSession, samples: &[AngleSample], speed: f64) -> ReplayStats {
    let mut stats = ReplayStats::default();
    let mut previous: Option<Duration> = None;
    let mut last_warning: Option<String> = None;

    for sample in samples {
        if let Some(pause) = previous.and_then(|prev| pause_between(prev, sample.timestamp, speed)) {
            tokio::time::sleep(pause).await;
        }
        previous = Some(sample.timestamp);
        stats.samples += 1;

        let warming_up = session.in_posture_check();
        let Some(event) = session.ingest(*sample) else {
            break;
        };
        stats.events += 1;

        if event.stage_changed {
            debug!(
                from = %event.from_stage,
                to = %event.to_stage,
                reading = %describe(event.reading),
                "stage changed"
            );
        }

        if event.warning != last_warning {
            if let Some(warning) = &event.warning {
                println!("  ⚠ {warning} ({})", describe(event.reading));
            }
            last_warning = event.warning.clone();
        }

        if warming_up {
            stats.warmup_samples += 1;
            match session.posture_status() {
                None => println!("Posture check passed, the workout starts now."),
                Some(status) if event.rep_completed => println!(
                    "Warm-up rep, clean streak {}/{}",
                    status.clean_streak,
                    posture::READY_STREAK
                ),
                Some(_) => {}
            }
            continue;
        }

        let progress = event.progress;
        if let Some(rep) = event.rep_number {
            println!(
                "Rep {rep}/{} (set {}/{})",
                progress.goal.reps,
                if event.set_completed {
                    progress.current_set
                } else {
                    progress.current_set + 1
                },
                progress.goal.sets
            );
        }
        if event.set_completed {
            println!(
                "Set {}/{} complete, {} warnings so far.",
                progress.current_set, progress.goal.sets, progress.warning_count
            );
        }
        if event.session_completed {
            stats.completed = true;
            break;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CoachConfig;
    use crate::generator::ScriptedGenerator;
    use crate::models::{ExerciseType, Priority};
    use crate::speech::SpeechSink;

    struct Silent;

    impl SpeechSink for Silent {
        fn speak(&self, _text: &str, _priority: Priority) {}
    }

    #[test]
    fn reads_single_and_paired_rows() {
        let data = "seconds,angle,left_angle\n0.0,170,\n0.5,120,\n1.0,90,60\n";
        let samples = read_samples(data.as_bytes()).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].reading, Reading::Single(170.0));
        assert_eq!(samples[1].timestamp, Duration::from_millis(500));
        assert_eq!(
            samples[2].reading,
            Reading::Pair {
                right: 90.0,
                left: 60.0
            }
        );
    }

    #[test]
    fn out_of_order_rows_are_skipped() {
        let data = "seconds,angle,left_angle\n1.0,170,\n0.5,120,\n1.5,80,\n";
        let samples = read_samples(data.as_bytes()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].timestamp, Duration::from_millis(1500));
    }

    #[test]
    fn negative_time_is_rejected() {
        let data = "seconds,angle,left_angle\n-1.0,170,\n";
        assert!(read_samples(data.as_bytes()).is_err());
    }

    #[test]
    fn malformed_row_is_an_error() {
        let data = "seconds,angle,left_angle\n0.0,upright,\n";
        assert!(read_samples(data.as_bytes()).is_err());
    }

    #[test]
    fn pause_scales_with_speed() {
        let from = Duration::from_secs(1);
        let to = Duration::from_secs(3);
        assert_eq!(pause_between(from, to, 2.0), Some(Duration::from_secs(1)));
        assert_eq!(pause_between(from, to, 0.0), None);
        assert_eq!(pause_between(to, to, 1.0), None);
    }

    #[tokio::test]
    async fn warm_up_samples_do_not_count_toward_the_goal() {
        let mut samples = Vec::new();
        let mut t = 0.0;
        for _ in 0..4 {
            for angle in [120.0, 80.0, 120.0, 170.0] {
                samples.push(AngleSample::single(angle, Duration::from_secs_f64(t)));
                t += 0.5;
            }
        }

        let mut session = WorkoutSession::start(
            ExerciseType::Squat,
            1,
            1,
            &CoachConfig::default(),
            Arc::new(ScriptedGenerator::new()),
            Arc::new(Silent),
        )
        .unwrap();
        session.begin_posture_check();

        let stats = replay(&mut session, &samples, 0.0).await;
        assert_eq!(stats.warmup_samples, 12);
        assert!(stats.completed);
        assert_eq!(stats.samples, 16);
        assert_eq!(session.machine().total_reps(), 1);
    }

    #[tokio::test]
    async fn replay_stops_when_goal_is_reached() {
        let mut samples = Vec::new();
        let mut t = 0.0;
        for _ in 0..3 {
            for angle in [170.0, 120.0, 80.0, 120.0] {
                samples.push(AngleSample::single(angle, Duration::from_secs_f64(t)));
                t += 0.5;
            }
        }
        samples.push(AngleSample::single(170.0, Duration::from_secs_f64(t)));

        let mut session = WorkoutSession::start(
            ExerciseType::Squat,
            1,
            2,
            &CoachConfig::default(),
            Arc::new(ScriptedGenerator::new()),
            Arc::new(Silent),
        )
        .unwrap();

        let stats = replay(&mut session, &samples, 0.0).await;
        assert!(stats.completed);
        assert!(session.is_complete());
        // The second lap closes on the sample at index 8.
        assert_eq!(stats.samples, 9);
        assert_eq!(stats.events, 9);
    }
}
