use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use crate::config::CoachConfig;
use crate::generator::{GroqGenerator, ScriptedGenerator, TextGenerator};
use crate::models::{ExerciseType, Priority};
use crate::session::WorkoutSession;
use crate::speech::ConsoleSpeaker;

mod angles;
mod coach;
mod config;
mod db;
mod error;
mod generator;
mod machine;
mod models;
mod posture;
mod prompts;
mod replay;
mod report;
mod scheduler;
mod session;
mod speech;

#[derive(Parser)]
#[command(name = "form-coach")]
#[command(about = "Real-time exercise form coaching from joint-angle streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Replay a recorded angle capture through the coach
    Replay {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        exercise: ExerciseType,
        #[arg(long, default_value_t = 10)]
        reps: u32,
        #[arg(long, default_value_t = 3)]
        sets: u32,
        /// Playback speed relative to capture time; 0 disables pacing
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Use built-in coaching lines instead of the hosted model
        #[arg(long)]
        offline: bool,
        /// Coach form on warm-up reps until three clean reps in a row, then start counting
        #[arg(long)]
        warmup: bool,
        /// Skip writing the workout to the database
        #[arg(long)]
        no_log: bool,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List recently logged workouts
    History {
        #[arg(long, default_value_t = 5)]
        limit: i64,
        #[arg(long)]
        exercise: Option<ExerciseType>,
    },
    /// Daily totals and exercise mix
    Stats {
        #[arg(long, default_value_t = 7)]
        since_days: i64,
    },
    /// Lifetime totals and the current day streak
    Summary,
    /// Remove one logged workout
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// Remove every logged workout
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

struct ReplayArgs {
    csv: PathBuf,
    exercise: ExerciseType,
    reps: u32,
    sets: u32,
    speed: f64,
    offline: bool,
    warmup: bool,
    no_log: bool,
    out: Option<PathBuf>,
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "form_coach=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Replay {
            csv,
            exercise,
            reps,
            sets,
            speed,
            offline,
            warmup,
            no_log,
            out,
            json,
        } => {
            run_replay(ReplayArgs {
                csv,
                exercise,
                reps,
                sets,
                speed,
                offline,
                warmup,
                no_log,
                out,
                json,
            })
            .await?;
        }
        Commands::History { limit, exercise } => {
            let pool = connect().await?;
            let workouts = db::fetch_recent_workouts(&pool, limit, exercise).await?;

            if workouts.is_empty() {
                println!("No workouts logged yet.");
                return Ok(());
            }

            println!("Recent workouts:");
            for workout in workouts {
                println!(
                    "- {} {}: {} x {} reps, {} warnings, {}s",
                    workout.completed_at.format("%Y-%m-%d %H:%M"),
                    workout.exercise_type,
                    workout.sets,
                    workout.reps,
                    workout.warnings,
                    workout.duration_seconds
                );
            }
        }
        Commands::Stats { since_days } => {
            let pool = connect().await?;
            let today = Utc::now().date_naive();
            let since_date = db::cutoff_date(since_days - 1, today);
            let stats = db::fetch_daily_stats(&pool, since_date).await?;
            let distribution = db::fetch_exercise_distribution(&pool).await?;

            println!("Workouts since {since_date}:");
            for day in db::fill_days(&stats, since_date, today) {
                println!(
                    "- {}: {} workouts, {} reps",
                    day.day, day.workout_count, day.total_reps
                );
            }

            if distribution.is_empty() {
                println!("No workouts logged yet.");
            } else {
                println!("Exercise mix:");
                for entry in distribution {
                    println!("- {}: {}", entry.exercise_type, entry.count);
                }
            }
        }
        Commands::Summary => {
            let pool = connect().await?;
            let summary = db::fetch_user_summary(&pool, Utc::now().date_naive()).await?;
            println!("Workouts logged: {}", summary.total_workouts);
            println!("Total reps: {}", summary.total_reps);
            println!("Current streak: {} days", summary.streak_days);
        }
        Commands::Delete { id } => {
            let pool = connect().await?;
            if db::delete_workout(&pool, id).await? {
                println!("Deleted workout {id}.");
            } else {
                println!("No workout with id {id}.");
            }
        }
        Commands::Clear { yes } => {
            if !yes && !prompt_clear()? {
                println!("Nothing deleted.");
                return Ok(());
            }
            let pool = connect().await?;
            let removed = db::clear_workouts(&pool).await?;
            println!("Deleted {removed} workouts.");
        }
    }

    Ok(())
}

fn clear_confirmed(answer: &str) -> bool {
    answer.trim() == "DELETE"
}

fn prompt_clear() -> anyhow::Result<bool> {
    print!("This removes every logged workout. Type DELETE to continue: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(clear_confirmed(&answer))
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn pick_generator(config: &CoachConfig, offline: bool) -> anyhow::Result<Arc<dyn TextGenerator>> {
    if offline {
        return Ok(Arc::new(ScriptedGenerator::new()));
    }
    if config.api_key.is_none() {
        warn!("GROQ_API_KEY not set, using built-in coaching lines");
        return Ok(Arc::new(ScriptedGenerator::new()));
    }
    Ok(Arc::new(GroqGenerator::from_config(config)?))
}

async fn run_replay(args: ReplayArgs) -> anyhow::Result<()> {
    let config = CoachConfig::from_env()?;
    let samples = replay::load_samples(&args.csv)?;
    let generator = pick_generator(&config, args.offline)?;
    let speaker = Arc::new(ConsoleSpeaker::spawn());

    let mut session = WorkoutSession::start(
        args.exercise,
        args.reps,
        args.sets,
        &config,
        generator,
        speaker.clone(),
    )?;
    if args.warmup {
        session.begin_posture_check();
        println!(
            "Posture check: {} clean reps in a row start the workout.",
            posture::READY_STREAK
        );
    }
    println!(
        "Session {} started: {} {} x {} from {} samples.",
        session.id(),
        args.exercise.display_name(),
        args.sets,
        args.reps,
        samples.len()
    );

    let stats = replay::replay(&mut session, &samples, args.speed).await;
    session.settle_feedback(config.generator_timeout).await;

    if let Some(status) = session.posture_status() {
        println!(
            "Posture check not passed: clean streak {}/{} after {} samples.",
            status.clean_streak,
            posture::READY_STREAK,
            stats.warmup_samples
        );
    } else if !stats.completed {
        let machine = session.machine();
        println!(
            "Capture ended at set {} rep {}.",
            machine.current_set() + 1,
            machine.current_rep()
        );
    }
    info!(
        samples = stats.samples,
        events = stats.events,
        completed = stats.completed,
        "replay finished"
    );
    for priority in Priority::ALL {
        info!(
            priority = %priority,
            requests = session.scheduler().emitted(priority),
            "coaching requests"
        );
    }

    let outcome = session.finish().await;
    speaker.wait_idle(Duration::from_secs(30)).await;

    let markdown = report::render_markdown(&outcome.report);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        println!("{markdown}");
    }
    if let Some(out) = &args.out {
        std::fs::write(out, &markdown)
            .with_context(|| format!("failed to write report to {}", out.display()))?;
        println!("Report written to {}.", out.display());
    }

    if args.no_log {
        return Ok(());
    }
    if std::env::var("DATABASE_URL").is_err() {
        warn!("DATABASE_URL not set, workout not logged");
        return Ok(());
    }
    let pool = connect().await?;
    let id = db::log_workout(&pool, &outcome.record).await?;
    println!("Workout logged ({id}).");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_needs_the_exact_word() {
        assert!(clear_confirmed("DELETE\n"));
        assert!(clear_confirmed("  DELETE "));
        assert!(!clear_confirmed("delete"));
        assert!(!clear_confirmed("y"));
        assert!(!clear_confirmed(""));
    }

    #[test]
    fn replay_flags_parse() {
        let cli = Cli::try_parse_from([
            "form-coach",
            "replay",
            "--csv",
            "data/curl_demo.csv",
            "--exercise",
            "hammer-curl",
            "--warmup",
            "--speed",
            "0",
        ])
        .unwrap();
        match cli.command {
            Commands::Replay {
                exercise,
                warmup,
                reps,
                speed,
                ..
            } => {
                assert_eq!(exercise, ExerciseType::HammerCurl);
                assert!(warmup);
                assert_eq!(reps, 10);
                assert_eq!(speed, 0.0);
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn delete_requires_a_valid_id() {
        assert!(Cli::try_parse_from(["form-coach", "delete", "--id", "not-a-uuid"]).is_err());
    }
}
