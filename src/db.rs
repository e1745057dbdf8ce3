use chrono::{Duration as ChronoDuration, NaiveDate};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    DailyStat, ExerciseCount, ExerciseType, UserSummary, WorkoutHistoryRow, WorkoutRecord,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn log_workout(pool: &PgPool, record: &WorkoutRecord) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO form_coach.workouts
        (id, exercise_type, sets, reps, total_reps, warnings, duration_seconds, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(record.id)
    .bind(record.exercise.as_str())
    .bind(record.sets)
    .bind(record.reps)
    .bind(record.total_reps)
    .bind(record.warnings)
    .bind(record.duration_seconds)
    .bind(record.completed_at)
    .fetch_optional(pool)
    .await?
    .map(|row| row.get("id"))
    .unwrap_or(record.id);

    Ok(id)
}

pub async fn fetch_recent_workouts(
    pool: &PgPool,
    limit: i64,
    exercise: Option<ExerciseType>,
) -> anyhow::Result<Vec<WorkoutHistoryRow>> {
    let mut query = String::from(
        "SELECT exercise_type, sets, reps, warnings, duration_seconds, completed_at \
         FROM form_coach.workouts",
    );
    if exercise.is_some() {
        query.push_str(" WHERE exercise_type = $2");
    }
    query.push_str(" ORDER BY completed_at DESC LIMIT $1");

    let mut rows = sqlx::query(&query).bind(limit);
    if let Some(value) = exercise {
        rows = rows.bind(value.as_str());
    }

    let records = rows.fetch_all(pool).await?;
    let mut workouts = Vec::with_capacity(records.len());

    for row in records {
        workouts.push(WorkoutHistoryRow {
            exercise_type: row.get("exercise_type"),
            sets: row.get("sets"),
            reps: row.get("reps"),
            warnings: row.get("warnings"),
            duration_seconds: row.get("duration_seconds"),
            completed_at: row.get("completed_at"),
        });
    }

    Ok(workouts)
}

pub async fn fetch_daily_stats(pool: &PgPool, since_date: NaiveDate) -> anyhow::Result<Vec<DailyStat>> {
    let records = sqlx::query(
        r#"
        SELECT (completed_at AT TIME ZONE 'UTC')::date AS day,
               COUNT(*) AS workout_count,
               COALESCE(SUM(total_reps), 0)::BIGINT AS total_reps
        FROM form_coach.workouts
        WHERE (completed_at AT TIME ZONE 'UTC')::date >= $1
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(since_date)
    .fetch_all(pool)
    .await?;

    Ok(records
        .into_iter()
        .map(|row| DailyStat {
            day: row.get("day"),
            workout_count: row.get("workout_count"),
            total_reps: row.get("total_reps"),
        })
        .collect())
}

pub async fn fetch_exercise_distribution(pool: &PgPool) -> anyhow::Result<Vec<ExerciseCount>> {
    let records = sqlx::query(
        r#"
        SELECT exercise_type, COUNT(*) AS count
        FROM form_coach.workouts
        GROUP BY exercise_type
        ORDER BY count DESC, exercise_type
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(records
        .into_iter()
        .map(|row| ExerciseCount {
            exercise_type: row.get("exercise_type"),
            count: row.get("count"),
        })
        .collect())
}

pub async fn fetch_user_summary(pool: &PgPool, today: NaiveDate) -> anyhow::Result<UserSummary> {
    let totals = sqlx::query(
        r#"
        SELECT COUNT(*) AS total_workouts,
               COALESCE(SUM(total_reps), 0)::BIGINT AS total_reps
        FROM form_coach.workouts
        "#,
    )
    .fetch_one(pool)
    .await?;

    let days: Vec<NaiveDate> = sqlx::query(
        r#"
        SELECT DISTINCT (completed_at AT TIME ZONE 'UTC')::date AS day
        FROM form_coach.workouts
        ORDER BY day DESC
        "#,
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| row.get("day"))
    .collect();

    Ok(UserSummary {
        total_workouts: totals.get("total_workouts"),
        total_reps: totals.get("total_reps"),
        streak_days: streak_days(&days, today),
    })
}

/// Returns false when no workout had that id.
pub async fn delete_workout(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM form_coach.workouts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn clear_workouts(pool: &PgPool) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM form_coach.workouts")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Consecutive workout days counting back from `today`; zero when today has
/// no workout.
pub fn streak_days(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut expected = today;
    while days.contains(&expected) {
        streak += 1;
        expected -= ChronoDuration::days(1);
    }
    streak
}

/// One entry per day from `since_date` through `today`, zero-filled where
/// nothing was logged.
pub fn fill_days(stats: &[DailyStat], since_date: NaiveDate, today: NaiveDate) -> Vec<DailyStat> {
    let mut days = Vec::new();
    let mut day = since_date;
    while day <= today {
        let logged = stats.iter().find(|stat| stat.day == day);
        days.push(DailyStat {
            day,
            workout_count: logged.map_or(0, |stat| stat.workout_count),
            total_reps: logged.map_or(0, |stat| stat.total_reps),
        });
        day += ChronoDuration::days(1);
    }
    days
}

pub fn cutoff_date(since_days: i64, today: NaiveDate) -> NaiveDate {
    today - ChronoDuration::days(since_days.max(0))
}
