//! Repository for the `scenarios` table.

use chrono::NaiveTime;
use signage_core::record::NewScenarioRecord;
use signage_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::scenario::ScenarioRow;

/// Column list for `scenarios` queries.
const COLUMNS: &str = "id, title, handler, handler_options, priority, \
    date_start, date_end, week_days, hour_start, hour_end, \
    display_limit, display_count, display_date_last, display_timeout_ms";

/// Eligibility predicate; `$1` = instant, `$2` = local weekday (0 = Sunday),
/// `$3` = local time of day. The hour window is half-open and wraps past
/// midnight when `hour_start > hour_end`.
const ELIGIBLE: &str = "(date_start IS NULL OR date_start <= $1) \
    AND (date_end IS NULL OR date_end >= $1) \
    AND (display_limit IS NULL OR display_count < display_limit) \
    AND (week_days IS NULL OR $2 = ANY(week_days)) \
    AND CASE \
        WHEN hour_start IS NOT NULL AND hour_end IS NOT NULL AND hour_start > hour_end \
            THEN $3 >= hour_start OR $3 < hour_end \
        ELSE (hour_start IS NULL OR $3 >= hour_start) AND (hour_end IS NULL OR $3 < hour_end) \
    END";

/// Provides read/write operations for scenarios.
pub struct ScenarioRepo;

impl ScenarioRepo {
    /// The eligible scenario with the highest priority, then the lowest
    /// display count. Remaining ties are broken with `random()`.
    pub async fn find_best_candidate(
        pool: &PgPool,
        instant: Timestamp,
        weekday: i16,
        time_of_day: NaiveTime,
    ) -> Result<Option<ScenarioRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenarios WHERE {ELIGIBLE} \
             ORDER BY priority DESC, display_count ASC, random() \
             LIMIT 1"
        );
        sqlx::query_as::<_, ScenarioRow>(&query)
            .bind(instant)
            .bind(weekday)
            .bind(time_of_day)
            .fetch_optional(pool)
            .await
    }

    /// Find a scenario by its internal id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ScenarioRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenarios WHERE id = $1");
        sqlx::query_as::<_, ScenarioRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a new scenario, returning the generated id.
    pub async fn create(pool: &PgPool, input: &NewScenarioRecord) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO scenarios \
                (title, handler, handler_options, priority, date_start, date_end, \
                 week_days, hour_start, hour_end, display_limit, display_timeout_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id",
        )
        .bind(&input.title)
        .bind(&input.handler)
        .bind(&input.handler_options)
        .bind(input.priority)
        .bind(input.date_start)
        .bind(input.date_end)
        .bind(&input.week_days)
        .bind(input.hour_start)
        .bind(input.hour_end)
        .bind(input.display_limit)
        .bind(input.display_timeout_ms)
        .fetch_one(pool)
        .await
    }

    /// Increment the display counter and stamp the last display date.
    ///
    /// Returns `true` if a row was updated.
    pub async fn mark_displayed(pool: &PgPool, id: DbId, at: Timestamp) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scenarios \
             SET display_count = display_count + 1, \
                 display_date_last = $2, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
