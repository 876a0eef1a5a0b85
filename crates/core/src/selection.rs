//! Scenario eligibility and ranking (the "what plays next" policy).
//!
//! Pure functions shared by every [`ScenarioStore`](crate::store::ScenarioStore)
//! implementation that ranks in process. The PostgreSQL store expresses the
//! same predicate in SQL.
//!
//! A record is eligible at `now` when all of its set bounds hold:
//! start date <= now <= end date, display count below the limit, the local
//! weekday in the weekday set, and the local time of day inside the hour
//! window. Eligible records rank by highest priority, then lowest display
//! count. Remaining ties are broken at random.

use chrono::{Datelike, NaiveTime, Utc};
use rand::seq::IndexedRandom;

use crate::record::ScenarioRecord;
use crate::types::LocalTimestamp;

/// Weekday index of `now` in the local offset, 0 = Sunday.
pub fn weekday_index(now: &LocalTimestamp) -> i16 {
    now.weekday().num_days_from_sunday() as i16
}

/// Whether `time` falls inside the half-open window `[start, end)`.
///
/// A window whose start is after its end wraps past midnight. A missing
/// bound leaves that side open.
pub fn within_hours(start: Option<NaiveTime>, end: Option<NaiveTime>, time: NaiveTime) -> bool {
    match (start, end) {
        (None, None) => true,
        (Some(start), None) => time >= start,
        (None, Some(end)) => time < end,
        (Some(start), Some(end)) if start <= end => time >= start && time < end,
        (Some(start), Some(end)) => time >= start || time < end,
    }
}

/// Whether a record may be selected at `now`.
pub fn is_eligible(record: &ScenarioRecord, now: &LocalTimestamp) -> bool {
    let instant = now.with_timezone(&Utc);

    if record.date_start.is_some_and(|start| start > instant) {
        return false;
    }
    if record.date_end.is_some_and(|end| end < instant) {
        return false;
    }
    if record
        .display_limit
        .is_some_and(|limit| record.display_count >= limit)
    {
        return false;
    }
    if let Some(days) = &record.week_days {
        if !days.contains(&weekday_index(now)) {
            return false;
        }
    }

    within_hours(record.hour_start, record.hour_end, now.time())
}

/// Eligible records sharing the best rank (max priority, then min display
/// count). Empty when nothing is eligible.
pub fn top_ranked<'a, I>(records: I, now: &LocalTimestamp) -> Vec<&'a ScenarioRecord>
where
    I: IntoIterator<Item = &'a ScenarioRecord>,
{
    let mut best: Vec<&ScenarioRecord> = Vec::new();

    for record in records.into_iter().filter(|r| is_eligible(r, now)) {
        match best.first() {
            None => best.push(record),
            Some(leader) => {
                let rank = (record.priority, -record.display_count);
                let leader_rank = (leader.priority, -leader.display_count);
                if rank > leader_rank {
                    best.clear();
                    best.push(record);
                } else if rank == leader_rank {
                    best.push(record);
                }
            }
        }
    }

    best
}

/// Pick the best candidate, choosing at random among equally ranked ones.
pub fn best_candidate<'a, I>(records: I, now: &LocalTimestamp) -> Option<&'a ScenarioRecord>
where
    I: IntoIterator<Item = &'a ScenarioRecord>,
{
    top_ranked(records, now).choose(&mut rand::rng()).copied()
}
