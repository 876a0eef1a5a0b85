/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Wall-clock time of the display network, used for weekday and hour windows.
pub type LocalTimestamp = chrono::DateTime<chrono::FixedOffset>;
