/// All database primary keys except job ids are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Jobs are identified by a 128-bit opaque id, minted at admission.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
