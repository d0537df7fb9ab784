/// Studies are keyed by UUID (v7 for new rows, so ids sort by creation time).
pub type StudyId = uuid::Uuid;

/// User ids are issued by the external auth system.
pub type UserId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
