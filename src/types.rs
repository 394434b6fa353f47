//! Core types for aria-pool

use serde::{Deserialize, Serialize};

/// Stable key of a task inside a pool (the database row id)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(pub i64);

impl TaskKey {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskKey {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a category grouping (the database row id)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryKey(pub i64);

impl CategoryKey {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for CategoryKey {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Both keys are stored as plain INTEGER columns
macro_rules! sqlite_i64_key {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Sqlite> for $ty {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $ty {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

sqlite_i64_key!(TaskKey);
sqlite_i64_key!(CategoryKey);

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Never submitted to the engine (or restored from the dustbin)
    Inactive,
    /// Downloading on the engine
    Active,
    /// Queued on the engine
    Waiting,
    /// Paused on the engine
    Paused,
    /// Finished downloading
    Complete,
    /// A remote call failed or the engine reported an error
    Error,
    /// Moved to the dustbin
    Trashed,
}

impl Status {
    /// Convert integer status code to Status enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => Status::Inactive,
            1 => Status::Active,
            2 => Status::Waiting,
            3 => Status::Paused,
            4 => Status::Complete,
            5 => Status::Error,
            6 => Status::Trashed,
            _ => Status::Error, // Unknown codes need a manual restart
        }
    }

    /// Convert Status enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            Status::Inactive => 0,
            Status::Active => 1,
            Status::Waiting => 2,
            Status::Paused => 3,
            Status::Complete => 4,
            Status::Error => 5,
            Status::Trashed => 6,
        }
    }

    /// Map the engine's status vocabulary to a local status
    ///
    /// Returns `None` for strings the engine is not documented to send.
    pub fn from_engine(status: &str) -> Option<Self> {
        match status {
            "active" => Some(Status::Active),
            "waiting" => Some(Status::Waiting),
            "paused" => Some(Status::Paused),
            "complete" => Some(Status::Complete),
            "error" => Some(Status::Error),
            "removed" => Some(Status::Trashed),
            _ => None,
        }
    }

    /// Whether the engine knows about the task and its status is polled
    pub fn is_tracked(&self) -> bool {
        matches!(self, Status::Active | Status::Waiting | Status::Paused)
    }

    /// Lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Inactive => "inactive",
            Status::Active => "active",
            Status::Waiting => "waiting",
            Status::Paused => "paused",
            Status::Complete => "complete",
            Status::Error => "error",
            Status::Trashed => "trashed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of download, selecting how the task is submitted to the engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// HTTP/FTP/magnet URIs
    #[default]
    Plain,
    /// `.torrent` metafile
    BitTorrent,
    /// Metalink document
    Metalink,
}

impl TaskKind {
    /// Convert integer kind code to TaskKind
    pub fn from_i32(kind: i32) -> Option<Self> {
        match kind {
            0 => Some(TaskKind::Plain),
            1 => Some(TaskKind::BitTorrent),
            2 => Some(TaskKind::Metalink),
            _ => None,
        }
    }

    /// Convert TaskKind to integer kind code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskKind::Plain => 0,
            TaskKind::BitTorrent => 1,
            TaskKind::Metalink => 2,
        }
    }
}

/// Identifies one grouping of a pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// Unfinished, not-removed tasks
    Queue,
    /// Completed tasks of one category
    Category(CategoryKey),
    /// Removed tasks
    Dustbin,
}

impl GroupKey {
    /// Whether a task with `status` is listed by this grouping
    pub fn admits(&self, status: Status) -> bool {
        match self {
            GroupKey::Queue => !matches!(status, Status::Complete | Status::Trashed),
            GroupKey::Category(_) => status == Status::Complete,
            GroupKey::Dustbin => status == Status::Trashed,
        }
    }

    /// Grouping a task with `status` and owning `category` belongs in
    pub fn for_status(status: Status, category: CategoryKey) -> Self {
        match status {
            Status::Complete => GroupKey::Category(category),
            Status::Trashed => GroupKey::Dustbin,
            _ => GroupKey::Queue,
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Queue => f.write_str("queue"),
            GroupKey::Category(key) => write!(f, "category:{key}"),
            GroupKey::Dustbin => f.write_str("dustbin"),
        }
    }
}
