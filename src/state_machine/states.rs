use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-file load status on an incoming fileset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    /// File has not arrived for this fileset yet
    Notloaded,
    /// File has arrived and its records were ingested
    Loaded,
}

/// Aggregate status of an incoming fileset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilesetStatus {
    /// At least one file has arrived; records may still be in flight
    Loaded,
    /// All three files present and every record has settled
    Completed,
    /// Purged by the retention sweep
    Deleted,
}

/// Processing status of one source record (any of the three kinds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentStatus {
    /// Ingested, not yet validated
    Loaded,
    /// Validation produced at least one ERROR-severity issue
    Error,
    /// Written downstream with WARNING-severity issues attached
    Warning,
    /// Validated clean and written downstream
    Verified,
    /// Previously verified course row invalidated by a later file reload
    UpdateCrs,
}

/// Saga execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// Created, entry step not yet confirmed
    Started,
    /// At least one step has completed
    InProgress,
    /// Terminal transition reached
    Completed,
}

/// The three source record kinds of a fileset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Demographic,
    Course,
    Assessment,
}

impl StudentStatus {
    /// Still in the pipeline: keeps its fileset from completing
    pub fn is_unsettled(&self) -> bool {
        matches!(self, Self::Loaded | Self::UpdateCrs)
    }

    /// Has left the pipeline with a final processing outcome
    pub fn is_settled(&self) -> bool {
        !self.is_unsettled()
    }
}

impl SagaStatus {
    /// Counts against the global concurrency cap
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl FilesetStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Deleted)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notloaded => write!(f, "NOTLOADED"),
            Self::Loaded => write!(f, "LOADED"),
        }
    }
}

impl fmt::Display for FilesetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "LOADED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Deleted => write!(f, "DELETED"),
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "LOADED"),
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
            Self::Verified => write!(f, "VERIFIED"),
            Self::UpdateCrs => write!(f, "UPDATE_CRS"),
        }
    }
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "STARTED"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demographic => write!(f, "DEMOGRAPHIC"),
            Self::Course => write!(f, "COURSE"),
            Self::Assessment => write!(f, "ASSESSMENT"),
        }
    }
}

impl std::str::FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOTLOADED" => Ok(Self::Notloaded),
            "LOADED" => Ok(Self::Loaded),
            _ => Err(format!("Invalid file status: {s}")),
        }
    }
}

impl std::str::FromStr for FilesetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOADED" => Ok(Self::Loaded),
            "COMPLETED" => Ok(Self::Completed),
            "DELETED" => Ok(Self::Deleted),
            _ => Err(format!("Invalid fileset status: {s}")),
        }
    }
}

impl std::str::FromStr for StudentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOADED" => Ok(Self::Loaded),
            "ERROR" => Ok(Self::Error),
            "WARNING" => Ok(Self::Warning),
            "VERIFIED" => Ok(Self::Verified),
            "UPDATE_CRS" => Ok(Self::UpdateCrs),
            _ => Err(format!("Invalid student status: {s}")),
        }
    }
}

impl std::str::FromStr for SagaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(Self::Started),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(format!("Invalid saga status: {s}")),
        }
    }
}

/// Default status for a fileset the moment its first file arrives
impl Default for FilesetStatus {
    fn default() -> Self {
        Self::Loaded
    }
}

/// Default status for a freshly ingested record
impl Default for StudentStatus {
    fn default() -> Self {
        Self::Loaded
    }
}

impl Default for FileStatus {
    fn default() -> Self {
        Self::Notloaded
    }
}
