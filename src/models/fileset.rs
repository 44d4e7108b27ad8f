//! # Incoming Fileset Model
//!
//! One row per school submission: the trio of demographic (DEM), course (CRS),
//! and assessment (XAM) files uploaded together for one collection event.
//!
//! Created when the first file arrives; each file flips its own status to
//! LOADED independently, and the aggregate status advances to COMPLETED only
//! once all three files are present and every beneath-record has settled.

use crate::state_machine::{FileStatus, FilesetStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingFileset {
    pub fileset_id: Uuid,
    /// Ministry school code the submission belongs to
    pub school_id: String,
    pub demographic_file_status: FileStatus,
    pub demographic_file_name: Option<String>,
    pub course_file_status: FileStatus,
    pub course_file_name: Option<String>,
    pub assessment_file_status: FileStatus,
    pub assessment_file_name: Option<String>,
    pub fileset_status: FilesetStatus,
    pub create_user: String,
    pub create_date: DateTime<Utc>,
    pub update_user: String,
    pub update_date: DateTime<Utc>,
}

impl IncomingFileset {
    /// Create a fileset shell for a school's first file arrival
    pub fn new(school_id: impl Into<String>, user: impl Into<String>) -> Self {
        let now = Utc::now();
        let user = user.into();
        Self {
            fileset_id: Uuid::new_v4(),
            school_id: school_id.into(),
            demographic_file_status: FileStatus::Notloaded,
            demographic_file_name: None,
            course_file_status: FileStatus::Notloaded,
            course_file_name: None,
            assessment_file_status: FileStatus::Notloaded,
            assessment_file_name: None,
            fileset_status: FilesetStatus::Loaded,
            create_user: user.clone(),
            create_date: now,
            update_user: user,
            update_date: now,
        }
    }

    /// All three files have arrived
    pub fn all_files_loaded(&self) -> bool {
        self.demographic_file_status == FileStatus::Loaded
            && self.course_file_status == FileStatus::Loaded
            && self.assessment_file_status == FileStatus::Loaded
    }

    pub fn touch(&mut self, user: impl Into<String>) {
        self.update_user = user.into();
        self.update_date = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fileset_has_no_files() {
        let fs = IncomingFileset::new("03636018", "TESTER");
        assert!(!fs.all_files_loaded());
        assert_eq!(fs.fileset_status, FilesetStatus::Loaded);
        assert_eq!(fs.demographic_file_status, FileStatus::Notloaded);
    }

    #[test]
    fn test_all_files_loaded() {
        let mut fs = IncomingFileset::new("03636018", "TESTER");
        fs.demographic_file_status = FileStatus::Loaded;
        fs.course_file_status = FileStatus::Loaded;
        assert!(!fs.all_files_loaded());
        fs.assessment_file_status = FileStatus::Loaded;
        assert!(fs.all_files_loaded());
    }
}
