//! # Source Record Models
//!
//! One struct per fixed-format record kind. Each row belongs to exactly one
//! fileset, carries the student's PEN for cross-file correlation, and is
//! mutated only by orchestrator step handlers after ingestion.

use crate::state_machine::StudentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    /// Blocks the downstream write; record settles as ERROR
    Error,
    /// Annotates the record; downstream write still happens
    Warning,
}

/// One field-level finding from the validation rule engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub issue_code: String,
    pub field_code: String,
    pub severity: IssueSeverity,
}

impl ValidationIssue {
    pub fn error(issue_code: impl Into<String>, field_code: impl Into<String>) -> Self {
        Self {
            issue_code: issue_code.into(),
            field_code: field_code.into(),
            severity: IssueSeverity::Error,
        }
    }

    pub fn warning(issue_code: impl Into<String>, field_code: impl Into<String>) -> Self {
        Self {
            issue_code: issue_code.into(),
            field_code: field_code.into(),
            severity: IssueSeverity::Warning,
        }
    }
}

/// Demographic (DEM) file record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemographicStudent {
    pub demographic_student_id: Uuid,
    pub fileset_id: Uuid,
    pub pen: String,
    pub local_id: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    /// CCYYMMDD as submitted
    pub birthdate: Option<String>,
    pub gender: Option<String>,
    pub grade_code: Option<String>,
    pub citizenship: Option<String>,
    pub student_status: StudentStatus,
    pub validation_issues: Vec<ValidationIssue>,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

/// Course (CRS) file record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseStudent {
    pub course_student_id: Uuid,
    pub fileset_id: Uuid,
    pub pen: String,
    pub local_id: Option<String>,
    pub course_code: Option<String>,
    pub course_level: Option<String>,
    /// CCYYMM session the course was taken in
    pub course_session: Option<String>,
    pub final_grade: Option<String>,
    pub credits: Option<String>,
    pub student_status: StudentStatus,
    pub validation_issues: Vec<ValidationIssue>,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

/// Assessment (XAM) file record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentStudent {
    pub assessment_student_id: Uuid,
    pub fileset_id: Uuid,
    pub pen: String,
    pub local_id: Option<String>,
    pub assessment_code: Option<String>,
    /// CCYYMM session the assessment is registered for
    pub session_date: Option<String>,
    pub student_status: StudentStatus,
    pub validation_issues: Vec<ValidationIssue>,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl DemographicStudent {
    pub fn new(fileset_id: Uuid, pen: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            demographic_student_id: Uuid::new_v4(),
            fileset_id,
            pen: pen.into(),
            local_id: None,
            last_name: None,
            first_name: None,
            birthdate: None,
            gender: None,
            grade_code: None,
            citizenship: None,
            student_status: StudentStatus::Loaded,
            validation_issues: Vec::new(),
            create_date: now,
            update_date: now,
        }
    }

    pub fn has_error_issues(&self) -> bool {
        has_error_issues(&self.validation_issues)
    }

    pub fn has_warning_issues(&self) -> bool {
        has_warning_issues(&self.validation_issues)
    }
}

impl CourseStudent {
    pub fn new(fileset_id: Uuid, pen: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            course_student_id: Uuid::new_v4(),
            fileset_id,
            pen: pen.into(),
            local_id: None,
            course_code: None,
            course_level: None,
            course_session: None,
            final_grade: None,
            credits: None,
            student_status: StudentStatus::Loaded,
            validation_issues: Vec::new(),
            create_date: now,
            update_date: now,
        }
    }

    pub fn has_error_issues(&self) -> bool {
        has_error_issues(&self.validation_issues)
    }

    pub fn has_warning_issues(&self) -> bool {
        has_warning_issues(&self.validation_issues)
    }
}

impl AssessmentStudent {
    pub fn new(fileset_id: Uuid, pen: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            assessment_student_id: Uuid::new_v4(),
            fileset_id,
            pen: pen.into(),
            local_id: None,
            assessment_code: None,
            session_date: None,
            student_status: StudentStatus::Loaded,
            validation_issues: Vec::new(),
            create_date: now,
            update_date: now,
        }
    }

    pub fn has_error_issues(&self) -> bool {
        has_error_issues(&self.validation_issues)
    }

    pub fn has_warning_issues(&self) -> bool {
        has_warning_issues(&self.validation_issues)
    }
}

fn has_error_issues(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == IssueSeverity::Error)
}

fn has_warning_issues(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == IssueSeverity::Warning)
}
