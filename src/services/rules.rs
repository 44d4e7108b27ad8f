//! # Validation Rule Engine Seam
//!
//! `validate` is a pure function over a record and its context: no side
//! effects, safely re-callable on replay. The full domain rule catalog lives
//! outside this crate; [`BaselineValidationRules`] ships only the structural
//! checks every submission must pass regardless of collection year.

use crate::models::{AssessmentStudent, CourseStudent, DemographicStudent, ValidationIssue};
use crate::services::school_cache::School;

/// Borrowed view over any of the three record kinds
#[derive(Debug, Clone, Copy)]
pub enum RecordView<'a> {
    Demographic(&'a DemographicStudent),
    Course(&'a CourseStudent),
    Assessment(&'a AssessmentStudent),
}

impl RecordView<'_> {
    pub fn pen(&self) -> &str {
        match self {
            Self::Demographic(r) => &r.pen,
            Self::Course(r) => &r.pen,
            Self::Assessment(r) => &r.pen,
        }
    }

    pub fn local_id(&self) -> Option<&str> {
        match self {
            Self::Demographic(r) => r.local_id.as_deref(),
            Self::Course(r) => r.local_id.as_deref(),
            Self::Assessment(r) => r.local_id.as_deref(),
        }
    }
}

/// Reference data resolved before validation runs
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// School the fileset was submitted for, if known to the reference cache
    pub school: Option<School>,
}

/// Pure rule engine: `(record, context) -> [issue]`
pub trait ValidationRules: Send + Sync {
    fn validate(&self, record: RecordView<'_>, context: &ValidationContext)
        -> Vec<ValidationIssue>;
}

/// Structural checks shared by all collections
#[derive(Debug, Default)]
pub struct BaselineValidationRules;

impl BaselineValidationRules {
    pub fn new() -> Self {
        Self
    }
}

impl ValidationRules for BaselineValidationRules {
    fn validate(
        &self,
        record: RecordView<'_>,
        context: &ValidationContext,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let pen = record.pen();
        if pen.len() != 9 || !pen.chars().all(|c| c.is_ascii_digit()) {
            issues.push(ValidationIssue::error("PEN_INVALID", "PEN"));
        }

        if context.school.is_none() {
            issues.push(ValidationIssue::error("SCHOOL_UNKNOWN", "SCHOOL_ID"));
        }

        if record.local_id().map_or(true, str::is_empty) {
            issues.push(ValidationIssue::warning("LOCAL_ID_BLANK", "LOCAL_ID"));
        }

        match record {
            RecordView::Demographic(dem) => {
                if dem.last_name.as_deref().map_or(true, str::is_empty) {
                    issues.push(ValidationIssue::error("SURNAME_BLANK", "LAST_NAME"));
                }
                if let Some(birthdate) = dem.birthdate.as_deref() {
                    if birthdate.len() != 8 || !birthdate.chars().all(|c| c.is_ascii_digit()) {
                        issues.push(ValidationIssue::error("BIRTHDATE_INVALID", "BIRTHDATE"));
                    }
                } else {
                    issues.push(ValidationIssue::error("BIRTHDATE_BLANK", "BIRTHDATE"));
                }
            }
            RecordView::Course(crs) => {
                if crs.course_code.as_deref().map_or(true, str::is_empty) {
                    issues.push(ValidationIssue::error("COURSE_CODE_BLANK", "COURSE_CODE"));
                }
                if let Some(session) = crs.course_session.as_deref() {
                    if session.len() != 6 || !session.chars().all(|c| c.is_ascii_digit()) {
                        issues.push(ValidationIssue::error(
                            "COURSE_SESSION_INVALID",
                            "COURSE_SESSION",
                        ));
                    }
                }
            }
            RecordView::Assessment(xam) => {
                if xam.assessment_code.as_deref().map_or(true, str::is_empty) {
                    issues.push(ValidationIssue::error(
                        "ASSESSMENT_CODE_BLANK",
                        "ASSESSMENT_CODE",
                    ));
                }
            }
        }

        issues
    }
}
