//! # PostgreSQL Store
//!
//! sqlx-backed implementation of both store traits. Statuses are stored as
//! their wire codes and parsed on read; saga entity keys and validation issues
//! ride in JSONB columns. The selection queries use NOT EXISTS guards so the
//! database stays the sole arbiter of scheduler invariants.
//!
//! Schema lives in `migrations/`.

use crate::error::{CollectionError, Result};
use crate::models::{
    AssessmentStudent, CollectionSaga, CourseStudent, DemographicStudent, IncomingFileset,
    SagaEntityKey, SagaEventState, ValidationIssue,
};
use crate::persistence::{CollectionStore, PenCandidate, SagaStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_status<T: std::str::FromStr<Err = String>>(raw: &str, column: &str) -> Result<T> {
    raw.parse()
        .map_err(|e: String| CollectionError::store("row_mapping", format!("{column}: {e}")))
}

fn saga_from_row(row: &PgRow) -> Result<CollectionSaga> {
    let entity: Option<serde_json::Value> = row.try_get("entity")?;
    let entity: Option<SagaEntityKey> = match entity {
        Some(value) => Some(serde_json::from_value(value)?),
        None => None,
    };
    Ok(CollectionSaga {
        saga_id: row.try_get("saga_id")?,
        saga_name: row.try_get("saga_name")?,
        saga_state: row.try_get("saga_state")?,
        status: parse_status(row.try_get::<String, _>("status")?.as_str(), "status")?,
        payload: row.try_get("payload")?,
        entity,
        retry_count: row.try_get("retry_count")?,
        create_user: row.try_get("create_user")?,
        create_date: row.try_get("create_date")?,
        update_date: row.try_get("update_date")?,
    })
}

fn saga_event_from_row(row: &PgRow) -> Result<SagaEventState> {
    Ok(SagaEventState {
        saga_event_id: row.try_get("saga_event_id")?,
        saga_id: row.try_get("saga_id")?,
        event_type: row.try_get("event_type")?,
        event_outcome: parse_status(
            row.try_get::<String, _>("event_outcome")?.as_str(),
            "event_outcome",
        )?,
        event_payload: row.try_get("event_payload")?,
        step_number: row.try_get("step_number")?,
        create_date: row.try_get("create_date")?,
    })
}

fn fileset_from_row(row: &PgRow) -> Result<IncomingFileset> {
    Ok(IncomingFileset {
        fileset_id: row.try_get("fileset_id")?,
        school_id: row.try_get("school_id")?,
        demographic_file_status: parse_status(
            row.try_get::<String, _>("demographic_file_status")?.as_str(),
            "demographic_file_status",
        )?,
        demographic_file_name: row.try_get("demographic_file_name")?,
        course_file_status: parse_status(
            row.try_get::<String, _>("course_file_status")?.as_str(),
            "course_file_status",
        )?,
        course_file_name: row.try_get("course_file_name")?,
        assessment_file_status: parse_status(
            row.try_get::<String, _>("assessment_file_status")?.as_str(),
            "assessment_file_status",
        )?,
        assessment_file_name: row.try_get("assessment_file_name")?,
        fileset_status: parse_status(
            row.try_get::<String, _>("fileset_status")?.as_str(),
            "fileset_status",
        )?,
        create_user: row.try_get("create_user")?,
        create_date: row.try_get("create_date")?,
        update_user: row.try_get("update_user")?,
        update_date: row.try_get("update_date")?,
    })
}

fn issues_from_row(row: &PgRow) -> Result<Vec<ValidationIssue>> {
    let value: serde_json::Value = row.try_get("validation_issues")?;
    Ok(serde_json::from_value(value)?)
}

fn demographic_from_row(row: &PgRow) -> Result<DemographicStudent> {
    Ok(DemographicStudent {
        demographic_student_id: row.try_get("demographic_student_id")?,
        fileset_id: row.try_get("fileset_id")?,
        pen: row.try_get("pen")?,
        local_id: row.try_get("local_id")?,
        last_name: row.try_get("last_name")?,
        first_name: row.try_get("first_name")?,
        birthdate: row.try_get("birthdate")?,
        gender: row.try_get("gender")?,
        grade_code: row.try_get("grade_code")?,
        citizenship: row.try_get("citizenship")?,
        student_status: parse_status(
            row.try_get::<String, _>("student_status")?.as_str(),
            "student_status",
        )?,
        validation_issues: issues_from_row(row)?,
        create_date: row.try_get("create_date")?,
        update_date: row.try_get("update_date")?,
    })
}

fn course_from_row(row: &PgRow) -> Result<CourseStudent> {
    Ok(CourseStudent {
        course_student_id: row.try_get("course_student_id")?,
        fileset_id: row.try_get("fileset_id")?,
        pen: row.try_get("pen")?,
        local_id: row.try_get("local_id")?,
        course_code: row.try_get("course_code")?,
        course_level: row.try_get("course_level")?,
        course_session: row.try_get("course_session")?,
        final_grade: row.try_get("final_grade")?,
        credits: row.try_get("credits")?,
        student_status: parse_status(
            row.try_get::<String, _>("student_status")?.as_str(),
            "student_status",
        )?,
        validation_issues: issues_from_row(row)?,
        create_date: row.try_get("create_date")?,
        update_date: row.try_get("update_date")?,
    })
}

fn assessment_from_row(row: &PgRow) -> Result<AssessmentStudent> {
    Ok(AssessmentStudent {
        assessment_student_id: row.try_get("assessment_student_id")?,
        fileset_id: row.try_get("fileset_id")?,
        pen: row.try_get("pen")?,
        local_id: row.try_get("local_id")?,
        assessment_code: row.try_get("assessment_code")?,
        session_date: row.try_get("session_date")?,
        student_status: parse_status(
            row.try_get::<String, _>("student_status")?.as_str(),
            "student_status",
        )?,
        validation_issues: issues_from_row(row)?,
        create_date: row.try_get("create_date")?,
        update_date: row.try_get("update_date")?,
    })
}

#[async_trait]
impl SagaStore for PgStore {
    async fn insert_saga(&self, saga: CollectionSaga) -> Result<CollectionSaga> {
        let entity = saga
            .entity
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT INTO collection_saga
                (saga_id, saga_name, saga_state, status, payload, entity, retry_count,
                 create_user, create_date, update_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(saga.saga_id)
        .bind(&saga.saga_name)
        .bind(&saga.saga_state)
        .bind(saga.status.to_string())
        .bind(&saga.payload)
        .bind(entity)
        .bind(saga.retry_count)
        .bind(&saga.create_user)
        .bind(saga.create_date)
        .bind(saga.update_date)
        .execute(&self.pool)
        .await?;
        Ok(saga)
    }

    async fn save_saga(&self, saga: &CollectionSaga) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE collection_saga
            SET saga_state = $2, status = $3, payload = $4, retry_count = $5, update_date = $6
            WHERE saga_id = $1
            "#,
        )
        .bind(saga.saga_id)
        .bind(&saga.saga_state)
        .bind(saga.status.to_string())
        .bind(&saga.payload)
        .bind(saga.retry_count)
        .bind(saga.update_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_saga(&self, saga_id: Uuid) -> Result<Option<CollectionSaga>> {
        let row = sqlx::query("SELECT * FROM collection_saga WHERE saga_id = $1")
            .bind(saga_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(saga_from_row).transpose()
    }

    async fn append_event(&self, event: SagaEventState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_event_state
                (saga_event_id, saga_id, event_type, event_outcome, event_payload,
                 step_number, create_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.saga_event_id)
        .bind(event.saga_id)
        .bind(&event.event_type)
        .bind(event.event_outcome.to_string())
        .bind(&event.event_payload)
        .bind(event.step_number)
        .bind(event.create_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn events_for_saga(&self, saga_id: Uuid) -> Result<Vec<SagaEventState>> {
        let rows = sqlx::query(
            "SELECT * FROM saga_event_state WHERE saga_id = $1 ORDER BY step_number",
        )
        .bind(saga_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(saga_event_from_row).collect()
    }

    async fn active_saga_count(&self) -> Result<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS active FROM collection_saga WHERE status IN ('STARTED', 'IN_PROGRESS')",
        )
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.try_get("active")?;
        Ok(count as u64)
    }

    async fn active_saga_exists(&self, entity: &SagaEntityKey, saga_name: &str) -> Result<bool> {
        let entity = serde_json::to_value(entity)?;
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM collection_saga
                WHERE saga_name = $1
                  AND entity = $2
                  AND status IN ('STARTED', 'IN_PROGRESS')
            ) AS present
            "#,
        )
        .bind(saga_name)
        .bind(entity)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("present")?)
    }

    async fn stalled_sagas(&self, limit: usize) -> Result<Vec<CollectionSaga>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM collection_saga
            WHERE status IN ('STARTED', 'IN_PROGRESS')
            ORDER BY create_date, saga_id
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(saga_from_row).collect()
    }

    async fn purge_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        sqlx::query(
            r#"
            DELETE FROM saga_event_state
            WHERE saga_id IN (
                SELECT saga_id FROM collection_saga
                WHERE status = 'COMPLETED' AND update_date < $1
            )
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        let result = sqlx::query(
            "DELETE FROM collection_saga WHERE status = 'COMPLETED' AND update_date < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CollectionStore for PgStore {
    async fn insert_fileset(&self, fileset: IncomingFileset) -> Result<IncomingFileset> {
        sqlx::query(
            r#"
            INSERT INTO incoming_fileset
                (fileset_id, school_id,
                 demographic_file_status, demographic_file_name,
                 course_file_status, course_file_name,
                 assessment_file_status, assessment_file_name,
                 fileset_status, create_user, create_date, update_user, update_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(fileset.fileset_id)
        .bind(&fileset.school_id)
        .bind(fileset.demographic_file_status.to_string())
        .bind(&fileset.demographic_file_name)
        .bind(fileset.course_file_status.to_string())
        .bind(&fileset.course_file_name)
        .bind(fileset.assessment_file_status.to_string())
        .bind(&fileset.assessment_file_name)
        .bind(fileset.fileset_status.to_string())
        .bind(&fileset.create_user)
        .bind(fileset.create_date)
        .bind(&fileset.update_user)
        .bind(fileset.update_date)
        .execute(&self.pool)
        .await?;
        Ok(fileset)
    }

    async fn save_fileset(&self, fileset: &IncomingFileset) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE incoming_fileset
            SET demographic_file_status = $2, demographic_file_name = $3,
                course_file_status = $4, course_file_name = $5,
                assessment_file_status = $6, assessment_file_name = $7,
                fileset_status = $8, update_user = $9, update_date = $10
            WHERE fileset_id = $1
            "#,
        )
        .bind(fileset.fileset_id)
        .bind(fileset.demographic_file_status.to_string())
        .bind(&fileset.demographic_file_name)
        .bind(fileset.course_file_status.to_string())
        .bind(&fileset.course_file_name)
        .bind(fileset.assessment_file_status.to_string())
        .bind(&fileset.assessment_file_name)
        .bind(fileset.fileset_status.to_string())
        .bind(&fileset.update_user)
        .bind(fileset.update_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_fileset(&self, fileset_id: Uuid) -> Result<Option<IncomingFileset>> {
        let row = sqlx::query("SELECT * FROM incoming_fileset WHERE fileset_id = $1")
            .bind(fileset_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(fileset_from_row).transpose()
    }

    async fn completable_filesets(&self, limit: usize) -> Result<Vec<IncomingFileset>> {
        let rows = sqlx::query(
            r#"
            SELECT f.* FROM incoming_fileset f
            WHERE f.demographic_file_status = 'LOADED'
              AND f.course_file_status = 'LOADED'
              AND f.assessment_file_status = 'LOADED'
              AND f.fileset_status <> 'COMPLETED'
              AND NOT EXISTS (
                  SELECT 1 FROM demographic_student d
                  WHERE d.fileset_id = f.fileset_id
                    AND d.student_status IN ('LOADED', 'UPDATE_CRS'))
              AND NOT EXISTS (
                  SELECT 1 FROM course_student c
                  WHERE c.fileset_id = f.fileset_id
                    AND c.student_status IN ('LOADED', 'UPDATE_CRS'))
              AND NOT EXISTS (
                  SELECT 1 FROM assessment_student a
                  WHERE a.fileset_id = f.fileset_id
                    AND a.student_status IN ('LOADED', 'UPDATE_CRS'))
              AND NOT EXISTS (
                  SELECT 1 FROM collection_saga s
                  WHERE s.status IN ('STARTED', 'IN_PROGRESS')
                    AND s.entity = jsonb_build_object(
                        'kind', 'FILESET', 'key', f.fileset_id::text))
            ORDER BY f.create_date, f.fileset_id
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(fileset_from_row).collect()
    }

    async fn stale_filesets(&self, cutoff: DateTime<Utc>) -> Result<Vec<IncomingFileset>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM incoming_fileset
            WHERE (demographic_file_status <> 'LOADED'
                   OR course_file_status <> 'LOADED'
                   OR assessment_file_status <> 'LOADED')
              AND update_date < $1
            ORDER BY create_date, fileset_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(fileset_from_row).collect()
    }

    async fn aged_filesets(&self, cutoff: DateTime<Utc>) -> Result<Vec<IncomingFileset>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM incoming_fileset
            WHERE create_date < $1
            ORDER BY create_date, fileset_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(fileset_from_row).collect()
    }

    async fn delete_fileset(&self, fileset_id: Uuid) -> Result<()> {
        // Child rows first; no FK cascade in the schema
        for table in ["demographic_student", "course_student", "assessment_student"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE fileset_id = $1"))
                .bind(fileset_id)
                .execute(&self.pool)
                .await?;
        }
        sqlx::query("DELETE FROM incoming_fileset WHERE fileset_id = $1")
            .bind(fileset_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unsettled_record_count(&self, fileset_id: Uuid) -> Result<u64> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM demographic_student
                 WHERE fileset_id = $1 AND student_status IN ('LOADED', 'UPDATE_CRS'))
              + (SELECT COUNT(*) FROM course_student
                 WHERE fileset_id = $1 AND student_status IN ('LOADED', 'UPDATE_CRS'))
              + (SELECT COUNT(*) FROM assessment_student
                 WHERE fileset_id = $1 AND student_status IN ('LOADED', 'UPDATE_CRS'))
              AS unsettled
            "#,
        )
        .bind(fileset_id)
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.try_get("unsettled")?;
        Ok(count as u64)
    }

    async fn has_loaded_demographics(&self, fileset_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM demographic_student
                WHERE fileset_id = $1 AND student_status = 'LOADED'
            ) AS present
            "#,
        )
        .bind(fileset_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("present")?)
    }

    async fn has_loaded_courses(&self, fileset_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM course_student
                WHERE fileset_id = $1 AND student_status = 'LOADED'
            ) AS present
            "#,
        )
        .bind(fileset_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("present")?)
    }

    async fn insert_demographic(&self, record: DemographicStudent) -> Result<DemographicStudent> {
        sqlx::query(
            r#"
            INSERT INTO demographic_student
                (demographic_student_id, fileset_id, pen, local_id, last_name, first_name,
                 birthdate, gender, grade_code, citizenship, student_status,
                 validation_issues, create_date, update_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.demographic_student_id)
        .bind(record.fileset_id)
        .bind(&record.pen)
        .bind(&record.local_id)
        .bind(&record.last_name)
        .bind(&record.first_name)
        .bind(&record.birthdate)
        .bind(&record.gender)
        .bind(&record.grade_code)
        .bind(&record.citizenship)
        .bind(record.student_status.to_string())
        .bind(serde_json::to_value(&record.validation_issues)?)
        .bind(record.create_date)
        .bind(record.update_date)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn save_demographic(&self, record: &DemographicStudent) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE demographic_student
            SET student_status = $2, validation_issues = $3, update_date = $4
            WHERE demographic_student_id = $1
            "#,
        )
        .bind(record.demographic_student_id)
        .bind(record.student_status.to_string())
        .bind(serde_json::to_value(&record.validation_issues)?)
        .bind(record.update_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_demographic(&self, id: Uuid) -> Result<Option<DemographicStudent>> {
        let row = sqlx::query("SELECT * FROM demographic_student WHERE demographic_student_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(demographic_from_row).transpose()
    }

    async fn loaded_demographics(&self, limit: usize) -> Result<Vec<DemographicStudent>> {
        let rows = sqlx::query(
            r#"
            SELECT d.* FROM demographic_student d
            WHERE d.student_status = 'LOADED'
              AND NOT EXISTS (
                  SELECT 1 FROM collection_saga s
                  WHERE s.status IN ('STARTED', 'IN_PROGRESS')
                    AND s.entity = jsonb_build_object(
                        'kind', 'DEMOGRAPHIC_STUDENT', 'key', d.demographic_student_id::text))
            ORDER BY d.create_date, d.demographic_student_id
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(demographic_from_row).collect()
    }

    async fn insert_assessment(&self, record: AssessmentStudent) -> Result<AssessmentStudent> {
        sqlx::query(
            r#"
            INSERT INTO assessment_student
                (assessment_student_id, fileset_id, pen, local_id, assessment_code,
                 session_date, student_status, validation_issues, create_date, update_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.assessment_student_id)
        .bind(record.fileset_id)
        .bind(&record.pen)
        .bind(&record.local_id)
        .bind(&record.assessment_code)
        .bind(&record.session_date)
        .bind(record.student_status.to_string())
        .bind(serde_json::to_value(&record.validation_issues)?)
        .bind(record.create_date)
        .bind(record.update_date)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn save_assessment(&self, record: &AssessmentStudent) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE assessment_student
            SET student_status = $2, validation_issues = $3, update_date = $4
            WHERE assessment_student_id = $1
            "#,
        )
        .bind(record.assessment_student_id)
        .bind(record.student_status.to_string())
        .bind(serde_json::to_value(&record.validation_issues)?)
        .bind(record.update_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_assessment(&self, id: Uuid) -> Result<Option<AssessmentStudent>> {
        let row = sqlx::query("SELECT * FROM assessment_student WHERE assessment_student_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(assessment_from_row).transpose()
    }

    async fn loaded_assessments(&self, limit: usize) -> Result<Vec<AssessmentStudent>> {
        let rows = sqlx::query(
            r#"
            SELECT a.* FROM assessment_student a
            WHERE a.student_status = 'LOADED'
              AND NOT EXISTS (
                  SELECT 1 FROM demographic_student d
                  WHERE d.fileset_id = a.fileset_id AND d.student_status = 'LOADED')
              AND NOT EXISTS (
                  SELECT 1 FROM collection_saga s
                  WHERE s.status IN ('STARTED', 'IN_PROGRESS')
                    AND s.entity = jsonb_build_object(
                        'kind', 'ASSESSMENT_STUDENT', 'key', a.assessment_student_id::text))
            ORDER BY a.create_date, a.assessment_student_id
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(assessment_from_row).collect()
    }

    async fn insert_course(&self, record: CourseStudent) -> Result<CourseStudent> {
        sqlx::query(
            r#"
            INSERT INTO course_student
                (course_student_id, fileset_id, pen, local_id, course_code, course_level,
                 course_session, final_grade, credits, student_status,
                 validation_issues, create_date, update_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.course_student_id)
        .bind(record.fileset_id)
        .bind(&record.pen)
        .bind(&record.local_id)
        .bind(&record.course_code)
        .bind(&record.course_level)
        .bind(&record.course_session)
        .bind(&record.final_grade)
        .bind(&record.credits)
        .bind(record.student_status.to_string())
        .bind(serde_json::to_value(&record.validation_issues)?)
        .bind(record.create_date)
        .bind(record.update_date)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn save_course(&self, record: &CourseStudent) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE course_student
            SET student_status = $2, validation_issues = $3, update_date = $4
            WHERE course_student_id = $1
            "#,
        )
        .bind(record.course_student_id)
        .bind(record.student_status.to_string())
        .bind(serde_json::to_value(&record.validation_issues)?)
        .bind(record.update_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<CourseStudent>> {
        let row = sqlx::query("SELECT * FROM course_student WHERE course_student_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(course_from_row).transpose()
    }

    async fn loaded_courses(&self, limit: usize) -> Result<Vec<CourseStudent>> {
        let rows = sqlx::query(
            r#"
            SELECT c.* FROM course_student c
            WHERE c.student_status = 'LOADED'
              AND NOT EXISTS (
                  SELECT 1 FROM demographic_student d
                  WHERE d.fileset_id = c.fileset_id AND d.student_status = 'LOADED')
              AND NOT EXISTS (
                  SELECT 1 FROM collection_saga s
                  WHERE s.status IN ('STARTED', 'IN_PROGRESS')
                    AND s.entity = jsonb_build_object(
                        'kind', 'COURSE_STUDENT', 'key', c.course_student_id::text))
            ORDER BY c.create_date, c.course_student_id
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(course_from_row).collect()
    }

    async fn update_crs_pens(&self, limit: usize) -> Result<Vec<PenCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (c.pen) c.pen, c.fileset_id
            FROM course_student c
            WHERE c.student_status = 'UPDATE_CRS'
              AND NOT EXISTS (
                  SELECT 1 FROM course_student l
                  WHERE l.fileset_id = c.fileset_id AND l.student_status = 'LOADED')
              AND NOT EXISTS (
                  SELECT 1 FROM collection_saga s
                  WHERE s.status IN ('STARTED', 'IN_PROGRESS')
                    AND s.entity = jsonb_build_object('kind', 'PEN', 'key', c.pen))
            ORDER BY c.pen, c.create_date
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(PenCandidate {
                    pen: row.try_get("pen")?,
                    fileset_id: row.try_get("fileset_id")?,
                })
            })
            .collect()
    }

    async fn update_crs_courses_for_pen(&self, pen: &str) -> Result<Vec<CourseStudent>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM course_student
            WHERE pen = $1 AND student_status = 'UPDATE_CRS'
            ORDER BY create_date, course_student_id
            "#,
        )
        .bind(pen)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(course_from_row).collect()
    }
}
