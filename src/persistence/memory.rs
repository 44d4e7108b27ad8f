//! # In-Memory Store
//!
//! Lock-guarded maps implementing both store traits. Backs the test suite and
//! single-process embedding; selection queries mirror the SQL in the Postgres
//! store, including ordering (creation time, then id for a stable tiebreak).

use crate::error::Result;
use crate::models::{
    AssessmentStudent, CollectionSaga, CourseStudent, DemographicStudent, IncomingFileset,
    SagaEntityKey, SagaEventState,
};
use crate::persistence::{CollectionStore, PenCandidate, SagaStore};
use crate::state_machine::{FilesetStatus, SagaStatus, StudentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    sagas: RwLock<HashMap<Uuid, CollectionSaga>>,
    saga_events: RwLock<Vec<SagaEventState>>,
    filesets: RwLock<HashMap<Uuid, IncomingFileset>>,
    demographics: RwLock<HashMap<Uuid, DemographicStudent>>,
    courses: RwLock<HashMap<Uuid, CourseStudent>>,
    assessments: RwLock<HashMap<Uuid, AssessmentStudent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn unsettled_count_locked(
        &self,
        fileset_id: Uuid,
        demographics: &HashMap<Uuid, DemographicStudent>,
        courses: &HashMap<Uuid, CourseStudent>,
        assessments: &HashMap<Uuid, AssessmentStudent>,
    ) -> u64 {
        let dem = demographics
            .values()
            .filter(|r| r.fileset_id == fileset_id && r.student_status.is_unsettled())
            .count();
        let crs = courses
            .values()
            .filter(|r| r.fileset_id == fileset_id && r.student_status.is_unsettled())
            .count();
        let xam = assessments
            .values()
            .filter(|r| r.fileset_id == fileset_id && r.student_status.is_unsettled())
            .count();
        (dem + crs + xam) as u64
    }

    fn fileset_has_loaded_demographics(&self, fileset_id: Uuid) -> bool {
        self.demographics
            .read()
            .values()
            .any(|r| r.fileset_id == fileset_id && r.student_status == StudentStatus::Loaded)
    }

    fn fileset_has_loaded_courses(&self, fileset_id: Uuid) -> bool {
        self.courses
            .read()
            .values()
            .any(|r| r.fileset_id == fileset_id && r.student_status == StudentStatus::Loaded)
    }

    /// Candidate-side exclusivity guard: a record bound to a non-COMPLETED
    /// saga is not selectable
    fn saga_free(&self, entity: &SagaEntityKey) -> bool {
        !self
            .sagas
            .read()
            .values()
            .any(|s| s.status.is_active() && s.entity.as_ref() == Some(entity))
    }
}

fn sort_by_creation<T>(items: &mut [T], created: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by_key(created);
}

#[async_trait]
impl SagaStore for InMemoryStore {
    async fn insert_saga(&self, saga: CollectionSaga) -> Result<CollectionSaga> {
        self.sagas.write().insert(saga.saga_id, saga.clone());
        Ok(saga)
    }

    async fn save_saga(&self, saga: &CollectionSaga) -> Result<()> {
        self.sagas.write().insert(saga.saga_id, saga.clone());
        Ok(())
    }

    async fn find_saga(&self, saga_id: Uuid) -> Result<Option<CollectionSaga>> {
        Ok(self.sagas.read().get(&saga_id).cloned())
    }

    async fn append_event(&self, event: SagaEventState) -> Result<()> {
        self.saga_events.write().push(event);
        Ok(())
    }

    async fn events_for_saga(&self, saga_id: Uuid) -> Result<Vec<SagaEventState>> {
        let mut events: Vec<SagaEventState> = self
            .saga_events
            .read()
            .iter()
            .filter(|e| e.saga_id == saga_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.step_number);
        Ok(events)
    }

    async fn active_saga_count(&self) -> Result<u64> {
        Ok(self
            .sagas
            .read()
            .values()
            .filter(|s| s.status.is_active())
            .count() as u64)
    }

    async fn active_saga_exists(&self, entity: &SagaEntityKey, saga_name: &str) -> Result<bool> {
        Ok(self.sagas.read().values().any(|s| {
            s.status.is_active()
                && s.saga_name == saga_name
                && s.entity.as_ref() == Some(entity)
        }))
    }

    async fn stalled_sagas(&self, limit: usize) -> Result<Vec<CollectionSaga>> {
        let mut active: Vec<CollectionSaga> = self
            .sagas
            .read()
            .values()
            .filter(|s| s.status.is_active())
            .cloned()
            .collect();
        sort_by_creation(&mut active, |s| (s.create_date, s.saga_id));
        active.truncate(limit);
        Ok(active)
    }

    async fn purge_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut sagas = self.sagas.write();
        let doomed: Vec<Uuid> = sagas
            .values()
            .filter(|s| s.status == SagaStatus::Completed && s.update_date < cutoff)
            .map(|s| s.saga_id)
            .collect();
        for saga_id in &doomed {
            sagas.remove(saga_id);
        }
        self.saga_events
            .write()
            .retain(|e| !doomed.contains(&e.saga_id));
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn insert_fileset(&self, fileset: IncomingFileset) -> Result<IncomingFileset> {
        self.filesets
            .write()
            .insert(fileset.fileset_id, fileset.clone());
        Ok(fileset)
    }

    async fn save_fileset(&self, fileset: &IncomingFileset) -> Result<()> {
        self.filesets
            .write()
            .insert(fileset.fileset_id, fileset.clone());
        Ok(())
    }

    async fn find_fileset(&self, fileset_id: Uuid) -> Result<Option<IncomingFileset>> {
        Ok(self.filesets.read().get(&fileset_id).cloned())
    }

    async fn completable_filesets(&self, limit: usize) -> Result<Vec<IncomingFileset>> {
        let candidates: Vec<IncomingFileset> = {
            let filesets = self.filesets.read();
            filesets
                .values()
                .filter(|f| f.all_files_loaded() && f.fileset_status != FilesetStatus::Completed)
                .cloned()
                .collect()
        };
        let demographics = self.demographics.read();
        let courses = self.courses.read();
        let assessments = self.assessments.read();
        let mut eligible: Vec<IncomingFileset> = candidates
            .into_iter()
            .filter(|f| {
                self.unsettled_count_locked(f.fileset_id, &demographics, &courses, &assessments)
                    == 0
            })
            .filter(|f| self.saga_free(&SagaEntityKey::Fileset(f.fileset_id)))
            .collect();
        sort_by_creation(&mut eligible, |f| (f.create_date, f.fileset_id));
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn stale_filesets(&self, cutoff: DateTime<Utc>) -> Result<Vec<IncomingFileset>> {
        let mut stale: Vec<IncomingFileset> = self
            .filesets
            .read()
            .values()
            .filter(|f| !f.all_files_loaded() && f.update_date < cutoff)
            .cloned()
            .collect();
        sort_by_creation(&mut stale, |f| (f.create_date, f.fileset_id));
        Ok(stale)
    }

    async fn aged_filesets(&self, cutoff: DateTime<Utc>) -> Result<Vec<IncomingFileset>> {
        let mut aged: Vec<IncomingFileset> = self
            .filesets
            .read()
            .values()
            .filter(|f| f.create_date < cutoff)
            .cloned()
            .collect();
        sort_by_creation(&mut aged, |f| (f.create_date, f.fileset_id));
        Ok(aged)
    }

    async fn delete_fileset(&self, fileset_id: Uuid) -> Result<()> {
        self.filesets.write().remove(&fileset_id);
        self.demographics
            .write()
            .retain(|_, r| r.fileset_id != fileset_id);
        self.courses.write().retain(|_, r| r.fileset_id != fileset_id);
        self.assessments
            .write()
            .retain(|_, r| r.fileset_id != fileset_id);
        Ok(())
    }

    async fn unsettled_record_count(&self, fileset_id: Uuid) -> Result<u64> {
        let demographics = self.demographics.read();
        let courses = self.courses.read();
        let assessments = self.assessments.read();
        Ok(self.unsettled_count_locked(fileset_id, &demographics, &courses, &assessments))
    }

    async fn has_loaded_demographics(&self, fileset_id: Uuid) -> Result<bool> {
        Ok(self.fileset_has_loaded_demographics(fileset_id))
    }

    async fn has_loaded_courses(&self, fileset_id: Uuid) -> Result<bool> {
        Ok(self.fileset_has_loaded_courses(fileset_id))
    }

    async fn insert_demographic(&self, record: DemographicStudent) -> Result<DemographicStudent> {
        self.demographics
            .write()
            .insert(record.demographic_student_id, record.clone());
        Ok(record)
    }

    async fn save_demographic(&self, record: &DemographicStudent) -> Result<()> {
        self.demographics
            .write()
            .insert(record.demographic_student_id, record.clone());
        Ok(())
    }

    async fn find_demographic(&self, id: Uuid) -> Result<Option<DemographicStudent>> {
        Ok(self.demographics.read().get(&id).cloned())
    }

    async fn loaded_demographics(&self, limit: usize) -> Result<Vec<DemographicStudent>> {
        let mut loaded: Vec<DemographicStudent> = self
            .demographics
            .read()
            .values()
            .filter(|r| r.student_status == StudentStatus::Loaded)
            .filter(|r| self.saga_free(&SagaEntityKey::DemographicStudent(r.demographic_student_id)))
            .cloned()
            .collect();
        sort_by_creation(&mut loaded, |r| (r.create_date, r.demographic_student_id));
        loaded.truncate(limit);
        Ok(loaded)
    }

    async fn insert_assessment(&self, record: AssessmentStudent) -> Result<AssessmentStudent> {
        self.assessments
            .write()
            .insert(record.assessment_student_id, record.clone());
        Ok(record)
    }

    async fn save_assessment(&self, record: &AssessmentStudent) -> Result<()> {
        self.assessments
            .write()
            .insert(record.assessment_student_id, record.clone());
        Ok(())
    }

    async fn find_assessment(&self, id: Uuid) -> Result<Option<AssessmentStudent>> {
        Ok(self.assessments.read().get(&id).cloned())
    }

    async fn loaded_assessments(&self, limit: usize) -> Result<Vec<AssessmentStudent>> {
        let mut loaded: Vec<AssessmentStudent> = self
            .assessments
            .read()
            .values()
            .filter(|r| r.student_status == StudentStatus::Loaded)
            .filter(|r| !self.fileset_has_loaded_demographics(r.fileset_id))
            .filter(|r| self.saga_free(&SagaEntityKey::AssessmentStudent(r.assessment_student_id)))
            .cloned()
            .collect();
        sort_by_creation(&mut loaded, |r| (r.create_date, r.assessment_student_id));
        loaded.truncate(limit);
        Ok(loaded)
    }

    async fn insert_course(&self, record: CourseStudent) -> Result<CourseStudent> {
        self.courses
            .write()
            .insert(record.course_student_id, record.clone());
        Ok(record)
    }

    async fn save_course(&self, record: &CourseStudent) -> Result<()> {
        self.courses
            .write()
            .insert(record.course_student_id, record.clone());
        Ok(())
    }

    async fn find_course(&self, id: Uuid) -> Result<Option<CourseStudent>> {
        Ok(self.courses.read().get(&id).cloned())
    }

    async fn loaded_courses(&self, limit: usize) -> Result<Vec<CourseStudent>> {
        let mut loaded: Vec<CourseStudent> = self
            .courses
            .read()
            .values()
            .filter(|r| r.student_status == StudentStatus::Loaded)
            .filter(|r| !self.fileset_has_loaded_demographics(r.fileset_id))
            .filter(|r| self.saga_free(&SagaEntityKey::CourseStudent(r.course_student_id)))
            .cloned()
            .collect();
        sort_by_creation(&mut loaded, |r| (r.create_date, r.course_student_id));
        loaded.truncate(limit);
        Ok(loaded)
    }

    async fn update_crs_pens(&self, limit: usize) -> Result<Vec<PenCandidate>> {
        // Collect first, filter after: the loaded-course guard takes the same
        // lock and parking_lot read locks are not reentrant
        let mut rows: Vec<CourseStudent> = {
            let courses = self.courses.read();
            courses
                .values()
                .filter(|r| r.student_status == StudentStatus::UpdateCrs)
                .cloned()
                .collect()
        };
        rows.retain(|r| !self.fileset_has_loaded_courses(r.fileset_id));
        sort_by_creation(&mut rows, |r| (r.create_date, r.course_student_id));

        let mut candidates: Vec<PenCandidate> = Vec::new();
        for row in rows {
            if candidates.iter().any(|c| c.pen == row.pen) {
                continue;
            }
            if !self.saga_free(&SagaEntityKey::Pen(row.pen.clone())) {
                continue;
            }
            candidates.push(PenCandidate {
                pen: row.pen.clone(),
                fileset_id: row.fileset_id,
            });
            if candidates.len() >= limit {
                break;
            }
        }
        Ok(candidates)
    }

    async fn update_crs_courses_for_pen(&self, pen: &str) -> Result<Vec<CourseStudent>> {
        let mut rows: Vec<CourseStudent> = self
            .courses
            .read()
            .values()
            .filter(|r| r.pen == pen && r.student_status == StudentStatus::UpdateCrs)
            .cloned()
            .collect();
        sort_by_creation(&mut rows, |r| (r.create_date, r.course_student_id));
        Ok(rows)
    }
}
