//! Shared fixtures for the integration test suite: a deterministic
//! single-process harness around the in-memory store and bus, a scriptable
//! rule engine, and a downstream client that records every write.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use dashmap::DashMap;
use grad_collection_core::config::CollectionConfig;
use grad_collection_core::error::Result;
use grad_collection_core::messaging::InMemoryEventBus;
use grad_collection_core::models::{
    AssessmentStudent, CourseStudent, DemographicStudent, IncomingFileset, ValidationIssue,
};
use grad_collection_core::orchestration::CollectionSystem;
use grad_collection_core::persistence::{CollectionStore, InMemoryStore, SagaStore};
use grad_collection_core::services::{
    DownstreamClient, DownstreamOutcome, RecordView, School, SchoolCache, SchoolProvider,
    ValidationContext, ValidationRules,
};
use grad_collection_core::state_machine::{FileStatus, StudentStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_SCHOOL: &str = "03636018";
pub const TEST_USER: &str = "TEST_USER";

/// Rule engine whose verdict is scripted per PEN. Unscripted PENs validate
/// clean, which keeps most tests quiet about validation.
#[derive(Default)]
pub struct ScriptedRules {
    verdicts: DashMap<String, Vec<ValidationIssue>>,
}

impl ScriptedRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, pen: &str, issues: Vec<ValidationIssue>) {
        self.verdicts.insert(pen.to_string(), issues);
    }
}

impl ValidationRules for ScriptedRules {
    fn validate(&self, record: RecordView<'_>, _context: &ValidationContext) -> Vec<ValidationIssue> {
        self.verdicts
            .get(record.pen())
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

/// Every downstream write this client has accepted, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamWrite {
    Demographic(Uuid),
    Course(Uuid),
    Assessment(Uuid),
    CourseBatch { pen: String, count: usize },
}

#[derive(Default)]
pub struct RecordingDownstream {
    writes: Mutex<Vec<DownstreamWrite>>,
}

impl RecordingDownstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<DownstreamWrite> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

#[async_trait::async_trait]
impl DownstreamClient for RecordingDownstream {
    async fn write_demographic(&self, record: &DemographicStudent) -> Result<DownstreamOutcome> {
        self.writes
            .lock()
            .push(DownstreamWrite::Demographic(record.demographic_student_id));
        Ok(DownstreamOutcome::Written)
    }

    async fn write_assessment(&self, record: &AssessmentStudent) -> Result<DownstreamOutcome> {
        self.writes
            .lock()
            .push(DownstreamWrite::Assessment(record.assessment_student_id));
        Ok(DownstreamOutcome::Written)
    }

    async fn write_course(&self, record: &CourseStudent) -> Result<DownstreamOutcome> {
        self.writes
            .lock()
            .push(DownstreamWrite::Course(record.course_student_id));
        Ok(DownstreamOutcome::Written)
    }

    async fn write_course_batch(
        &self,
        pen: &str,
        records: &[CourseStudent],
    ) -> Result<DownstreamOutcome> {
        self.writes.lock().push(DownstreamWrite::CourseBatch {
            pen: pen.to_string(),
            count: records.len(),
        });
        Ok(DownstreamOutcome::Written)
    }
}

/// Provider with one known school
pub struct StaticSchools;

#[async_trait::async_trait]
impl SchoolProvider for StaticSchools {
    async fn load_school(&self, school_id: &str) -> Result<Option<School>> {
        Ok((school_id == TEST_SCHOOL).then(|| School {
            school_id: TEST_SCHOOL.to_string(),
            district_id: "005".to_string(),
            display_name: "Test Secondary".to_string(),
        }))
    }

    async fn load_all(&self) -> Result<Vec<School>> {
        Ok(vec![School {
            school_id: TEST_SCHOOL.to_string(),
            district_id: "005".to_string(),
            display_name: "Test Secondary".to_string(),
        }])
    }
}

pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub rules: Arc<ScriptedRules>,
    pub downstream: Arc<RecordingDownstream>,
    pub system: CollectionSystem,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: CollectionConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let rules = Arc::new(ScriptedRules::new());
        let downstream = Arc::new(RecordingDownstream::new());
        let schools = Arc::new(SchoolCache::new(Arc::new(StaticSchools)));
        let system = CollectionSystem::new(
            store.clone() as Arc<dyn SagaStore>,
            store.clone() as Arc<dyn CollectionStore>,
            Arc::new(InMemoryEventBus::new()),
            rules.clone(),
            schools,
            downstream.clone(),
            &config,
        )
        .expect("system wiring");
        Self {
            store,
            rules,
            downstream,
            system,
        }
    }

    /// One scheduler tick followed by a full drain of the event queues
    pub async fn tick_and_settle(&mut self) -> grad_collection_core::TickOutcome {
        let outcome = self.system.tick().await.expect("scheduler tick");
        self.system.process_pending().await;
        outcome
    }

    pub async fn active_sagas(&self) -> u64 {
        SagaStore::active_saga_count(self.store.as_ref())
            .await
            .expect("saga count")
    }

    /// Backdate every active saga's update_date, so the sweeper's grace
    /// period check sees it as stalled
    pub async fn backdate_active_sagas(&self, by: Duration) {
        let stalled = self.store.stalled_sagas(usize::MAX).await.expect("stalled query");
        for mut saga in stalled {
            saga.update_date = Utc::now() - by;
            self.store.save_saga(&saga).await.expect("save saga");
        }
    }
}

pub fn test_config() -> CollectionConfig {
    CollectionConfig {
        sweeper_grace_period: std::time::Duration::from_secs(120),
        ..CollectionConfig::default()
    }
}

/// Fileset with all three files LOADED
pub async fn seed_fileset(store: &InMemoryStore) -> IncomingFileset {
    let mut fileset = IncomingFileset::new(TEST_SCHOOL, TEST_USER);
    fileset.demographic_file_status = FileStatus::Loaded;
    fileset.demographic_file_name = Some("school.dem".to_string());
    fileset.course_file_status = FileStatus::Loaded;
    fileset.course_file_name = Some("school.crs".to_string());
    fileset.assessment_file_status = FileStatus::Loaded;
    fileset.assessment_file_name = Some("school.xam".to_string());
    store.insert_fileset(fileset).await.expect("insert fileset")
}

pub async fn seed_demographic(
    store: &InMemoryStore,
    fileset_id: Uuid,
    pen: &str,
) -> DemographicStudent {
    let mut record = DemographicStudent::new(fileset_id, pen);
    record.last_name = Some("DOE".to_string());
    record.birthdate = Some("20080101".to_string());
    store
        .insert_demographic(record)
        .await
        .expect("insert demographic")
}

pub async fn seed_course(
    store: &InMemoryStore,
    fileset_id: Uuid,
    pen: &str,
    status: StudentStatus,
) -> CourseStudent {
    let mut record = CourseStudent::new(fileset_id, pen);
    record.course_code = Some("EN12".to_string());
    record.course_session = Some("202606".to_string());
    record.student_status = status;
    store.insert_course(record).await.expect("insert course")
}

pub async fn seed_assessment(
    store: &InMemoryStore,
    fileset_id: Uuid,
    pen: &str,
) -> AssessmentStudent {
    let mut record = AssessmentStudent::new(fileset_id, pen);
    record.assessment_code = Some("LTE10".to_string());
    record.session_date = Some("202606".to_string());
    store
        .insert_assessment(record)
        .await
        .expect("insert assessment")
}
