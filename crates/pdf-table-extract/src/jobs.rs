//! Job bookkeeping around the detection pipeline.
//!
//! A job moves `pending -> processing -> completed | failed`; a failed job may
//! be retried, a completed one is final. Claiming a job for processing is the
//! store's job so that duplicate runs are rejected even across workers.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::assembly::{AssemblyReport, TablePipeline};
use crate::error::JobError;
use crate::model::ExtractedTable;
use crate::options::ProcessingOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Failed, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    /// Validates `self -> next`, rejecting duplicate runs explicitly.
    pub fn transition(self, next: Self, job_id: &str) -> Result<Self, JobError> {
        if self == Self::Processing && next == Self::Processing {
            return Err(JobError::AlreadyProcessing(job_id.to_string()));
        }
        if !self.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub file_name: String,
    pub status: JobStatus,
    pub options: ProcessingOptions,
    pub error_message: Option<String>,
    pub table_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        options: ProcessingOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            status: JobStatus::Pending,
            options,
            error_message: None,
            table_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the record to `next`, stamping `now`.
    pub fn advance(&mut self, next: JobStatus, now: DateTime<Utc>) -> Result<(), JobError> {
        self.status = self.status.transition(next, &self.id)?;
        self.updated_at = now;
        if next == JobStatus::Processing {
            self.error_message = None;
        }
        Ok(())
    }

    /// The completed version of this record; `self` is left untouched so a
    /// failed save can still mark it failed.
    pub fn completed(&self, table_count: usize, now: DateTime<Utc>) -> Result<Self, JobError> {
        let mut completed = self.clone();
        completed.advance(JobStatus::Completed, now)?;
        completed.table_count = table_count;
        Ok(completed)
    }

    pub fn mark_failed(&mut self, message: &str, now: DateTime<Utc>) -> Result<(), JobError> {
        self.advance(JobStatus::Failed, now)?;
        self.error_message = Some(message.to_string());
        Ok(())
    }
}

/// Keyed persistence of jobs, their original files and extracted tables.
pub trait JobStore: Send + Sync {
    fn create_job(&self, record: JobRecord, original_file: Vec<u8>) -> Result<(), JobError>;

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, JobError>;

    /// Atomically moves the job into `processing`.
    fn begin_processing(&self, job_id: &str, now: DateTime<Utc>) -> Result<JobRecord, JobError>;

    fn complete_job(
        &self,
        job_id: &str,
        table_count: usize,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, JobError>;

    fn fail_job(&self, job_id: &str, message: &str, now: DateTime<Utc>)
    -> Result<JobRecord, JobError>;

    fn get_original_file(&self, job_id: &str) -> Result<Option<Vec<u8>>, JobError>;

    fn create_extracted_table(&self, job_id: &str, table: ExtractedTable) -> Result<(), JobError>;

    /// Tables of the job ordered by `table_index`.
    fn get_extracted_tables_by_job_id(&self, job_id: &str)
    -> Result<Vec<ExtractedTable>, JobError>;
}

#[derive(Debug, Default)]
struct StoreState {
    jobs: HashMap<String, JobRecord>,
    files: HashMap<String, Vec<u8>>,
    tables: HashMap<String, Vec<ExtractedTable>>,
}

/// Process-local [`JobStore`]; every operation holds one lock, so writes for
/// different jobs never interleave.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    state: Mutex<StoreState>,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, JobError> {
        self.state
            .lock()
            .map_err(|_| JobError::Storage("job store lock poisoned".to_string()))
    }

    fn update(
        &self,
        job_id: &str,
        apply: impl FnOnce(&mut JobRecord) -> Result<(), JobError>,
    ) -> Result<JobRecord, JobError> {
        let mut state = self.lock()?;
        let record = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        apply(record)?;
        Ok(record.clone())
    }
}

impl JobStore for InMemoryJobStore {
    fn create_job(&self, record: JobRecord, original_file: Vec<u8>) -> Result<(), JobError> {
        let mut state = self.lock()?;
        if state.jobs.contains_key(&record.id) {
            return Err(JobError::Storage(format!(
                "job '{}' already exists",
                record.id
            )));
        }
        state.files.insert(record.id.clone(), original_file);
        state.jobs.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, JobError> {
        Ok(self.lock()?.jobs.get(job_id).cloned())
    }

    fn begin_processing(&self, job_id: &str, now: DateTime<Utc>) -> Result<JobRecord, JobError> {
        self.update(job_id, |record| record.advance(JobStatus::Processing, now))
    }

    fn complete_job(
        &self,
        job_id: &str,
        table_count: usize,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, JobError> {
        self.update(job_id, |record| {
            *record = record.completed(table_count, now)?;
            Ok(())
        })
    }

    fn fail_job(
        &self,
        job_id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<JobRecord, JobError> {
        self.update(job_id, |record| record.mark_failed(message, now))
    }

    fn get_original_file(&self, job_id: &str) -> Result<Option<Vec<u8>>, JobError> {
        Ok(self.lock()?.files.get(job_id).cloned())
    }

    fn create_extracted_table(&self, job_id: &str, table: ExtractedTable) -> Result<(), JobError> {
        let mut state = self.lock()?;
        if !state.jobs.contains_key(job_id) {
            return Err(JobError::NotFound(job_id.to_string()));
        }
        let tables = state.tables.entry(job_id.to_string()).or_default();
        tables.retain(|existing| existing.table_index != table.table_index);
        tables.push(table);
        tables.sort_by_key(|existing| existing.table_index);
        Ok(())
    }

    fn get_extracted_tables_by_job_id(
        &self,
        job_id: &str,
    ) -> Result<Vec<ExtractedTable>, JobError> {
        Ok(self
            .lock()?
            .tables
            .get(job_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Runs one job through the pipeline and records the outcome.
///
/// Data-quality problems never fail a job. Anything that stops the run after
/// the claim (a missing original file, an unreadable document, a storage
/// error) marks the job `failed` so it can be retried, then propagates.
pub fn process_job(
    store: &dyn JobStore,
    pipeline: &TablePipeline,
    job_id: &str,
    now: impl Fn() -> DateTime<Utc>,
) -> Result<(JobRecord, AssemblyReport), JobError> {
    let record = store.begin_processing(job_id, now())?;
    info!(job_id, file = %record.file_name, "job processing started");

    match run_claimed(store, pipeline, &record, &now) {
        Ok((record, report)) => {
            info!(
                job_id,
                tables = report.tables.len(),
                strategy = ?report.strategy,
                "job completed"
            );
            Ok((record, report))
        }
        Err(run_error) => {
            error!(job_id, error = %run_error, "job failed");
            if let Err(fail_error) = store.fail_job(job_id, &run_error.to_string(), now()) {
                error!(job_id, error = %fail_error, "could not record job failure");
            }
            Err(run_error)
        }
    }
}

fn run_claimed(
    store: &dyn JobStore,
    pipeline: &TablePipeline,
    record: &JobRecord,
    now: &impl Fn() -> DateTime<Utc>,
) -> Result<(JobRecord, AssemblyReport), JobError> {
    let original = store
        .get_original_file(&record.id)?
        .ok_or_else(|| JobError::MissingOriginalFile(record.id.clone()))?;

    let report = pipeline.assemble(&original, &record.options)?;
    for table in &report.tables {
        store.create_extracted_table(&record.id, table.clone())?;
    }
    let record = store.complete_job(&record.id, report.tables.len(), now())?;
    Ok((record, report))
}
