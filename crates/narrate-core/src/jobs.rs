//! Background job tracking.
//!
//! A [`JobStore`] is a cheap, cloneable handle; every clone sees the same
//! jobs. Callers create one and hand it to whatever needs to submit or
//! inspect work.

use crate::error::{NarrateError, NarrateResult};
use crate::pipeline::{Pipeline, PipelineOutcome, PipelineState, SynthesisRequest};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Job identifier: `<unix seconds>_<8 hex chars>`
pub type JobId = String;

/// Generate a new job id
#[must_use]
pub fn generate_job_id() -> JobId {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().timestamp(), &suffix[..8])
}

/// State of one submitted request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job id
    pub id: JobId,
    /// Lifecycle state
    pub status: PipelineState,
    /// Requested voice
    pub voice_id: String,
    /// Requested speed
    pub speed: f32,
    /// Requested depth
    pub depth: u8,
    /// Whether the input was SSML
    pub is_ssml: bool,
    /// Where the result goes
    pub output_path: PathBuf,
    /// Whether the result is the silent fallback
    pub fallback: bool,
    /// Playback length of the result in seconds
    pub duration_secs: Option<f32>,
    /// Failure description
    pub error: Option<String>,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn new(id: JobId, request: &SynthesisRequest, output_path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: PipelineState::Pending,
            voice_id: request.voice_id.clone(),
            speed: request.speed,
            depth: request.depth,
            is_ssml: request.is_ssml,
            output_path,
            fallback: false,
            duration_secs: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Time since submission
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Shared map of job records
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending job and return its id
    pub fn create(&self, request: &SynthesisRequest, output_path: PathBuf) -> JobId {
        let id = generate_job_id();
        let record = JobRecord::new(id.clone(), request, output_path);
        self.jobs.write().insert(id.clone(), record);
        debug!("Created job {id}");
        id
    }

    /// Move a job to `next`
    ///
    /// # Errors
    ///
    /// Returns an error if the job is unknown or the transition is not
    /// allowed from its current state.
    pub fn transition(&self, job_id: &str, next: PipelineState) -> NarrateResult<()> {
        self.update(job_id, next, |_| {})
    }

    /// Record a finished run
    ///
    /// # Errors
    ///
    /// Same as [`Self::transition`].
    pub fn complete(&self, job_id: &str, outcome: &PipelineOutcome) -> NarrateResult<()> {
        self.update(job_id, PipelineState::Completed, |record| {
            record.output_path.clone_from(&outcome.artifact.path);
            record.fallback = outcome.is_fallback();
            record.duration_secs = Some(outcome.artifact.duration.as_secs_f32());
        })
    }

    /// Record a failed run
    ///
    /// # Errors
    ///
    /// Same as [`Self::transition`].
    pub fn fail(&self, job_id: &str, error: &NarrateError) -> NarrateResult<()> {
        self.update(job_id, PipelineState::Failed, |record| {
            record.error = Some(error.to_string());
        })
    }

    fn update<F>(&self, job_id: &str, next: PipelineState, apply: F) -> NarrateResult<()>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut jobs = self.jobs.write();
        let record = jobs
            .get_mut(job_id)
            .ok_or_else(|| NarrateError::job_not_found(job_id))?;
        if !record.status.can_transition_to(next) {
            return Err(NarrateError::invalid_input(format!(
                "Job {job_id} cannot move from {} to {next}",
                record.status
            )));
        }
        apply(record);
        record.status = next;
        record.updated_at = Utc::now();
        debug!("Job {job_id} -> {next}");
        Ok(())
    }

    /// Snapshot of one job
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::JobNotFound`] for unknown ids.
    pub fn get(&self, job_id: &str) -> NarrateResult<JobRecord> {
        self.jobs
            .read()
            .get(job_id)
            .cloned()
            .ok_or_else(|| NarrateError::job_not_found(job_id))
    }

    /// All jobs, oldest first
    #[must_use]
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Number of tracked jobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Whether no jobs are tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Forget a job
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::JobNotFound`] for unknown ids.
    pub fn remove(&self, job_id: &str) -> NarrateResult<JobRecord> {
        self.jobs
            .write()
            .remove(job_id)
            .ok_or_else(|| NarrateError::job_not_found(job_id))
    }

    /// Run `request` on a tokio task and track it. The handle resolves once
    /// the job has reached a terminal state.
    pub fn submit(
        &self,
        pipeline: Arc<Pipeline>,
        request: SynthesisRequest,
        output_path: PathBuf,
    ) -> (JobId, JoinHandle<()>) {
        let id = self.create(&request, output_path.clone());
        let store = self.clone();
        let job_id = id.clone();

        let handle = tokio::spawn(async move {
            if let Err(err) = store.transition(&job_id, PipelineState::Processing) {
                warn!("Job {job_id} could not start: {err}");
                return;
            }
            let recorded = match pipeline.synthesize(&request, &output_path).await {
                Ok(outcome) => {
                    info!(
                        "Job {job_id} completed{}",
                        if outcome.is_fallback() { " with fallback audio" } else { "" }
                    );
                    store.complete(&job_id, &outcome)
                }
                Err(err) => {
                    warn!("Job {job_id} failed: {err}");
                    store.fail(&job_id, &err)
                }
            };
            if let Err(err) = recorded {
                warn!("Job {job_id} state not recorded: {err}");
            }
        });

        (id, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request() -> SynthesisRequest {
        SynthesisRequest::text("Hello").with_depth(3)
    }

    #[test]
    fn test_job_id_format() {
        let id = generate_job_id();
        let (secs, hex) = id.split_once('_').unwrap();
        assert!(secs.parse::<i64>().unwrap() > 1_600_000_000);
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_job_id(), id);
    }

    #[test]
    fn test_create_and_get() {
        let store = JobStore::new();
        let id = store.create(&request(), PathBuf::from("out.mp3"));

        let record = store.get(&id).unwrap();
        assert_eq!(record.status, PipelineState::Pending);
        assert_eq!(record.depth, 3);
        assert_eq!(record.voice_id, "en-US-JennyNeural");
        assert_eq!(store.len(), 1);
        assert!(record.elapsed() >= chrono::Duration::zero());
    }

    #[test]
    fn test_transitions_are_validated() {
        let store = JobStore::new();
        let id = store.create(&request(), PathBuf::from("out.wav"));

        assert!(store.transition(&id, PipelineState::Completed).is_err());
        store.transition(&id, PipelineState::Processing).unwrap();
        store.fail(&id, &NarrateError::synthesis("engine down")).unwrap();

        let record = store.get(&id).unwrap();
        assert_eq!(record.status, PipelineState::Failed);
        assert_eq!(record.error.as_deref(), Some("TTS synthesis failed: engine down"));
        assert!(store.transition(&id, PipelineState::Processing).is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let store = JobStore::new();
        let other = store.clone();
        let id = store.create(&request(), PathBuf::from("out.wav"));
        assert!(other.get(&id).is_ok());

        other.remove(&id).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.get(&id), Err(NarrateError::JobNotFound { .. })));
    }

    #[test]
    fn test_list_is_ordered() {
        let store = JobStore::new();
        let first = store.create(&request(), PathBuf::from("a.wav"));
        std::thread::sleep(Duration::from_millis(5));
        let second = store.create(&request(), PathBuf::from("b.wav"));

        let ids: Vec<JobId> = store.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}
