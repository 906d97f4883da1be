//! Job orchestration
//!
//! At most one synthesis job runs at a time. Requests that arrive while a
//! job is running are folded into a single pending slot instead of a queue:
//! explicit requests (save, preview) beat automatic ones, and a save beats a
//! preview. The slot is drained once, when the running job succeeds; a
//! failed job discards it.

pub mod worker;

use crate::service::{new_temp_wav, SynthesisService};
use crate::speech::synth::{SynthesisConfig, Synthesizer};
use crate::{Result, StudioError};
use log::{debug, error, info};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use worker::{JobCompletion, JobTicket, Worker};

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One synthesis run
#[derive(Debug)]
pub struct Job {
    pub id: u64,
    pub text: String,
    pub config: SynthesisConfig,
    /// Output file, owned by the job until handed over on success
    pub destination: TempPath,
    pub state: JobState,
    /// Set when the inputs changed under the job; its result is not used
    pub discarded: bool,
}

/// Who asked for a generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// User pressed generate
    Manual,
    /// Debounce timer fired
    Auto,
    /// Preview requested without a usable result
    Preview,
    /// Save requested without a usable result
    Save(PathBuf),
}

/// Follow-up recorded while a job runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Preview,
    Save(PathBuf),
    AutoRetry,
}

impl PendingAction {
    fn priority(&self) -> u8 {
        match self {
            PendingAction::AutoRetry => 0,
            PendingAction::Preview => 1,
            PendingAction::Save(_) => 2,
        }
    }

    pub fn is_explicit(&self) -> bool {
        !matches!(self, PendingAction::AutoRetry)
    }
}

impl From<Trigger> for PendingAction {
    fn from(trigger: Trigger) -> Self {
        match trigger {
            Trigger::Manual | Trigger::Auto => PendingAction::AutoRetry,
            Trigger::Preview => PendingAction::Preview,
            Trigger::Save(path) => PendingAction::Save(path),
        }
    }
}

/// What `generate` did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new job was started with this id
    Started(u64),
    /// A job was already running; the request went to the pending slot
    Coalesced,
}

/// A job that has left the running state
#[derive(Debug)]
pub struct FinishedJob {
    pub id: u64,
    pub text: String,
    /// `Succeeded` or `Failed`
    pub state: JobState,
    /// Synthesized file on success
    pub outcome: Result<TempPath>,
    /// Follow-up to run now; always `None` after a failure of a job that
    /// was not discarded
    pub pending: Option<PendingAction>,
    /// The job was discarded while running; `outcome` is stale and
    /// `pending` holds only requests made after the discard
    pub discarded: bool,
}

/// Single-flight coordinator for synthesis jobs
pub struct Orchestrator {
    running: Option<Job>,
    pending: Option<PendingAction>,
    next_id: u64,
    completions: Receiver<JobCompletion>,
    worker: Worker,
}

impl Orchestrator {
    /// Create an orchestrator with its worker thread
    pub fn new(synth: Arc<dyn Synthesizer>) -> Result<Self> {
        let (tx, completions) = mpsc::channel();
        let worker = Worker::spawn(synth, tx)?;
        Ok(Self {
            running: None,
            pending: None,
            next_id: 1,
            completions,
            worker,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.running.is_some()
    }

    pub fn running(&self) -> Option<&Job> {
        self.running.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Request a synthesis of `text`
    ///
    /// While a job runs nothing new is started and the request is recorded
    /// as a pending action. Otherwise the request is validated (errors are
    /// returned synchronously and change nothing) and a job is started on
    /// the worker thread.
    pub fn generate(
        &mut self,
        service: &SynthesisService,
        text: &str,
        config: &SynthesisConfig,
        trigger: Trigger,
    ) -> Result<Submission> {
        if self.is_busy() {
            self.record_pending(trigger.into());
            return Ok(Submission::Coalesced);
        }

        let destination = new_temp_wav()?;
        let request = service.build_request(text, config, &destination)?;

        let id = self.next_id;
        self.next_id += 1;
        let mut job = Job {
            id,
            text: request.text.clone(),
            config: config.clone(),
            destination,
            state: JobState::Pending,
            discarded: false,
        };

        self.worker.dispatch(JobTicket { id, request })?;
        job.state = JobState::Running;
        info!("Started job {} ({:?})", id, trigger);
        self.running = Some(job);

        if !matches!(trigger, Trigger::Manual | Trigger::Auto) {
            self.record_pending(trigger.into());
        }
        Ok(Submission::Started(id))
    }

    /// Put `action` in the pending slot unless something more important is there
    ///
    /// Returns whether the slot now holds `action`.
    pub fn record_pending(&mut self, action: PendingAction) -> bool {
        let replace = self
            .pending
            .as_ref()
            .map_or(true, |current| action.priority() >= current.priority());
        if replace {
            debug!("Pending action: {:?}", action);
            self.pending = Some(action);
        } else {
            debug!("Keeping pending {:?} over {:?}", self.pending, action);
        }
        replace
    }

    /// Mark the running job's result as unusable and drop the pending action
    ///
    /// The worker cannot be interrupted, so the job still completes. Its
    /// `FinishedJob` comes back with `discarded` set, carrying only requests
    /// recorded after this call. Returns whether a job was running.
    pub fn discard_running(&mut self) -> bool {
        let Some(job) = self.running.as_mut() else {
            return false;
        };
        job.discarded = true;
        info!("Discarding job {}", job.id);
        if let Some(dropped) = self.pending.take() {
            info!("Dropping pending {:?} with discarded job", dropped);
        }
        true
    }

    /// Take a finished job if one is ready, without blocking
    pub fn poll(&mut self) -> Option<FinishedJob> {
        match self.completions.try_recv() {
            Ok(completion) => self.complete(completion),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.worker_lost(),
        }
    }

    /// Wait up to `timeout` for the running job to finish
    pub fn wait(&mut self, timeout: Duration) -> Option<FinishedJob> {
        if !self.is_busy() {
            return None;
        }
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => self.complete(completion),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => self.worker_lost(),
        }
    }

    fn complete(&mut self, completion: JobCompletion) -> Option<FinishedJob> {
        let job = match self.running.take() {
            Some(job) if job.id == completion.job_id => job,
            other => {
                debug!("Ignoring completion for unknown job {}", completion.job_id);
                self.running = other;
                return None;
            }
        };
        Some(self.finish(job, completion.result))
    }

    fn finish(&mut self, mut job: Job, result: Result<()>) -> FinishedJob {
        match result {
            Ok(()) => {
                job.state = JobState::Succeeded;
                info!("Job {} succeeded: {}", job.id, job.destination.display());
                FinishedJob {
                    id: job.id,
                    text: job.text,
                    state: job.state,
                    outcome: Ok(job.destination),
                    pending: self.pending.take(),
                    discarded: job.discarded,
                }
            }
            Err(e) => {
                job.state = JobState::Failed;
                error!("Job {} failed: {}", job.id, e);
                let pending = self.pending.take();
                let pending = if job.discarded {
                    pending
                } else {
                    if let Some(dropped) = pending {
                        info!("Dropping pending {:?} after failed job", dropped);
                    }
                    None
                };
                FinishedJob {
                    id: job.id,
                    text: job.text,
                    state: job.state,
                    outcome: Err(e),
                    pending,
                    discarded: job.discarded,
                }
            }
        }
    }

    fn worker_lost(&mut self) -> Option<FinishedJob> {
        let job = self.running.take()?;
        Some(self.finish(
            job,
            Err(StudioError::Other("Synthesis worker stopped".to_string())),
        ))
    }
}
