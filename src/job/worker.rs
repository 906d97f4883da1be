//! Background synthesis worker
//!
//! A single thread owns the synthesizer calls. Jobs arrive over a channel
//! and results go back over another, so completions are delivered in the
//! order jobs were started.

use crate::speech::synth::{SynthesisRequest, Synthesizer};
use crate::{Result, StudioError};
use log::{debug, info};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Work item handed to the worker thread
#[derive(Debug)]
pub struct JobTicket {
    pub id: u64,
    pub request: SynthesisRequest,
}

/// Message sent back when a job finishes
#[derive(Debug)]
pub struct JobCompletion {
    pub job_id: u64,
    pub result: Result<()>,
}

/// Handle to the worker thread
pub struct Worker {
    jobs: Option<Sender<JobTicket>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread
    pub fn spawn(synth: Arc<dyn Synthesizer>, completions: Sender<JobCompletion>) -> Result<Self> {
        let (jobs, inbox) = mpsc::channel::<JobTicket>();

        let handle = thread::Builder::new()
            .name("ttstudio-synth".to_string())
            .spawn(move || {
                for ticket in inbox {
                    debug!("Worker running job {} with {}", ticket.id, synth.name());
                    let result = synth.synthesize(&ticket.request);
                    let completion = JobCompletion {
                        job_id: ticket.id,
                        result,
                    };
                    if completions.send(completion).is_err() {
                        debug!("Completion receiver gone, worker exiting");
                        break;
                    }
                }
                info!("Synthesis worker stopped");
            })?;

        Ok(Self {
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    /// Queue a job for the worker thread
    pub fn dispatch(&self, ticket: JobTicket) -> Result<()> {
        self.jobs
            .as_ref()
            .ok_or_else(|| StudioError::Other("Synthesis worker stopped".to_string()))?
            .send(ticket)
            .map_err(|_| StudioError::Other("Synthesis worker stopped".to_string()))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after any running job
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
