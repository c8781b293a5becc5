use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use crate::error::ProviderError;
use crate::provider::{EmbeddingsProvider, PushOutbox};
use crate::state::host::StageExpression;
use crate::state::plot_data::PlotPayload;
use crate::sync::view_change::LoadResponse;
use crate::sync::Effect;

/// Result slot filled by a background thread.
struct PendingJob<T> {
    result: Arc<Mutex<Option<T>>>,
    handle: JoinHandle<()>,
}

enum JobPoll<T> {
    Ready(T),
    Running,
    Lost(String),
}

impl<T: Send + 'static> PendingJob<T> {
    fn spawn(job: impl FnOnce() -> T + Send + 'static) -> Self {
        let result: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
        let result_clone = Arc::clone(&result);
        let handle = std::thread::spawn(move || {
            let value = job();
            if let Ok(mut slot) = result_clone.lock() {
                *slot = Some(value);
            }
        });
        Self { result, handle }
    }

    fn poll(&self) -> JobPoll<T> {
        // Read before the slot so a job finishing in between is not lost.
        let finished = self.handle.is_finished();
        let mut lock = match self.result.lock() {
            Ok(lock) => lock,
            Err(_) => return JobPoll::Lost("result slot poisoned".into()),
        };
        match lock.take() {
            Some(value) => JobPoll::Ready(value),
            None if finished => JobPoll::Lost("worker thread exited without a result".into()),
            None => JobPoll::Running,
        }
    }
}

/// A provider reply together with the sequence number of its request.
#[derive(Debug)]
pub enum Completion {
    /// Side-channel payload for load `seq`, ahead of its `Load` reply.
    Pushed {
        seq: u64,
        visualization_key: String,
        payload: PlotPayload,
    },
    Load {
        seq: u64,
        result: Result<LoadResponse, ProviderError>,
    },
    SelectionExported {
        seq: u64,
        result: Result<Vec<String>, ProviderError>,
    },
    Stage {
        seq: u64,
        result: Result<Option<StageExpression>, ProviderError>,
    },
}

enum Job {
    Load(u64, PendingJob<Result<LoadResponse, ProviderError>>),
    Export(u64, PendingJob<Result<Vec<String>, ProviderError>>),
    Stage(u64, PendingJob<Result<Option<StageExpression>, ProviderError>>),
}

/// Runs panel effects against a provider on background threads and hands
/// back completions once per frame.
pub struct JobRunner {
    provider: Option<Arc<dyn EmbeddingsProvider>>,
    jobs: Vec<Job>,
    outbox: PushOutbox,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner {
    pub fn new() -> Self {
        Self {
            provider: None,
            jobs: Vec::new(),
            outbox: PushOutbox::default(),
        }
    }

    /// Jobs already running keep the provider they started with.
    pub fn set_provider(&mut self, provider: Arc<dyn EmbeddingsProvider>) {
        self.provider = Some(provider);
    }

    pub fn is_busy(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn submit(&mut self, effect: Effect) {
        let Some(provider) = self.provider.clone() else {
            tracing::warn!("No provider available, dropping {effect:?}");
            return;
        };
        let job = match effect {
            Effect::Load(request) => {
                let seq = request.seq;
                let publisher = self.outbox.publisher(seq, &request.params.visualization_key);
                Job::Load(
                    seq,
                    PendingJob::spawn(move || provider.load_visualization(&request.params, &publisher)),
                )
            }
            Effect::ExportSelection(export) => {
                let seq = export.seq;
                Job::Export(seq, PendingJob::spawn(move || provider.apply_selection(&export.sample_ids)))
            }
            Effect::BuildStage(request) => {
                let seq = request.seq;
                Job::Stage(seq, PendingJob::spawn(move || provider.build_extended_stage(&request)))
            }
        };
        self.jobs.push(job);
    }

    /// Collect every job that finished since the last call. Pushed payloads
    /// come first so a `Load` reply never overtakes its own push.
    pub fn poll(&mut self) -> Vec<Completion> {
        let mut done = Vec::new();
        self.jobs.retain(|job| {
            let completion = match job {
                Job::Load(seq, pending) => ready(pending.poll()).map(|result| Completion::Load { seq: *seq, result }),
                Job::Export(seq, pending) => {
                    ready(pending.poll()).map(|result| Completion::SelectionExported { seq: *seq, result })
                }
                Job::Stage(seq, pending) => ready(pending.poll()).map(|result| Completion::Stage { seq: *seq, result }),
            };
            match completion {
                Some(c) => {
                    done.push(c);
                    false
                }
                None => true,
            }
        });
        // Drained after the finished jobs: anything they published is here.
        let mut out: Vec<Completion> = self
            .outbox
            .drain()
            .into_iter()
            .map(|p| Completion::Pushed {
                seq: p.seq,
                visualization_key: p.visualization_key,
                payload: p.payload,
            })
            .collect();
        out.extend(done);
        out
    }
}

fn ready<T>(poll: JobPoll<Result<T, ProviderError>>) -> Option<Result<T, ProviderError>> {
    match poll {
        JobPoll::Ready(result) => Some(result),
        JobPoll::Running => None,
        JobPoll::Lost(msg) => {
            tracing::error!("Background job failed: {msg}");
            Some(Err(ProviderError::Worker(msg)))
        }
    }
}
