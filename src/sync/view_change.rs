//! Reloads plot data whenever an upstream input changes, and commits only
//! the response to the most recent request.

use crate::error::{LoadError, ProviderError, StaleResponseDiscarded};
use crate::state::host::ViewSignature;
use crate::state::plot_data::{PlotData, PlotDataStore, PlotPayload};

/// Parameters sent to the data provider with a load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadParams {
    pub visualization_key: String,
    pub color_by: Option<String>,
}

/// Every input whose change triggers a reload.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTrigger {
    pub visualization_key: Option<String>,
    pub color_by: Option<String>,
    pub view: ViewSignature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub seq: u64,
    pub params: LoadParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// Successful provider reply to a load request.
#[derive(Debug, Clone)]
pub enum LoadResponse {
    /// The payload itself.
    Payload(PlotPayload),
    /// Second phase of a side-channel delivery: the provider confirms it has
    /// pushed the payload (see [`ViewChangeSynchronizer::push`]).
    Pushed,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Committed,
    Discarded(StaleResponseDiscarded),
    Failed { visualization_key: String, error: LoadError },
}

#[derive(Debug)]
pub struct ViewChangeSynchronizer {
    state: LoadState,
    store: PlotDataStore,
    last_trigger: Option<ViewTrigger>,
    next_seq: u64,
    /// Latest issued request, until its response arrives.
    pending: Option<LoadRequest>,
    /// Side-channel payload received for `pending`, awaiting confirmation.
    pushed: Option<(u64, Result<PlotData, LoadError>)>,
}

impl Default for ViewChangeSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewChangeSynchronizer {
    pub fn new() -> Self {
        Self {
            state: LoadState::Idle,
            store: PlotDataStore::default(),
            last_trigger: None,
            next_seq: 0,
            pending: None,
            pushed: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn store(&self) -> &PlotDataStore {
        &self.store
    }

    pub fn plot_data(&self) -> Option<&PlotData> {
        self.store.get()
    }

    /// Compare `trigger` with the previous observation and start a load if
    /// anything changed while a visualization key and dataset are present.
    pub fn observe(&mut self, trigger: ViewTrigger) -> Option<LoadRequest> {
        if self.last_trigger.as_ref() == Some(&trigger) {
            return None;
        }
        self.last_trigger = Some(trigger.clone());

        let Some(key) = trigger.visualization_key else {
            self.state = LoadState::Idle;
            self.pending = None;
            self.pushed = None;
            return None;
        };
        if trigger.view.dataset.is_none() {
            return None;
        }
        Some(self.begin(LoadParams {
            visualization_key: key,
            color_by: trigger.color_by,
        }))
    }

    /// Re-issue the last observed request, e.g. from a "retry" control.
    pub fn reload(&mut self) -> Option<LoadRequest> {
        let trigger = self.last_trigger.clone()?;
        trigger.view.dataset.as_ref()?;
        let key = trigger.visualization_key?;
        Some(self.begin(LoadParams {
            visualization_key: key,
            color_by: trigger.color_by,
        }))
    }

    fn begin(&mut self, params: LoadParams) -> LoadRequest {
        self.next_seq += 1;
        let request = LoadRequest { seq: self.next_seq, params };
        tracing::info!(
            "Loading visualization '{}' (color by {:?}) as request #{}",
            request.params.visualization_key,
            request.params.color_by,
            request.seq
        );
        // Existing data stays in the store until the new load commits.
        self.state = LoadState::Loading;
        self.pending = Some(request.clone());
        self.pushed = None;
        request
    }

    /// Side-channel delivery of a payload produced for request `seq`.
    /// Accepted only if `seq` is the outstanding request and the key matches
    /// it; it becomes current once the provider confirms with
    /// [`LoadResponse::Pushed`].
    pub fn push(&mut self, seq: u64, visualization_key: &str, payload: PlotPayload) -> bool {
        let Some(pending) = self.pending.as_ref() else {
            tracing::debug!("Ignoring pushed plot data #{seq} for '{visualization_key}': nothing pending");
            return false;
        };
        if pending.seq != seq || pending.params.visualization_key != visualization_key {
            tracing::debug!(
                "Ignoring pushed plot data #{seq} for '{visualization_key}', waiting for #{} '{}'",
                pending.seq,
                pending.params.visualization_key
            );
            return false;
        }
        let data = PlotData::try_from(payload).map_err(LoadError::from);
        self.pushed = Some((seq, data));
        true
    }

    /// Handle the provider's reply to request `seq`.
    pub fn complete(&mut self, seq: u64, response: Result<LoadResponse, ProviderError>) -> LoadOutcome {
        let request = match self.pending.take() {
            Some(request) if request.seq == seq => request,
            other => {
                self.pending = other;
                return LoadOutcome::Discarded(StaleResponseDiscarded { seq, latest: self.next_seq });
            }
        };

        let data = match response {
            Ok(LoadResponse::Payload(payload)) => PlotData::try_from(payload).map_err(LoadError::from),
            Ok(LoadResponse::Pushed) => match self.pushed.take() {
                Some((pushed_seq, data)) if pushed_seq == seq => data,
                _ => Err(LoadError::NoData),
            },
            Err(e) => Err(LoadError::from(e)),
        };

        match data {
            Ok(data) => {
                tracing::info!(
                    "Loaded visualization '{}': {} points",
                    request.params.visualization_key,
                    data.len()
                );
                self.store.replace(data);
                self.state = LoadState::Loaded;
                LoadOutcome::Committed
            }
            Err(e) => {
                self.state = LoadState::Error(e.to_string());
                LoadOutcome::Failed {
                    visualization_key: request.params.visualization_key,
                    error: e,
                }
            }
        }
    }
}
