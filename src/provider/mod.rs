pub mod directory;
pub mod worker;

use std::sync::{Arc, Mutex};
use crate::error::ProviderError;
use crate::state::host::StageExpression;
use crate::state::plot_data::PlotPayload;
use crate::sync::extended_stage::StageRequest;
use crate::sync::view_change::{LoadParams, LoadResponse};

/// Remote side of the panel: computes plot payloads, receives exported
/// selections and builds view stages. Calls may block; the app runs them
/// on worker threads.
pub trait EmbeddingsProvider: Send + Sync {
    /// Either return the payload directly, or publish it through
    /// `publisher` and answer [`LoadResponse::Pushed`].
    fn load_visualization(
        &self,
        params: &LoadParams,
        publisher: &PlotPublisher,
    ) -> Result<LoadResponse, ProviderError>;

    /// Returns the ids the provider promoted into the host's sample
    /// selection.
    fn apply_selection(&self, sample_ids: &[String]) -> Result<Vec<String>, ProviderError>;

    fn build_extended_stage(&self, request: &StageRequest) -> Result<Option<StageExpression>, ProviderError>;
}

/// A payload published on the side channel for load request `seq`.
#[derive(Debug)]
pub struct PushedPlot {
    pub seq: u64,
    pub visualization_key: String,
    pub payload: PlotPayload,
}

/// Collects side-channel payloads until the app picks them up.
#[derive(Debug, Clone, Default)]
pub struct PushOutbox {
    inner: Arc<Mutex<Vec<PushedPlot>>>,
}

impl PushOutbox {
    /// Publisher bound to one load request.
    pub fn publisher(&self, seq: u64, visualization_key: &str) -> PlotPublisher {
        PlotPublisher {
            seq,
            visualization_key: visualization_key.to_string(),
            outbox: self.clone(),
        }
    }

    pub fn drain(&self) -> Vec<PushedPlot> {
        match self.inner.lock() {
            Ok(mut pushed) => std::mem::take(&mut *pushed),
            Err(_) => {
                tracing::error!("Push outbox poisoned, dropping pushed plot data");
                Vec::new()
            }
        }
    }
}

/// Handed to [`EmbeddingsProvider::load_visualization`]; every payload it
/// publishes is tagged with the request it was created for.
#[derive(Debug, Clone)]
pub struct PlotPublisher {
    seq: u64,
    visualization_key: String,
    outbox: PushOutbox,
}

impl PlotPublisher {
    pub fn publish(&self, payload: PlotPayload) -> Result<(), ProviderError> {
        let mut pushed = self
            .outbox
            .inner
            .lock()
            .map_err(|_| ProviderError::Worker("push outbox poisoned".into()))?;
        pushed.push(PushedPlot {
            seq: self.seq,
            visualization_key: self.visualization_key.clone(),
            payload,
        });
        Ok(())
    }
}
