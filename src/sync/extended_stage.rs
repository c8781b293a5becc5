//! Derives a view filter from the resolved selection and installs or
//! retracts it on the host's view pipeline.

use crate::error::{ProviderError, StaleResponseDiscarded};
use crate::state::host::{DatasetIdentity, StageExpression, ViewStage};

/// Decides whether a selection should constrain query results.
pub trait SelectionScopePolicy {
    fn should_resolve_selection(
        &self,
        view: &[ViewStage],
        patches_field: Option<&str>,
    ) -> bool;
}

/// Resolve patch selections into a filter unless the view is already a
/// patches view over the same field (the selection then needs no
/// translation).
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchesViewPolicy;

impl SelectionScopePolicy for PatchesViewPolicy {
    fn should_resolve_selection(
        &self,
        view: &[ViewStage],
        patches_field: Option<&str>,
    ) -> bool {
        let Some(field) = patches_field else {
            return false;
        };
        !view.iter().any(|stage| {
            stage.kind == "ToPatches" && stage.params.get("field").and_then(|f| f.as_str()) == Some(field)
        })
    }
}

/// Everything the stage depends on; a change re-evaluates it.
#[derive(Debug, Clone, PartialEq)]
pub struct StageInputs {
    pub dataset: Option<DatasetIdentity>,
    pub plot_loaded: bool,
    pub view: Vec<ViewStage>,
    pub selection: Option<Vec<String>>,
    pub patches_field: Option<String>,
    pub lasso: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequest {
    pub seq: u64,
    pub dataset: DatasetIdentity,
    pub selection: Option<Vec<String>>,
    pub patches_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageDirective {
    Build(StageRequest),
    Retract,
    Unchanged,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StageOutcome {
    Install(StageExpression),
    Discarded(StaleResponseDiscarded),
    /// Another panel owns a spatial selection; it keeps priority.
    SpatialSelectionActive,
    NoStage,
    Failed,
}

#[derive(Debug, Default)]
pub struct ExtendedStageBuilder {
    next_seq: u64,
    in_flight: Option<(u64, DatasetIdentity)>,
    last_inputs: Option<StageInputs>,
}

impl ExtendedStageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, inputs: StageInputs, policy: &dyn SelectionScopePolicy) -> StageDirective {
        if self.last_inputs.as_ref() == Some(&inputs) {
            return StageDirective::Unchanged;
        }
        self.last_inputs = Some(inputs.clone());

        let selection = inputs.selection.filter(|ids| !ids.is_empty());
        let Some(selection) = selection else {
            self.in_flight = None;
            return StageDirective::Retract;
        };
        let (true, Some(dataset)) = (inputs.plot_loaded, inputs.dataset) else {
            return StageDirective::Unchanged;
        };

        let resolve = inputs.patches_field.is_some()
            && policy.should_resolve_selection(&inputs.view, inputs.patches_field.as_deref());
        if !resolve {
            self.in_flight = None;
            return StageDirective::Retract;
        }

        self.next_seq += 1;
        self.in_flight = Some((self.next_seq, dataset.clone()));
        StageDirective::Build(StageRequest {
            seq: self.next_seq,
            dataset,
            selection: Some(selection),
            patches_field: inputs.patches_field,
        })
    }

    /// Handle the provider's reply to request `seq`. `current_dataset` is
    /// read at completion time; opening any dataset since the request,
    /// even one with the same name, discards it.
    pub fn complete(
        &mut self,
        seq: u64,
        current_dataset: Option<&DatasetIdentity>,
        spatial_selection_active: bool,
        result: Result<Option<StageExpression>, ProviderError>,
    ) -> StageOutcome {
        let stale = StaleResponseDiscarded { seq, latest: self.next_seq };
        let dataset = match self.in_flight.take() {
            Some((in_flight, dataset)) if in_flight == seq => dataset,
            other => {
                self.in_flight = other;
                tracing::debug!("{stale}");
                return StageOutcome::Discarded(stale);
            }
        };
        if current_dataset != Some(&dataset) {
            tracing::debug!("Dataset changed since stage request #{seq}; {stale}");
            return StageOutcome::Discarded(stale);
        }

        match result {
            Err(e) => {
                tracing::error!("Failed to create extended stage: {e}");
                StageOutcome::Failed
            }
            Ok(_) if spatial_selection_active => StageOutcome::SpatialSelectionActive,
            Ok(Some(stage)) => StageOutcome::Install(stage),
            Ok(None) => StageOutcome::NoStage,
        }
    }
}
