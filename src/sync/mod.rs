//! Selection and view synchronization for the embeddings panel.
//!
//! [`EmbeddingsPanel`] wires the resolver, the load synchronizer, the stage
//! builder and the camera counters together. It never talks to a provider
//! itself: [`EmbeddingsPanel::tick`] returns [`Effect`]s for the caller to
//! run and the `on_*` handlers take the replies back.

pub mod camera_revision;
pub mod extended_stage;
pub mod selection;
pub mod view_change;

use crate::config::DimensionPolicy;
use crate::data::loader::BrainMethodInfo;
use crate::data::schema;
use crate::error::ProviderError;
use crate::state::host::{HostState, StageExpression};
use crate::state::panel_state::{DragMode, PanelState};
use crate::state::plot_data::{PlotData, PlotPayload};
use camera_revision::CameraRevisionTracker;
use extended_stage::{ExtendedStageBuilder, PatchesViewPolicy, StageDirective, StageInputs, StageOutcome, StageRequest};
use selection::{LassoGeometry, ResolvedSelection, SelectionResolver};
use view_change::{LoadOutcome, LoadRequest, LoadResponse, LoadState, ViewChangeSynchronizer, ViewTrigger};

/// Sample ids handed to the host's selection consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionExport {
    pub seq: u64,
    pub sample_ids: Vec<String>,
}

/// Provider work requested by the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Load(LoadRequest),
    ExportSelection(SelectionExport),
    BuildStage(StageRequest),
}

#[derive(Debug)]
pub struct EmbeddingsPanel {
    state: PanelState,
    resolver: SelectionResolver,
    loader: ViewChangeSynchronizer,
    stage: ExtendedStageBuilder,
    camera: CameraRevisionTracker,
    scope_policy: PatchesViewPolicy,
    dimension_policy: DimensionPolicy,
    export_seq: u64,
    queued: Vec<Effect>,
}

impl EmbeddingsPanel {
    pub fn new(dimension_policy: DimensionPolicy) -> Self {
        Self {
            state: PanelState::default(),
            resolver: SelectionResolver::new(),
            loader: ViewChangeSynchronizer::new(),
            stage: ExtendedStageBuilder::new(),
            camera: CameraRevisionTracker::new(),
            scope_policy: PatchesViewPolicy,
            dimension_policy,
            export_seq: 0,
            queued: Vec::new(),
        }
    }

    // --- Read access --------------------------------------------------------

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn load_state(&self) -> &LoadState {
        self.loader.state()
    }

    pub fn plot_data(&self) -> Option<&PlotData> {
        self.loader.plot_data()
    }

    /// Bumped whenever new plot data is committed.
    pub fn data_generation(&self) -> u64 {
        self.loader.store().generation()
    }

    pub fn camera(&self) -> &CameraRevisionTracker {
        &self.camera
    }

    pub fn lasso(&self) -> &[[f32; 2]] {
        self.resolver.lasso()
    }

    /// Visualizations the selector offers under the dimension policy.
    pub fn eligible_methods<'a>(&self, host: &'a HostState) -> Vec<&'a BrainMethodInfo> {
        self.dimension_policy.eligible(host.brain_methods())
    }

    pub fn color_by_choices(&self, host: &HostState) -> Vec<String> {
        schema::color_by_choices(host.schema())
    }

    /// Patches field of the active visualization, if any.
    pub fn patches_field<'a>(&self, host: &'a HostState) -> Option<&'a str> {
        let key = self.state.visualization_key.as_deref()?;
        host.brain_method(key)?.patches_field.as_deref()
    }

    pub fn resolved_selection(&self, host: &HostState) -> Option<ResolvedSelection> {
        self.resolver.resolve(host, self.patches_field(host))
    }

    /// "Clear Selection" is offered only for a selection this panel owns.
    pub fn can_clear_selection(&self, host: &HostState) -> bool {
        self.resolved_selection(host).is_some_and(|r| !r.is_external)
    }

    // --- Panel controls -----------------------------------------------------

    /// Switch visualizations. The colour-by field belongs to the previous
    /// visualization and is dropped.
    pub fn select_visualization(&mut self, key: Option<String>) {
        if self.state.visualization_key == key {
            return;
        }
        tracing::info!("Visualization changed to {:?}", key);
        self.state.visualization_key = key;
        self.state.color_by = None;
    }

    pub fn set_color_by(&mut self, choice: Option<&str>) {
        self.state.color_by = schema::normalize_color_by(choice);
    }

    pub fn set_drag_mode(&mut self, mode: DragMode) {
        self.state.drag_mode = mode;
    }

    pub fn set_dimension_policy(&mut self, policy: DimensionPolicy) {
        self.dimension_policy = policy;
    }

    pub fn reset_zoom(&mut self) {
        self.camera.reset_zoom();
    }

    pub fn reset_camera(&mut self) {
        self.camera.reset_camera();
    }

    /// Re-run the last load after an error.
    pub fn retry(&mut self) {
        if let Some(request) = self.loader.reload() {
            self.queued.push(Effect::Load(request));
        }
    }

    /// Pick a visualization for a freshly opened dataset: keep the current
    /// key if it is still eligible, auto-select when exactly one is.
    pub fn on_dataset_opened(&mut self, host: &HostState) {
        let eligible: Vec<String> = self.eligible_methods(host).iter().map(|m| m.key.clone()).collect();
        let keep = self
            .state
            .visualization_key
            .as_ref()
            .is_some_and(|key| eligible.contains(key));
        if keep {
            return;
        }
        let key = match eligible.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        };
        self.select_visualization(key);
    }

    // --- Plot interaction ---------------------------------------------------

    /// Replace the plot selection with the points hit by a click or lasso.
    pub fn select_points(&mut self, host: &mut HostState, ids: Vec<String>, lasso: LassoGeometry) {
        if ids.is_empty() {
            self.resolver.set_selection(host, None, Vec::new());
        } else {
            self.resolver.set_selection(host, Some(ids), lasso);
        }
        self.queue_export();
    }

    pub fn toggle_point(&mut self, host: &mut HostState, id: &str) {
        self.resolver.toggle(host, id);
        self.queue_export();
    }

    pub fn clear_selection(&mut self, host: &mut HostState) {
        self.resolver.clear_selection(host);
        self.queue_export();
    }

    fn queue_export(&mut self) {
        self.export_seq += 1;
        // Only the newest export matters.
        self.queued.retain(|e| !matches!(e, Effect::ExportSelection(_)));
        self.queued.push(Effect::ExportSelection(SelectionExport {
            seq: self.export_seq,
            sample_ids: self.resolver.plot_selection().to_vec(),
        }));
    }

    // --- Per-frame reconciliation -------------------------------------------

    /// Compare every input with the previous frame and return the provider
    /// work that follows from the changes. Retractions are applied to the
    /// host directly.
    pub fn tick(&mut self, host: &mut HostState) -> Vec<Effect> {
        let mut effects = std::mem::take(&mut self.queued);

        let trigger = ViewTrigger {
            visualization_key: self.state.visualization_key.clone(),
            color_by: self.state.color_by.clone(),
            view: host.view_signature(),
        };
        if let Some(request) = self.loader.observe(trigger) {
            effects.push(Effect::Load(request));
        }

        let patches_field = self.patches_field(host).map(str::to_string);
        // A stage filters on patch ids; sample-id tiers must not reach it.
        let selection = self
            .resolver
            .resolve(host, patches_field.as_deref())
            .filter(|r| patches_field.is_none() || r.tier.holds_patch_ids())
            .map(|r| r.ids);
        let inputs = StageInputs {
            dataset: host.dataset_identity(),
            plot_loaded: *self.loader.state() == LoadState::Loaded,
            view: host.view().to_vec(),
            selection,
            patches_field,
            lasso: self.resolver.lasso().to_vec(),
        };
        match self.stage.update(inputs, &self.scope_policy) {
            StageDirective::Build(request) => effects.push(Effect::BuildStage(request)),
            StageDirective::Retract => {
                if host.override_stage().is_some() {
                    tracing::debug!("Retracting extended stage");
                    host.set_override_stage(None);
                }
            }
            StageDirective::Unchanged => {}
        }

        effects
    }

    // --- Provider replies ---------------------------------------------------

    /// A fresh plot starts with no selection.
    pub fn on_load(
        &mut self,
        host: &mut HostState,
        seq: u64,
        result: Result<LoadResponse, ProviderError>,
    ) -> LoadOutcome {
        let outcome = self.loader.complete(seq, result);
        match &outcome {
            LoadOutcome::Committed => self.resolver.clear_selection(host),
            LoadOutcome::Discarded(stale) => tracing::debug!("{stale}"),
            LoadOutcome::Failed { visualization_key, error } => {
                tracing::error!("Error loading visualization '{visualization_key}': {error}");
            }
        }
        outcome
    }

    /// Side-channel payload for load `seq`; see [`ViewChangeSynchronizer::push`].
    pub fn on_push(&mut self, seq: u64, visualization_key: &str, payload: PlotPayload) -> bool {
        self.loader.push(seq, visualization_key, payload)
    }

    /// Promote the acknowledged ids into the host's sample selection, unless
    /// the plot selection has moved on since.
    pub fn on_selection_exported(
        &mut self,
        host: &mut HostState,
        seq: u64,
        result: Result<Vec<String>, ProviderError>,
    ) {
        match result {
            Err(e) => tracing::error!("Failed to export selection #{seq}: {e}"),
            Ok(_) if seq != self.export_seq => {
                tracing::debug!("Ignoring selection export #{seq}, latest is #{}", self.export_seq);
            }
            Ok(ids) if ids.is_empty() => {}
            Ok(ids) => host.set_selected_samples(ids),
        }
    }

    pub fn on_stage(
        &mut self,
        host: &mut HostState,
        seq: u64,
        result: Result<Option<StageExpression>, ProviderError>,
    ) -> StageOutcome {
        let spatial_active = host.extended_selection().spatial_selection.is_some();
        let dataset = host.dataset_identity();
        let outcome = self.stage.complete(seq, dataset.as_ref(), spatial_active, result);
        if let StageOutcome::Install(stage) = &outcome {
            tracing::debug!("Installing extended stage {:?}", stage);
            host.set_override_stage(Some(stage.clone()));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{Dataset, SampleRecord};
    use crate::provider::{EmbeddingsProvider, PlotPublisher, PushOutbox};
    use crate::state::plot_data::tests::payload;
    use crate::sync::selection::SelectionTier;
    use crate::sync::view_change::LoadParams;
    use serde_json::json;
    use std::path::PathBuf;

    /// Answers synchronously: every run returns points `s1..s3` (or
    /// `p1..p3` for the patch run).
    struct FakeProvider;

    impl EmbeddingsProvider for FakeProvider {
        fn load_visualization(
            &self,
            params: &LoadParams,
            _: &PlotPublisher,
        ) -> Result<LoadResponse, ProviderError> {
            match params.visualization_key.as_str() {
                "umap" => Ok(LoadResponse::Payload(payload(&["s1", "s2", "s3"]))),
                "patches" => Ok(LoadResponse::Payload(payload(&["p1", "p2", "p3"]))),
                other => Err(ProviderError::UnknownVisualization(other.into())),
            }
        }

        fn apply_selection(&self, sample_ids: &[String]) -> Result<Vec<String>, ProviderError> {
            Ok(sample_ids.iter().filter(|id| id.starts_with('s')).cloned().collect())
        }

        fn build_extended_stage(&self, request: &StageRequest) -> Result<Option<StageExpression>, ProviderError> {
            Ok(request.selection.clone().map(|label_ids| StageExpression::SelectLabels {
                field: request.patches_field.clone().unwrap_or_default(),
                label_ids,
            }))
        }
    }

    fn method(key: &str, num_dims: usize, patches_field: Option<&str>) -> BrainMethodInfo {
        BrainMethodInfo {
            key: key.into(),
            method: "umap".into(),
            num_dims,
            patches_field: patches_field.map(str::to_string),
        }
    }

    fn dataset(name: &str, methods: Vec<BrainMethodInfo>) -> Dataset {
        Dataset::new(
            PathBuf::new(),
            name.into(),
            Vec::new(),
            Vec::new(),
            vec![SampleRecord {
                id: "s1".into(),
                tags: Vec::new(),
                slice: None,
                fields: Default::default(),
            }],
            methods,
        )
    }

    fn setup(methods: Vec<BrainMethodInfo>) -> (EmbeddingsPanel, HostState) {
        let mut host = HostState::new();
        host.open_dataset(dataset("ds", methods));
        let mut panel = EmbeddingsPanel::new(DimensionPolicy::Strict3d);
        panel.on_dataset_opened(&host);
        (panel, host)
    }

    /// Run one frame: tick, then answer every effect synchronously.
    fn frame(panel: &mut EmbeddingsPanel, host: &mut HostState) -> Vec<Effect> {
        let effects = panel.tick(host);
        let provider = FakeProvider;
        for effect in &effects {
            match effect {
                Effect::Load(r) => {
                    let outbox = PushOutbox::default();
                    let publisher = outbox.publisher(r.seq, &r.params.visualization_key);
                    let result = provider.load_visualization(&r.params, &publisher);
                    for pushed in outbox.drain() {
                        panel.on_push(pushed.seq, &pushed.visualization_key, pushed.payload);
                    }
                    panel.on_load(host, r.seq, result);
                }
                Effect::ExportSelection(e) => {
                    panel.on_selection_exported(host, e.seq, provider.apply_selection(&e.sample_ids));
                }
                Effect::BuildStage(r) => {
                    panel.on_stage(host, r.seq, provider.build_extended_stage(r));
                }
            }
        }
        effects
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_eligible_method_is_selected_and_loaded_once() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None), method("flat", 2, None)]);
        assert_eq!(panel.state().visualization_key.as_deref(), Some("umap"));
        let effects = frame(&mut panel, &mut host);
        assert!(matches!(effects.as_slice(), [Effect::Load(_)]));
        assert_eq!(panel.load_state(), &LoadState::Loaded);
        assert_eq!(panel.plot_data().unwrap().len(), 3);
        assert!(frame(&mut panel, &mut host).is_empty());
    }

    #[test]
    fn several_eligible_methods_wait_for_a_choice() {
        let (mut panel, mut host) = setup(vec![method("a", 3, None), method("b", 3, None)]);
        assert_eq!(panel.state().visualization_key, None);
        assert!(frame(&mut panel, &mut host).is_empty());
        assert_eq!(panel.load_state(), &LoadState::Idle);
    }

    #[test]
    fn choosing_a_visualization_drops_the_color_field() {
        let (mut panel, _) = setup(vec![method("umap", 3, None)]);
        panel.set_color_by(Some("predicted.label"));
        assert_eq!(panel.state().color_by.as_deref(), Some("predicted.label"));
        panel.select_visualization(Some("other".into()));
        assert_eq!(panel.state().color_by, None);
    }

    #[test]
    fn host_inputs_trigger_reloads() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        frame(&mut panel, &mut host);
        host.set_filter("tags", Some(json!("train")));
        assert!(matches!(frame(&mut panel, &mut host).as_slice(), [Effect::Load(_)]));
        panel.set_color_by(Some("uniqueness"));
        let effects = frame(&mut panel, &mut host);
        let [Effect::Load(request)] = effects.as_slice() else {
            panic!("expected one load");
        };
        assert_eq!(request.params.color_by.as_deref(), Some("uniqueness"));
    }

    #[test]
    fn exported_selection_is_promoted_into_host_samples() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        frame(&mut panel, &mut host);
        panel.select_points(&mut host, ids(&["s2", "s3"]), vec![[0.0, 0.0]]);
        let r = panel.resolved_selection(&host).unwrap();
        assert_eq!(r.tier, SelectionTier::Plot);

        let effects = frame(&mut panel, &mut host);
        assert!(effects.iter().any(|e| matches!(e, Effect::ExportSelection(_))));
        assert_eq!(host.selected_samples(), ids(&["s2", "s3"]).as_slice());
        let r = panel.resolved_selection(&host).unwrap();
        assert_eq!((r.tier, r.ids), (SelectionTier::Samples, ids(&["s2", "s3"])));
    }

    #[test]
    fn superseded_export_acknowledgement_is_ignored() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        panel.select_points(&mut host, ids(&["s1"]), Vec::new());
        panel.select_points(&mut host, ids(&["s2"]), Vec::new());
        panel.on_selection_exported(&mut host, 1, Ok(ids(&["s1"])));
        assert!(host.selected_samples().is_empty());
        panel.on_selection_exported(&mut host, 2, Err(ProviderError::Failed("offline".into())));
        // a failed export keeps the local selection
        assert_eq!(panel.resolved_selection(&host).unwrap().ids, ids(&["s2"]));
    }

    #[test]
    fn committed_load_clears_the_selection() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        frame(&mut panel, &mut host);
        panel.select_points(&mut host, ids(&["s1"]), Vec::new());
        host.shuffle_colors();
        frame(&mut panel, &mut host);
        assert_eq!(panel.resolved_selection(&host), None);
    }

    #[test]
    fn clear_is_only_offered_for_owned_selections() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        assert!(!panel.can_clear_selection(&host));
        host.set_extended_selection(Some(ids(&["s1"])), "map-panel");
        assert!(!panel.can_clear_selection(&host));
        panel.select_points(&mut host, ids(&["s1"]), Vec::new());
        assert!(panel.can_clear_selection(&host));
    }

    #[test]
    fn patch_selection_installs_and_retracts_a_stage() {
        let (mut panel, mut host) = setup(vec![method("patches", 3, Some("gt"))]);
        frame(&mut panel, &mut host);
        panel.select_points(&mut host, ids(&["p1", "p2"]), Vec::new());
        let effects = frame(&mut panel, &mut host);
        assert!(effects.iter().any(|e| matches!(e, Effect::BuildStage(_))));
        assert_eq!(
            host.override_stage(),
            Some(&StageExpression::SelectLabels { field: "gt".into(), label_ids: ids(&["p1", "p2"]) })
        );

        panel.clear_selection(&mut host);
        frame(&mut panel, &mut host);
        assert_eq!(host.override_stage(), None);
    }

    #[test]
    fn stage_reply_after_a_dataset_switch_is_dropped() {
        let (mut panel, mut host) = setup(vec![method("patches", 3, Some("gt"))]);
        frame(&mut panel, &mut host);
        panel.select_points(&mut host, ids(&["p1"]), Vec::new());
        let effects = panel.tick(&mut host);
        let Some(Effect::BuildStage(request)) = effects.into_iter().find(|e| matches!(e, Effect::BuildStage(_)))
        else {
            panic!("expected a stage request");
        };
        host.open_dataset(dataset("other", vec![method("patches", 3, Some("gt"))]));
        let outcome = panel.on_stage(&mut host, request.seq, FakeProvider.build_extended_stage(&request));
        assert!(matches!(outcome, StageOutcome::Discarded(_)));
        assert_eq!(host.override_stage(), None);
    }

    #[test]
    fn stage_reply_after_reopening_a_same_named_dataset_is_dropped() {
        let (mut panel, mut host) = setup(vec![method("patches", 3, Some("gt"))]);
        frame(&mut panel, &mut host);
        panel.select_points(&mut host, ids(&["p1"]), Vec::new());
        let effects = panel.tick(&mut host);
        let Some(Effect::BuildStage(request)) = effects.into_iter().find(|e| matches!(e, Effect::BuildStage(_)))
        else {
            panic!("expected a stage request");
        };
        host.open_dataset(dataset("ds", vec![method("patches", 3, Some("gt"))]));
        let outcome = panel.on_stage(&mut host, request.seq, FakeProvider.build_extended_stage(&request));
        assert!(matches!(outcome, StageOutcome::Discarded(_)));
        assert_eq!(host.override_stage(), None);
    }

    #[test]
    fn reopening_a_same_named_dataset_reloads_the_plot() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        frame(&mut panel, &mut host);
        let before = panel.data_generation();

        host.open_dataset(dataset("ds", vec![method("umap", 3, None)]));
        panel.on_dataset_opened(&host);
        let effects = frame(&mut panel, &mut host);
        assert!(matches!(effects.as_slice(), [Effect::Load(_)]));
        assert!(panel.data_generation() > before);
    }

    #[test]
    fn host_sample_pick_on_a_patch_run_builds_no_stage() {
        let (mut panel, mut host) = setup(vec![method("patches", 3, Some("gt"))]);
        frame(&mut panel, &mut host);
        host.toggle_sample("s1");
        let effects = frame(&mut panel, &mut host);
        assert!(!effects.iter().any(|e| matches!(e, Effect::BuildStage(_))));
        assert_eq!(host.override_stage(), None);

        // a plot selection installs a stage; a later host pick outranks it and retracts
        host.toggle_sample("s1");
        panel.select_points(&mut host, ids(&["p1"]), Vec::new());
        frame(&mut panel, &mut host);
        assert!(host.override_stage().is_some());
        host.toggle_sample("s1");
        let effects = frame(&mut panel, &mut host);
        assert!(!effects.iter().any(|e| matches!(e, Effect::BuildStage(_))));
        assert_eq!(host.override_stage(), None);
    }

    #[test]
    fn sample_runs_never_build_stages() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        frame(&mut panel, &mut host);
        host.set_override_stage(Some(StageExpression::Select { sample_ids: ids(&["s9"]) }));
        panel.select_points(&mut host, ids(&["s1"]), Vec::new());
        let effects = frame(&mut panel, &mut host);
        assert!(!effects.iter().any(|e| matches!(e, Effect::BuildStage(_))));
        assert_eq!(host.override_stage(), None);
    }

    #[test]
    fn data_and_selection_changes_leave_camera_counters_alone() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        frame(&mut panel, &mut host);
        panel.select_points(&mut host, ids(&["s1"]), Vec::new());
        host.shuffle_colors();
        frame(&mut panel, &mut host);
        assert_eq!(*panel.camera(), CameraRevisionTracker::new());
        panel.reset_zoom();
        assert_eq!((panel.camera().zoom_revision(), panel.camera().camera_reset_token()), (1, 0));
        panel.reset_camera();
        assert_eq!((panel.camera().zoom_revision(), panel.camera().camera_reset_token()), (1, 1));
    }

    #[test]
    fn pushed_payload_commits_when_confirmed() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        let effects = panel.tick(&mut host);
        let [Effect::Load(request)] = effects.as_slice() else {
            panic!("expected one load");
        };
        assert!(!panel.on_push(request.seq, "other", payload(&["x"])));
        assert!(!panel.on_push(request.seq + 1, "umap", payload(&["x"])));
        assert!(panel.on_push(request.seq, "umap", payload(&["s1", "s2"])));
        assert!(matches!(
            panel.on_load(&mut host, request.seq, Ok(LoadResponse::Pushed)),
            LoadOutcome::Committed
        ));
        assert_eq!(panel.plot_data().unwrap().sample_ids, ids(&["s1", "s2"]));
    }

    #[test]
    fn retry_reissues_a_failed_load() {
        let (mut panel, mut host) = setup(vec![method("umap", 3, None)]);
        panel.select_visualization(Some("missing".into()));
        frame(&mut panel, &mut host);
        assert!(matches!(panel.load_state(), LoadState::Error(_)));
        panel.retry();
        let effects = panel.tick(&mut host);
        assert!(matches!(effects.as_slice(), [Effect::Load(_)]));
    }
}
