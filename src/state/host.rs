use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::data::loader::{BrainMethodInfo, Dataset, SampleRecord};
use crate::data::schema::FieldDescriptor;

/// One stage of the host's dataset view definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewStage {
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

impl ViewStage {
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self { kind: kind.into(), params }
    }
}

/// Filter expression installed on the view pipeline from a selection.
/// Opaque to the selection core; only the host interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StageExpression {
    /// Keep only the listed samples.
    Select { sample_ids: Vec<String> },
    /// Keep samples carrying any of the listed labels in `field`.
    SelectLabels { field: String, label_ids: Vec<String> },
}

/// Host-wide selection shared between panels, tagged with its owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedSelection {
    pub selection: Option<Vec<String>>,
    pub scope: Option<String>,
    /// Geometric selection made in another panel (e.g. a map region).
    pub spatial_selection: Option<Value>,
}

/// A label picked in a patches view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedLabel {
    pub field: String,
    pub label_id: String,
    pub sample_id: String,
}

/// Which dataset is open. Every `open_dataset` bumps `generation`, so
/// reopening a directory or opening another one with the same name still
/// reads as a different dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetIdentity {
    pub name: String,
    pub generation: u64,
}

/// Snapshot of every host input whose change must reload the plot.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSignature {
    pub dataset: Option<DatasetIdentity>,
    pub view: Vec<ViewStage>,
    pub filters: BTreeMap<String, Value>,
    pub slices: Vec<String>,
    pub color_seed: u64,
}

/// In-process stand-in for the host application's state store.
///
/// Each piece of state has exactly one writer path through the methods
/// below; panels never reach into the fields directly.
#[derive(Debug, Default)]
pub struct HostState {
    dataset: Option<Dataset>,
    dataset_generation: u64,
    view: Vec<ViewStage>,
    filters: BTreeMap<String, Value>,
    slices: Vec<String>,
    color_seed: u64,
    selected_samples: Vec<String>,
    selected_labels: Vec<SelectedLabel>,
    extended_selection: ExtendedSelection,
    override_stage: Option<StageExpression>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active dataset. Every selection and filter is reset.
    pub fn open_dataset(&mut self, dataset: Dataset) {
        self.slices = dataset.slices.first().cloned().into_iter().collect();
        self.dataset = Some(dataset);
        self.dataset_generation += 1;
        self.view.clear();
        self.filters.clear();
        self.selected_samples.clear();
        self.selected_labels.clear();
        self.extended_selection = ExtendedSelection::default();
        self.override_stage = None;
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn dataset_identity(&self) -> Option<DatasetIdentity> {
        self.dataset.as_ref().map(|d| DatasetIdentity {
            name: d.name.clone(),
            generation: self.dataset_generation,
        })
    }

    pub fn brain_methods(&self) -> &[BrainMethodInfo] {
        self.dataset.as_ref().map(|d| d.brain_methods.as_slice()).unwrap_or_default()
    }

    pub fn brain_method(&self, key: &str) -> Option<&BrainMethodInfo> {
        self.dataset.as_ref().and_then(|d| d.brain_method(key))
    }

    pub fn schema(&self) -> &[FieldDescriptor] {
        self.dataset.as_ref().map(|d| d.schema.as_slice()).unwrap_or_default()
    }

    pub fn view(&self) -> &[ViewStage] {
        &self.view
    }

    pub fn set_view(&mut self, view: Vec<ViewStage>) {
        self.view = view;
    }

    pub fn filters(&self) -> &BTreeMap<String, Value> {
        &self.filters
    }

    /// Set (`Some`) or remove (`None`) the filter on `field`.
    pub fn set_filter(&mut self, field: &str, value: Option<Value>) {
        match value {
            Some(v) => {
                self.filters.insert(field.to_string(), v);
            }
            None => {
                self.filters.remove(field);
            }
        }
    }

    pub fn slices(&self) -> &[String] {
        &self.slices
    }

    pub fn set_slices(&mut self, slices: Vec<String>) {
        self.slices = slices;
    }

    pub fn color_seed(&self) -> u64 {
        self.color_seed
    }

    pub fn shuffle_colors(&mut self) {
        self.color_seed = self.color_seed.wrapping_add(1);
    }

    pub fn view_signature(&self) -> ViewSignature {
        ViewSignature {
            dataset: self.dataset_identity(),
            view: self.view.clone(),
            filters: self.filters.clone(),
            slices: self.slices.clone(),
            color_seed: self.color_seed,
        }
    }

    // --- Sample selection ---------------------------------------------------

    pub fn selected_samples(&self) -> &[String] {
        &self.selected_samples
    }

    pub fn set_selected_samples(&mut self, ids: Vec<String>) {
        self.selected_samples = dedup_ordered(ids);
    }

    pub fn toggle_sample(&mut self, id: &str) {
        if let Some(pos) = self.selected_samples.iter().position(|s| s == id) {
            self.selected_samples.remove(pos);
        } else {
            self.selected_samples.push(id.to_string());
        }
    }

    // --- Patch selection ----------------------------------------------------

    pub fn set_selected_labels(&mut self, labels: Vec<SelectedLabel>) {
        self.selected_labels = labels;
    }

    pub fn toggle_label(&mut self, label: SelectedLabel) {
        if let Some(pos) = self.selected_labels.iter().position(|l| *l == label) {
            self.selected_labels.remove(pos);
        } else {
            self.selected_labels.push(label);
        }
    }

    pub fn selected_labels(&self) -> &[SelectedLabel] {
        &self.selected_labels
    }

    /// Selected label ids in `field`; empty without a patches field.
    pub fn selected_patch_ids(&self, field: Option<&str>) -> Vec<String> {
        let Some(field) = field else {
            return Vec::new();
        };
        self.selected_labels
            .iter()
            .filter(|l| l.field == field)
            .map(|l| l.label_id.clone())
            .collect()
    }

    /// Samples owning at least one selected label, in selection order.
    pub fn selected_patch_samples(&self) -> Vec<String> {
        dedup_ordered(self.selected_labels.iter().map(|l| l.sample_id.clone()).collect())
    }

    // --- Extended selection -------------------------------------------------

    pub fn extended_selection(&self) -> &ExtendedSelection {
        &self.extended_selection
    }

    pub fn set_extended_selection(&mut self, selection: Option<Vec<String>>, scope: &str) {
        self.extended_selection = ExtendedSelection {
            selection,
            scope: Some(scope.to_string()),
            spatial_selection: None,
        };
    }

    pub fn set_spatial_selection(&mut self, region: Option<Value>, scope: &str) {
        self.extended_selection = ExtendedSelection {
            selection: None,
            scope: Some(scope.to_string()),
            spatial_selection: region,
        };
    }

    pub fn reset_extended_selection(&mut self) {
        self.extended_selection = ExtendedSelection::default();
    }

    pub fn override_stage(&self) -> Option<&StageExpression> {
        self.override_stage.as_ref()
    }

    pub fn set_override_stage(&mut self, stage: Option<StageExpression>) {
        self.override_stage = stage;
    }

    // --- Derived view -------------------------------------------------------

    /// Samples passing slices, filters and the override stage.
    pub fn visible_samples(&self) -> Vec<&SampleRecord> {
        let Some(dataset) = self.dataset.as_ref() else {
            return Vec::new();
        };
        dataset
            .samples
            .iter()
            .filter(|s| self.in_slices(s))
            .filter(|s| self.filters.iter().all(|(field, value)| matches_filter(s, field, value)))
            .filter(|s| match &self.override_stage {
                None => true,
                Some(StageExpression::Select { sample_ids }) => sample_ids.contains(&s.id),
                Some(StageExpression::SelectLabels { field, label_ids }) => s
                    .label_ids(field)
                    .iter()
                    .any(|id| label_ids.iter().any(|l| l == id)),
            })
            .collect()
    }

    fn in_slices(&self, sample: &SampleRecord) -> bool {
        match &sample.slice {
            Some(slice) if !self.slices.is_empty() => self.slices.contains(slice),
            _ => true,
        }
    }
}

fn matches_filter(sample: &SampleRecord, field: &str, value: &Value) -> bool {
    if field == "tags" {
        return match value {
            Value::String(tag) => sample.tags.contains(tag),
            Value::Array(tags) => tags
                .iter()
                .filter_map(Value::as_str)
                .any(|t| sample.tags.iter().any(|s| s == t)),
            _ => true,
        };
    }
    sample.fields.get(field) == Some(value)
}

fn dedup_ordered(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{load_dataset, tests::write_fixture};
    use serde_json::json;

    fn host() -> HostState {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let mut host = HostState::new();
        host.open_dataset(load_dataset(dir.path()).unwrap());
        host
    }

    fn visible_ids(host: &HostState) -> Vec<&str> {
        host.visible_samples().iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn opening_a_dataset_activates_the_first_slice() {
        let host = host();
        assert_eq!(host.dataset_identity().map(|d| d.name), Some("quickstart".to_string()));
        assert_eq!(host.slices(), ["left".to_string()]);
        assert_eq!(visible_ids(&host), vec!["s1", "s3"]);
    }

    #[test]
    fn tag_filter_and_override_stage_narrow_the_view() {
        let mut host = host();
        host.set_slices(Vec::new());
        host.set_filter("tags", Some(json!("train")));
        assert_eq!(visible_ids(&host), vec!["s1", "s3"]);
        host.set_override_stage(Some(StageExpression::Select { sample_ids: vec!["s3".into()] }));
        assert_eq!(visible_ids(&host), vec!["s3"]);
        host.set_filter("tags", None);
        host.set_override_stage(Some(StageExpression::SelectLabels {
            field: "ground_truth".into(),
            label_ids: vec!["p3".into()],
        }));
        assert_eq!(visible_ids(&host), vec!["s2"]);
    }

    #[test]
    fn patch_selection_derives_patch_samples() {
        let mut host = host();
        for (label, sample) in [("p2", "s2"), ("p3", "s2"), ("p1", "s1")] {
            host.toggle_label(SelectedLabel {
                field: "ground_truth".into(),
                label_id: label.into(),
                sample_id: sample.into(),
            });
        }
        assert_eq!(host.selected_patch_ids(Some("ground_truth")), vec!["p2", "p3", "p1"]);
        assert!(host.selected_patch_ids(None).is_empty());
        assert_eq!(host.selected_patch_samples(), vec!["s2", "s1"]);
    }

    #[test]
    fn sample_selection_is_deduplicated() {
        let mut host = host();
        host.set_selected_samples(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(host.selected_samples(), ["a".to_string(), "b".to_string()]);
        host.toggle_sample("a");
        assert_eq!(host.selected_samples(), ["b".to_string()]);
    }

    #[test]
    fn signature_tracks_view_inputs() {
        let mut host = host();
        let before = host.view_signature();
        host.shuffle_colors();
        assert_ne!(before, host.view_signature());
    }

    #[test]
    fn reopening_a_same_named_dataset_changes_identity() {
        let mut host = host();
        let first = host.dataset_identity().unwrap();
        let before = host.view_signature();

        let other = tempfile::tempdir().unwrap();
        write_fixture(other.path());
        host.open_dataset(load_dataset(other.path()).unwrap());

        let second = host.dataset_identity().unwrap();
        assert_eq!(first.name, second.name);
        assert_ne!(first, second);
        assert_ne!(before, host.view_signature());
    }
}
