use std::collections::HashSet;
use serde_json::Value;
use crate::config::DimensionPolicy;
use crate::data::colors;
use crate::data::loader::{self, Dataset, SampleRecord};
use crate::data::schema;
use crate::error::ProviderError;
use crate::provider::{EmbeddingsProvider, PlotPublisher};
use crate::state::host::StageExpression;
use crate::state::plot_data::PlotPayload;
use crate::sync::extended_stage::StageRequest;
use crate::sync::view_change::{LoadParams, LoadResponse};

/// Serves visualizations from an opened dataset directory.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    dataset: Dataset,
    policy: DimensionPolicy,
}

impl DirectoryProvider {
    pub fn new(dataset: Dataset, policy: DimensionPolicy) -> Self {
        Self { dataset, policy }
    }

    /// Value of `path` for one point. Patch runs resolve
    /// `<patches_field>.detections.<attr>` on the point's own detection.
    fn point_value<'a>(
        &'a self,
        point_id: &str,
        path: &[&str],
        patches_field: Option<&str>,
    ) -> Option<&'a Value> {
        if let Some(field) = patches_field {
            let (sample, detection) = self.dataset.patch(field, point_id)?;
            return match path {
                [head, "detections", rest @ ..] if *head == field => loader::resolve_path(detection, rest),
                _ => sample_value(sample, path),
            };
        }
        sample_value(self.dataset.sample(point_id)?, path)
    }
}

fn sample_value<'a>(sample: &'a SampleRecord, path: &[&str]) -> Option<&'a Value> {
    let (head, rest) = path.split_first()?;
    loader::resolve_path(sample.fields.get(*head)?, rest)
}

impl EmbeddingsProvider for DirectoryProvider {
    /// Plot data goes out on the side channel; the reply only confirms it.
    fn load_visualization(
        &self,
        params: &LoadParams,
        publisher: &PlotPublisher,
    ) -> Result<LoadResponse, ProviderError> {
        let key = params.visualization_key.as_str();
        let method = self
            .dataset
            .brain_method(key)
            .ok_or_else(|| ProviderError::UnknownVisualization(key.to_string()))?;
        if !self.policy.admits(method.num_dims) {
            return Err(ProviderError::Dimensions { key: key.to_string(), dims: method.num_dims });
        }

        let points = loader::load_points(&self.dataset.root, key)?;
        if !self.policy.admits(points.dims) {
            return Err(ProviderError::Dimensions { key: key.to_string(), dims: points.dims });
        }
        tracing::debug!("Brain results '{key}' loaded: {} points, {}D", points.ids.len(), points.dims);

        let patches_field = method.patches_field.as_deref();
        let (labels, point_colors, scheme) = match params.color_by.as_deref() {
            None => colors::uniform(&points.ids),
            Some(path) => {
                if !schema::is_known_path(&self.dataset.schema, path) {
                    return Err(ProviderError::UnknownField(path.to_string()));
                }
                let parts: Vec<&str> = path.split('.').collect();
                let values: Vec<Option<&Value>> = points
                    .ids
                    .iter()
                    .map(|id| self.point_value(id, &parts, patches_field))
                    .collect();
                colors::colorize(&values)
            }
        };

        publisher.publish(PlotPayload {
            x: Some(points.coords.iter().map(|p| p[0]).collect()),
            y: Some(points.coords.iter().map(|p| p[1]).collect()),
            z: Some(points.coords.iter().map(|p| p[2]).collect()),
            sample_ids: Some(points.ids),
            labels: Some(labels),
            colors: Some(point_colors),
            color_scheme: Some(scheme),
            patches_field: method.patches_field.clone(),
        })?;
        Ok(LoadResponse::Pushed)
    }

    fn apply_selection(&self, sample_ids: &[String]) -> Result<Vec<String>, ProviderError> {
        let known: HashSet<&str> = self.dataset.samples.iter().map(|s| s.id.as_str()).collect();
        Ok(sample_ids
            .iter()
            .filter(|id| known.contains(id.as_str()))
            .cloned()
            .collect())
    }

    fn build_extended_stage(&self, request: &StageRequest) -> Result<Option<StageExpression>, ProviderError> {
        if request.dataset.name != self.dataset.name {
            return Err(ProviderError::Failed(format!(
                "stage requested for dataset '{}' but '{}' is open",
                request.dataset.name, self.dataset.name
            )));
        }
        let Some(selection) = request.selection.clone() else {
            return Ok(None);
        };
        Ok(Some(match &request.patches_field {
            Some(field) => StageExpression::SelectLabels { field: field.clone(), label_ids: selection },
            None => StageExpression::Select { sample_ids: selection },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{load_dataset, tests::write_fixture};
    use crate::provider::PushOutbox;
    use crate::state::host::DatasetIdentity;
    use crate::state::plot_data::{ColorScheme, PlotData, PointColors};

    fn provider(policy: DimensionPolicy) -> DirectoryProvider {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        // Keep the directory alive for the whole test process.
        let path = dir.into_path();
        DirectoryProvider::new(load_dataset(&path).unwrap(), policy)
    }

    fn load(p: &DirectoryProvider, key: &str, color_by: Option<&str>) -> Result<PlotData, ProviderError> {
        let params = LoadParams {
            visualization_key: key.into(),
            color_by: color_by.map(str::to_string),
        };
        let outbox = PushOutbox::default();
        let response = p.load_visualization(&params, &outbox.publisher(1, key))?;
        assert!(matches!(response, LoadResponse::Pushed));
        let mut pushed = outbox.drain();
        assert_eq!(pushed.len(), 1);
        let pushed = pushed.remove(0);
        assert_eq!((pushed.seq, pushed.visualization_key.as_str()), (1, key));
        Ok(PlotData::try_from(pushed.payload).unwrap())
    }

    #[test]
    fn uncolored_load_uses_id_prefixes() {
        let data = load(&provider(DimensionPolicy::Strict3d), "umap3d", None).unwrap();
        assert_eq!(data.sample_ids, vec!["s1", "s2", "s3"]);
        assert_eq!(data.color_scheme, ColorScheme::Uniform);
        assert_eq!(data.position(1), [1.0, 0.5, 0.0]);
    }

    #[test]
    fn classification_labels_are_categorical() {
        let data = load(&provider(DimensionPolicy::Strict3d), "umap3d", Some("predicted.label")).unwrap();
        assert_eq!(data.color_scheme, ColorScheme::Categorical);
        assert_eq!(data.labels, vec!["cat", "dog", "cat"]);
    }

    #[test]
    fn numeric_fields_are_continuous() {
        let data = load(&provider(DimensionPolicy::Strict3d), "umap3d", Some("uniqueness")).unwrap();
        assert_eq!(data.color_scheme, ColorScheme::Continuous);
        assert_eq!(data.colors, PointColors::Numeric(vec![0.5, 0.25, 0.0]));
    }

    #[test]
    fn patch_runs_color_by_their_own_detection() {
        let data = load(
            &provider(DimensionPolicy::Strict3d),
            "patches",
            Some("ground_truth.detections.label"),
        )
        .unwrap();
        assert_eq!(data.labels, vec!["ear", "paw", "ear"]);
        assert_eq!(data.patches_field.as_deref(), Some("ground_truth"));
    }

    #[test]
    fn strict_policy_rejects_2d_runs() {
        let p = provider(DimensionPolicy::Strict3d);
        assert!(matches!(
            load(&p, "tsne2d", None),
            Err(ProviderError::Dimensions { dims: 2, .. })
        ));
        let data = load(&provider(DimensionPolicy::Permissive), "tsne2d", None).unwrap();
        assert_eq!(data.z, vec![0.0, 0.0]);
    }

    #[test]
    fn unknown_keys_and_fields_fail() {
        let p = provider(DimensionPolicy::Strict3d);
        assert!(matches!(load(&p, "nope", None), Err(ProviderError::UnknownVisualization(_))));
        assert!(matches!(load(&p, "umap3d", Some("bogus")), Err(ProviderError::UnknownField(_))));
    }

    #[test]
    fn exported_selection_keeps_known_samples() {
        let p = provider(DimensionPolicy::Strict3d);
        let ids = vec!["s2".to_string(), "p1".to_string()];
        assert_eq!(p.apply_selection(&ids).unwrap(), vec!["s2"]);
    }

    #[test]
    fn stages_follow_the_patches_field() {
        let p = provider(DimensionPolicy::Strict3d);
        let mut req = StageRequest {
            seq: 1,
            dataset: DatasetIdentity { name: "quickstart".into(), generation: 1 },
            selection: Some(vec!["p1".into()]),
            patches_field: Some("ground_truth".into()),
        };
        assert_eq!(
            p.build_extended_stage(&req).unwrap(),
            Some(StageExpression::SelectLabels {
                field: "ground_truth".into(),
                label_ids: vec!["p1".into()]
            })
        );
        req.patches_field = None;
        assert!(matches!(
            p.build_extended_stage(&req).unwrap(),
            Some(StageExpression::Select { .. })
        ));
        req.selection = None;
        assert_eq!(p.build_extended_stage(&req).unwrap(), None);
        req.dataset.name = "other".into();
        assert!(p.build_extended_stage(&req).is_err());
    }
}
