use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::data::schema::FieldDescriptor;
use crate::error::ProviderError;

/// File holding the dataset manifest inside a dataset directory.
pub const MANIFEST_FILE: &str = "dataset.json";
/// Sub-directory holding one `<key>.json` + `<key>.csv` pair per brain run.
pub const BRAIN_DIR: &str = "brain";

/// One sample of a dataset. Label fields are stored as JSON objects
/// (`{"label": ..}` or `{"detections": [{"id": .., "label": ..}]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub slice: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
}

impl SampleRecord {
    /// Detection objects stored under a Detections field.
    pub fn detections(&self, field: &str) -> &[Value] {
        self.fields
            .get(field)
            .and_then(|v| v.get("detections"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Ids of the detections stored under `field`.
    pub fn label_ids(&self, field: &str) -> Vec<&str> {
        self.detections(field)
            .iter()
            .filter_map(|d| d.get("id").and_then(Value::as_str))
            .collect()
    }
}

/// Metadata of a computed visualization ("brain run").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrainMethodInfo {
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub num_dims: usize,
    #[serde(default)]
    pub patches_field: Option<String>,
}

fn default_method() -> String {
    "umap".to_string()
}

#[derive(Debug, Deserialize)]
struct DatasetManifest {
    name: String,
    #[serde(default)]
    slices: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
    #[serde(default)]
    samples: Vec<SampleRecord>,
}

/// An opened dataset directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub root: PathBuf,
    pub name: String,
    pub slices: Vec<String>,
    pub schema: Vec<FieldDescriptor>,
    pub samples: Vec<SampleRecord>,
    pub brain_methods: Vec<BrainMethodInfo>,
    /// sample id -> position in `samples`
    sample_index: HashMap<String, usize>,
    /// field -> detection id -> (sample position, detection position)
    patch_index: HashMap<String, HashMap<String, (usize, usize)>>,
}

impl Dataset {
    pub fn new(
        root: PathBuf,
        name: String,
        slices: Vec<String>,
        schema: Vec<FieldDescriptor>,
        samples: Vec<SampleRecord>,
        brain_methods: Vec<BrainMethodInfo>,
    ) -> Self {
        let mut sample_index = HashMap::with_capacity(samples.len());
        let mut patch_index: HashMap<String, HashMap<String, (usize, usize)>> = HashMap::new();
        for (i, sample) in samples.iter().enumerate() {
            sample_index.entry(sample.id.clone()).or_insert(i);
            for field in sample.fields.keys() {
                for (j, detection) in sample.detections(field).iter().enumerate() {
                    if let Some(id) = detection.get("id").and_then(Value::as_str) {
                        patch_index
                            .entry(field.clone())
                            .or_default()
                            .entry(id.to_string())
                            .or_insert((i, j));
                    }
                }
            }
        }
        Self {
            root,
            name,
            slices,
            schema,
            samples,
            brain_methods,
            sample_index,
            patch_index,
        }
    }

    pub fn sample(&self, id: &str) -> Option<&SampleRecord> {
        self.sample_index.get(id).map(|&i| &self.samples[i])
    }

    /// Find the sample owning the detection `label_id` in `field`.
    pub fn patch(&self, field: &str, label_id: &str) -> Option<(&SampleRecord, &Value)> {
        let &(i, j) = self.patch_index.get(field)?.get(label_id)?;
        let sample = &self.samples[i];
        Some((sample, &sample.detections(field)[j]))
    }

    pub fn brain_method(&self, key: &str) -> Option<&BrainMethodInfo> {
        self.brain_methods.iter().find(|m| m.key == key)
    }
}

/// Read a dataset directory: the manifest plus every brain run config.
pub fn load_dataset(root: &Path) -> Result<Dataset, ProviderError> {
    let text = std::fs::read_to_string(root.join(MANIFEST_FILE))?;
    let manifest: DatasetManifest = serde_json::from_str(&text)?;

    let mut brain_methods = Vec::new();
    let brain_dir = root.join(BRAIN_DIR);
    if brain_dir.is_dir() {
        for entry in std::fs::read_dir(&brain_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let mut info: BrainMethodInfo = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
            info.key = key.to_string();
            brain_methods.push(info);
        }
    }
    brain_methods.sort_by(|a, b| a.key.cmp(&b.key));

    tracing::info!(
        "Opened dataset '{}' ({} samples, {} visualizations)",
        manifest.name,
        manifest.samples.len(),
        brain_methods.len()
    );

    Ok(Dataset::new(
        root.to_path_buf(),
        manifest.name,
        manifest.slices,
        manifest.fields,
        manifest.samples,
        brain_methods,
    ))
}

/// Raw coordinates of one brain run, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainPoints {
    pub ids: Vec<String>,
    /// Missing trailing components (2D runs) are stored as 0.0.
    pub coords: Vec<[f64; 3]>,
    pub dims: usize,
}

/// Read `brain/<key>.csv` (`sample_id,x,y[,z]` with a header row).
pub fn load_points(root: &Path, key: &str) -> Result<BrainPoints, ProviderError> {
    let path = root.join(BRAIN_DIR).join(format!("{key}.csv"));
    if !path.is_file() {
        return Err(ProviderError::MissingPoints(key.to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)?;
    let dims = reader.headers()?.len().saturating_sub(1);
    if !(1..=3).contains(&dims) {
        return Err(ProviderError::Dimensions { key: key.to_string(), dims });
    }

    let mut ids = Vec::new();
    let mut coords = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(id) = record.get(0) else { continue };
        let mut point = [0.0; 3];
        for (axis, slot) in point.iter_mut().enumerate().take(dims) {
            let cell = record.get(axis + 1).unwrap_or_default();
            *slot = match cell.parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    let line = record.position().map_or(0, |p| p.line());
                    return Err(ProviderError::Failed(format!(
                        "{key}.csv line {line}: '{cell}' is not a coordinate"
                    )));
                }
            };
        }
        ids.push(id.to_string());
        coords.push(point);
    }

    Ok(BrainPoints { ids, coords, dims })
}

/// Walk a dotted field path through a JSON value. Arrays are entered at
/// their first element so `gt.detections.label` works on sample-level runs.
pub fn resolve_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut value = root;
    for part in path {
        if let Value::Array(items) = value {
            value = items.first()?;
        }
        value = value.get(part)?;
    }
    match value {
        Value::Null => None,
        Value::Array(items) => items.first().filter(|v| !v.is_null()),
        v => Some(v),
    }
}
