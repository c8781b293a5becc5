use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::error::ValidationError;

/// Colour used for every point when the plot is not coloured by a field.
pub const UNIFORM_COLOR: &str = "#1f77b4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Categorical,
    Continuous,
    Uniform,
}

/// Per-point colour values. Continuous plots carry numbers that are mapped
/// through a colour ramp at render time; the others carry hex strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointColors {
    Numeric(Vec<f64>),
    Named(Vec<String>),
}

impl PointColors {
    pub fn len(&self) -> usize {
        match self {
            PointColors::Numeric(v) => v.len(),
            PointColors::Named(v) => v.len(),
        }
    }
}

/// Wire shape of a visualization payload as delivered by a provider.
/// Every array is optional here so that a malformed payload can be
/// rejected with a precise error instead of a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotPayload {
    pub x: Option<Vec<f64>>,
    pub y: Option<Vec<f64>>,
    pub z: Option<Vec<f64>>,
    pub sample_ids: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
    pub colors: Option<PointColors>,
    pub color_scheme: Option<ColorScheme>,
    /// Patches field the points were computed on, if any.
    #[serde(default)]
    pub patches_field: Option<String>,
}

/// A validated visualization: equal-length columns, one row per point.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub labels: Vec<String>,
    pub colors: PointColors,
    pub sample_ids: Vec<String>,
    pub color_scheme: ColorScheme,
    pub patches_field: Option<String>,
}

impl TryFrom<PlotPayload> for PlotData {
    type Error = ValidationError;

    fn try_from(payload: PlotPayload) -> Result<Self, Self::Error> {
        let x = payload.x.ok_or(ValidationError::MissingArray("x"))?;
        let y = payload.y.ok_or(ValidationError::MissingArray("y"))?;
        let z = payload.z.ok_or(ValidationError::MissingArray("z"))?;
        let sample_ids = payload
            .sample_ids
            .ok_or(ValidationError::MissingArray("sample_ids"))?;

        let n = sample_ids.len();
        check_len("x", n, x.len())?;
        check_len("y", n, y.len())?;
        check_len("z", n, z.len())?;
        for (axis, values) in [("x", &x), ("y", &y), ("z", &z)] {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(ValidationError::NonFiniteCoordinate { axis, index });
            }
        }

        let labels = match payload.labels {
            Some(labels) => {
                check_len("labels", n, labels.len())?;
                labels
            }
            None => sample_ids.clone(),
        };

        let (colors, color_scheme) = match (payload.colors, payload.color_scheme) {
            (Some(colors), Some(scheme)) => (colors, scheme),
            (Some(PointColors::Numeric(v)), None) => {
                (PointColors::Numeric(v), ColorScheme::Continuous)
            }
            (Some(PointColors::Named(v)), None) => {
                (PointColors::Named(v), ColorScheme::Categorical)
            }
            (None, _) => (
                PointColors::Named(vec![UNIFORM_COLOR.to_string(); n]),
                ColorScheme::Uniform,
            ),
        };
        check_len("colors", n, colors.len())?;

        let kind_ok = match (&colors, color_scheme) {
            (PointColors::Numeric(_), ColorScheme::Continuous) => true,
            (PointColors::Named(_), ColorScheme::Categorical | ColorScheme::Uniform) => true,
            // An empty array deserializes as whichever variant comes first.
            (_, _) if n == 0 => true,
            _ => false,
        };
        if !kind_ok {
            return Err(ValidationError::ColorKind { scheme: color_scheme });
        }

        let mut seen = HashSet::with_capacity(n);
        for id in &sample_ids {
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::DuplicateSampleId(id.clone()));
            }
        }

        Ok(Self {
            x,
            y,
            z,
            labels,
            colors,
            sample_ids,
            color_scheme,
            patches_field: payload.patches_field,
        })
    }
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), ValidationError> {
    if expected == found {
        Ok(())
    } else {
        Err(ValidationError::LengthMismatch { field, expected, found })
    }
}

/// Point indices split by membership in the current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPartition {
    pub selected: Vec<usize>,
    pub unselected: Vec<usize>,
}

impl PlotData {
    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn position(&self, index: usize) -> [f64; 3] {
        [self.x[index], self.y[index], self.z[index]]
    }

    /// Split point indices into selected / unselected, preserving order.
    /// With no (or an empty) selection every point is unselected.
    pub fn partition(&self, selection: Option<&[String]>) -> SelectionPartition {
        let selected_ids: HashSet<&str> = selection
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .collect();

        let mut out = SelectionPartition::default();
        for (idx, id) in self.sample_ids.iter().enumerate() {
            if selected_ids.contains(id.as_str()) {
                out.selected.push(idx);
            } else {
                out.unselected.push(idx);
            }
        }
        out
    }

    /// Axis-aligned bounds of all finite points; degenerate axes are padded.
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for (axis, values) in [&self.x, &self.y, &self.z].into_iter().enumerate() {
            for &v in values {
                if v.is_finite() {
                    min[axis] = min[axis].min(v);
                    max[axis] = max[axis].max(v);
                }
            }
        }
        for i in 0..3 {
            if !min[i].is_finite() || !max[i].is_finite() {
                min[i] = -1.0;
                max[i] = 1.0;
            }
            if (max[i] - min[i]).abs() < 1e-12 {
                min[i] -= 0.5;
                max[i] += 0.5;
            }
        }
        (min, max)
    }
}

/// Holds the current plot generation. Only the view-change synchronizer
/// writes here; the store is replaced wholesale, never edited in place.
#[derive(Debug, Default)]
pub struct PlotDataStore {
    current: Option<PlotData>,
    generation: u64,
}

impl PlotDataStore {
    pub fn get(&self) -> Option<&PlotData> {
        self.current.as_ref()
    }

    /// Bumped on every replacement; lets renderers cache derived buffers.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn replace(&mut self, data: PlotData) {
        self.current = Some(data);
        self.generation += 1;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    pub(crate) fn payload(sample_ids: &[&str]) -> PlotPayload {
        let n = sample_ids.len();
        PlotPayload {
            x: Some((0..n).map(|i| i as f64).collect()),
            y: Some(vec![0.0; n]),
            z: Some(vec![1.0; n]),
            sample_ids: Some(ids(sample_ids)),
            ..Default::default()
        }
    }

    #[test]
    fn partition_splits_selected_points() {
        let data = PlotData::try_from(payload(&["s1", "s2", "s3"])).unwrap();
        let sel = ids(&["s2"]);
        let part = data.partition(Some(&sel));
        assert_eq!(part.selected, vec![1]);
        assert_eq!(part.unselected, vec![0, 2]);
    }

    #[test]
    fn partition_without_selection_leaves_everything_unselected() {
        let data = PlotData::try_from(payload(&["a", "b"])).unwrap();
        assert_eq!(data.partition(None).unselected, vec![0, 1]);
        assert!(data.partition(Some(&[])).selected.is_empty());
    }

    #[test]
    fn missing_coordinates_are_rejected() {
        let mut p = payload(&["a"]);
        p.z = None;
        assert_eq!(
            PlotData::try_from(p).unwrap_err(),
            ValidationError::MissingArray("z")
        );
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let mut p = payload(&["a", "b"]);
        p.y = Some(vec![0.0]);
        assert_eq!(
            PlotData::try_from(p).unwrap_err(),
            ValidationError::LengthMismatch { field: "y", expected: 2, found: 1 }
        );
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let mut p = payload(&["a", "b"]);
        p.y = Some(vec![0.0, f64::NAN]);
        assert_eq!(
            PlotData::try_from(p).unwrap_err(),
            ValidationError::NonFiniteCoordinate { axis: "y", index: 1 }
        );
    }

    #[test]
    fn continuous_scheme_needs_numeric_colors() {
        let mut p = payload(&["a"]);
        p.colors = Some(PointColors::Named(ids(&["#fff"])));
        p.color_scheme = Some(ColorScheme::Continuous);
        assert!(matches!(
            PlotData::try_from(p),
            Err(ValidationError::ColorKind { scheme: ColorScheme::Continuous })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let p = payload(&["a", "a"]);
        assert_eq!(
            PlotData::try_from(p).unwrap_err(),
            ValidationError::DuplicateSampleId("a".into())
        );
    }

    #[test]
    fn missing_colors_default_to_uniform() {
        let data = PlotData::try_from(payload(&["a", "b"])).unwrap();
        assert_eq!(data.color_scheme, ColorScheme::Uniform);
        assert_eq!(data.colors, PointColors::Named(ids(&[UNIFORM_COLOR, UNIFORM_COLOR])));
        assert_eq!(data.labels, ids(&["a", "b"]));
    }

    #[test]
    fn payload_parses_from_json() {
        let json = r#"{"x":[1.0],"y":[2.0],"z":[3.0],"sample_ids":["s"],
            "labels":["cat"],"colors":[0.5],"color_scheme":"continuous"}"#;
        let p: PlotPayload = serde_json::from_str(json).unwrap();
        let data = PlotData::try_from(p).unwrap();
        assert_eq!(data.colors, PointColors::Numeric(vec![0.5]));
        assert_eq!(data.position(0), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn store_replacement_bumps_generation() {
        let mut store = PlotDataStore::default();
        assert!(store.get().is_none());
        store.replace(PlotData::try_from(payload(&["a"])).unwrap());
        assert_eq!(store.generation(), 1);
        store.replace(PlotData::try_from(payload(&["b"])).unwrap());
        assert_eq!(store.generation(), 2);
        assert_eq!(store.get().unwrap().sample_ids, ids(&["b"]));
    }
}
