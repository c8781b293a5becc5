use serde::{Deserialize, Serialize};

/// Sentinel colour-by choice meaning "do not colour by any field".
pub const UNCOLORED: &str = "uncolored";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Classification,
    Detections,
    Int,
    Float,
    String,
    Bool,
}

impl FieldKind {
    /// Nested attribute paths exposed by label fields.
    pub fn sub_paths(&self) -> &'static [&'static str] {
        match self {
            FieldKind::Classification => &["label", "confidence"],
            FieldKind::Detections => &["detections.label", "detections.confidence"],
            _ => &[],
        }
    }
}

/// One top-level field of a dataset schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// Candidate colour-by paths for a schema: the `uncolored` sentinel, every
/// field, then each label field's nested sub-paths right after it.
pub fn color_by_choices(schema: &[FieldDescriptor]) -> Vec<String> {
    let mut choices = vec![UNCOLORED.to_string()];
    for field in schema {
        choices.push(field.name.clone());
        for sub in field.kind.sub_paths() {
            choices.push(format!("{}.{}", field.name, sub));
        }
    }
    choices
}

/// Map a user-facing choice to the field path sent with load requests.
pub fn normalize_color_by(choice: Option<&str>) -> Option<String> {
    match choice {
        None | Some(UNCOLORED) | Some("") => None,
        Some(path) => Some(path.to_string()),
    }
}

/// Whether `path` names a field (or sub-path) of `schema`.
pub fn is_known_path(schema: &[FieldDescriptor], path: &str) -> bool {
    schema.iter().any(|f| {
        path == f.name
            || f.kind
                .sub_paths()
                .iter()
                .any(|sub| path.strip_prefix(f.name.as_str()).and_then(|rest| rest.strip_prefix('.')) == Some(*sub))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor { name: name.into(), kind }
    }

    #[test]
    fn choices_include_label_sub_paths() {
        let schema = vec![
            field("ground_truth", FieldKind::Detections),
            field("uniqueness", FieldKind::Float),
            field("predicted", FieldKind::Classification),
        ];
        assert_eq!(
            color_by_choices(&schema),
            vec![
                "uncolored",
                "ground_truth",
                "ground_truth.detections.label",
                "ground_truth.detections.confidence",
                "uniqueness",
                "predicted",
                "predicted.label",
                "predicted.confidence",
            ]
        );
    }

    #[test]
    fn empty_schema_only_offers_uncolored() {
        assert_eq!(color_by_choices(&[]), vec![UNCOLORED]);
    }

    #[test]
    fn uncolored_normalizes_to_none() {
        assert_eq!(normalize_color_by(Some(UNCOLORED)), None);
        assert_eq!(normalize_color_by(None), None);
        assert_eq!(normalize_color_by(Some("label")), Some("label".into()));
    }

    #[test]
    fn known_paths_cover_sub_paths() {
        let schema = vec![field("gt", FieldKind::Classification)];
        assert!(is_known_path(&schema, "gt"));
        assert!(is_known_path(&schema, "gt.label"));
        assert!(!is_known_path(&schema, "gt.detections.label"));
        assert!(!is_known_path(&schema, "other"));
    }
}
