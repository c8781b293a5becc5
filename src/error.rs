use crate::state::plot_data::ColorScheme;

/// A plot payload that cannot be stored.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("plot payload is missing the `{0}` array")]
    MissingArray(&'static str),
    #[error("`{field}` has {found} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("colour values do not match the {scheme:?} colour scheme")]
    ColorKind { scheme: ColorScheme },
    #[error("sample id `{0}` appears more than once")]
    DuplicateSampleId(String),
    #[error("`{axis}` coordinate of point {index} is not a finite number")]
    NonFiniteCoordinate { axis: &'static str, index: usize },
}

/// Failure reported by (or while talking to) the data provider.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("visualization `{0}` does not exist")]
    UnknownVisualization(String),
    #[error("visualization `{key}` has {dims}D embeddings, not 3D")]
    Dimensions { key: String, dims: usize },
    #[error("unknown field path `{0}`")]
    UnknownField(String),
    #[error("visualization `{0}` has no point file")]
    MissingPoints(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("worker error: {0}")]
    Worker(String),
    #[error("{0}")]
    Failed(String),
}

/// Everything that can put the load pipeline into its error state.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("invalid plot data: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("provider finished loading but delivered no plot data")]
    NoData,
}

/// A completed async call whose originating request is no longer current.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("discarded response #{seq}, latest request is #{latest}")]
pub struct StaleResponseDiscarded {
    pub seq: u64,
    pub latest: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
