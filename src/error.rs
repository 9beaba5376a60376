// File: error.rs
// License: Apache v2.0

use std::io;
use thiserror::Error;

pub type Result<T, E = SceneError> = std::result::Result<T, E>;

/// Errors raised while authoring, building or exporting a scene.
///
/// Every failure is fatal to the call that produced it. Nothing is retried
/// internally and `Scene::build` never returns a partially built scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("scene {0} already exists")]
    DuplicateScene(String),

    #[error("scene {0} does not exist")]
    UnknownScene(String),

    #[error("ref_name '{0}' already exists")]
    DuplicateObject(String),

    #[error("object {0} does not exist")]
    UnknownObject(String),

    #[error("asset name '{0}' already exists")]
    DuplicateAsset(String),

    #[error("mesh_name '{0}' does not exist")]
    UnknownMesh(String),

    #[error("asset '{0}' is not a stitch")]
    NotAStitch(String),

    #[error("{name}: {reason}")]
    Topology { name: String, reason: String },

    #[error("invalid axis '{0}', expected x, y or z")]
    InvalidAxis(String),

    #[error("object {0} is static")]
    ObjectIsStatic(String),

    #[error("{0}: vertex does not exist")]
    NoVertices(String),

    #[error("{0}: face does not exist")]
    NoFaces(String),

    #[error("time must be greater than the last time. last time is {last}, got {time}")]
    TimeOrder { last: f64, time: f64 },

    #[error("time must be greater than zero")]
    ZeroTime,

    #[error("target must have the same length as pin ({expected} rows), got {actual}")]
    TargetLength { expected: usize, actual: usize },

    #[error("duplicated indices {0:?}")]
    DuplicatePin(Vec<usize>),

    #[error("ex and ey must be orthogonal. ex: {ex:?}, ey: {ey:?}")]
    NotOrthogonal { ex: [f64; 3], ey: [f64; 3] },

    #[error("{axis} must be orthogonal to the face normal. normal: {normal:?}")]
    NotTangent { axis: &'static str, normal: [f64; 3] },

    #[error("{name} must not be a zero vector, got {value:?}")]
    ZeroVector { name: &'static str, value: [f64; 3] },

    #[error("already normalized")]
    AlreadyNormalized,

    #[error("stitch weight row {row} sums to {sum}, expected 1")]
    StitchWeight { row: usize, sum: f64 },

    #[error("no area")]
    NoArea,

    #[error("{0} is empty")]
    EmptyGeometry(&'static str),

    #[error("file {0} already exists")]
    AlreadyExists(String),

    #[error("no plot")]
    NoPlot,

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {reason}")]
    Format { path: String, reason: String },

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("snapshot: {0}")]
    Snapshot(#[from] bincode::Error),
}

impl SceneError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        SceneError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn format(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        SceneError::Format {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }
}
