// Error types shared across the trainer pipeline
use std::path::PathBuf;

use crate::env::base_env::ActionSpec;

#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error("can't load demonstration data from an unsupported version ({0})")]
    UnsupportedDemoVersion(i32),

    #[error("no BrainParameters found in demonstration file at {}", .0.display())]
    MissingBehaviorSpec(PathBuf),

    #[error("the actions {demo:?} in demonstration do not match the policy's {policy:?}")]
    ActionSpecMismatch { demo: ActionSpec, policy: ActionSpec },

    #[error(
        "the demonstration has {demo} observations but the policy expects {policy}"
    )]
    ObservationCountMismatch { demo: usize, policy: usize },

    #[error(
        "the shape {demo:?} for observation {index} in demonstration does not match the policy's {policy:?}"
    )]
    ObservationShapeMismatch {
        index: usize,
        demo: Vec<usize>,
        policy: Vec<usize>,
    },

    #[error("the path {} is not a '.demo' file", .0.display())]
    NotADemoFile(PathBuf),

    #[error("there are no '.demo' files in {}", .0.display())]
    NoDemoFiles(PathBuf),

    #[error("the demonstration file or directory {} does not exist", .0.display())]
    DemoPathNotFound(PathBuf),

    #[error("demonstration metadata is {0} bytes, more than the reserved header")]
    MetadataTooLarge(usize),

    #[error("record at byte {pos} claims {len} bytes but only {available} remain")]
    TruncatedRecord {
        pos: usize,
        len: usize,
        available: usize,
    },

    #[error("observation {0} is compressed; only float observations are supported")]
    CompressedObservation(usize),

    #[error("buffer error: {0}")]
    Buffer(String),

    #[error("environment error: {0}")]
    Environment(String),

    #[error("policy error: {0}")]
    Policy(String),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
