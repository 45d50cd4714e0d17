use burn::record::RecorderError;
use thiserror::Error;

use crate::{EncoderWeights, ModelName};

/// Errors raised while building segmentation or classification networks.
#[derive(Debug, Error)]
pub enum Error {
    /// The identifier does not name one of the supported U-Net combinations.
    #[error("unsupported model '{0}'")]
    UnsupportedModel(String),

    /// The weight source is not a known name.
    #[error("unknown encoder weights '{0}'")]
    UnknownWeights(String),

    /// The encoder family does not publish the requested weights.
    #[error("weights '{weights}' are not available for {encoder}")]
    UnavailableWeights {
        encoder: &'static str,
        weights: EncoderWeights,
    },

    /// Pretrained weights were requested but the `pretrained` feature is disabled.
    #[error("pretrained weights for {0} require the `pretrained` feature")]
    PretrainedDisabled(&'static str),

    /// The model has no projection head and cannot be used for classification.
    #[error("{0} has no classification head")]
    NoClassificationHead(ModelName),

    #[error("class count must be positive")]
    InvalidClassCount,

    /// Segmentation inputs must be divisible by the encoder's total stride.
    #[error("input size {height}x{width} is not divisible by {stride}")]
    InvalidInputSize {
        height: usize,
        width: usize,
        stride: usize,
    },

    #[error("placement needs at least one device")]
    NoDevice,

    #[error("could not download weights: {0}")]
    Download(#[from] std::io::Error),

    #[error("could not load weights: {0:?}")]
    Record(RecorderError),
}

impl From<RecorderError> for Error {
    fn from(err: RecorderError) -> Self {
        Self::Record(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
