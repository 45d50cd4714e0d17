pub mod densenet;
pub mod dpn;
pub mod efficientnet;
pub mod resnet;
pub mod senet;

mod backbone;
pub use backbone::*;

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

#[cfg(feature = "pretrained")]
use std::path::PathBuf;

use crate::EncoderWeights;

/// Number of feature maps returned by every encoder: the input followed by one map
/// per downsampling stage (strides 2, 4, 8, 16 and 32).
pub const NUM_FEATURES: usize = 6;

pub trait Encoder<B: Backend>: Module<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>>;
}

/// Backend independent description of an encoder variant.
pub trait EncoderSpec {
    /// Cache directory prefix for downloaded weights.
    const FAMILY: &'static str;

    fn name(&self) -> &'static str;
    fn out_channels(&self) -> Vec<usize>;
    fn url(&self, weights: EncoderWeights) -> Option<&'static str>;

    /// Key remapping from the PyTorch state dict to the encoder's record.
    #[cfg(feature = "pretrained")]
    fn key_remap(&self) -> Vec<(String, String)>;
}

pub trait EncoderConfig<B: Backend>: EncoderSpec {
    type Encoder: Encoder<B>;

    /// Randomly initialized encoder.
    fn init(&self, device: &B::Device) -> Self::Encoder;

    /// Initialize the encoder with the requested weights, downloading them if needed.
    fn init_with(
        &self,
        weights: EncoderWeights,
        device: &B::Device,
    ) -> crate::Result<Self::Encoder> {
        let encoder = self.init(device);
        if !weights.is_pretrained() {
            return Ok(encoder);
        }

        let url = self.url(weights).ok_or(crate::Error::UnavailableWeights {
            encoder: self.name(),
            weights,
        })?;

        #[cfg(feature = "pretrained")]
        {
            let file = crate::download(Self::FAMILY, url)?;
            load_pytorch_weights(encoder, file, self.key_remap(), device)
        }
        #[cfg(not(feature = "pretrained"))]
        {
            let _ = (encoder, url);
            Err(crate::Error::PretrainedDisabled(self.name()))
        }
    }
}

/// Load a PyTorch state dict into `module`, applying each `(pattern, replacement)` key
/// remap in order.
#[cfg(feature = "pretrained")]
fn load_pytorch_weights<B: Backend, M: Module<B>>(
    module: M,
    file: PathBuf,
    key_remap: Vec<(String, String)>,
    device: &B::Device,
) -> crate::Result<M> {
    use burn::record::{FullPrecisionSettings, Recorder};
    use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

    let load_args = key_remap
        .iter()
        .fold(LoadArgs::new(file), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        });
    let record = PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)?;

    Ok(module.load_record(record))
}
