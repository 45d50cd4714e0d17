use burn::{config::Config, prelude::*};
use log::info;

use crate::{
    model::{SegmentationModel, SegmentationModelConfig},
    placement::{DataParallel, Placement},
    EncoderWeights, Error, ModelName,
};

/// Builds U-Net segmentation networks from a model identifier.
///
/// ```no_run
/// # use burn::backend::NdArray;
/// # use segmentation_factory_burn::{EncoderWeights, ModelFactory};
/// let factory = ModelFactory::new("efficientnet-b3".parse()?).with_weights(EncoderWeights::Random);
/// let model = factory.resolve::<NdArray>(&Default::default())?;
/// # Ok::<(), segmentation_factory_burn::Error>(())
/// ```
#[derive(Config, Debug)]
pub struct ModelFactory {
    pub model: ModelName,
    #[config(default = "EncoderWeights::ImageNet")]
    pub weights: EncoderWeights,
    #[config(default = 4)]
    pub classes: usize,
}

impl ModelFactory {
    /// Build the network on `device`.
    pub fn resolve<B: Backend>(
        &self,
        device: &B::Device,
    ) -> crate::Result<SegmentationModel<B>> {
        if self.classes == 0 {
            return Err(Error::InvalidClassCount);
        }

        let encoder = self.model.encoder();
        if !encoder.has_weights(self.weights) {
            return Err(Error::UnavailableWeights {
                encoder: encoder.name(),
                weights: self.weights,
            });
        }

        info!("Using model: {}", self.model);
        if !self.weights.is_pretrained() {
            info!("Random initialize weights...");
        }

        SegmentationModelConfig::new(encoder, self.classes).init(self.weights, device)
    }

    /// Build the network on the primary device of `placement` and replicate it across
    /// the remaining ones.
    pub fn resolve_and_distribute<B: Backend>(
        &self,
        placement: &Placement<B>,
    ) -> crate::Result<DataParallel<B, SegmentationModel<B>>> {
        let model = self.resolve(placement.primary())?;
        Ok(DataParallel::new(model, placement))
    }
}
