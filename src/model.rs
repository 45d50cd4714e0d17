use burn::prelude::*;

use crate::{
    decoder::{
        unet::{UnetDecoder, UnetDecoderConfig},
        Decoder, DecoderConfig,
    },
    encoder::{Backbone, Encoder, EncoderPreset},
    segmentation_head::{SegmentationHead, SegmentationHeadConfig},
    EncoderWeights, Error,
};

/// Total downsampling factor of every encoder.
pub const OUTPUT_STRIDE: usize = 32;

/// A network mapping a batch of images to a 4D output tensor.
pub trait ImageModel<B: Backend>: Module<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// U-Net: encoder features fused by the decoder, then projected to per-pixel logits.
#[derive(Module, Debug)]
pub struct SegmentationModel<B: Backend> {
    pub encoder: Backbone<B>,
    pub decoder: UnetDecoder<B>,
    pub head: SegmentationHead<B>,
}

impl<B: Backend> SegmentationModel<B> {
    /// `(batch, 3, h, w)` to `(batch, classes, h, w)`.
    ///
    /// # Panics
    ///
    /// If `h` or `w` is not divisible by [`OUTPUT_STRIDE`]; see [`Self::try_forward`].
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if let Err(err) = check_input_size(&x) {
            panic!("{err}");
        }
        let features = self.encoder.forward(x);
        let x = self.decoder.forward(features);
        self.head.forward(x)
    }

    /// Like [`Self::forward`], returning [`Error::InvalidInputSize`] for inputs the
    /// decoder cannot upsample back to their original size.
    pub fn try_forward(&self, x: Tensor<B, 4>) -> crate::Result<Tensor<B, 4>> {
        check_input_size(&x)?;
        Ok(self.forward(x))
    }

    pub fn into_encoder(self) -> Backbone<B> {
        self.encoder
    }
}

impl<B: Backend> ImageModel<B> for SegmentationModel<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        SegmentationModel::forward(self, x)
    }
}

fn check_input_size<B: Backend>(x: &Tensor<B, 4>) -> crate::Result<()> {
    let [_, _, height, width] = x.dims();
    if height % OUTPUT_STRIDE != 0 || width % OUTPUT_STRIDE != 0 {
        return Err(Error::InvalidInputSize {
            height,
            width,
            stride: OUTPUT_STRIDE,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SegmentationModelConfig {
    encoder: EncoderPreset,
    decoder: UnetDecoderConfig,
    classes: usize,
}

impl SegmentationModelConfig {
    pub fn new(encoder: EncoderPreset, classes: usize) -> Self {
        let decoder = UnetDecoderConfig::new(encoder.out_channels());
        Self {
            encoder,
            decoder,
            classes,
        }
    }

    /// Replace the decoder configuration, rewiring its skip channels to the encoder.
    pub fn with_decoder(self, decoder: UnetDecoderConfig) -> Self {
        let decoder = decoder.with_encoder_channels(self.encoder.out_channels());
        Self { decoder, ..self }
    }

    pub fn init<B: Backend>(
        &self,
        weights: EncoderWeights,
        device: &B::Device,
    ) -> crate::Result<SegmentationModel<B>> {
        let encoder = self.encoder.init(weights, device)?;
        let decoder = self.decoder.init(device);
        let head = SegmentationHeadConfig::new(self.decoder.out_channels(), self.classes)
            .init(device);

        Ok(SegmentationModel {
            encoder,
            decoder,
            head,
        })
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::{encoder::test_utils::TestBackend, ModelName};

    #[test]
    fn custom_decoder_keeps_encoder_channels() {
        let device = Default::default();
        let decoder = UnetDecoderConfig::new(vec![]).with_decoder_channels(vec![64, 32, 16, 16, 8]);
        let config = SegmentationModelConfig::new(ModelName::UnetResNet34.encoder(), 2)
            .with_decoder(decoder);
        let model = config
            .init::<TestBackend>(EncoderWeights::Random, &device)
            .unwrap();

        let x = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
        assert_eq!(model.forward(x).dims(), [1, 2, 64, 64]);
    }

    fn resnet34() -> SegmentationModel<TestBackend> {
        SegmentationModelConfig::new(ModelName::UnetResNet34.encoder(), 2)
            .init(EncoderWeights::Random, &Default::default())
            .unwrap()
    }

    #[test]
    fn try_forward_rejects_sizes_off_the_stride() {
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 48, 64], &Default::default());
        let err = resnet34().try_forward(x).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidInputSize {
                height: 48,
                width: 64,
                stride: 32,
            }
        ));
    }

    #[test]
    #[should_panic(expected = "input size 48x48 is not divisible by 32")]
    fn forward_panics_with_the_size_error() {
        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 48, 48], &Default::default());
        resnet34().forward(x);
    }
}
