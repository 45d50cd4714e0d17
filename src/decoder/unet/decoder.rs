use burn::{
    prelude::*,
    tensor::ops::{InterpolateMode, InterpolateOptions},
};

use crate::decoder::{Decoder, DecoderConfig};

use super::conv2drelu::{Conv2dReLU, Conv2dReLUConfig};

/// Nearest-neighbour 2x upsampling, concatenation with the skip feature, two convolutions.
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    conv1: Conv2dReLU<B>,
    conv2: Conv2dReLU<B>,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, skip: Option<Tensor<B, 4>>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        let x = burn::tensor::module::interpolate(
            x,
            [height * 2, width * 2],
            InterpolateOptions::new(InterpolateMode::Nearest),
        );

        let x = match skip {
            Some(skip) => Tensor::cat(vec![x, skip], 1),
            None => x,
        };

        let x = self.conv1.forward(x);
        self.conv2.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    in_channels: usize,
    skip_channels: usize,
    out_channels: usize,
    use_batchnorm: bool,
}

impl DecoderBlockConfig {
    /// Returns the initialized block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        DecoderBlock {
            conv1: Conv2dReLUConfig::new(self.in_channels + self.skip_channels, self.out_channels)
                .with_use_batchnorm(self.use_batchnorm)
                .init(device),
            conv2: Conv2dReLUConfig::new(self.out_channels, self.out_channels)
                .with_use_batchnorm(self.use_batchnorm)
                .init(device),
        }
    }
}

/// U-Net decoder: one block per encoder stage, each upsampling by two and fusing the
/// skip feature of matching resolution.
#[derive(Module, Debug)]
pub struct UnetDecoder<B: Backend> {
    blocks: Vec<DecoderBlock<B>>,
}

impl<B: Backend> Decoder<B> for UnetDecoder<B> {
    fn forward(&self, features: Vec<Tensor<B, 4>>) -> Tensor<B, 4> {
        // The input image itself is never used as a skip.
        let mut features = features.into_iter().skip(1).rev();

        let Some(head) = features.next() else {
            panic!("U-Net decoder needs at least one encoder feature");
        };

        self.blocks
            .iter()
            .fold(head, |x, block| block.forward(x, features.next()))
    }
}

#[derive(Config, Debug)]
pub struct UnetDecoderConfig {
    /// Encoder channels, from the input image to the deepest stage.
    encoder_channels: Vec<usize>,
    #[config(default = "vec![256, 128, 64, 32, 16]")]
    decoder_channels: Vec<usize>,

    #[config(default = true)]
    use_batchnorm: bool,
}

impl DecoderConfig for UnetDecoderConfig {
    type Decoder<B: Backend> = UnetDecoder<B>;

    fn out_channels(&self) -> usize {
        self.decoder_channels.last().copied().unwrap_or_default()
    }

    fn with_encoder_channels(&self, encoder_channels: Vec<usize>) -> Self {
        let mut s = self.clone();
        s.encoder_channels = encoder_channels;
        s
    }

    fn init<B: Backend>(&self, device: &B::Device) -> UnetDecoder<B> {
        // Deepest stage first, input image dropped.
        let encoder_channels: Vec<usize> =
            self.encoder_channels.iter().skip(1).rev().copied().collect();
        let head_channels = encoder_channels.first().copied().unwrap_or_default();

        let in_channels = std::iter::once(head_channels).chain(
            self.decoder_channels
                .iter()
                .take(self.decoder_channels.len().saturating_sub(1))
                .copied(),
        );
        let skip_channels = encoder_channels
            .iter()
            .skip(1)
            .copied()
            .chain(std::iter::repeat(0));

        let blocks = in_channels
            .zip(skip_channels)
            .zip(&self.decoder_channels)
            .map(|((in_ch, skip_ch), &out_ch)| {
                DecoderBlockConfig::new(in_ch, skip_ch, out_ch, self.use_batchnorm).init(device)
            })
            .collect();

        UnetDecoder { blocks }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, tensor::Distribution};

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn restores_input_resolution() {
        let device = Default::default();
        let encoder_channels = vec![3, 64, 64, 128, 256, 512];
        let config = UnetDecoderConfig::new(encoder_channels.clone());
        let decoder: UnetDecoder<TestBackend> = config.init(&device);

        let features = encoder_channels
            .iter()
            .enumerate()
            .map(|(stage, &channels)| {
                let size = 64 >> stage;
                Tensor::<TestBackend, 4>::random(
                    [1, channels, size, size],
                    Distribution::Default,
                    &device,
                )
            })
            .collect();

        let out = decoder.forward(features);
        assert_eq!(out.dims(), [1, config.out_channels(), 64, 64]);
        assert_eq!(decoder.blocks.len(), 5);
    }
}
