pub mod unet;

use burn::tensor::{backend::Backend, Tensor};

pub trait Decoder<B: Backend> {
    /// Fuse the encoder features, ordered from the input to the deepest stage.
    fn forward(&self, features: Vec<Tensor<B, 4>>) -> Tensor<B, 4>;
}

pub trait DecoderConfig {
    type Decoder<B: Backend>: Decoder<B>;
    fn init<B: Backend>(&self, device: &B::Device) -> Self::Decoder<B>;
    fn out_channels(&self) -> usize;
    fn with_encoder_channels(&self, encoder_channels: Vec<usize>) -> Self;
}
