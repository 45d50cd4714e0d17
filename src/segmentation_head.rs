use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

/// Final convolution mapping decoder features to per-pixel class logits.
#[derive(Module, Debug)]
pub struct SegmentationHead<B: Backend> {
    conv: Conv2d<B>,
}

impl<B: Backend> SegmentationHead<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct SegmentationHeadConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = "[3, 3]")]
    kernel_size: [usize; 2],
}

impl SegmentationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegmentationHead<B> {
        SegmentationHead {
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], self.kernel_size)
                .with_padding(PaddingConfig2d::Same)
                .init(device),
        }
    }
}
