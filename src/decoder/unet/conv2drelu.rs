use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// 3x3 convolution, optional batch norm, ReLU.
#[derive(Module, Debug)]
pub struct Conv2dReLU<B: Backend> {
    conv: Conv2d<B>,
    batchnorm: Option<BatchNorm<B, 2>>,
    relu: Relu,
}

impl<B: Backend> Conv2dReLU<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.conv.forward(x);

        if let Some(ref batchnorm) = self.batchnorm {
            x = batchnorm.forward(x);
        }

        self.relu.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct Conv2dReLUConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = true)]
    use_batchnorm: bool,
}

impl Conv2dReLUConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Conv2dReLU<B> {
        Conv2dReLU {
            // Batch norm carries the bias.
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(!self.use_batchnorm)
                .init(device),
            batchnorm: self
                .use_batchnorm
                .then(|| BatchNormConfig::new(self.out_channels).init(device)),
            relu: Relu::new(),
        }
    }
}
