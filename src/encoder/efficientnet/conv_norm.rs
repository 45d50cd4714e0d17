use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::silu,
};

/// Kaiming normal over the output fan, used for every convolution of the network.
pub(super) const CONV_INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: SQRT_2,
    fan_out_only: true,
};

/// Convolution, batch norm and swish.
#[derive(Module, Debug)]
pub struct Conv2dNormActivation<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> Conv2dNormActivation<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        silu(self.norm.forward(self.conv.forward(x)))
    }
}

#[derive(Config, Debug)]
pub struct Conv2dNormActivationConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = 3)]
    kernel_size: usize,
    #[config(default = 1)]
    stride: usize,
    #[config(default = 1)]
    groups: usize,
    #[config(default = true)]
    bias: bool,
    #[config(default = 0.01)]
    bn_momentum: f64,
    #[config(default = 1e-3)]
    bn_epsilon: f64,
}

impl Conv2dNormActivationConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Conv2dNormActivation<B> {
        // Output size matches "same" padding for even input sizes.
        let padding = (self.kernel_size - 1) / 2;
        Conv2dNormActivation {
            conv: Conv2dConfig::new(
                [self.in_channels, self.out_channels],
                [self.kernel_size, self.kernel_size],
            )
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(self.groups)
            .with_bias(self.bias)
            .with_initializer(CONV_INITIALIZER)
            .init(device),
            norm: BatchNormConfig::new(self.out_channels)
                .with_momentum(self.bn_momentum)
                .with_epsilon(self.bn_epsilon)
                .init(device),
        }
    }
}
