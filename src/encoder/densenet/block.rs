use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Bottleneck layer producing `growth_rate` new channels.
#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    norm1: BatchNorm<B, 2>,
    relu: Relu,
    conv1: Conv2d<B>,
    norm2: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
}

impl<B: Backend> DenseLayer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(self.relu.forward(self.norm1.forward(x)));
        self.conv2.forward(self.relu.forward(self.norm2.forward(x)))
    }
}

/// Layers whose outputs are concatenated onto their input.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    layers: Vec<DenseLayer<B>>,
}

impl<B: Backend> DenseBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.layers.iter().fold(x, |x, layer| {
            let new_features = layer.forward(x.clone());
            Tensor::cat(vec![x, new_features], 1)
        })
    }
}

#[derive(Config, Debug)]
pub struct DenseBlockConfig {
    num_layers: usize,
    in_channels: usize,
    growth_rate: usize,
    bn_size: usize,
}

impl DenseBlockConfig {
    pub fn out_channels(&self) -> usize {
        self.in_channels + self.num_layers * self.growth_rate
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseBlock<B> {
        let bottleneck = self.bn_size * self.growth_rate;
        let layers = (0..self.num_layers)
            .map(|idx| {
                let in_channels = self.in_channels + idx * self.growth_rate;
                DenseLayer {
                    norm1: BatchNormConfig::new(in_channels).init(device),
                    relu: Relu::new(),
                    conv1: Conv2dConfig::new([in_channels, bottleneck], [1, 1])
                        .with_bias(false)
                        .init(device),
                    norm2: BatchNormConfig::new(bottleneck).init(device),
                    conv2: Conv2dConfig::new([bottleneck, self.growth_rate], [3, 3])
                        .with_padding(PaddingConfig2d::Explicit(1, 1))
                        .with_bias(false)
                        .init(device),
                }
            })
            .collect();

        DenseBlock { layers }
    }
}

/// Channel compression and 2x downsampling between dense blocks.
#[derive(Module, Debug)]
pub struct Transition<B: Backend> {
    norm: BatchNorm<B, 2>,
    relu: Relu,
    conv: Conv2d<B>,
    pool: AvgPool2d,
}

impl<B: Backend> Transition<B> {
    /// Returns the downsampled output and the activation taken before the
    /// convolution, which serves as the skip feature.
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let skip = self.relu.forward(self.norm.forward(x));
        let x = self.pool.forward(self.conv.forward(skip.clone()));
        (x, skip)
    }
}

#[derive(Config, Debug)]
pub struct TransitionConfig {
    in_channels: usize,
    out_channels: usize,
}

impl TransitionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Transition<B> {
        Transition {
            norm: BatchNormConfig::new(self.in_channels).init(device),
            relu: Relu::new(),
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
                .with_bias(false)
                .init(device),
            pool: AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::encoder::test_utils::TestBackend;

    #[test]
    fn dense_block_grows_channels() {
        let device = Default::default();
        let config = DenseBlockConfig::new(3, 64, 32, 4);
        let block: DenseBlock<TestBackend> = config.init(&device);

        let x = Tensor::<TestBackend, 4>::random([1, 64, 8, 8], Distribution::Default, &device);
        assert_eq!(block.forward(x).dims(), [1, config.out_channels(), 8, 8]);
        assert_eq!(config.out_channels(), 160);
    }

    #[test]
    fn transition_skip_keeps_resolution() {
        let device = Default::default();
        let transition: Transition<TestBackend> = TransitionConfig::new(256, 128).init(&device);

        let x = Tensor::<TestBackend, 4>::random([1, 256, 8, 8], Distribution::Default, &device);
        let (x, skip) = transition.forward(x);
        assert_eq!(x.dims(), [1, 128, 4, 4]);
        assert_eq!(skip.dims(), [1, 256, 8, 8]);
    }
}
