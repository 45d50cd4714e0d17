use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::encoder::Encoder;

use super::block::{DenseBlock, DenseBlockConfig, Transition, TransitionConfig};

/// Densely connected convolutional network feature extractor.
/// Derived from [torchvision.models.densenet](https://github.com/pytorch/vision/blob/main/torchvision/models/densenet.py).
#[derive(Module, Debug)]
pub struct DenseNet<B: Backend> {
    conv0: Conv2d<B>,
    norm0: BatchNorm<B, 2>,
    relu0: Relu,
    pool0: MaxPool2d,
    denseblock1: DenseBlock<B>,
    transition1: Transition<B>,
    denseblock2: DenseBlock<B>,
    transition2: Transition<B>,
    denseblock3: DenseBlock<B>,
    transition3: Transition<B>,
    denseblock4: DenseBlock<B>,
    norm5: BatchNorm<B, 2>,
}

impl<B: Backend> Encoder<B> for DenseNet<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut features = Vec::with_capacity(6);
        features.push(x.clone());

        let x = self.relu0.forward(self.norm0.forward(self.conv0.forward(x)));
        features.push(x.clone());
        let x = self.pool0.forward(x);

        // Skip features are the normalized activations inside each transition.
        let (x, skip) = self.transition1.forward(self.denseblock1.forward(x));
        features.push(skip);
        let (x, skip) = self.transition2.forward(self.denseblock2.forward(x));
        features.push(skip);
        let (x, skip) = self.transition3.forward(self.denseblock3.forward(x));
        features.push(skip);

        let x = self.norm5.forward(self.denseblock4.forward(x));
        features.push(x);

        features
    }
}

#[derive(Config, Debug)]
pub struct DenseNetConfig {
    #[config(default = 32)]
    pub growth_rate: usize,
    pub block_config: [usize; 4],
    #[config(default = 64)]
    pub num_init_features: usize,
    #[config(default = 4)]
    pub bn_size: usize,
}

impl DenseNetConfig {
    /// Dense block configs, each block starting from the compressed output of the
    /// previous transition.
    fn blocks(&self) -> [DenseBlockConfig; 4] {
        let mut in_channels = self.num_init_features;
        core::array::from_fn(|idx| {
            let block = DenseBlockConfig::new(
                self.block_config[idx],
                in_channels,
                self.growth_rate,
                self.bn_size,
            );
            in_channels = block.out_channels() / 2;
            block
        })
    }

    pub fn out_channels(&self) -> Vec<usize> {
        let blocks = self.blocks();
        let mut channels = vec![3, self.num_init_features];
        channels.extend(blocks.iter().map(DenseBlockConfig::out_channels));
        channels
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseNet<B> {
        let [block1, block2, block3, block4] = self.blocks();
        let transition = |block: &DenseBlockConfig| {
            TransitionConfig::new(block.out_channels(), block.out_channels() / 2).init(device)
        };

        DenseNet {
            conv0: Conv2dConfig::new([3, self.num_init_features], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .init(device),
            norm0: BatchNormConfig::new(self.num_init_features).init(device),
            relu0: Relu::new(),
            pool0: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            denseblock1: block1.init(device),
            transition1: transition(&block1),
            denseblock2: block2.init(device),
            transition2: transition(&block2),
            denseblock3: block3.init(device),
            transition3: transition(&block3),
            denseblock4: block4.init(device),
            norm5: BatchNormConfig::new(block4.out_channels()).init(device),
        }
    }
}
