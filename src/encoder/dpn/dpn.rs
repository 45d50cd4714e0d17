use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::encoder::Encoder;

use super::block::{DualPath, DualPathBlock, DualPathBlockConfig, DualPathBlockKind, BN_EPS};

#[derive(Module, Debug)]
pub struct InputBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    act: Relu,
    pool: MaxPool2d,
}

/// Final normalization of the concatenated paths.
#[derive(Module, Debug)]
pub struct CatBnAct<B: Backend> {
    bn: BatchNorm<B, 2>,
    act: Relu,
}

impl<B: Backend> CatBnAct<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.act.forward(self.bn.forward(x))
    }
}

/// [Dual Path Network](https://arxiv.org/abs/1707.01629) feature extractor.
#[derive(Module, Debug)]
pub struct Dpn<B: Backend> {
    conv1_1: InputBlock<B>,
    conv2: Vec<DualPathBlock<B>>,
    conv3: Vec<DualPathBlock<B>>,
    conv4: Vec<DualPathBlock<B>>,
    conv5: Vec<DualPathBlock<B>>,
    conv5_bn_ac: CatBnAct<B>,
}

fn run_stage<B: Backend>(blocks: &[DualPathBlock<B>], x: DualPath<B>) -> DualPath<B> {
    blocks.iter().fold(x, |x, block| block.forward(x))
}

impl<B: Backend> Encoder<B> for Dpn<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut features = Vec::with_capacity(6);
        features.push(x.clone());

        let stem = &self.conv1_1;
        let x = stem.act.forward(stem.bn.forward(stem.conv.forward(x)));
        features.push(x.clone());

        let mut path = DualPath::Single(stem.pool.forward(x));
        for stage in [&self.conv2, &self.conv3, &self.conv4] {
            path = run_stage(stage, path);
            features.push(relu(path.clone().concat()));
        }

        let x = run_stage(&self.conv5, path).concat();
        features.push(self.conv5_bn_ac.forward(x));

        features
    }
}

#[derive(Config, Debug)]
pub struct DpnConfig {
    /// Channels produced by the stem.
    pub num_init_features: usize,
    /// Bottleneck width of the first stage.
    pub k_r: usize,
    pub groups: usize,
    /// Number of blocks per stage.
    pub k_sec: [usize; 4],
    /// Dense path increment per stage.
    pub inc_sec: [usize; 4],
    /// Small variants use a 3x3 stem and narrower residual paths.
    #[config(default = true)]
    pub small: bool,
}

impl DpnConfig {
    /// Channels of the concatenated paths after each stage.
    pub fn stage_channels(&self) -> [usize; 4] {
        let bw_factor = if self.small { 1 } else { 4 };
        let mut channels = [0; 4];
        for stage in 0..4 {
            let bw = (64 << stage) * bw_factor;
            channels[stage] = bw + (self.k_sec[stage] + 2) * self.inc_sec[stage];
        }
        channels
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Dpn<B> {
        let stem_kernel = if self.small { 3 } else { 7 };
        let stem_padding = (stem_kernel - 1) / 2;
        let conv1_1 = InputBlock {
            conv: Conv2dConfig::new([3, self.num_init_features], [stem_kernel, stem_kernel])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(stem_padding, stem_padding))
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(self.num_init_features)
                .with_epsilon(BN_EPS)
                .init(device),
            act: Relu::new(),
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        };

        let bw_factor = if self.small { 1 } else { 4 };
        let mut in_channels = self.num_init_features;
        let stages: [Vec<DualPathBlock<B>>; 4] = core::array::from_fn(|stage| {
            let bw = (64 << stage) * bw_factor;
            let r = self.k_r * bw / (64 * bw_factor);
            let inc = self.inc_sec[stage];

            let mut blocks = Vec::with_capacity(self.k_sec[stage]);
            for idx in 0..self.k_sec[stage] {
                let kind = match (stage, idx) {
                    (0, 0) => DualPathBlockKind::Proj,
                    (_, 0) => DualPathBlockKind::Down,
                    _ => DualPathBlockKind::Normal,
                };
                blocks.push(
                    DualPathBlockConfig::new(in_channels, r, bw, inc, self.groups, kind)
                        .init(device),
                );
                in_channels = if idx == 0 {
                    bw + 3 * inc
                } else {
                    in_channels + inc
                };
            }
            blocks
        });
        let [conv2, conv3, conv4, conv5] = stages;

        Dpn {
            conv1_1,
            conv2,
            conv3,
            conv4,
            conv5,
            conv5_bn_ac: CatBnAct {
                bn: BatchNormConfig::new(in_channels)
                    .with_epsilon(BN_EPS)
                    .init(device),
                act: Relu::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpn68_stage_channels() {
        let config = DpnConfig::new(10, 128, 32, [3, 4, 12, 3], [16, 32, 32, 64]);
        assert_eq!(config.stage_channels(), [144, 320, 704, 832]);
    }
}
