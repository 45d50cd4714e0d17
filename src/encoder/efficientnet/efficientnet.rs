use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    tensor::{activation::silu, backend::Backend, Device, Tensor},
};

use crate::encoder::Encoder;

use super::{
    conv_norm::CONV_INITIALIZER,
    inverted_residual::{InvertedResidual, InvertedResidualConfig},
};

/// EfficientNet feature extractor, without the head convolution and classifier.
#[derive(Module, Debug)]
pub struct EfficientNet<B: Backend> {
    conv_stem: Conv2d<B>,
    bn0: BatchNorm<B, 2>,
    blocks: Vec<InvertedResidual<B>>,
    /// Number of blocks run before each of the last four feature maps is taken.
    stage_ends: Vec<usize>,
}

impl<B: Backend> Encoder<B> for EfficientNet<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut features = Vec::with_capacity(6);
        features.push(x.clone());

        // Stem
        let mut x = silu(self.bn0.forward(self.conv_stem.forward(x)));
        features.push(x.clone());

        // Blocks
        for (idx, block) in self.blocks.iter().enumerate() {
            x = block.forward(x);

            if self.stage_ends.contains(&(idx + 1)) {
                features.push(x.clone());
            }
        }

        features
    }
}

#[derive(Debug, Config)]
pub struct EfficientNetGlobalConfig {
    width_coefficient: Option<f64>,
    depth_coefficient: Option<f64>,

    /// Running statistics decay, TensorFlow convention.
    #[config(default = 0.99)]
    batch_norm_momentum: f64,
    #[config(default = 1e-3)]
    batch_norm_epsilon: f64,
    #[config(default = 0.2)]
    drop_connect_rate: f64,
    #[config(default = 8)]
    depth_divisor: usize,
    min_depth: Option<usize>,
}

impl EfficientNetGlobalConfig {
    fn round_filters(&self, filters: usize) -> usize {
        let Some(multiplier) = self.width_coefficient else {
            return filters;
        };

        let filters = filters as f64 * multiplier;
        let min_depth = self.min_depth.unwrap_or(self.depth_divisor);

        let mut new_filters = min_depth.max(
            ((filters + self.depth_divisor as f64 / 2.0).floor() / self.depth_divisor as f64)
                as usize
                * self.depth_divisor,
        );

        if (new_filters as f64) < 0.9 * filters {
            new_filters += self.depth_divisor;
        }

        new_filters
    }

    fn round_repeats(&self, repeats: usize) -> usize {
        let Some(multiplier) = self.depth_coefficient else {
            return repeats;
        };

        (multiplier * repeats as f64).ceil() as usize
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EfficientNetConfig {
    bn_mom: f64,
    bn_eps: f64,

    stem_out: usize,
    blocks: Vec<InvertedResidualConfig>,
    stage_ends: Vec<usize>,
}

impl EfficientNetConfig {
    pub fn new(global: &EfficientNetGlobalConfig, stages: &[InvertedResidualConfig]) -> Self {
        // PyTorch momentum is the weight of the new batch statistics.
        let bn_mom = 1.0 - global.batch_norm_momentum;
        let bn_eps = global.batch_norm_epsilon;

        // Stem
        let stem_out = global.round_filters(32);

        // Blocks
        let block_repeats: Vec<usize> = stages
            .iter()
            .map(|stage| global.round_repeats(stage.num_repeat))
            .collect();
        let mut blocks: Vec<InvertedResidualConfig> = stages
            .iter()
            .zip(&block_repeats)
            .flat_map(|(stage, &num_repeat)| {
                let input_filters = global.round_filters(stage.input_filters);
                let output_filters = global.round_filters(stage.output_filters);

                (0..num_repeat).map(move |layer_idx| {
                    let mut block = stage.clone();

                    block.input_filters = if layer_idx == 0 {
                        input_filters
                    } else {
                        output_filters
                    };
                    block.output_filters = output_filters;
                    block.bn_momentum = bn_mom;
                    block.bn_epsilon = bn_eps;

                    if layer_idx > 0 {
                        block.stride = 1;
                    }

                    block
                })
            })
            .collect();
        let block_len = blocks.len() as f64;
        blocks
            .iter_mut()
            .enumerate()
            .for_each(|(block_idx, block)| {
                block.drop_connect_rate =
                    Some(global.drop_connect_rate * block_idx as f64 / block_len)
            });

        // Features are taken at the end of stages 1, 2, 4 and 6.
        let cumulative_num_block: Vec<usize> = block_repeats
            .iter()
            .scan(0, |acc, curr| {
                *acc += curr;
                Some(*acc)
            })
            .collect();
        let stage_ends = [1, 2, 4, 6]
            .into_iter()
            .filter_map(|stage| cumulative_num_block.get(stage).copied())
            .collect();

        Self {
            bn_mom,
            bn_eps,
            stem_out,
            blocks,
            stage_ends,
        }
    }

    pub fn out_channels(&self) -> Vec<usize> {
        [3, self.stem_out]
            .into_iter()
            .chain(
                self.stage_ends
                    .iter()
                    .map(|&end| self.blocks[end - 1].output_filters),
            )
            .collect()
    }

    /// Initialize a new [`EfficientNet`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> EfficientNet<B> {
        // Stem
        let conv_stem = Conv2dConfig::new([3, self.stem_out], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(CONV_INITIALIZER)
            .init(device);
        let bn0 = BatchNormConfig::new(self.stem_out)
            .with_momentum(self.bn_mom)
            .with_epsilon(self.bn_eps)
            .init(device);

        // Blocks
        let blocks = self.blocks.iter().map(|block| block.init(device)).collect();

        EfficientNet {
            conv_stem,
            bn0,
            blocks,
            stage_ends: self.stage_ends.clone(),
        }
    }
}
