use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

// Kaiming normal for convolutions followed by ReLU.
const INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: SQRT_2,
    fan_out_only: true,
};

// Variant order matters when importing weights: a bottleneck state dict also
// contains every key of a basic block.
#[derive(Module, Debug)]
pub enum ResidualBlock<B: Backend> {
    Bottleneck(Bottleneck<B>),
    Basic(BasicBlock<B>),
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Basic(block) => block.forward(x),
            Self::Bottleneck(block) => block.forward(x),
        }
    }
}

/// Two 3x3 convolutions with an identity shortcut.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.bn2.forward(self.conv2.forward(out));

        self.relu.forward(out + identity)
    }
}

/// 1x1 reduce, grouped 3x3, 1x1 expand. The stride sits on the 3x3 convolution.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        self.relu.forward(out + identity)
    }
}

/// Projection shortcut used when the block changes resolution or width.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct DownsampleConfig {
    in_channels: usize,
    out_channels: usize,
    stride: usize,
}

impl DownsampleConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Downsample<B> {
        Downsample {
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
                .with_stride([self.stride, self.stride])
                .with_bias(false)
                .with_initializer(INITIALIZER)
                .init(device),
            bn: BatchNormConfig::new(self.out_channels).init(device),
        }
    }

    fn needed(in_channels: usize, out_channels: usize, stride: usize) -> Option<Self> {
        (stride != 1 || in_channels != out_channels)
            .then(|| Self::new(in_channels, out_channels, stride))
    }
}

fn conv3x3(channels: [usize; 2], stride: usize, groups: usize) -> Conv2dConfig {
    Conv2dConfig::new(channels, [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_groups(groups)
        .with_bias(false)
        .with_initializer(INITIALIZER)
}

fn conv1x1(channels: [usize; 2]) -> Conv2dConfig {
    Conv2dConfig::new(channels, [1, 1])
        .with_bias(false)
        .with_initializer(INITIALIZER)
}

/// A stage of residual blocks sharing the same output width.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    num_blocks: usize,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    bottleneck: bool,
    /// Cardinality of the 3x3 convolutions (ResNeXt).
    #[config(default = 1)]
    groups: usize,
    /// Width of each group per 64 bottleneck channels.
    #[config(default = 64)]
    base_width: usize,
}

impl LayerBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LayerBlock<B> {
        let blocks = (0..self.num_blocks)
            .map(|idx| {
                // Only the first block changes width and resolution.
                let (in_channels, stride) = if idx == 0 {
                    (self.in_channels, self.stride)
                } else {
                    (self.out_channels, 1)
                };

                if self.bottleneck {
                    ResidualBlock::Bottleneck(self.bottleneck_block(in_channels, stride, device))
                } else {
                    ResidualBlock::Basic(self.basic_block(in_channels, stride, device))
                }
            })
            .collect();

        LayerBlock { blocks }
    }

    fn basic_block<B: Backend>(
        &self,
        in_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> BasicBlock<B> {
        let out_channels = self.out_channels;
        BasicBlock {
            conv1: conv3x3([in_channels, out_channels], stride, 1).init(device),
            bn1: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            conv2: conv3x3([out_channels, out_channels], 1, 1).init(device),
            bn2: BatchNormConfig::new(out_channels).init(device),
            downsample: DownsampleConfig::needed(in_channels, out_channels, stride)
                .map(|config| config.init(device)),
        }
    }

    fn bottleneck_block<B: Backend>(
        &self,
        in_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> Bottleneck<B> {
        let out_channels = self.out_channels;
        let width = (out_channels / 4) * self.base_width / 64 * self.groups;
        Bottleneck {
            conv1: conv1x1([in_channels, width]).init(device),
            bn1: BatchNormConfig::new(width).init(device),
            relu: Relu::new(),
            conv2: conv3x3([width, width], stride, self.groups).init(device),
            bn2: BatchNormConfig::new(width).init(device),
            conv3: conv1x1([width, out_channels]).init(device),
            bn3: BatchNormConfig::new(out_channels).init(device),
            downsample: DownsampleConfig::needed(in_channels, out_channels, stride)
                .map(|config| config.init(device)),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::encoder::test_utils::TestBackend;

    #[test]
    fn first_block_downsamples() {
        let device = Default::default();
        let layer: LayerBlock<TestBackend> =
            LayerBlockConfig::new(2, 64, 256, 2, true).init(&device);

        let x = Tensor::<TestBackend, 4>::random([1, 64, 16, 16], Distribution::Default, &device);
        assert_eq!(layer.forward(x).dims(), [1, 256, 8, 8]);
    }

    #[test]
    fn grouped_bottleneck_width() {
        let device = Default::default();
        let config = LayerBlockConfig::new(1, 64, 256, 1, true)
            .with_groups(32)
            .with_base_width(4);
        let block = config.bottleneck_block::<TestBackend>(64, 1, &device);

        // ResNeXt-50 32x4d: 32 groups of 4 channels in the first stage.
        assert_eq!(block.conv2.weight.dims(), [128, 4, 3, 3]);
        assert!(block.downsample.is_some());
    }
}
