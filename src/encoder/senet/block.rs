use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{activation::sigmoid, module::adaptive_avg_pool2d},
};

/// Channel attention: global pooling, bottleneck MLP as 1x1 convolutions, sigmoid gate.
#[derive(Module, Debug)]
pub struct SeModule<B: Backend> {
    fc1: Conv2d<B>,
    relu: Relu,
    fc2: Conv2d<B>,
}

impl<B: Backend> SeModule<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let scale = adaptive_avg_pool2d(x.clone(), [1, 1]);
        let scale = self.relu.forward(self.fc1.forward(scale));
        let scale = sigmoid(self.fc2.forward(scale));
        x * scale
    }
}

#[derive(Config, Debug)]
pub struct SeModuleConfig {
    channels: usize,
    reduction: usize,
}

impl SeModuleConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SeModule<B> {
        let squeezed = self.channels / self.reduction;
        SeModule {
            fc1: Conv2dConfig::new([self.channels, squeezed], [1, 1]).init(device),
            relu: Relu::new(),
            fc2: Conv2dConfig::new([squeezed, self.channels], [1, 1]).init(device),
        }
    }
}

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

/// Bottleneck whose residual branch is recalibrated by a [SeModule] before the addition.
#[derive(Module, Debug)]
pub struct SeBottleneck<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    conv3: Conv2d<B>,
    bn3: BatchNorm<B, 2>,
    relu: Relu,
    se_module: SeModule<B>,
    downsample: Option<Downsample<B>>,
}

impl<B: Backend> SeBottleneck<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = match &self.downsample {
            Some(downsample) => downsample.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.relu.forward(self.bn2.forward(self.conv2.forward(out)));
        let out = self.bn3.forward(self.conv3.forward(out));

        self.relu.forward(self.se_module.forward(out) + residual)
    }
}

#[derive(Config, Debug)]
pub struct SeBottleneckConfig {
    in_channels: usize,
    planes: usize,
    stride: usize,
    groups: usize,
    reduction: usize,
    /// ResNeXt blocks stride on the 3x3 convolution and widen it with `base_width`;
    /// ResNet blocks stride on the first 1x1 convolution.
    base_width: Option<usize>,
}

impl SeBottleneckConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SeBottleneck<B> {
        let out_channels = self.planes * 4;
        let (width, stride1, stride2) = match self.base_width {
            Some(base_width) => (self.planes * base_width / 64 * self.groups, 1, self.stride),
            None => (self.planes, self.stride, 1),
        };

        let downsample = (self.stride != 1 || self.in_channels != out_channels).then(|| {
            Downsample {
                conv: Conv2dConfig::new([self.in_channels, out_channels], [1, 1])
                    .with_stride([self.stride, self.stride])
                    .with_bias(false)
                    .init(device),
                bn: BatchNormConfig::new(out_channels).init(device),
            }
        });

        SeBottleneck {
            conv1: Conv2dConfig::new([self.in_channels, width], [1, 1])
                .with_stride([stride1, stride1])
                .with_bias(false)
                .init(device),
            bn1: BatchNormConfig::new(width).init(device),
            conv2: Conv2dConfig::new([width, width], [3, 3])
                .with_stride([stride2, stride2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_groups(self.groups)
                .with_bias(false)
                .init(device),
            bn2: BatchNormConfig::new(width).init(device),
            conv3: Conv2dConfig::new([width, out_channels], [1, 1])
                .with_bias(false)
                .init(device),
            bn3: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            se_module: SeModuleConfig::new(out_channels, self.reduction).init(device),
            downsample,
        }
    }
}

#[derive(Module, Debug)]
pub struct SeLayer<B: Backend> {
    blocks: Vec<SeBottleneck<B>>,
}

impl<B: Backend> SeLayer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct SeLayerConfig {
    num_blocks: usize,
    in_channels: usize,
    planes: usize,
    stride: usize,
    groups: usize,
    reduction: usize,
    base_width: Option<usize>,
}

impl SeLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SeLayer<B> {
        let blocks = (0..self.num_blocks)
            .map(|idx| {
                let (in_channels, stride) = if idx == 0 {
                    (self.in_channels, self.stride)
                } else {
                    (self.planes * 4, 1)
                };
                SeBottleneckConfig::new(
                    in_channels,
                    self.planes,
                    stride,
                    self.groups,
                    self.reduction,
                )
                .with_base_width(self.base_width)
                .init(device)
            })
            .collect();

        SeLayer { blocks }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::encoder::test_utils::TestBackend;

    #[test]
    fn se_gate_keeps_shape() {
        let device = Default::default();
        let se: SeModule<TestBackend> = SeModuleConfig::new(64, 16).init(&device);
        let x = Tensor::<TestBackend, 4>::random([2, 64, 8, 8], Distribution::Default, &device);

        assert_eq!(se.forward(x).dims(), [2, 64, 8, 8]);
    }

    #[test]
    fn resnet_block_widths() {
        let device = Default::default();
        let block: SeBottleneck<TestBackend> =
            SeBottleneckConfig::new(256, 128, 2, 1, 16).init(&device);

        assert_eq!(block.conv1.weight.dims(), [128, 256, 1, 1]);
        assert_eq!(block.conv3.weight.dims(), [512, 128, 1, 1]);

        let x = Tensor::<TestBackend, 4>::random([1, 256, 16, 16], Distribution::Default, &device);
        assert_eq!(block.forward(x).dims(), [1, 512, 8, 8]);
    }

    #[test]
    fn resnext_block_widths() {
        let device = Default::default();
        let block: SeBottleneck<TestBackend> = SeBottleneckConfig::new(256, 128, 2, 32, 16)
            .with_base_width(Some(4))
            .init(&device);

        assert_eq!(block.conv2.weight.dims(), [256, 8, 3, 3]);

        let x = Tensor::<TestBackend, 4>::random([1, 256, 16, 16], Distribution::Default, &device);
        assert_eq!(block.forward(x).dims(), [1, 512, 8, 8]);
    }
}
