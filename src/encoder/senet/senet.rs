use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::encoder::Encoder;

use super::block::{SeLayer, SeLayerConfig};

#[derive(Module, Debug)]
pub struct SeStem<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu1: Relu,
    pool: MaxPool2d,
}

/// Squeeze-and-Excitation network feature extractor (SE-ResNet and SE-ResNeXt).
#[derive(Module, Debug)]
pub struct SeNet<B: Backend> {
    layer0: SeStem<B>,
    layer1: SeLayer<B>,
    layer2: SeLayer<B>,
    layer3: SeLayer<B>,
    layer4: SeLayer<B>,
}

impl<B: Backend> Encoder<B> for SeNet<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut features = Vec::with_capacity(6);
        features.push(x.clone());

        let stem = &self.layer0;
        let x = stem.relu1.forward(stem.bn1.forward(stem.conv1.forward(x)));
        features.push(x.clone());
        let x = stem.pool.forward(pad_for_ceil_mode(x));

        let x = self.layer1.forward(x);
        features.push(x.clone());
        let x = self.layer2.forward(x);
        features.push(x.clone());
        let x = self.layer3.forward(x);
        features.push(x.clone());
        let x = self.layer4.forward(x);
        features.push(x);

        features
    }
}

/// Pad the right and bottom edges so that an unpadded 3x3/2 max pool matches a
/// ceil-mode one: windows still start at 0, 2, 4, ...
fn pad_for_ceil_mode<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, height, width] = x.dims();
    let extra = |size: usize| usize::from(size >= 3 && (size - 3) % 2 == 1);
    let (bottom, right) = (extra(height), extra(width));
    if bottom == 0 && right == 0 {
        return x;
    }
    x.pad((0, right, 0, bottom), f32::NEG_INFINITY.elem::<B::FloatElem>())
}

#[derive(Config, Debug)]
pub struct SeNetConfig {
    layers: [usize; 4],
    groups: usize,
    #[config(default = 16)]
    reduction: usize,
    /// Set for SE-ResNeXt blocks.
    base_width: Option<usize>,
}

impl SeNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SeNet<B> {
        let layer0 = SeStem {
            conv1: Conv2dConfig::new([3, 64], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .init(device),
            bn1: BatchNormConfig::new(64).init(device),
            relu1: Relu::new(),
            pool: MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
        };

        let layer = |idx: usize, in_channels, planes, stride| {
            SeLayerConfig::new(
                self.layers[idx],
                in_channels,
                planes,
                stride,
                self.groups,
                self.reduction,
            )
            .with_base_width(self.base_width)
            .init(device)
        };

        SeNet {
            layer0,
            layer1: layer(0, 64, 64, 1),
            layer2: layer(1, 256, 128, 2),
            layer3: layer(2, 512, 256, 2),
            layer4: layer(3, 1024, 512, 2),
        }
    }
}
