use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Batch norm used throughout DPN.
pub(super) const BN_EPS: f64 = 1e-3;

/// Pre-activation convolution: batch norm, ReLU, then convolution.
#[derive(Module, Debug)]
pub struct BnActConv2d<B: Backend> {
    bn: BatchNorm<B, 2>,
    act: Relu,
    conv: Conv2d<B>,
}

impl<B: Backend> BnActConv2d<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(self.act.forward(self.bn.forward(x)))
    }
}

#[derive(Config, Debug)]
pub struct BnActConv2dConfig {
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    #[config(default = 1)]
    stride: usize,
    #[config(default = 1)]
    groups: usize,
}

impl BnActConv2dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BnActConv2d<B> {
        let padding = (self.kernel_size - 1) / 2;
        BnActConv2d {
            bn: BatchNormConfig::new(self.in_channels)
                .with_epsilon(BN_EPS)
                .init(device),
            act: Relu::new(),
            conv: Conv2dConfig::new(
                [self.in_channels, self.out_channels],
                [self.kernel_size, self.kernel_size],
            )
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(self.groups)
            .with_bias(false)
            .init(device),
        }
    }
}

/// The two paths carried between dual path blocks.
#[derive(Debug, Clone)]
pub enum DualPath<B: Backend> {
    /// Output of the stem, before the first block of a network.
    Single(Tensor<B, 4>),
    /// Residual path and densely connected path.
    Dual {
        residual: Tensor<B, 4>,
        dense: Tensor<B, 4>,
    },
}

impl<B: Backend> DualPath<B> {
    /// Both paths concatenated along the channel dimension.
    pub fn concat(self) -> Tensor<B, 4> {
        match self {
            Self::Single(x) => x,
            Self::Dual { residual, dense } => Tensor::cat(vec![residual, dense], 1),
        }
    }
}

/// Split `x` along channels into `[0, at)` and `[at, end)`.
fn split_channels<B: Backend>(x: Tensor<B, 4>, at: usize) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let [batch, channels, height, width] = x.dims();
    let head = x
        .clone()
        .slice([0..batch, 0..at, 0..height, 0..width]);
    let tail = x.slice([0..batch, at..channels, 0..height, 0..width]);
    (head, tail)
}

/// Dual path block: a ResNeXt-style bottleneck whose output is split between a residual
/// path (summed) and a dense path (concatenated).
#[derive(Module, Debug)]
pub struct DualPathBlock<B: Backend> {
    /// Projection of the input paths, present on the first block of each stage.
    c1x1_w: Option<BnActConv2d<B>>,
    c1x1_a: BnActConv2d<B>,
    c3x3_b: BnActConv2d<B>,
    c1x1_c: BnActConv2d<B>,
    residual_channels: usize,
}

impl<B: Backend> DualPathBlock<B> {
    pub fn forward(&self, x: DualPath<B>) -> DualPath<B> {
        let (x_in, shortcut) = match (&self.c1x1_w, x) {
            (Some(proj), x) => {
                let x_in = x.concat();
                let projected = proj.forward(x_in.clone());
                (x_in, split_channels(projected, self.residual_channels))
            }
            (None, DualPath::Dual { residual, dense }) => {
                let x_in = Tensor::cat(vec![residual.clone(), dense.clone()], 1);
                (x_in, (residual, dense))
            }
            (None, DualPath::Single(x)) => {
                panic!(
                    "dual path block without projection got a single path of {} channels",
                    x.dims()[1]
                )
            }
        };

        let out = self.c1x1_a.forward(x_in);
        let out = self.c3x3_b.forward(out);
        let out = self.c1x1_c.forward(out);
        let (out_residual, out_dense) = split_channels(out, self.residual_channels);

        let (shortcut_residual, shortcut_dense) = shortcut;
        DualPath::Dual {
            residual: shortcut_residual + out_residual,
            dense: Tensor::cat(vec![shortcut_dense, out_dense], 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DualPathBlockKind {
    /// First block of the network: projects, keeps resolution.
    Proj,
    /// First block of a later stage: projects and halves resolution.
    Down,
    Normal,
}

#[derive(Config, Debug)]
pub struct DualPathBlockConfig {
    in_channels: usize,
    /// Width of the bottleneck 1x1 and grouped 3x3 convolutions.
    bottleneck_channels: usize,
    /// Width of the residual path.
    residual_channels: usize,
    /// Channels added to the dense path by this block.
    increment: usize,
    groups: usize,
    kind: DualPathBlockKind,
}

impl DualPathBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DualPathBlock<B> {
        let stride = match self.kind {
            DualPathBlockKind::Down => 2,
            DualPathBlockKind::Proj | DualPathBlockKind::Normal => 1,
        };
        let c1x1_w = match self.kind {
            DualPathBlockKind::Proj | DualPathBlockKind::Down => Some(
                BnActConv2dConfig::new(
                    self.in_channels,
                    self.residual_channels + 2 * self.increment,
                    1,
                )
                .with_stride(stride)
                .init(device),
            ),
            DualPathBlockKind::Normal => None,
        };

        DualPathBlock {
            c1x1_w,
            c1x1_a: BnActConv2dConfig::new(self.in_channels, self.bottleneck_channels, 1)
                .init(device),
            c3x3_b: BnActConv2dConfig::new(self.bottleneck_channels, self.bottleneck_channels, 3)
                .with_stride(stride)
                .with_groups(self.groups)
                .init(device),
            c1x1_c: BnActConv2dConfig::new(
                self.bottleneck_channels,
                self.residual_channels + self.increment,
                1,
            )
            .init(device),
            residual_channels: self.residual_channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::encoder::test_utils::TestBackend;

    #[test]
    fn paths_grow_by_increment() {
        let device = Default::default();
        let first: DualPathBlock<TestBackend> =
            DualPathBlockConfig::new(10, 128, 64, 16, 32, DualPathBlockKind::Proj).init(&device);
        let second: DualPathBlock<TestBackend> =
            DualPathBlockConfig::new(112, 128, 64, 16, 32, DualPathBlockKind::Normal)
                .init(&device);

        let x = Tensor::<TestBackend, 4>::random([1, 10, 8, 8], Distribution::Default, &device);
        let out = second.forward(first.forward(DualPath::Single(x)));

        let DualPath::Dual { residual, dense } = out else {
            panic!("expected two paths");
        };
        assert_eq!(residual.dims(), [1, 64, 8, 8]);
        // 2 * 16 from the projection, then 16 per block.
        assert_eq!(dense.dims(), [1, 64, 8, 8]);
    }

    #[test]
    fn down_block_halves_resolution() {
        let device = Default::default();
        let block: DualPathBlock<TestBackend> =
            DualPathBlockConfig::new(144, 256, 128, 32, 32, DualPathBlockKind::Down).init(&device);

        let x = Tensor::<TestBackend, 4>::random([1, 144, 8, 8], Distribution::Default, &device);
        let out = block.forward(DualPath::Single(x)).concat();
        assert_eq!(out.dims(), [1, 128 + 3 * 32, 4, 4]);
    }
}
