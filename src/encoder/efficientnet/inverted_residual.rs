use burn::config::Config;
use burn::nn::conv::Conv2dConfig;
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, PaddingConfig2d};
use burn::tensor::activation::{sigmoid, silu};
use burn::tensor::module::adaptive_avg_pool2d;
use burn::tensor::Tensor;
use burn::{module::Module, nn::conv::Conv2d, tensor::backend::Backend};

use super::conv_norm::{Conv2dNormActivation, Conv2dNormActivationConfig, CONV_INITIALIZER};

#[derive(Module, Debug)]
pub struct PointWiseLinear<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> PointWiseLinear<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct SqueezeAndExcitation<B: Backend> {
    reduce: Conv2d<B>,
    expand: Conv2d<B>,
}

impl<B: Backend> SqueezeAndExcitation<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x_squeezed = adaptive_avg_pool2d(x.clone(), [1, 1]);
        let x_squeezed = self.reduce.forward(x_squeezed);
        let x_squeezed = silu(x_squeezed);
        let x_squeezed = self.expand.forward(x_squeezed);
        sigmoid(x_squeezed) * x
    }
}

/// Mobile [inverted residual block](https://paperswithcode.com/method/inverted-residual-block)
/// with squeeze and excitation.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    use_res_connect: bool,
    pw: Option<Conv2dNormActivation<B>>, // pointwise, only when expand ratio != 1
    dw: Conv2dNormActivation<B>,
    se: Option<SqueezeAndExcitation<B>>,
    pw_linear: PointWiseLinear<B>,

    dropout: Option<Dropout>,
}

impl<B: Backend> InvertedResidual<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = x.clone();
        if let Some(pw) = &self.pw {
            out = pw.forward(out);
        }

        out = self.dw.forward(out);
        if let Some(se) = &self.se {
            out = se.forward(out);
        }

        out = self.pw_linear.forward(out);

        if self.use_res_connect {
            if let Some(dropout) = &self.dropout {
                out = dropout.forward(out);
            }
            out = out + x;
        }
        out
    }
}

/// [InvertedResidual](InvertedResidual) configuration. One instance describes a stage;
/// `num_repeat` is expanded into blocks by the network config.
#[derive(Config, Debug)]
pub struct InvertedResidualConfig {
    pub num_repeat: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub expand_ratio: usize,
    pub input_filters: usize,
    pub output_filters: usize,
    #[config(default = true)]
    pub id_skip: bool,
    pub se_ratio: Option<f64>,
    pub drop_connect_rate: Option<f64>,
    #[config(default = 0.01)]
    pub bn_momentum: f64,
    #[config(default = 1e-3)]
    pub bn_epsilon: f64,
}

impl InvertedResidualConfig {
    /// Stage with squeeze ratio 0.25, as in every EfficientNet stage.
    pub fn stage(
        num_repeat: usize,
        kernel_size: usize,
        stride: usize,
        expand_ratio: usize,
        input_filters: usize,
        output_filters: usize,
    ) -> Self {
        Self::new(
            num_repeat,
            kernel_size,
            stride,
            expand_ratio,
            input_filters,
            output_filters,
        )
        .with_se_ratio(Some(0.25))
    }

    /// Initialize a new [InvertedResidual](InvertedResidual) module.
    pub fn init<B: Backend>(&self, device: &B::Device) -> InvertedResidual<B> {
        let hidden_dim = self.input_filters * self.expand_ratio;
        let conv_norm = |in_channels, out_channels| {
            Conv2dNormActivationConfig::new(in_channels, out_channels)
                .with_bias(false)
                .with_bn_momentum(self.bn_momentum)
                .with_bn_epsilon(self.bn_epsilon)
        };

        let pw = (self.expand_ratio != 1).then(|| {
            conv_norm(self.input_filters, hidden_dim)
                .with_kernel_size(1)
                .init(device)
        });
        let dw = conv_norm(hidden_dim, hidden_dim)
            .with_stride(self.stride)
            .with_kernel_size(self.kernel_size)
            .with_groups(hidden_dim)
            .init(device);
        let pw_linear = PointWiseLinear {
            conv: Conv2dConfig::new([hidden_dim, self.output_filters], [1, 1])
                .with_padding(PaddingConfig2d::Explicit(0, 0))
                .with_bias(false)
                .with_initializer(CONV_INITIALIZER)
                .init(device),
            norm: BatchNormConfig::new(self.output_filters)
                .with_momentum(self.bn_momentum)
                .with_epsilon(self.bn_epsilon)
                .init(device),
        };
        let se = self.se_ratio.map(|se_ratio| {
            assert!(0.0 < se_ratio && se_ratio <= 1.0);
            let num_squeezed_channels = ((self.input_filters as f64 * se_ratio) as usize).max(1);
            SqueezeAndExcitation {
                reduce: Conv2dConfig::new([hidden_dim, num_squeezed_channels], [1, 1])
                    .with_initializer(CONV_INITIALIZER)
                    .init(device),
                expand: Conv2dConfig::new([num_squeezed_channels, hidden_dim], [1, 1])
                    .with_initializer(CONV_INITIALIZER)
                    .init(device),
            }
        });

        InvertedResidual {
            use_res_connect: self.id_skip
                && self.stride == 1
                && self.input_filters == self.output_filters,
            pw,
            dw,
            se,
            pw_linear,

            dropout: self
                .drop_connect_rate
                .map(|prob| DropoutConfig::new(prob).init()),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::encoder::test_utils::TestBackend;

    #[test]
    fn residual_only_when_shape_is_kept() {
        let device = Default::default();
        let kept: InvertedResidual<TestBackend> =
            InvertedResidualConfig::stage(1, 3, 1, 6, 24, 24).init(&device);
        let strided: InvertedResidual<TestBackend> =
            InvertedResidualConfig::stage(1, 5, 2, 6, 24, 40).init(&device);

        assert!(kept.use_res_connect);
        assert!(!strided.use_res_connect);

        let x = Tensor::<TestBackend, 4>::random([1, 24, 16, 16], Distribution::Default, &device);
        assert_eq!(kept.forward(x.clone()).dims(), [1, 24, 16, 16]);
        assert_eq!(strided.forward(x).dims(), [1, 40, 8, 8]);
    }

    #[test]
    fn no_expansion_skips_pointwise() {
        let device = Default::default();
        let block: InvertedResidual<TestBackend> =
            InvertedResidualConfig::stage(1, 3, 1, 1, 32, 16).init(&device);

        assert!(block.pw.is_none());
        assert!(block.se.is_some());
    }
}
