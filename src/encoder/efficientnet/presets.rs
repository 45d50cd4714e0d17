use burn::tensor::{backend::Backend, Device};

use crate::{
    encoder::{EncoderConfig, EncoderSpec},
    EncoderWeights,
};

use super::{inverted_residual::InvertedResidualConfig, EfficientNet, EfficientNetConfig, EfficientNetGlobalConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EfficientNetKind {
    EfficientnetB3,
    EfficientnetB4,
}

impl From<EfficientNetKind> for EfficientNetConfig {
    fn from(value: EfficientNetKind) -> Self {
        value.to_config()
    }
}

impl EfficientNetKind {
    pub fn to_config(&self) -> EfficientNetConfig {
        use EfficientNetKind::*;
        let (w, d) = match self {
            EfficientnetB3 => (1.2, 1.4),
            EfficientnetB4 => (1.4, 1.8),
        };

        let global_config = EfficientNetGlobalConfig::new()
            .with_width_coefficient(Some(w))
            .with_depth_coefficient(Some(d));

        // Baseline EfficientNet-B0 stages, scaled by the global config.
        let stages = [
            InvertedResidualConfig::stage(1, 3, 1, 1, 32, 16),
            InvertedResidualConfig::stage(2, 3, 2, 6, 16, 24),
            InvertedResidualConfig::stage(2, 5, 2, 6, 24, 40),
            InvertedResidualConfig::stage(3, 3, 2, 6, 40, 80),
            InvertedResidualConfig::stage(3, 5, 1, 6, 80, 112),
            InvertedResidualConfig::stage(4, 5, 2, 6, 112, 192),
            InvertedResidualConfig::stage(1, 3, 1, 6, 192, 320),
        ];

        EfficientNetConfig::new(&global_config, &stages)
    }
}

impl EncoderSpec for EfficientNetKind {
    const FAMILY: &'static str = "efficientnet";

    fn name(&self) -> &'static str {
        match self {
            Self::EfficientnetB3 => "efficientnet-b3",
            Self::EfficientnetB4 => "efficientnet-b4",
        }
    }

    fn out_channels(&self) -> Vec<usize> {
        self.to_config().out_channels()
    }

    fn url(&self, weights: EncoderWeights) -> Option<&'static str> {
        use EfficientNetKind::*;
        match (self, weights) {
            (_, EncoderWeights::Random) => None,
            (EfficientnetB3, EncoderWeights::ImageNet) => Some("https://github.com/lukemelas/EfficientNet-PyTorch/releases/download/1.0/efficientnet-b3-5fb5a3c3.pth"),
            (EfficientnetB4, EncoderWeights::ImageNet) => Some("https://github.com/lukemelas/EfficientNet-PyTorch/releases/download/1.0/efficientnet-b4-6ed6700e.pth"),
            (EfficientnetB3, EncoderWeights::AdvProp) => Some("https://github.com/lukemelas/EfficientNet-PyTorch/releases/download/1.0/adv-efficientnet-b3-cdd7c0f4.pth"),
            (EfficientnetB4, EncoderWeights::AdvProp) => Some("https://github.com/lukemelas/EfficientNet-PyTorch/releases/download/1.0/adv-efficientnet-b4-44fb3a87.pth"),
        }
    }

    #[cfg(feature = "pretrained")]
    fn key_remap(&self) -> Vec<(String, String)> {
        [
            (
                "_blocks\\.([0-9]+)\\._expand_conv\\.(.+)",
                "blocks.$1.pw.conv.$2",
            ),
            ("_blocks\\.([0-9]+)\\._bn0\\.(.+)", "blocks.$1.pw.norm.$2"),
            (
                "_blocks\\.([0-9]+)\\._depthwise_conv\\.(.+)",
                "blocks.$1.dw.conv.$2",
            ),
            ("_blocks\\.([0-9]+)\\._bn1\\.(.+)", "blocks.$1.dw.norm.$2"),
            (
                "_blocks\\.([0-9]+)\\._project_conv\\.(.+)",
                "blocks.$1.pw_linear.conv.$2",
            ),
            (
                "_blocks\\.([0-9]+)\\._bn2\\.(.+)",
                "blocks.$1.pw_linear.norm.$2",
            ),
            ("_blocks\\.([0-9]+)\\._se_(.+)", "blocks.$1.se.$2"),
            ("_blocks\\.([0-9]+)\\._(.+)", "blocks.$1.$2"),
            ("^_(.+)", "$1"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (pattern.to_string(), replacement.to_string()))
        .collect()
    }
}

impl<B: Backend> EncoderConfig<B> for EfficientNetKind {
    type Encoder = EfficientNet<B>;

    fn init(&self, device: &Device<B>) -> Self::Encoder {
        self.to_config().init(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::test_utils::{assert_feature_shapes, TestBackend};

    #[test]
    fn scaled_channels() {
        assert_eq!(
            EfficientNetKind::EfficientnetB3.out_channels(),
            vec![3, 40, 32, 48, 136, 384]
        );
        assert_eq!(
            EfficientNetKind::EfficientnetB4.out_channels(),
            vec![3, 48, 32, 56, 160, 448]
        );
    }

    #[test]
    fn efficientnet_b3_features() {
        let kind = EfficientNetKind::EfficientnetB3;
        let encoder = EncoderConfig::<TestBackend>::init(&kind, &Default::default());
        assert_feature_shapes(&encoder, &kind.out_channels());
    }

    #[test]
    fn random_init_keeps_deep_features_alive() {
        use burn::tensor::{Distribution, Tensor};

        use crate::encoder::Encoder;

        let device = Default::default();
        let kind = EfficientNetKind::EfficientnetB3;
        let encoder = EncoderConfig::<TestBackend>::init(&kind, &device);

        let x = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
        let deepest = encoder.forward(x).pop().unwrap();
        let mean_abs = deepest.abs().mean().into_scalar();
        assert!(mean_abs > 1e-6, "deepest feature collapsed: {mean_abs}");
    }

    #[test]
    fn efficientnet_b4_features() {
        let kind = EfficientNetKind::EfficientnetB4;
        let encoder = EncoderConfig::<TestBackend>::init(&kind, &Default::default());
        assert_feature_shapes(&encoder, &kind.out_channels());
    }
}
