use burn::tensor::{backend::Backend, Device};

use crate::{
    encoder::{EncoderConfig, EncoderSpec},
    EncoderWeights,
};

use super::{ResNet, ResNetConfig};

/// ResNet structure metadata.
pub struct ResNetStructure {
    shape: [usize; 4],
    expansion: usize,
    groups: usize,
    base_width: usize,
}

impl ResNetStructure {
    pub fn to_config(&self) -> ResNetConfig {
        ResNetConfig::new(self.shape, self.expansion, self.groups, self.base_width)
    }
}

/// Torchvision ResNet variants usable as U-Net encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResNetKind {
    ResNet34,
    ResNet50,
    ResNeXt50_32x4d,
}

impl ResNetKind {
    pub fn structure(&self) -> ResNetStructure {
        match self {
            Self::ResNet34 => ResNetStructure {
                shape: [3, 4, 6, 3],
                expansion: 1,
                groups: 1,
                base_width: 64,
            },
            Self::ResNet50 => ResNetStructure {
                shape: [3, 4, 6, 3],
                expansion: 4,
                groups: 1,
                base_width: 64,
            },
            Self::ResNeXt50_32x4d => ResNetStructure {
                shape: [3, 4, 6, 3],
                expansion: 4,
                groups: 32,
                base_width: 4,
            },
        }
    }
}

impl EncoderSpec for ResNetKind {
    const FAMILY: &'static str = "resnet";

    fn name(&self) -> &'static str {
        match self {
            Self::ResNet34 => "resnet34",
            Self::ResNet50 => "resnet50",
            Self::ResNeXt50_32x4d => "resnext50_32x4d",
        }
    }

    fn out_channels(&self) -> Vec<usize> {
        match self {
            Self::ResNet34 => vec![3, 64, 64, 128, 256, 512],
            Self::ResNet50 | Self::ResNeXt50_32x4d => vec![3, 64, 256, 512, 1024, 2048],
        }
    }

    /// ImageNet-1k weights (top-1 73.314% / 76.130% / 77.618%).
    fn url(&self, weights: EncoderWeights) -> Option<&'static str> {
        match (self, weights) {
            (Self::ResNet34, EncoderWeights::ImageNet) => {
                Some("https://download.pytorch.org/models/resnet34-b627a593.pth")
            }
            (Self::ResNet50, EncoderWeights::ImageNet) => {
                Some("https://download.pytorch.org/models/resnet50-0676ba61.pth")
            }
            (Self::ResNeXt50_32x4d, EncoderWeights::ImageNet) => {
                Some("https://download.pytorch.org/models/resnext50_32x4d-7cdf4587.pth")
            }
            _ => None,
        }
    }

    #[cfg(feature = "pretrained")]
    fn key_remap(&self) -> Vec<(String, String)> {
        [
            // Map *.downsample.0.* -> *.downsample.conv.*
            ("(.+)\\.downsample\\.0\\.(.+)", "$1.downsample.conv.$2"),
            // Map *.downsample.1.* -> *.downsample.bn.*
            ("(.+)\\.downsample\\.1\\.(.+)", "$1.downsample.bn.$2"),
            // Map layer[i].[j].* -> layer[i].blocks.[j].*
            ("(layer[1-4])\\.([0-9]+)\\.(.+)", "$1.blocks.$2.$3"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (pattern.to_string(), replacement.to_string()))
        .collect()
    }
}

impl<B: Backend> EncoderConfig<B> for ResNetKind {
    type Encoder = ResNet<B>;

    fn init(&self, device: &Device<B>) -> Self::Encoder {
        self.structure().to_config().init(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::test_utils::{assert_feature_shapes, TestBackend};

    #[test]
    fn resnet34_features() {
        let kind = ResNetKind::ResNet34;
        let encoder = EncoderConfig::<TestBackend>::init(&kind, &Default::default());
        assert_feature_shapes(&encoder, &kind.out_channels());
    }

    #[test]
    fn resnet50_features() {
        let kind = ResNetKind::ResNet50;
        let encoder = EncoderConfig::<TestBackend>::init(&kind, &Default::default());
        assert_feature_shapes(&encoder, &kind.out_channels());
    }

    #[test]
    fn resnext50_features() {
        let kind = ResNetKind::ResNeXt50_32x4d;
        let encoder = EncoderConfig::<TestBackend>::init(&kind, &Default::default());
        assert_feature_shapes(&encoder, &kind.out_channels());
    }

    #[test]
    fn advprop_is_not_published() {
        assert_eq!(ResNetKind::ResNet50.url(EncoderWeights::AdvProp), None);
        assert!(ResNetKind::ResNet50.url(EncoderWeights::ImageNet).is_some());
    }
}
