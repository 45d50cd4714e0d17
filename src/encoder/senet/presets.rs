use burn::tensor::{backend::Backend, Device};

use crate::{
    encoder::{EncoderConfig, EncoderSpec},
    EncoderWeights,
};

use super::{SeNet, SeNetConfig};

/// SENet variants from the `pretrainedmodels` zoo usable as U-Net encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SeNetKind {
    SeResNet50,
    SeResNeXt50_32x4d,
}

impl SeNetKind {
    pub fn to_config(&self) -> SeNetConfig {
        match self {
            Self::SeResNet50 => SeNetConfig::new([3, 4, 6, 3], 1),
            Self::SeResNeXt50_32x4d => SeNetConfig::new([3, 4, 6, 3], 32).with_base_width(Some(4)),
        }
    }
}

impl EncoderSpec for SeNetKind {
    const FAMILY: &'static str = "senet";

    fn name(&self) -> &'static str {
        match self {
            Self::SeResNet50 => "se_resnet50",
            Self::SeResNeXt50_32x4d => "se_resnext50_32x4d",
        }
    }

    fn out_channels(&self) -> Vec<usize> {
        vec![3, 64, 256, 512, 1024, 2048]
    }

    fn url(&self, weights: EncoderWeights) -> Option<&'static str> {
        match (self, weights) {
            (Self::SeResNet50, EncoderWeights::ImageNet) => {
                Some("http://data.lip6.fr/cadene/pretrainedmodels/se_resnet50-ce0d4300.pth")
            }
            (Self::SeResNeXt50_32x4d, EncoderWeights::ImageNet) => {
                Some("http://data.lip6.fr/cadene/pretrainedmodels/se_resnext50_32x4d-a260b3a4.pth")
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

impl<B: Backend> EncoderConfig<B> for SeNetKind {
    type Encoder = SeNet<B>;

    fn init(&self, device: &Device<B>) -> Self::Encoder {
        self.to_config().init(device)
    }
}
