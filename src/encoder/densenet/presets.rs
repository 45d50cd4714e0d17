use burn::tensor::{backend::Backend, Device};

use crate::{
    encoder::{EncoderConfig, EncoderSpec},
    EncoderWeights,
};

use super::{DenseNet, DenseNetConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DenseNetKind {
    DenseNet121,
}

impl DenseNetKind {
    pub fn to_config(&self) -> DenseNetConfig {
        match self {
            Self::DenseNet121 => DenseNetConfig::new([6, 12, 24, 16]),
        }
    }
}

impl EncoderSpec for DenseNetKind {
    const FAMILY: &'static str = "densenet";

    fn name(&self) -> &'static str {
        match self {
            Self::DenseNet121 => "densenet121",
        }
    }

    fn out_channels(&self) -> Vec<usize> {
        self.to_config().out_channels()
    }

    fn url(&self, weights: EncoderWeights) -> Option<&'static str> {
        match (self, weights) {
            (Self::DenseNet121, EncoderWeights::ImageNet) => {
                Some("https://download.pytorch.org/models/densenet121-a639ec97.pth")
            }
            _ => None,
        }
    }

    #[cfg(feature = "pretrained")]
    fn key_remap(&self) -> Vec<(String, String)> {
        let config = self.to_config();

        let mut remap = vec![
            // Old checkpoints name layer parameters `norm.1` instead of `norm1`.
            (
                "(denselayer[0-9]+)\\.(norm|conv)\\.([12])\\.(.+)".to_string(),
                "$1.$2$3.$4".to_string(),
            ),
            ("^features\\.(.+)".to_string(), "$1".to_string()),
        ];
        // Map denseblock[b].denselayer[l].* -> denseblock[b].layers.[l - 1].*
        for (block, num_layers) in (1..).zip(config.block_config) {
            for layer in 1..=num_layers {
                remap.push((
                    format!("denseblock{block}\\.denselayer{layer}\\.(.+)"),
                    format!("denseblock{block}.layers.{}.$1", layer - 1),
                ));
            }
        }
        remap
    }
}

impl<B: Backend> EncoderConfig<B> for DenseNetKind {
    type Encoder = DenseNet<B>;

    fn init(&self, device: &Device<B>) -> Self::Encoder {
        self.to_config().init(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::test_utils::{assert_feature_shapes, TestBackend};

    #[test]
    fn densenet121_features() {
        let kind = DenseNetKind::DenseNet121;
        assert_eq!(kind.out_channels(), vec![3, 64, 256, 512, 1024, 1024]);

        let encoder = EncoderConfig::<TestBackend>::init(&kind, &Default::default());
        assert_feature_shapes(&encoder, &kind.out_channels());
    }
}
