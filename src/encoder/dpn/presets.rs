use burn::tensor::{backend::Backend, Device};

use crate::{
    encoder::{EncoderConfig, EncoderSpec},
    EncoderWeights,
};

use super::{Dpn, DpnConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DpnKind {
    Dpn68,
}

impl DpnKind {
    pub fn to_config(&self) -> DpnConfig {
        match self {
            Self::Dpn68 => DpnConfig::new(10, 128, 32, [3, 4, 12, 3], [16, 32, 32, 64]),
        }
    }
}

impl EncoderSpec for DpnKind {
    const FAMILY: &'static str = "dpn";

    fn name(&self) -> &'static str {
        match self {
            Self::Dpn68 => "dpn68",
        }
    }

    fn out_channels(&self) -> Vec<usize> {
        let config = self.to_config();
        let mut channels = vec![3, config.num_init_features];
        channels.extend(config.stage_channels());
        channels
    }

    fn url(&self, weights: EncoderWeights) -> Option<&'static str> {
        match (self, weights) {
            (Self::Dpn68, EncoderWeights::ImageNet) => {
                Some("http://data.lip6.fr/cadene/pretrainedmodels/dpn68-4af7d88d.pth")
            }
            _ => None,
        }
    }

    #[cfg(feature = "pretrained")]
    fn key_remap(&self) -> Vec<(String, String)> {
        let config = self.to_config();

        let mut remap = vec![
            // Both projection flavours load into the same optional field.
            (
                "(.+)\\.c1x1_w_s[12]\\.(.+)".to_string(),
                "$1.c1x1_w.$2".to_string(),
            ),
            (
                "features\\.conv1_1\\.(.+)".to_string(),
                "conv1_1.$1".to_string(),
            ),
            (
                "features\\.conv5_bn_ac\\.(.+)".to_string(),
                "conv5_bn_ac.$1".to_string(),
            ),
        ];
        // Map features.conv[s]_[i].* -> conv[s].[i - 1].*
        for (stage, num_blocks) in (2..).zip(config.k_sec) {
            for idx in 1..=num_blocks {
                remap.push((
                    format!("features\\.conv{stage}_{idx}\\.(.+)"),
                    format!("conv{stage}.{}.$1", idx - 1),
                ));
            }
        }
        remap
    }
}

impl<B: Backend> EncoderConfig<B> for DpnKind {
    type Encoder = Dpn<B>;

    fn init(&self, device: &Device<B>) -> Self::Encoder {
        self.to_config().init(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::test_utils::{assert_feature_shapes, TestBackend};

    #[test]
    fn dpn68_features() {
        let kind = DpnKind::Dpn68;
        assert_eq!(kind.out_channels(), vec![3, 10, 144, 320, 704, 832]);

        let encoder = EncoderConfig::<TestBackend>::init(&kind, &Default::default());
        assert_feature_shapes(&encoder, &kind.out_channels());
    }
}
