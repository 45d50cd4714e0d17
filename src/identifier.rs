use core::{fmt, str::FromStr};

use crate::{
    encoder::{
        densenet::DenseNetKind, dpn::DpnKind, efficientnet::EfficientNetKind, resnet::ResNetKind,
        senet::SeNetKind, EncoderPreset,
    },
    Error,
};

/// Supported U-Net encoder/decoder combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelName {
    #[serde(rename = "unet_resnet34")]
    UnetResNet34,
    #[serde(rename = "unet_resnet50")]
    UnetResNet50,
    #[serde(rename = "unet_resnext50_32x4d")]
    UnetResNeXt50_32x4d,
    #[serde(rename = "unet_se_resnet50")]
    UnetSeResNet50,
    #[serde(rename = "unet_se_resnext50_32x4d")]
    UnetSeResNeXt50_32x4d,
    #[serde(rename = "unet_dpn68")]
    UnetDpn68,
    #[serde(rename = "unet_efficientnet_b4")]
    UnetEfficientNetB4,
    #[serde(rename = "unet_efficientnet_b3")]
    UnetEfficientNetB3,
    #[serde(rename = "unet_densenet121")]
    UnetDenseNet121,
}

impl ModelName {
    pub const ALL: [ModelName; 9] = [
        Self::UnetResNet34,
        Self::UnetResNet50,
        Self::UnetResNeXt50_32x4d,
        Self::UnetSeResNet50,
        Self::UnetSeResNeXt50_32x4d,
        Self::UnetDpn68,
        Self::UnetEfficientNetB4,
        Self::UnetEfficientNetB3,
        Self::UnetDenseNet121,
    ];

    /// Canonical identifier, e.g. `unet_efficientnet_b3`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnetResNet34 => "unet_resnet34",
            Self::UnetResNet50 => "unet_resnet50",
            Self::UnetResNeXt50_32x4d => "unet_resnext50_32x4d",
            Self::UnetSeResNet50 => "unet_se_resnet50",
            Self::UnetSeResNeXt50_32x4d => "unet_se_resnext50_32x4d",
            Self::UnetDpn68 => "unet_dpn68",
            Self::UnetEfficientNetB4 => "unet_efficientnet_b4",
            Self::UnetEfficientNetB3 => "unet_efficientnet_b3",
            Self::UnetDenseNet121 => "unet_densenet121",
        }
    }

    /// Name of the encoder, e.g. `efficientnet-b3`.
    pub fn encoder_name(&self) -> &'static str {
        self.encoder().name()
    }

    /// The encoder family and variant backing this model.
    pub fn encoder(&self) -> EncoderPreset {
        match self {
            Self::UnetResNet34 => EncoderPreset::ResNet(ResNetKind::ResNet34),
            Self::UnetResNet50 => EncoderPreset::ResNet(ResNetKind::ResNet50),
            Self::UnetResNeXt50_32x4d => EncoderPreset::ResNet(ResNetKind::ResNeXt50_32x4d),
            Self::UnetSeResNet50 => EncoderPreset::SeNet(SeNetKind::SeResNet50),
            Self::UnetSeResNeXt50_32x4d => EncoderPreset::SeNet(SeNetKind::SeResNeXt50_32x4d),
            Self::UnetDpn68 => EncoderPreset::Dpn(DpnKind::Dpn68),
            Self::UnetEfficientNetB4 => EncoderPreset::EfficientNet(EfficientNetKind::EfficientnetB4),
            Self::UnetEfficientNetB3 => EncoderPreset::EfficientNet(EfficientNetKind::EfficientnetB3),
            Self::UnetDenseNet121 => EncoderPreset::DenseNet(DenseNetKind::DenseNet121),
        }
    }

    /// Channel path of the classification projection head, from the deepest encoder
    /// feature down to 32 channels. `None` when no head is defined for the model.
    pub fn projection_channels(&self) -> Option<&'static [usize]> {
        match self {
            Self::UnetResNet34 => Some(&[512, 32]),
            Self::UnetResNet50 => Some(&[2048, 512, 32]),
            Self::UnetSeResNeXt50_32x4d => Some(&[2048, 512, 32]),
            Self::UnetEfficientNetB4 => Some(&[448, 160, 32]),
            Self::UnetEfficientNetB3 => Some(&[384, 32]),
            Self::UnetDenseNet121 => Some(&[1024, 512, 32]),
            Self::UnetResNeXt50_32x4d | Self::UnetSeResNet50 | Self::UnetDpn68 => None,
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelName {
    type Err = Error;

    /// Accepts the canonical name (`unet_efficientnet_b3`) or the bare encoder
    /// name (`efficientnet-b3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s || name.encoder_name() == s)
            .ok_or_else(|| Error::UnsupportedModel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_encoder_names() {
        for name in ModelName::ALL {
            assert_eq!(name.as_str().parse::<ModelName>().unwrap(), name);
            assert_eq!(name.encoder_name().parse::<ModelName>().unwrap(), name);
        }
        assert_eq!(
            "efficientnet-b3".parse::<ModelName>().unwrap(),
            ModelName::UnetEfficientNetB3
        );
    }

    #[test]
    fn rejects_unknown_identifier() {
        let err = "unet_vgg16".parse::<ModelName>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedModel(ref name) if name == "unet_vgg16"));
    }

    #[test]
    fn projection_heads_end_at_32_channels() {
        let with_head: Vec<_> = ModelName::ALL
            .into_iter()
            .filter(|name| name.projection_channels().is_some())
            .collect();
        assert_eq!(with_head.len(), 6);

        for name in with_head {
            let channels = name.projection_channels().unwrap();
            assert_eq!(*channels.last().unwrap(), 32);
            assert_eq!(channels[0], name.encoder().out_channels()[5]);
        }
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&ModelName::UnetSeResNeXt50_32x4d).unwrap();
        assert_eq!(json, "\"unet_se_resnext50_32x4d\"");
    }
}
