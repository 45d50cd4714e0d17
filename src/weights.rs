use core::{fmt, str::FromStr};

use crate::Error;

/// Source of the encoder's initial parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderWeights {
    /// Random initialization.
    Random,
    /// Weights trained on ImageNet-1k.
    ImageNet,
    /// EfficientNet weights trained with adversarial examples.
    AdvProp,
}

impl Default for EncoderWeights {
    fn default() -> Self {
        Self::ImageNet
    }
}

impl EncoderWeights {
    /// `None` means random initialization, like passing no weight source at all.
    pub fn from_option(name: Option<&str>) -> Result<Self, Error> {
        name.map_or(Ok(Self::Random), str::parse)
    }

    pub fn is_pretrained(&self) -> bool {
        !matches!(self, Self::Random)
    }
}

impl fmt::Display for EncoderWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Random => "none",
            Self::ImageNet => "imagenet",
            Self::AdvProp => "advprop",
        })
    }
}

impl FromStr for EncoderWeights {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "random" => Ok(Self::Random),
            "imagenet" => Ok(Self::ImageNet),
            "advprop" => Ok(Self::AdvProp),
            _ => Err(Error::UnknownWeights(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_weight_names() {
        assert_eq!("none".parse::<EncoderWeights>().unwrap(), EncoderWeights::Random);
        assert_eq!("ImageNet".parse::<EncoderWeights>().unwrap(), EncoderWeights::ImageNet);
        assert_eq!("advprop".parse::<EncoderWeights>().unwrap(), EncoderWeights::AdvProp);
        assert!(matches!(
            "instagram".parse::<EncoderWeights>(),
            Err(Error::UnknownWeights(_))
        ));
    }

    #[test]
    fn missing_source_means_random() {
        assert_eq!(EncoderWeights::from_option(None).unwrap(), EncoderWeights::Random);
        assert_eq!(
            EncoderWeights::from_option(Some("imagenet")).unwrap(),
            EncoderWeights::ImageNet
        );
        assert_eq!(EncoderWeights::default(), EncoderWeights::ImageNet);
    }
}
