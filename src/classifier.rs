use burn::{
    config::Config,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Relu,
    },
    prelude::*,
    tensor::Distribution,
};

use crate::{
    encoder::{Backbone, Encoder},
    model::ImageModel,
    EncoderWeights, Error, ModelFactory, ModelName,
};

/// Index of the deepest encoder feature, the one fed to the classifier.
const FEATURE_INDEX: usize = 5;
const DROPOUT: f64 = 0.5;
const HEAD_CHANNELS: usize = 32;

/// Stack of 1x1 convolutions reducing the encoder width to 32 channels, with a ReLU
/// between consecutive convolutions.
#[derive(Module, Debug)]
pub struct ProjectionHead<B: Backend> {
    convs: Vec<Conv2d<B>>,
    relu: Relu,
}

impl<B: Backend> ProjectionHead<B> {
    pub fn new(channels: &[usize], device: &B::Device) -> Self {
        let convs = channels
            .windows(2)
            .map(|pair| Conv2dConfig::new([pair[0], pair[1]], [1, 1]).init(device))
            .collect();
        Self {
            convs,
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.convs.iter().enumerate().fold(x, |x, (i, conv)| {
            let x = if i > 0 { self.relu.forward(x) } else { x };
            conv.forward(x)
        })
    }
}

/// Whole-image classifier sharing the encoder of a U-Net segmentation model.
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    encoder: Backbone<B>,
    pool: AdaptiveAvgPool2d,
    feature: ProjectionHead<B>,
    logit: Conv2d<B>,
    training: bool,
}

impl<B: Backend> Classifier<B> {
    /// `(batch, 3, h, w)` to raw logits of shape `(batch, classes, 1, 1)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut features = self.encoder.forward(x);
        let x = features.swap_remove(FEATURE_INDEX);
        let x = self.dropout(x);
        let x = self.pool.forward(x);
        let x = self.feature.forward(x);
        self.logit.forward(x)
    }

    pub fn encoder(&self) -> &Backbone<B> {
        &self.encoder
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    fn dropout(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if !self.training {
            return x;
        }
        let keep = 1.0 - DROPOUT;
        let mask = x.random_like(Distribution::Bernoulli(keep));
        x.mul(mask).div_scalar(keep)
    }
}

impl<B: Backend> ImageModel<B> for Classifier<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        Classifier::forward(self, x)
    }
}

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub model: ModelName,
    #[config(default = 4)]
    pub classes: usize,
    /// Enables dropout on the encoder features.
    #[config(default = true)]
    pub training: bool,
    #[config(default = "EncoderWeights::ImageNet")]
    pub weights: EncoderWeights,
}

impl ClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::Result<Classifier<B>> {
        let channels = self
            .model
            .projection_channels()
            .ok_or(Error::NoClassificationHead(self.model))?;

        let encoder = ModelFactory::new(self.model)
            .with_weights(self.weights)
            .with_classes(self.classes)
            .resolve::<B>(device)?
            .into_encoder();

        Ok(Classifier {
            encoder,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            feature: ProjectionHead::new(channels, device),
            logit: Conv2dConfig::new([HEAD_CHANNELS, self.classes], [1, 1]).init(device),
            training: self.training,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::test_utils::TestBackend;

    #[test]
    fn projection_head_layers() {
        let device = Default::default();
        let single = ProjectionHead::<TestBackend>::new(&[512, 32], &device);
        let double = ProjectionHead::<TestBackend>::new(&[2048, 512, 32], &device);
        assert_eq!(single.convs.len(), 1);
        assert_eq!(double.convs.len(), 2);

        let x = Tensor::<TestBackend, 4>::ones([2, 2048, 1, 1], &device);
        assert_eq!(double.forward(x).dims(), [2, 32, 1, 1]);
    }

    #[test]
    fn missing_head_fails_before_building_the_encoder() {
        // Pretrained weights would need a download; the head check comes first.
        let result =
            ClassifierConfig::new(ModelName::UnetDpn68).init::<TestBackend>(&Default::default());
        assert!(matches!(
            result,
            Err(Error::NoClassificationHead(ModelName::UnetDpn68))
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ClassifierConfig::new(ModelName::UnetEfficientNetB4)
            .with_classes(2)
            .with_training(false);
        let json = serde_json::to_string(&config).unwrap();
        let restored: ClassifierConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.model, ModelName::UnetEfficientNetB4);
        assert_eq!(restored.classes, 2);
        assert!(!restored.training);
        assert_eq!(restored.weights, EncoderWeights::ImageNet);
    }

    #[test]
    fn training_dropout_zeroes_and_rescales() {
        let device = Default::default();
        let classifier = ClassifierConfig::new(ModelName::UnetResNet34)
            .with_weights(EncoderWeights::Random)
            .init::<TestBackend>(&device)
            .unwrap();

        let x = Tensor::<TestBackend, 4>::ones([1, 512, 4, 4], &device);
        let values = classifier
            .dropout(x)
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert!(values.iter().all(|&v| v == 0.0 || v == 2.0));
        assert!(values.iter().any(|&v| v == 0.0));
        assert!(values.iter().any(|&v| v == 2.0));
    }

    #[test]
    fn eval_mode_skips_dropout() {
        let device = Default::default();
        let classifier = ClassifierConfig::new(ModelName::UnetResNet34)
            .with_weights(EncoderWeights::Random)
            .with_training(false)
            .init::<TestBackend>(&device)
            .unwrap();
        assert!(!classifier.is_training());

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 64, 64], &device);
        let a = classifier.forward(x.clone());
        let b = classifier.forward(x);
        a.into_data().assert_approx_eq(&b.into_data(), 5);
    }
}
