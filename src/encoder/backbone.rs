use burn::prelude::*;

use crate::EncoderWeights;

use super::{
    densenet::{DenseNet, DenseNetKind},
    dpn::{Dpn, DpnKind},
    efficientnet::{EfficientNet, EfficientNetKind},
    resnet::{ResNet, ResNetKind},
    senet::{SeNet, SeNetKind},
    Encoder, EncoderConfig, EncoderSpec,
};

/// Encoder family and variant of a supported model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EncoderPreset {
    ResNet(ResNetKind),
    SeNet(SeNetKind),
    Dpn(DpnKind),
    EfficientNet(EfficientNetKind),
    DenseNet(DenseNetKind),
}

impl EncoderPreset {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ResNet(kind) => kind.name(),
            Self::SeNet(kind) => kind.name(),
            Self::Dpn(kind) => kind.name(),
            Self::EfficientNet(kind) => kind.name(),
            Self::DenseNet(kind) => kind.name(),
        }
    }

    /// Channels of the six feature maps produced by the encoder.
    pub fn out_channels(&self) -> Vec<usize> {
        match self {
            Self::ResNet(kind) => kind.out_channels(),
            Self::SeNet(kind) => kind.out_channels(),
            Self::Dpn(kind) => kind.out_channels(),
            Self::EfficientNet(kind) => kind.out_channels(),
            Self::DenseNet(kind) => kind.out_channels(),
        }
    }

    /// Whether `weights` can be used with this encoder.
    pub fn has_weights(&self, weights: EncoderWeights) -> bool {
        if !weights.is_pretrained() {
            return true;
        }
        let url = match self {
            Self::ResNet(kind) => kind.url(weights),
            Self::SeNet(kind) => kind.url(weights),
            Self::Dpn(kind) => kind.url(weights),
            Self::EfficientNet(kind) => kind.url(weights),
            Self::DenseNet(kind) => kind.url(weights),
        };
        url.is_some()
    }

    pub fn init<B: Backend>(
        &self,
        weights: EncoderWeights,
        device: &B::Device,
    ) -> crate::Result<Backbone<B>> {
        Ok(match self {
            Self::ResNet(kind) => {
                Backbone::ResNet(EncoderConfig::<B>::init_with(kind, weights, device)?)
            }
            Self::SeNet(kind) => {
                Backbone::SeNet(EncoderConfig::<B>::init_with(kind, weights, device)?)
            }
            Self::Dpn(kind) => {
                Backbone::Dpn(EncoderConfig::<B>::init_with(kind, weights, device)?)
            }
            Self::EfficientNet(kind) => {
                Backbone::EfficientNet(EncoderConfig::<B>::init_with(kind, weights, device)?)
            }
            Self::DenseNet(kind) => {
                Backbone::DenseNet(EncoderConfig::<B>::init_with(kind, weights, device)?)
            }
        })
    }
}

/// Any supported encoder, as a single module type.
#[derive(Module, Debug)]
pub enum Backbone<B: Backend> {
    ResNet(ResNet<B>),
    SeNet(SeNet<B>),
    Dpn(Dpn<B>),
    EfficientNet(EfficientNet<B>),
    DenseNet(DenseNet<B>),
}

impl<B: Backend> Encoder<B> for Backbone<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        match self {
            Self::ResNet(encoder) => encoder.forward(x),
            Self::SeNet(encoder) => encoder.forward(x),
            Self::Dpn(encoder) => encoder.forward(x),
            Self::EfficientNet(encoder) => encoder.forward(x),
            Self::DenseNet(encoder) => encoder.forward(x),
        }
    }
}
