use burn::{
    backend::NdArray,
    tensor::{Distribution, Tensor},
};
use segmentation_factory_burn::{ClassifierConfig, EncoderWeights, Error, ModelName};

type TestBackend = NdArray<f32>;

fn classifier(model: ModelName) -> ClassifierConfig {
    ClassifierConfig::new(model).with_weights(EncoderWeights::Random)
}

#[test]
fn models_with_a_head_produce_one_logit_per_class() {
    let device = Default::default();
    let x = Tensor::<TestBackend, 4>::random([2, 3, 64, 64], Distribution::Default, &device);

    for (classes, model) in (2..).zip(
        ModelName::ALL
            .into_iter()
            .filter(|model| model.projection_channels().is_some()),
    ) {
        let network = classifier(model)
            .with_classes(classes)
            .init::<TestBackend>(&device)
            .unwrap();

        assert_eq!(network.forward(x.clone()).dims(), [2, classes, 1, 1], "{model}");
    }
}

#[test]
fn models_without_a_head_are_rejected() {
    for model in [
        ModelName::UnetResNeXt50_32x4d,
        ModelName::UnetSeResNet50,
        ModelName::UnetDpn68,
    ] {
        let err = classifier(model)
            .init::<TestBackend>(&Default::default())
            .unwrap_err();
        assert!(matches!(err, Error::NoClassificationHead(name) if name == model));
    }
}

#[test]
fn training_mode_drops_features() {
    let device = Default::default();
    let network = classifier(ModelName::UnetResNet34)
        .init::<TestBackend>(&device)
        .unwrap();
    assert!(network.is_training());

    let x = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
    let a = network.forward(x.clone());
    let b = network.forward(x);
    let diff = (a - b).abs().sum().into_scalar();
    assert!(diff > 0.0);
}

#[test]
fn random_efficientnet_logits_depend_on_the_input() {
    let device = Default::default();
    let network = classifier(ModelName::UnetEfficientNetB3)
        .with_training(false)
        .init::<TestBackend>(&device)
        .unwrap();

    let a = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
    let b = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
    let diff = (network.forward(a) - network.forward(b)).abs().sum().into_scalar();
    assert!(diff > 0.0);
}

#[test]
fn zero_classes_is_rejected() {
    let err = classifier(ModelName::UnetResNet34)
        .with_classes(0)
        .init::<TestBackend>(&Default::default())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidClassCount));
}
