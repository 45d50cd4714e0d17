use burn::{
    backend::NdArray,
    tensor::{Distribution, Tensor},
};
use segmentation_factory_burn::{EncoderWeights, Error, ModelFactory, ModelName};

type TestBackend = NdArray<f32>;

fn random_input(shape: [usize; 4]) -> Tensor<TestBackend, 4> {
    Tensor::random(shape, Distribution::Default, &Default::default())
}

#[test]
fn every_model_segments_at_input_resolution() {
    let device = Default::default();
    for (classes, model) in (1..).zip(ModelName::ALL) {
        let network = ModelFactory::new(model)
            .with_weights(EncoderWeights::Random)
            .with_classes(classes)
            .resolve::<TestBackend>(&device)
            .unwrap();

        let out = network.forward(random_input([1, 3, 64, 64]));
        assert_eq!(out.dims(), [1, classes, 64, 64], "{model}");
    }
}

#[test]
fn unsupported_identifier_is_an_error() {
    let err = "unet_mobilenet_v2".parse::<ModelName>().unwrap_err();
    assert!(matches!(err, Error::UnsupportedModel(_)));
    assert_eq!(err.to_string(), "unsupported model 'unet_mobilenet_v2'");
}

#[test]
fn advprop_is_only_published_for_efficientnet() {
    let result = ModelFactory::new(ModelName::UnetResNet34)
        .with_weights(EncoderWeights::AdvProp)
        .resolve::<TestBackend>(&Default::default());

    assert!(matches!(
        result,
        Err(Error::UnavailableWeights {
            encoder: "resnet34",
            weights: EncoderWeights::AdvProp,
        })
    ));
}

#[test]
fn efficientnet_b3_keeps_wide_aspect_ratio() {
    let network = ModelFactory::new("efficientnet-b3".parse().unwrap())
        .with_weights(EncoderWeights::Random)
        .resolve::<TestBackend>(&Default::default())
        .unwrap();

    let out = network.forward(random_input([1, 3, 64, 320]));
    assert_eq!(out.dims(), [1, 4, 64, 320]);
}

#[test]
#[ignore = "slow on the ndarray backend"]
fn efficientnet_b3_full_resolution() {
    let network = ModelFactory::new(ModelName::UnetEfficientNetB3)
        .with_weights(EncoderWeights::Random)
        .resolve::<TestBackend>(&Default::default())
        .unwrap();

    let out = network.forward(random_input([1, 3, 256, 1600]));
    assert_eq!(out.dims(), [1, 4, 256, 1600]);
}

#[cfg(feature = "pretrained")]
#[test]
#[ignore = "downloads pretrained weights"]
fn pretrained_weights_differ_from_random() {
    use segmentation_factory_burn::encoder::Encoder;

    let device = Default::default();
    let pretrained = ModelFactory::new(ModelName::UnetResNet34)
        .resolve::<TestBackend>(&device)
        .unwrap();
    let random = ModelFactory::new(ModelName::UnetResNet34)
        .with_weights(EncoderWeights::Random)
        .resolve::<TestBackend>(&device)
        .unwrap();

    let x = random_input([1, 3, 64, 64]);
    let a = pretrained.encoder.forward(x.clone()).pop().unwrap();
    let b = random.encoder.forward(x).pop().unwrap();

    let diff = (a - b).abs().sum().into_scalar();
    assert!(diff > 1e-3);
}
