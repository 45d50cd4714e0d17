use burn::{
    backend::{ndarray::NdArrayDevice, NdArray},
    tensor::{Distribution, Tensor},
};
use segmentation_factory_burn::{EncoderWeights, ModelFactory, ModelName, Placement};

type TestBackend = NdArray<f32>;

fn factory() -> ModelFactory {
    ModelFactory::new(ModelName::UnetResNet34)
        .with_weights(EncoderWeights::Random)
        .with_classes(3)
}

#[test]
fn replicated_forward_matches_single_device() {
    let devices = vec![NdArrayDevice::Cpu, NdArrayDevice::Cpu];
    let placement = Placement::<TestBackend>::replicated(devices).unwrap();
    let parallel = factory().resolve_and_distribute(&placement).unwrap();
    assert_eq!(parallel.devices().len(), 2);

    // Odd batch size leaves the chunks uneven.
    let x = Tensor::<TestBackend, 4>::random(
        [3, 3, 64, 64],
        Distribution::Default,
        placement.primary(),
    );
    let expected = parallel.module().forward(x.clone());
    let out = parallel.forward(x);

    assert_eq!(out.dims(), [3, 3, 64, 64]);
    out.into_data().assert_approx_eq(&expected.into_data(), 3);
}

#[test]
fn single_device_is_a_pass_through() {
    let placement = Placement::<TestBackend>::single(NdArrayDevice::Cpu);
    let parallel = factory().resolve_and_distribute(&placement).unwrap();

    let x = Tensor::<TestBackend, 4>::random(
        [1, 3, 32, 32],
        Distribution::Default,
        placement.primary(),
    );
    let expected = parallel.module().forward(x.clone());
    parallel
        .forward(x)
        .into_data()
        .assert_approx_eq(&expected.into_data(), 5);

    let model = parallel.into_inner();
    let decoded = Tensor::zeros([1, 16, 4, 4], &NdArrayDevice::Cpu);
    assert_eq!(model.head.forward(decoded).dims(), [1, 3, 4, 4]);
}
