use std::env;

use burn::{
    backend::NdArray,
    tensor::{Distribution, Tensor},
};
use log::info;

use segmentation_factory_burn::{ClassifierConfig, EncoderWeights, ModelFactory, ModelName};

const DEFAULT_MODEL: &str = "efficientnet-b3";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let model: ModelName = env::args()
        .nth(1)
        .as_deref()
        .unwrap_or(DEFAULT_MODEL)
        .parse()?;
    let device = Default::default();

    let segmentation = ModelFactory::new(model)
        .with_weights(EncoderWeights::Random)
        .resolve::<NdArray>(&device)?;
    let classifier = ClassifierConfig::new(model)
        .with_weights(EncoderWeights::Random)
        .init::<NdArray>(&device)?;

    let x = Tensor::<NdArray, 4>::random([1, 3, 256, 1600], Distribution::Default, &device);
    info!("running {model} on input {:?}", x.dims());

    println!("{:?}", segmentation.forward(x.clone()).dims());
    println!("{:?}", classifier.forward(x).dims());

    Ok(())
}
