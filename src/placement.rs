use burn::prelude::*;
use log::info;

use crate::{model::ImageModel, Error, Result};

/// Devices a network is allowed to run on. The first one is the primary device: it holds
/// the network's parameters and receives every output.
#[derive(Debug, Clone)]
pub struct Placement<B: Backend> {
    devices: Vec<B::Device>,
}

impl<B: Backend> Placement<B> {
    pub fn single(device: B::Device) -> Self {
        Self {
            devices: vec![device],
        }
    }

    /// Replicate across every device in `devices`.
    pub fn replicated(devices: Vec<B::Device>) -> Result<Self> {
        if devices.is_empty() {
            return Err(Error::NoDevice);
        }
        Ok(Self { devices })
    }

    pub fn primary(&self) -> &B::Device {
        &self.devices[0]
    }

    pub fn devices(&self) -> &[B::Device] {
        &self.devices
    }
}

/// Data-parallel wrapper: the batch is split along its first dimension, each chunk is
/// evaluated by a replica on its own device and the outputs are gathered on the primary
/// device. With a single device this is a pass-through.
#[derive(Debug)]
pub struct DataParallel<B: Backend, M> {
    replicas: Vec<M>,
    devices: Vec<B::Device>,
}

impl<B: Backend, M: ImageModel<B>> DataParallel<B, M> {
    /// Move `module` to the primary device of `placement` and replicate it on the others.
    pub fn new(module: M, placement: &Placement<B>) -> Self {
        let devices = placement.devices().to_vec();
        let module = module.to_device(placement.primary());

        let mut replicas = Vec::with_capacity(devices.len());
        for device in devices.iter().skip(1) {
            replicas.push(module.clone().to_device(device));
        }
        replicas.insert(0, module);

        if devices.len() > 1 {
            info!("Replicating model across {} devices", devices.len());
        }

        Self { replicas, devices }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.replicas.len() == 1 {
            return self.replicas[0].forward(x.to_device(&self.devices[0]));
        }

        let primary = &self.devices[0];
        let outputs = x
            .chunk(self.replicas.len(), 0)
            .into_iter()
            .zip(self.replicas.iter().zip(&self.devices))
            .map(|(chunk, (replica, device))| {
                replica.forward(chunk.to_device(device)).to_device(primary)
            })
            .collect();

        Tensor::cat(outputs, 0)
    }

    /// The replica living on the primary device.
    pub fn module(&self) -> &M {
        &self.replicas[0]
    }

    pub fn into_inner(mut self) -> M {
        self.replicas.swap_remove(0)
    }

    pub fn devices(&self) -> &[B::Device] {
        &self.devices
    }
}
