#[cfg(feature = "pretrained")]
mod download;
#[cfg(feature = "pretrained")]
pub(crate) use download::download;

pub mod decoder;
pub mod encoder;
pub mod segmentation_head;

mod classifier;
mod error;
mod factory;
mod identifier;
mod model;
mod placement;
mod weights;

pub use classifier::*;
pub use error::*;
pub use factory::*;
pub use identifier::*;
pub use model::*;
pub use placement::*;
pub use weights::*;
