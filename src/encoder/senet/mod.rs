mod block;
mod presets;
mod senet;

pub use presets::*;
pub use senet::*;
