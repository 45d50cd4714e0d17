mod block;
mod densenet;
mod presets;

pub use densenet::*;
pub use presets::*;
