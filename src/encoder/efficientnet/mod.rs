mod conv_norm;
mod inverted_residual;
mod presets;

mod efficientnet;

pub use efficientnet::*;
pub use presets::*;
