mod block;
mod presets;
mod resnet;

pub use presets::*;
pub use resnet::*;
