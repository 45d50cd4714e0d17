mod block;
mod dpn;
mod presets;

pub use dpn::*;
pub use presets::*;
