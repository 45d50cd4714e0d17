mod conv2drelu;
mod decoder;

pub use decoder::*;
