mod diagram;
mod render;
mod tracer;

pub use diagram::*;
pub use render::*;
pub use tracer::*;
