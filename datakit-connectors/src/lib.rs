mod crm;
mod error;
mod registry;
mod warehouse;

pub use crm::*;
pub use error::*;
pub use registry::*;
pub use warehouse::*;
