mod base;
mod crm;
mod monitoring;
mod postgres;
mod settings;
mod storage;
mod warehouse;

pub use base::*;
pub use crm::*;
pub use monitoring::*;
pub use postgres::*;
pub use settings::*;
pub use storage::*;
pub use warehouse::*;
