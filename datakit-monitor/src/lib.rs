mod alert;
mod monitor;
mod pipeline_log;
mod record;
mod sampler;
mod sink;

pub use alert::*;
pub use monitor::*;
pub use pipeline_log::*;
pub use record::*;
pub use sampler::*;
pub use sink::*;
