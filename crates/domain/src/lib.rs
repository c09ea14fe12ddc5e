pub mod errors;
pub mod stats;
pub mod task;

pub use errors::*;
pub use stats::*;
pub use task::*;
