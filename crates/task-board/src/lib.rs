pub mod app;
pub mod chart;
pub mod context;
pub mod error;
pub mod routes;
pub mod views;

pub use app::*;
pub use chart::*;
pub use context::*;
pub use error::*;
pub use routes::*;
