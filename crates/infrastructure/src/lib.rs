pub mod auth_store;
pub mod memory;
pub mod pocketbase;
pub mod realtime;
pub mod repositories;

pub use auth_store::*;
pub use memory::*;
pub use pocketbase::*;
pub use realtime::*;
pub use repositories::*;
