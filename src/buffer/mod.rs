mod buffer_pool_manager;
mod frame;

pub use buffer_pool_manager::*;
pub use frame::*;
