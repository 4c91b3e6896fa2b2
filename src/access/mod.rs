mod access_manager;

pub use access_manager::*;
