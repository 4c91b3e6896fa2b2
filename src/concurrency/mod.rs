mod lock_manager;
mod lock_table_entry;
mod wait_for_graph;

pub use lock_manager::*;
pub use lock_table_entry::*;
pub use wait_for_graph::*;
