mod log_file;
mod log_record;
mod recovery;

pub use log_file::*;
pub use log_record::*;
pub use recovery::*;
