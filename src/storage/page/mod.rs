pub mod formatter;
mod page_maker;
mod slotted_page;

pub use page_maker::*;
pub use slotted_page::*;
