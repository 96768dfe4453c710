pub mod extract;
pub mod page;
