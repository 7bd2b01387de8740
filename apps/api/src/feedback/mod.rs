pub mod consensus;
pub mod handlers;
