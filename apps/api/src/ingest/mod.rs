pub mod handlers;
pub mod parser;
pub mod schema;
