pub mod features;
pub mod handlers;
pub mod model;
pub mod service;
