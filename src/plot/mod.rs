pub mod coordinates;
pub mod model;
pub mod service;
