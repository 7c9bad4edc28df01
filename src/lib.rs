pub mod app;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod stats;
pub mod transform;

pub use error::{Result, SchemaError, VizError};
