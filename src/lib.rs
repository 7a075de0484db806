//! Dataturks to Pascal VOC converter
//!
//! This library converts Dataturks bounding-box exports into the Pascal VOC
//! layout and flattens Pascal VOC annotations into a one-line-per-image index
//! for detector training.

pub mod config;
pub mod conversion;
pub mod dataset;
pub mod download;
pub mod error;
pub mod flatten;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{FlattenArgs, FlattenerConfig, ImageSet, ImportArgs, ImporterConfig};
pub use dataset::{run_import, setup_output_directories};
pub use download::{HttpFetcher, ImageFetcher};
pub use error::{FlattenError, ImportError};
pub use flatten::run_flatten;
pub use types::{ImportReport, Rectangle, VocAnnotation};
