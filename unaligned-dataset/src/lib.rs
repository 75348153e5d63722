pub mod dataset;
pub mod domain;
pub mod error;
pub mod folder;
pub mod image;
pub mod options;

// Re-export commonly used types
pub use dataset::{DataPoint, Dataset, UnalignedDataset};
pub use domain::Domain;
pub use error::DatasetError;
pub use image::{ImageTensor, Transform, TransformParams};
pub use options::{DatasetOptions, Direction, Preprocess};
