use imageproc::image::ImageError;

use std::path::PathBuf;

use crate::domain::Domain;

/// Failures a caller may want to tell apart.
///
/// Public operations return `anyhow::Result`; these values sit at the root
/// of the error chain and can be recovered with
/// `err.downcast_ref::<DatasetError>()`.
#[derive(Debug)]
pub enum DatasetError {
    MissingDirectory(PathBuf),
    NotADirectory(PathBuf),
    InvalidOptions(String),
    EmptyDomain { domain: Domain, dir: PathBuf },
    Decode { path: PathBuf, source: ImageError },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DatasetError::MissingDirectory(path) => {
                write!(f, "Directory does not exist: {}", path.display())
            }
            DatasetError::NotADirectory(path) => {
                write!(f, "Not a valid directory: {}", path.display())
            }
            DatasetError::InvalidOptions(msg) => write!(f, "Invalid dataset options: {msg}"),
            DatasetError::EmptyDomain { domain, dir } => {
                write!(f, "No images found in domain {domain} ({})", dir.display())
            }
            DatasetError::Decode { path, source } => {
                write!(f, "Failed to load image {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}
