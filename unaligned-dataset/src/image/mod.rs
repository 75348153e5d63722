//! Image loading and preprocessing for model input

mod decode;
mod tensor;
mod transform;

// Re-export public API
pub use decode::open_rgb;
pub use tensor::ImageTensor;
pub use transform::{build_transform, derive_transform_params, Step, Transform, TransformParams};

use anyhow::Result;
use imageproc::image::GenericImageView;
use rand::Rng;

use std::path::Path;

use crate::options::DatasetOptions;

/// Decode one image and run it through a freshly drawn pipeline.
pub fn load_and_transform<R: Rng>(
    path: &Path,
    options: &DatasetOptions,
    grayscale: bool,
    rng: &mut R,
) -> Result<ImageTensor> {
    let img = open_rgb(path)?;

    let params = derive_transform_params(options, img.dimensions(), rng);
    log::trace!("{}: {:?}", path.display(), params);

    build_transform(options, &params, grayscale).apply(img)
}
