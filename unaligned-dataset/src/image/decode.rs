//! Image decoding

use anyhow::Result;
use imageproc::image::{self, DynamicImage};

use std::path::Path;

use crate::error::DatasetError;

/// Open an image file and convert it to 8-bit RGB, whatever its encoding.
pub fn open_rgb(path: &Path) -> Result<DynamicImage> {
    let img = image::open(path).map_err(|source| DatasetError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(match img {
        DynamicImage::ImageRgb8(_) => img,
        _ => DynamicImage::ImageRgb8(img.into_rgb8()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{GrayImage, Luma};

    #[test]
    fn grayscale_source_becomes_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        GrayImage::from_pixel(4, 3, Luma([200])).save(&path).unwrap();

        let img = open_rgb(&path).unwrap();

        assert!(matches!(img, DynamicImage::ImageRgb8(_)));
        assert_eq!(img.into_rgb8().get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn corrupt_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = open_rgb(&path).unwrap_err();

        match err.downcast_ref::<DatasetError>() {
            Some(DatasetError::Decode { path: p, .. }) => assert_eq!(*p, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
