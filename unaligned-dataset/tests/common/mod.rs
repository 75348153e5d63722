use imageproc::image::{GrayImage, Luma, Rgb, RgbImage};
use tempfile::TempDir;

use std::fs;
use std::path::Path;

use unaligned_dataset::{DatasetOptions, Domain};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Writes `<root>/<phase>A|B|C` with `sizes[d]` images per domain. Images
/// vary in size and color encoding so every lookup exercises decoding,
/// resizing and cropping.
pub fn dataset_tree(phase: &str, sizes: [usize; 3]) -> TempDir {
    let root = tempfile::tempdir().expect("create temp dir");
    for (domain, &count) in Domain::iter().zip(sizes.iter()) {
        let dir = root.path().join(domain.dir_name(phase));
        fs::create_dir_all(&dir).expect("create domain dir");
        for i in 0..count {
            write_image(&dir, &format!("{i:04}.png"), i);
        }
    }
    root
}

fn write_image(dir: &Path, name: &str, i: usize) {
    let path = dir.join(name);
    let (w, h) = (24 + (i as u32 % 5) * 7, 18 + (i as u32 % 3) * 11);

    if i % 2 == 0 {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 9) as u8, (y * 9) as u8, i as u8]))
            .save(path)
            .expect("write rgb image");
    } else {
        GrayImage::from_pixel(w, h, Luma([(i * 17) as u8]))
            .save(path)
            .expect("write gray image");
    }
}

pub fn small_options(root: &Path) -> DatasetOptions {
    DatasetOptions {
        load_size: 20,
        crop_size: 16,
        seed: Some(2024),
        ..DatasetOptions::new(root)
    }
}
