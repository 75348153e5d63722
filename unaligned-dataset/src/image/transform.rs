//! Transform parameters and the resize/crop/flip/normalize pipeline

use anyhow::{ensure, Context, Result};
use fast_image_resize as fr;
use fr::images::Image as FrImage;
use imageproc::image::{
    imageops, DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage,
};
use rand::Rng;

use super::tensor::ImageTensor;
use crate::options::{DatasetOptions, Preprocess};

// Dimensions are rounded to a multiple of this when preprocessing is disabled
const POWER_BASE: u32 = 4;

// Bicubic, same kernel as PIL's BICUBIC
const RESIZE_ALG: fr::ResizeAlg = fr::ResizeAlg::Convolution(fr::FilterType::CatmullRom);

/// Random choices shared by every step of one image's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformParams {
    pub crop_pos: (u32, u32),
    pub flip: bool,
}

/// Draw crop offset and flip flag for an image of the given native size.
///
/// The crop offset is drawn against the size the image will have once it
/// reaches the crop step, so it always falls inside the resized image.
pub fn derive_transform_params<R: Rng>(
    options: &DatasetOptions,
    dimensions: (u32, u32),
    rng: &mut R,
) -> TransformParams {
    let (width, height) = dimensions;
    let (new_w, new_h) = match options.preprocess {
        Preprocess::ResizeAndCrop => (options.load_size, options.load_size),
        Preprocess::ScaleWidthAndCrop => (
            options.load_size,
            (options.load_size as u64 * height as u64 / width.max(1) as u64) as u32,
        ),
        _ => (width, height),
    };

    let x = rng.random_range(0..=new_w.saturating_sub(options.crop_size));
    let y = rng.random_range(0..=new_h.saturating_sub(options.crop_size));
    let flip = rng.random::<f64>() > 0.5;

    TransformParams {
        crop_pos: (x, y),
        flip,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Grayscale,
    Resize { width: u32, height: u32 },
    /// Resize to `target` width keeping aspect ratio, but never below
    /// `min_height` rows.
    ScaleWidth { target: u32, min_height: u32 },
    /// Square crop at `(x, y)`; regions past the image edge are zero-filled.
    Crop { x: u32, y: u32, size: u32 },
    MakePower2 { base: u32 },
    FlipHorizontal,
}

impl Step {
    fn apply(self, img: DynamicImage) -> Result<DynamicImage> {
        match self {
            Step::Grayscale => Ok(to_grayscale(&img)),
            Step::Resize { width, height } => resize(img, width, height),
            Step::ScaleWidth { target, min_height } => scale_width(img, target, min_height),
            Step::Crop { x, y, size } => Ok(crop(img, x, y, size)),
            Step::MakePower2 { base } => make_power_2(img, base),
            Step::FlipHorizontal => Ok(img.fliph()),
        }
    }
}

/// An ordered sequence of image operations ending in tensor conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    steps: Vec<Step>,
}

impl Transform {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn apply(&self, img: DynamicImage) -> Result<ImageTensor> {
        let mut img = img;
        for step in &self.steps {
            img = step.apply(img)?;
        }
        Ok(ImageTensor::from_image(&img))
    }
}

/// Build the pipeline for one image. Pure: the same inputs always give
/// the same steps.
pub fn build_transform(
    options: &DatasetOptions,
    params: &TransformParams,
    grayscale: bool,
) -> Transform {
    let mut steps = Vec::new();

    if grayscale {
        steps.push(Step::Grayscale);
    }

    if options.preprocess.resizes() {
        steps.push(Step::Resize {
            width: options.load_size,
            height: options.load_size,
        });
    } else if options.preprocess.scales_width() {
        steps.push(Step::ScaleWidth {
            target: options.load_size,
            min_height: options.crop_size,
        });
    }

    if options.preprocess.crops() {
        let (x, y) = params.crop_pos;
        steps.push(Step::Crop {
            x,
            y,
            size: options.crop_size,
        });
    }

    if options.preprocess == Preprocess::None {
        steps.push(Step::MakePower2 { base: POWER_BASE });
    }

    if !options.no_flip && params.flip {
        steps.push(Step::FlipHorizontal);
    }

    Transform { steps }
}

/// ITU-R 601-2 luma, the conversion PIL uses for mode "L"
fn to_grayscale(img: &DynamicImage) -> DynamicImage {
    if let DynamicImage::ImageLuma8(_) = img {
        return img.clone();
    }

    let rgb = img.to_rgb8();
    let gray: GrayImage = imageproc::map::map_colors(&rgb, |Rgb([r, g, b]): Rgb<u8>| {
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([l as u8])
    });
    DynamicImage::ImageLuma8(gray)
}

fn resize(img: DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    ensure!(
        width > 0 && height > 0,
        "Cannot resize image to {width}x{height}"
    );

    let (src_width, src_height) = img.dimensions();
    if (src_width, src_height) == (width, height) {
        return Ok(img);
    }
    ensure!(
        src_width > 0 && src_height > 0,
        "Cannot resize an empty {src_width}x{src_height} image"
    );

    let (pixel_type, channels, src_buffer) = match img {
        DynamicImage::ImageLuma8(gray) => (fr::PixelType::U8, 1, gray.into_raw()),
        other => (fr::PixelType::U8x3, 3, other.into_rgb8().into_raw()),
    };

    let src_image = FrImage::from_vec_u8(src_width, src_height, src_buffer, pixel_type)?;

    let mut dst_buffer = vec![0u8; width as usize * height as usize * channels];
    let mut dst_image = FrImage::from_slice_u8(width, height, &mut dst_buffer, pixel_type)?;

    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src_image,
        &mut dst_image,
        Some(&fr::ResizeOptions::new().resize_alg(RESIZE_ALG)),
    )?;

    let resized = if channels == 1 {
        GrayImage::from_raw(width, height, dst_buffer).map(DynamicImage::ImageLuma8)
    } else {
        RgbImage::from_raw(width, height, dst_buffer).map(DynamicImage::ImageRgb8)
    };
    resized.context("Resized buffer does not match image dimensions")
}

fn scale_width(img: DynamicImage, target: u32, min_height: u32) -> Result<DynamicImage> {
    let (width, height) = img.dimensions();
    if width == target && height >= min_height {
        return Ok(img);
    }
    ensure!(width > 0, "Cannot scale an image with zero width");

    let scaled = (target as f64 * height as f64 / width as f64).max(min_height as f64);
    resize(img, target, scaled as u32)
}

fn crop(img: DynamicImage, x: u32, y: u32, size: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= size && height <= size {
        return img;
    }

    match img {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(crop_padded(&gray, x, y, size)),
        other => DynamicImage::ImageRgb8(crop_padded(&other.into_rgb8(), x, y, size)),
    }
}

fn crop_padded<P: Pixel + 'static>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    x: u32,
    y: u32,
    size: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let view = imageops::crop_imm(img, x, y, size, size).to_image();
    if view.dimensions() == (size, size) {
        return view;
    }

    let mut canvas = ImageBuffer::new(size, size);
    imageops::replace(&mut canvas, &view, 0, 0);
    canvas
}

fn make_power_2(img: DynamicImage, base: u32) -> Result<DynamicImage> {
    let (width, height) = img.dimensions();
    let round = |v: u32| {
        let rounded = (v as f64 / base as f64).round_ties_even() as u32 * base;
        rounded.max(base)
    };

    let (new_width, new_height) = (round(width), round(height));
    if (new_width, new_height) == (width, height) {
        return Ok(img);
    }
    resize(img, new_width, new_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn options(preprocess: Preprocess, load_size: u32, crop_size: u32) -> DatasetOptions {
        DatasetOptions {
            preprocess,
            load_size,
            crop_size,
            ..DatasetOptions::default()
        }
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        }))
    }

    const NO_FLIP: TransformParams = TransformParams {
        crop_pos: (0, 0),
        flip: false,
    };

    #[test]
    fn crop_offset_stays_inside_resized_image() {
        let opts = options(Preprocess::ResizeAndCrop, 286, 256);
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..200 {
            let params = derive_transform_params(&opts, (640, 480), &mut rng);
            assert!(params.crop_pos.0 <= 30 && params.crop_pos.1 <= 30);
        }
    }

    #[test]
    fn scale_width_offsets_follow_aspect_ratio() {
        let opts = options(Preprocess::ScaleWidthAndCrop, 100, 40);
        let mut rng = StdRng::seed_from_u64(1);

        let mut max_y = 0;
        for _ in 0..200 {
            let params = derive_transform_params(&opts, (400, 200), &mut rng);
            assert!(params.crop_pos.0 <= 60);
            max_y = max_y.max(params.crop_pos.1);
        }
        assert!(max_y <= 10);
    }

    #[test]
    fn small_images_get_zero_offset() {
        let opts = options(Preprocess::Crop, 286, 256);
        let mut rng = StdRng::seed_from_u64(2);

        let params = derive_transform_params(&opts, (64, 32), &mut rng);
        assert_eq!(params.crop_pos, (0, 0));
    }

    #[test]
    fn same_seed_same_params() {
        let opts = DatasetOptions::default();
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            derive_transform_params(&opts, (300, 300), &mut rng)
        };

        assert_eq!(draw(42), draw(42));
    }

    #[test]
    fn steps_follow_preprocess_mode() {
        let params = TransformParams {
            crop_pos: (3, 4),
            flip: true,
        };

        let t = build_transform(&options(Preprocess::ResizeAndCrop, 286, 256), &params, true);
        assert_eq!(
            t.steps(),
            [
                Step::Grayscale,
                Step::Resize {
                    width: 286,
                    height: 286
                },
                Step::Crop {
                    x: 3,
                    y: 4,
                    size: 256
                },
                Step::FlipHorizontal,
            ]
        );

        let t = build_transform(&options(Preprocess::ScaleWidth, 128, 64), &params, false);
        assert_eq!(
            t.steps(),
            [
                Step::ScaleWidth {
                    target: 128,
                    min_height: 64
                },
                Step::FlipHorizontal,
            ]
        );

        let mut opts = options(Preprocess::None, 286, 256);
        opts.no_flip = true;
        let t = build_transform(&opts, &params, false);
        assert_eq!(t.steps(), [Step::MakePower2 { base: 4 }]);
    }

    #[test]
    fn resize_and_crop_gives_fixed_shape() {
        let opts = options(Preprocess::ResizeAndCrop, 32, 24);
        let mut rng = StdRng::seed_from_u64(3);

        for (w, h) in [(50, 20), (13, 77), (32, 32)] {
            let params = derive_transform_params(&opts, (w, h), &mut rng);

            let rgb = build_transform(&opts, &params, false).apply(gradient(w, h)).unwrap();
            assert_eq!(rgb.shape(), [3, 24, 24]);

            let gray = build_transform(&opts, &params, true).apply(gradient(w, h)).unwrap();
            assert_eq!(gray.shape(), [1, 24, 24]);
        }
    }

    #[test]
    fn scale_width_respects_min_height() {
        let opts = options(Preprocess::ScaleWidth, 50, 40);

        let t = build_transform(&opts, &NO_FLIP, false).apply(gradient(200, 100)).unwrap();
        assert_eq!(t.shape(), [3, 40, 50]);

        let t = build_transform(&opts, &NO_FLIP, false).apply(gradient(100, 200)).unwrap();
        assert_eq!(t.shape(), [3, 100, 50]);
    }

    #[test]
    fn crop_pads_short_side_with_zeros() {
        let opts = options(Preprocess::Crop, 286, 4);
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 6, Rgb([255, 255, 255])));

        let t = build_transform(&opts, &NO_FLIP, false).apply(white).unwrap();

        assert_eq!(t.shape(), [3, 4, 4]);
        assert_eq!(t.get(0, 0, 2), Some(1.0));
        assert_eq!(t.get(0, 0, 3), Some(-1.0));
    }

    #[test]
    fn crop_leaves_small_images_alone() {
        let opts = options(Preprocess::Crop, 286, 16);

        let t = build_transform(&opts, &NO_FLIP, false).apply(gradient(10, 12)).unwrap();
        assert_eq!(t.shape(), [3, 12, 10]);
    }

    #[test]
    fn make_power_2_rounds_to_base() {
        let opts = options(Preprocess::None, 286, 256);

        let t = build_transform(&opts, &NO_FLIP, false).apply(gradient(10, 6)).unwrap();
        assert_eq!(t.shape(), [3, 8, 8]);

        let t = build_transform(&opts, &NO_FLIP, false).apply(gradient(12, 20)).unwrap();
        assert_eq!(t.shape(), [3, 20, 12]);
    }

    #[test]
    fn flip_mirrors_columns() {
        let opts = options(Preprocess::None, 286, 256);
        let mut img = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        for y in 0..4 {
            img.put_pixel(0, y, Rgb([255, 0, 0]));
        }
        let params = TransformParams {
            crop_pos: (0, 0),
            flip: true,
        };

        let t = build_transform(&opts, &params, false)
            .apply(DynamicImage::ImageRgb8(img))
            .unwrap();

        assert_eq!(t.get(0, 2, 0), Some(-1.0));
        assert_eq!(t.get(0, 2, 3), Some(1.0));
    }

    #[test]
    fn grayscale_uses_luma_weights() {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));

        let gray = to_grayscale(&red).into_luma8();
        assert_eq!(gray.get_pixel(0, 0).0, [76]);
    }
}
