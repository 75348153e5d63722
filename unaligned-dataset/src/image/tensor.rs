use imageproc::image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// A normalized image in channel-major (CHW) layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
}

impl ImageTensor {
    /// Scale 8-bit pixels to `[0, 1]`, then normalize each channel with
    /// mean 0.5 and std 0.5 so values land in `[-1, 1]`.
    pub fn from_image(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => {
                let (w, h) = gray.dimensions();
                Self::from_interleaved(gray.as_raw(), 1, h as usize, w as usize)
            }
            _ => {
                let rgb = img.to_rgb8();
                let (w, h) = rgb.dimensions();
                Self::from_interleaved(rgb.as_raw(), 3, h as usize, w as usize)
            }
        }
    }

    fn from_interleaved(raw: &[u8], channels: usize, height: usize, width: usize) -> Self {
        let plane = height * width;
        let mut data = vec![0.0; channels * plane];

        for (i, pixel) in raw.chunks_exact(channels).enumerate() {
            for (c, &value) in pixel.iter().enumerate() {
                data[c * plane + i] = (value as f32 / 255.0 - 0.5) / 0.5;
            }
        }

        Self {
            channels,
            height,
            width,
            data,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    pub fn get(&self, channel: usize, y: usize, x: usize) -> Option<f32> {
        if channel >= self.channels || y >= self.height || x >= self.width {
            return None;
        }
        self.data
            .get(channel * self.height * self.width + y * self.width + x)
            .copied()
    }

    /// Undo the normalization, for previewing what the model sees.
    pub fn to_image(&self) -> DynamicImage {
        let plane = self.height * self.width;
        let to_u8 = |v: f32| ((v + 1.0) / 2.0 * 255.0).round().clamp(0.0, 255.0) as u8;
        let (w, h) = (self.width as u32, self.height as u32);

        if self.channels == 1 {
            DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
                let i = y as usize * self.width + x as usize;
                Luma([to_u8(self.data[i])])
            }))
        } else {
            DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                let i = y as usize * self.width + x as usize;
                Rgb([
                    to_u8(self.data[i]),
                    to_u8(self.data[plane + i]),
                    to_u8(self.data[2 * plane + i]),
                ])
            }))
        }
    }
}
