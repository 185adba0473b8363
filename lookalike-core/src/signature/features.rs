//! Feature extractors.
//!
//! Each extractor is a pure function from a decoded image to one feature.
//! Inputs are expected to be canonical (see [`crate::normalize`]) but any
//! non-empty image works: every extractor first resamples to its own fixed
//! working resolution, so output shapes never depend on the input size.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::bits::BitHash;

/// Side length of the coarse average hash (64 bits).
pub const SIMPLE_HASH_SIZE: u32 = 8;

/// Side length of the fine average hash (256 bits).
pub const ENHANCED_HASH_SIZE: u32 = 16;

/// Working resolution of the DCT-approximation hash.
pub const DCT_HASH_SIZE: u32 = 32;

/// Block side of the DCT-approximation hash (32 / 4 = 8 blocks per row).
pub const DCT_BLOCK_SIZE: u32 = 4;

/// Bins per color channel.
pub const HISTOGRAM_BINS: usize = 32;

/// Sobel gradient magnitude above which a pixel counts as an edge.
pub const EDGE_THRESHOLD: f64 = 30.0;

const HISTOGRAM_SIZE: u32 = 64;
const EDGE_SIZE: u32 = 100;
const BRIGHTNESS_SIZE: u32 = 50;
const TEXTURE_SIZE: u32 = 64;

/// Resampling filter used by every extractor.
const FILTER: FilterType = FilterType::Triangle;

/// Per-channel color distributions.
///
/// `red`, `green` and `blue` each sum to 1. `combined` is the per-bin sum of
/// the three channel counts divided by the pixel count, so it sums to 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorHistogram {
    pub red: [f64; HISTOGRAM_BINS],
    pub green: [f64; HISTOGRAM_BINS],
    pub blue: [f64; HISTOGRAM_BINS],
    pub combined: [f64; HISTOGRAM_BINS],
}

impl ColorHistogram {
    /// The four distributions in scoring order.
    pub fn channels(&self) -> [&[f64; HISTOGRAM_BINS]; 4] {
        [&self.red, &self.green, &self.blue, &self.combined]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDensity {
    /// Fraction of interior pixels whose gradient exceeds the threshold.
    pub density: f64,
    pub total_edges: u32,
}

/// Mean luminance of the top-left, top-right, bottom-left and bottom-right
/// quadrants.
pub type BrightnessProfile = [f64; 4];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureMetrics {
    /// Population variance of luminance.
    pub variance: f64,
    /// Mean absolute difference between a pixel and its 4-neighbour mean.
    pub contrast: f64,
    pub mean: f64,
}

fn luma(image: &DynamicImage, size: u32) -> GrayImage {
    image.resize_exact(size, size, FILTER).to_luma8()
}

fn mean_of(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let len = values.len();
    if len == 0 {
        return 0.0;
    }
    values.sum::<f64>() / len as f64
}

/// Average hash: one bit per pixel of a `size`×`size` luminance thumbnail,
/// set when the pixel is brighter than the thumbnail mean. Row-major.
pub fn average_hash(image: &DynamicImage, size: u32) -> BitHash {
    let samples = luma(image, size).into_raw();
    let mean = mean_of(samples.iter().map(|&v| v as f64));
    BitHash::from_bits(samples.iter().map(|&v| v as f64 > mean))
}

/// Block-averaged hash: a 32×32 thumbnail split into 64 blocks of 4×4, one
/// bit per block set when the block mean exceeds the mean of block means.
pub fn dct_hash(image: &DynamicImage) -> BitHash {
    let samples = luma(image, DCT_HASH_SIZE).into_raw();
    let blocks_per_side = DCT_HASH_SIZE / DCT_BLOCK_SIZE;
    let block_area = (DCT_BLOCK_SIZE * DCT_BLOCK_SIZE) as f64;

    let mut blocks = Vec::with_capacity((blocks_per_side * blocks_per_side) as usize);
    for block_y in 0..blocks_per_side {
        for block_x in 0..blocks_per_side {
            let mut sum = 0u32;
            for dy in 0..DCT_BLOCK_SIZE {
                for dx in 0..DCT_BLOCK_SIZE {
                    let x = block_x * DCT_BLOCK_SIZE + dx;
                    let y = block_y * DCT_BLOCK_SIZE + dy;
                    sum += samples[(y * DCT_HASH_SIZE + x) as usize] as u32;
                }
            }
            blocks.push(sum as f64 / block_area);
        }
    }

    let mean = mean_of(blocks.iter().copied());
    BitHash::from_bits(blocks.iter().map(|&block| block > mean))
}

pub fn color_histogram(image: &DynamicImage) -> ColorHistogram {
    let rgb = image
        .resize_exact(HISTOGRAM_SIZE, HISTOGRAM_SIZE, FILTER)
        .to_rgb8();
    let bin_width = 256 / HISTOGRAM_BINS;

    let mut counts = [[0u32; HISTOGRAM_BINS]; 3];
    for pixel in rgb.pixels() {
        for (channel, &value) in pixel.0.iter().enumerate() {
            let bin = (value as usize / bin_width).min(HISTOGRAM_BINS - 1);
            counts[channel][bin] += 1;
        }
    }

    let total = (rgb.width() * rgb.height()) as f64;
    let normalize = |hist: &[u32; HISTOGRAM_BINS]| -> [f64; HISTOGRAM_BINS] {
        std::array::from_fn(|i| hist[i] as f64 / total)
    };
    let combined: [u32; HISTOGRAM_BINS] =
        std::array::from_fn(|i| counts[0][i] + counts[1][i] + counts[2][i]);

    ColorHistogram {
        red: normalize(&counts[0]),
        green: normalize(&counts[1]),
        blue: normalize(&counts[2]),
        combined: normalize(&combined),
    }
}

/// Sobel edge density over a 100×100 luminance thumbnail.
pub fn edge_density(image: &DynamicImage) -> EdgeDensity {
    let gray = luma(image, EDGE_SIZE);
    let (width, height) = gray.dimensions();
    let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f64;

    let mut total_edges = 0u32;
    let mut interior = 0u32;

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let gx = -px(x - 1, y - 1) + px(x + 1, y - 1) - 2.0 * px(x - 1, y)
                + 2.0 * px(x + 1, y)
                - px(x - 1, y + 1)
                + px(x + 1, y + 1);
            let gy = -px(x - 1, y - 1) - 2.0 * px(x, y - 1) - px(x + 1, y - 1)
                + px(x - 1, y + 1)
                + 2.0 * px(x, y + 1)
                + px(x + 1, y + 1);

            if (gx * gx + gy * gy).sqrt() > EDGE_THRESHOLD {
                total_edges += 1;
            }
            interior += 1;
        }
    }

    let density = if interior > 0 {
        total_edges as f64 / interior as f64
    } else {
        0.0
    };

    EdgeDensity {
        density,
        total_edges,
    }
}

pub fn brightness_profile(image: &DynamicImage) -> BrightnessProfile {
    let gray = luma(image, BRIGHTNESS_SIZE);
    let (width, height) = gray.dimensions();

    let mut sums = [0f64; 4];
    let mut counts = [0u32; 4];

    for (x, y, pixel) in gray.enumerate_pixels() {
        let row = if y * 2 < height { 0 } else { 2 };
        let col = if x * 2 < width { 0 } else { 1 };
        sums[row + col] += pixel[0] as f64;
        counts[row + col] += 1;
    }

    std::array::from_fn(|i| {
        if counts[i] > 0 {
            sums[i] / counts[i] as f64
        } else {
            0.0
        }
    })
}

pub fn texture_metrics(image: &DynamicImage) -> TextureMetrics {
    let gray = luma(image, TEXTURE_SIZE);
    let (width, height) = gray.dimensions();
    let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f64;

    let samples = gray.as_raw();
    let mean = mean_of(samples.iter().map(|&v| v as f64));
    let variance = mean_of(samples.iter().map(|&v| (v as f64 - mean).powi(2)));

    let mut contrast = 0.0;
    let mut interior = 0u32;
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let neighbours = (px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y)) / 4.0;
            contrast += (px(x, y) - neighbours).abs();
            interior += 1;
        }
    }

    TextureMetrics {
        variance,
        contrast: if interior > 0 {
            contrast / interior as f64
        } else {
            0.0
        },
        mean,
    }
}
