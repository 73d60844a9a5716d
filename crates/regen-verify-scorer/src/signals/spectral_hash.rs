use std::sync::LazyLock;

use crate::pipeline::GrayPlane;
use crate::pipeline::ops::{dct2_low, dct_basis, resize_nearest_into};

const SAMPLE_SIZE: usize = 32;
const BLOCK_SIZE: usize = 8;

type CosineBasis = [[f64; SAMPLE_SIZE]; BLOCK_SIZE];

static BASIS: LazyLock<CosineBasis> = LazyLock::new(dct_basis::<BLOCK_SIZE, SAMPLE_SIZE>);

/// 63-bit perceptual fingerprint. Bit `i` (1..=63) mirrors the `i`-th
/// low-frequency coefficient in row-major order; bit 0 (DC) is always clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerceptualHash(u64);

impl PerceptualHash {
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

/// Cosine table shared by every hash in the process.
pub(crate) fn cosine_basis() -> &'static CosineBasis {
    &BASIS
}

pub fn perceptual_hash(plane: &GrayPlane) -> PerceptualHash {
    let mut sample = [0u8; SAMPLE_SIZE * SAMPLE_SIZE];
    resize_nearest_into(
        &plane.pixels,
        plane.width,
        plane.height,
        SAMPLE_SIZE,
        &mut sample,
    );
    let spectrum = dct2_low::<BLOCK_SIZE, SAMPLE_SIZE>(&sample, cosine_basis());
    let coefficients = spectrum.as_flattened();
    let ac = &coefficients[1..];
    let mean = ac.iter().sum::<f64>() / ac.len() as f64;
    let mut hash = 0u64;
    for (idx, value) in coefficients.iter().enumerate().skip(1) {
        if *value > mean {
            hash |= 1u64 << idx;
        }
    }
    PerceptualHash(hash)
}

/// Hamming distance between the fingerprints of two planes, in `0..=63`.
pub fn phash_distance(a: &GrayPlane, b: &GrayPlane) -> u32 {
    perceptual_hash(a).distance(&perceptual_hash(b))
}
