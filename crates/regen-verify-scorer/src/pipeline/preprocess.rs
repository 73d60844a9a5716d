use regen_verify_types::{PixelLayout, RasterSample};

use super::ops::{luma, sobel_magnitude_into};

/// Grayscale view of a raster plus its Sobel magnitude map. Built once per
/// image and shared by every signal.
#[derive(Clone, Debug)]
pub struct GrayPlane {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
    pub edges: Vec<f32>,
}

impl GrayPlane {
    pub fn from_raster(raster: &RasterSample) -> Self {
        let width = raster.width() as usize;
        let height = raster.height() as usize;
        let pixels = match raster.layout() {
            PixelLayout::Gray => raster.data().to_vec(),
            PixelLayout::Rgba => raster
                .data()
                .chunks_exact(4)
                .map(|px| luma(px[0], px[1], px[2]))
                .collect(),
        };
        let mut edges = Vec::with_capacity(pixels.len());
        sobel_magnitude_into(&pixels, width, height, &mut edges);
        Self {
            width,
            height,
            pixels,
            edges,
        }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn same_dimensions(&self, other: &GrayPlane) -> bool {
        self.width == other.width && self.height == other.height
    }
}
