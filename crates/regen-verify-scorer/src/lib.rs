//! Perceptual difference engine: SSIM, perceptual hash, edge quality and
//! subject geometry, combined into one severity-classified result.

pub mod pipeline;
pub mod sampling;
pub mod scorer;
pub mod signals;

pub use pipeline::GrayPlane;
pub use sampling::{
    ImageFileLoader, InMemoryLoader, LoadError, RasterLoader, raster_from_image,
};
pub use scorer::{PreparedOriginal, QualityScorer, classify};
pub use signals::{
    PerceptualHash, SubjectBox, edge_quality, geometry_delta, perceptual_hash, phash_distance,
    structural_similarity, subject_box,
};

#[cfg(test)]
mod tests;
