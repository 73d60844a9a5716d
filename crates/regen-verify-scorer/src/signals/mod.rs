pub mod edge_quality;
pub mod geometry;
pub mod spectral_hash;
pub mod structural;

pub use edge_quality::edge_quality;
pub use geometry::{SubjectBox, box_delta, geometry_delta, subject_box};
pub use spectral_hash::{PerceptualHash, perceptual_hash, phash_distance};
pub use structural::structural_similarity;
