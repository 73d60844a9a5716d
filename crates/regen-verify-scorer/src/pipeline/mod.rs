pub mod ops;
pub mod preprocess;

pub use preprocess::GrayPlane;
