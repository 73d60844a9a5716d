use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use regen_verify_types::{CandidateId, RasterError, RasterSample};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("candidate {id} not found")]
    NotFound { id: CandidateId },

    #[error("failed to decode {id}: {source}")]
    Decode {
        id: CandidateId,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid raster for {id}: {source}")]
    Raster {
        id: CandidateId,
        #[source]
        source: RasterError,
    },
}

/// Resolves a candidate identifier into pixels. Implementations may hit the
/// network or the filesystem; a failure only excludes that candidate.
pub trait RasterLoader: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self, id: &CandidateId) -> Result<RasterSample, LoadError>;
}

/// Decodes PNG/JPEG files, treating the candidate id as a path.
#[derive(Clone, Debug, Default)]
pub struct ImageFileLoader {
    base_dir: Option<PathBuf>,
    uniform_size: Option<(u32, u32)>,
}

impl ImageFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative ids are resolved against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Resample every decoded image to `width x height`.
    pub fn with_uniform_size(mut self, width: u32, height: u32) -> Self {
        self.uniform_size = Some((width, height));
        self
    }

    fn resolve(&self, id: &CandidateId) -> PathBuf {
        let raw = id.as_str();
        let path = Path::new(raw.strip_prefix("file://").unwrap_or(raw));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl RasterLoader for ImageFileLoader {
    fn name(&self) -> &'static str {
        "image-file"
    }

    fn load(&self, id: &CandidateId) -> Result<RasterSample, LoadError> {
        let path = self.resolve(id);
        if !path.exists() {
            return Err(LoadError::NotFound { id: id.clone() });
        }
        let image = image::open(&path).map_err(|source| LoadError::Decode {
            id: id.clone(),
            source,
        })?;
        raster_from_image(&image, self.uniform_size).map_err(|source| LoadError::Raster {
            id: id.clone(),
            source,
        })
    }
}

/// Fixed set of rasters keyed by id, for embedding callers that already hold
/// decoded pixels.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLoader {
    rasters: HashMap<CandidateId, RasterSample>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<CandidateId>, raster: RasterSample) {
        self.rasters.insert(id.into(), raster);
    }

    pub fn with(mut self, id: impl Into<CandidateId>, raster: RasterSample) -> Self {
        self.insert(id, raster);
        self
    }
}

impl RasterLoader for InMemoryLoader {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn load(&self, id: &CandidateId) -> Result<RasterSample, LoadError> {
        self.rasters
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound { id: id.clone() })
    }
}

pub fn raster_from_image(
    image: &DynamicImage,
    uniform_size: Option<(u32, u32)>,
) -> Result<RasterSample, RasterError> {
    let mut rgba: RgbaImage = image.to_rgba8();
    if let Some((width, height)) = uniform_size {
        if rgba.dimensions() != (width, height) {
            rgba = image::imageops::resize(&rgba, width, height, FilterType::Triangle);
        }
    }
    let (width, height) = rgba.dimensions();
    RasterSample::from_rgba(width, height, rgba.into_raw())
}
