use serde::{Deserialize, Serialize};
use std::fmt;

/// 2D real raster (line x pixel)
pub type SensorImage = ndarray::Array2<f32>;

/// Geographic bounding box in degrees, stored as (lat_min, lon_min, lat_max, lon_max)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Build a bounding box, rejecting inverted or non-finite bounds
    pub fn new(lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64) -> GeoResult<Self> {
        let bounds = [lat_min, lon_min, lat_max, lon_max];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(GeoError::InvalidParameter(format!(
                "Bounding box has non-finite bounds: {:?}",
                bounds
            )));
        }
        if lat_min > lat_max || lon_min > lon_max {
            return Err(GeoError::InvalidParameter(format!(
                "Inverted bounding box: lat [{}, {}], lon [{}, {}]",
                lat_min, lat_max, lon_min, lon_max
            )));
        }
        Ok(Self { lat_min, lon_min, lat_max, lon_max })
    }

    /// Smallest box enclosing a ring of `[lon, lat]` positions
    pub fn from_ring(ring: &[[f64; 2]]) -> Option<Self> {
        if ring.is_empty() {
            return None;
        }

        let mut bbox = Self {
            lat_min: f64::INFINITY,
            lon_min: f64::INFINITY,
            lat_max: f64::NEG_INFINITY,
            lon_max: f64::NEG_INFINITY,
        };
        for &[lon, lat] in ring {
            bbox.lat_min = bbox.lat_min.min(lat);
            bbox.lat_max = bbox.lat_max.max(lat);
            bbox.lon_min = bbox.lon_min.min(lon);
            bbox.lon_max = bbox.lon_max.max(lon);
        }
        Some(bbox)
    }

    /// Inclusive membership test; NaN coordinates are never inside
    #[inline]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) / 2.0,
            (self.lon_min + self.lon_max) / 2.0,
        )
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.lat_min, self.lon_min, self.lat_max, self.lon_max)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.3}, {:.3}, {:.3}, {:.3})",
            self.lat_min, self.lon_min, self.lat_max, self.lon_max
        )
    }
}

/// Full extent of a sensor image in its native (line, pixel) indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageExtent {
    pub height: usize, // lines
    pub width: usize,  // pixels
}

/// One sample of a sensor geolocation grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeolocationPoint {
    pub line: i64,
    pub pixel: i64,
    pub lat: f64,
    pub lon: f64,
    pub incidence: f64,  // degrees
    pub elevation: f64,  // degrees
}

/// Sparse mapping from sensor (line, pixel) to ground coordinates and viewing angles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationTable {
    pub samples: Vec<GeolocationPoint>,
    pub extent: ImageExtent,
}

impl GeolocationTable {
    pub fn new(samples: Vec<GeolocationPoint>, extent: ImageExtent) -> Self {
        Self { samples, extent }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Geographic extremes over every sample, as a bounding box
    pub fn coverage(&self) -> Option<BoundingBox> {
        if self.samples.is_empty() {
            return None;
        }

        let mut bbox = BoundingBox {
            lat_min: f64::INFINITY,
            lon_min: f64::INFINITY,
            lat_max: f64::NEG_INFINITY,
            lon_max: f64::NEG_INFINITY,
        };
        for s in &self.samples {
            bbox.lat_min = bbox.lat_min.min(s.lat);
            bbox.lat_max = bbox.lat_max.max(s.lat);
            bbox.lon_min = bbox.lon_min.min(s.lon);
            bbox.lon_max = bbox.lon_max.max(s.lon);
        }
        Some(bbox)
    }

    pub(crate) fn field(&self, f: impl Fn(&GeolocationPoint) -> f64) -> Vec<f64> {
        self.samples.iter().map(f).collect()
    }
}

/// Error types for zone extraction
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Malformed zone file: {0}")]
    MalformedZoneFile(String),

    #[error("Zone index {index} out of range (catalog holds {count} zones)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Zone not found: {0:?}")]
    ZoneNotFound(String),

    #[error("Invalid step {0}: must be a positive integer")]
    InvalidStep(usize),

    #[error("Insufficient geolocation samples: {0}")]
    InsufficientSamples(String),

    #[error("Zone {zone} does not intersect the sensor swath")]
    ZoneOutsideSwath { zone: String },

    #[error("Degenerate value range: low={low}, high={high}")]
    DegenerateRange { low: f64, high: f64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GeoError {
    /// The zone is simply not covered by this pass; batch callers usually skip it
    pub fn is_outside_swath(&self) -> bool {
        matches!(self, GeoError::ZoneOutsideSwath { .. })
    }
}

/// Result type for zone extraction operations
pub type GeoResult<T> = Result<T, GeoError>;
