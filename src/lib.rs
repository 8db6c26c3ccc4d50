//! geozone: geographic zone extraction from orbital sensor imagery
//!
//! Sensor rasters are indexed by (line, pixel), not by latitude/longitude.
//! Given a sparse geolocation grid for the image and a zone bounding box,
//! this library finds the pixel window covering the zone, the mask of pixels
//! that really fall inside it, and mean viewing angles over those pixels.

pub mod types;
pub mod config;
pub mod io;
pub mod core;
pub mod product;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, GeoError, GeoResult, GeolocationPoint, GeolocationTable, ImageExtent,
    SensorImage,
};

pub use config::CatalogConfig;
pub use io::{AnnotationParser, ProductCatalog, ProductFile, Zone, ZoneCatalog};
pub use crate::core::{normalize, PixelWindow, Rectifier, RectifyParams, SensorWindow};
pub use product::SensorProduct;
