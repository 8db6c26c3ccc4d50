//! Core geolocation processing modules

pub mod interpolate;
pub mod rectify;
pub mod normalize;

// Re-export main types
pub use interpolate::{BarycentricGrid, GridSpec, LinearInterpolator};
pub use rectify::{PixelWindow, Rectifier, RectifyParams, SensorWindow};
pub use normalize::{normalize, quantile_sorted};
