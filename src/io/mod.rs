//! I/O modules for reading zone maps, annotations, and product listings

pub mod zones;
pub mod annotation;
pub mod catalog;

pub use zones::{Zone, ZoneCatalog};
pub use annotation::AnnotationParser;
pub use catalog::{ProductCatalog, ProductFile};
