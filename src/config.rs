//! Catalog locations and naming conventions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default product file naming: Copernicus Global Land FCOVER, e.g.
/// `c_gls_FCOVER300-RT2_202301100000_GLOBE_OLCI_V1.1.2.nc`
pub const DEFAULT_FILE_PATTERN: &str = r"RT(?P<revision>\d+)_(?P<date>\d{12})_.*\.nc$";

/// Where zone maps and product files live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding zone maps
    pub zones_dir: PathBuf,
    /// Zone map file name inside `zones_dir`
    pub geomap: String,
    /// Directory holding product files
    pub products_dir: PathBuf,
    /// Regex with `date` (YYYYMMDDhhmm) and `revision` named groups
    pub file_pattern: String,
}

impl CatalogConfig {
    /// Configuration rooted at `base`: `base/zones/_Earth` and `base/fcover`
    pub fn with_base_dir<P: Into<PathBuf>>(base: P) -> Self {
        let base = base.into();
        Self {
            zones_dir: base.join("zones").join("_Earth"),
            geomap: "map.geojson".to_string(),
            products_dir: base.join("fcover"),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }

    pub fn geomap_path(&self) -> PathBuf {
        self.zones_dir.join(&self.geomap)
    }
}

impl Default for CatalogConfig {
    /// Rooted at the platform data directory (`~/.local/share/geozone` on Linux),
    /// or `./data` when the platform has none
    fn default() -> Self {
        let base = dirs::data_dir()
            .map(|d| d.join("geozone"))
            .unwrap_or_else(|| PathBuf::from("data"));
        Self::with_base_dir(base)
    }
}
