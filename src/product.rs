//! Zones and product files of one sensor, held side by side

use crate::config::CatalogConfig;
use crate::io::catalog::{ProductCatalog, ProductFile};
use crate::io::zones::{Zone, ZoneCatalog};
use crate::types::GeoResult;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// A zone catalog plus the product files available for it
#[derive(Debug, Clone)]
pub struct SensorProduct {
    geomap: String,
    zones: ZoneCatalog,
    files: ProductCatalog,
}

impl SensorProduct {
    /// Load the zone map and scan the product directory named by `config`
    pub fn open(config: &CatalogConfig) -> GeoResult<Self> {
        let zones = ZoneCatalog::from_path(config.geomap_path())?;
        let files = ProductCatalog::scan(&config.products_dir, &config.file_pattern)?;
        Ok(Self::new(config.geomap.clone(), zones, files))
    }

    pub fn new(geomap: impl Into<String>, zones: ZoneCatalog, files: ProductCatalog) -> Self {
        Self {
            geomap: geomap.into(),
            zones,
            files,
        }
    }

    pub fn zones(&self) -> &ZoneCatalog {
        &self.zones
    }

    pub fn files(&self) -> &ProductCatalog {
        &self.files
    }

    pub fn zone_names(&self) -> Vec<&str> {
        self.zones.names()
    }

    pub fn dates(&self) -> Vec<NaiveDateTime> {
        self.files.dates()
    }

    pub fn zone(&self, name: &str) -> GeoResult<&Zone> {
        self.zones.by_name(name)
    }

    pub fn file_by_date(&self, date: NaiveDate) -> GeoResult<&ProductFile> {
        self.files.file_by_date(date)
    }

    /// Product file and zone to hand to a raster reader
    pub fn locate(&self, date: NaiveDate, zone: &str) -> GeoResult<(&ProductFile, &Zone)> {
        Ok((self.file_by_date(date)?, self.zone(zone)?))
    }
}

impl fmt::Display for SensorProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensorProduct ({}) - {}", self.geomap, self.zones)
    }
}
