//! Zone catalog built from a GeoJSON-like feature collection
//!
//! Every feature is reduced to the bounding box of the first ring of its
//! geometry. The catalog is immutable once loaded.

use crate::types::{BoundingBox, GeoError, GeoResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// A named geographic rectangle of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub bbox: BoundingBox,
}

impl Zone {
    pub fn new(name: impl Into<String>, bbox: BoundingBox) -> Self {
        Self { name: name.into(), bbox }
    }

    /// Default name used for features without a `name` property
    pub fn default_name(bbox: &BoundingBox) -> String {
        format!("zone {}", bbox)
    }

    /// OpenSearch query selecting Sentinel-1 GRD products whose footprint contains the zone
    pub fn footprint_query(&self) -> String {
        let b = &self.bbox;
        format!(
            "(footprint:\"Contains(POLYGON(({lon0:.3} {lat0:.3},{lon1:.3} {lat0:.3},{lon1:.3} {lat1:.3},{lon0:.3} {lat1:.3},{lon0:.3} {lat0:.3})))\") AND  ((platformname:Sentinel-1 AND producttype:GRD))",
            lat0 = b.lat_min,
            lon0 = b.lon_min,
            lat1 = b.lat_max,
            lon1 = b.lon_max,
        )
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.bbox)
    }
}

/// Ordered, immutable collection of zones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneCatalog {
    zones: Vec<Zone>,
}

impl ZoneCatalog {
    /// Build a catalog from an already-parsed feature collection document
    pub fn load(document: &Value) -> GeoResult<Self> {
        match document.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {}
            Some(other) => {
                return Err(GeoError::MalformedZoneFile(format!(
                    "Expected a FeatureCollection, found {:?}",
                    other
                )))
            }
            None => {
                return Err(GeoError::MalformedZoneFile(
                    "Missing 'type' member".to_string(),
                ))
            }
        }

        let features = document
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| GeoError::MalformedZoneFile("Missing 'features' array".to_string()))?;

        if features.is_empty() {
            return Err(GeoError::MalformedZoneFile(
                "Feature collection has no features".to_string(),
            ));
        }

        let zones = features
            .iter()
            .enumerate()
            .map(|(i, feature)| parse_feature(i, feature))
            .collect::<GeoResult<Vec<_>>>()?;

        log::info!("Loaded {} zones", zones.len());
        Ok(Self { zones })
    }

    /// Parse a catalog from GeoJSON text
    pub fn from_json(content: &str) -> GeoResult<Self> {
        let document: Value = serde_json::from_str(content)?;
        Self::load(&document)
    }

    /// Read and parse a GeoJSON zone file
    pub fn from_path<P: AsRef<Path>>(path: P) -> GeoResult<Self> {
        let path = path.as_ref();
        log::debug!("Reading zone file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn get(&self, index: usize) -> GeoResult<&Zone> {
        self.zones.get(index).ok_or(GeoError::IndexOutOfRange {
            index,
            count: self.zones.len(),
        })
    }

    /// First zone whose name matches exactly
    pub fn by_name(&self, name: &str) -> GeoResult<&Zone> {
        self.zones
            .iter()
            .find(|z| z.name == name)
            .ok_or_else(|| GeoError::ZoneNotFound(name.to_string()))
    }

    pub fn count(&self) -> usize {
        self.zones.len()
    }

    /// Fresh iteration from the first zone on every call
    pub fn iter(&self) -> std::slice::Iter<'_, Zone> {
        self.zones.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.zones.iter().map(|z| z.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ZoneCatalog {
    type Item = &'a Zone;
    type IntoIter = std::slice::Iter<'a, Zone>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for ZoneCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} zones: [{}]", self.zones.len(), self.names().join(", "))
    }
}

fn parse_feature(index: usize, feature: &Value) -> GeoResult<Zone> {
    let malformed = |what: &str| GeoError::MalformedZoneFile(format!("Feature {}: {}", index, what));

    let properties = feature
        .get("properties")
        .ok_or_else(|| malformed("missing 'properties'"))?;
    let geometry = feature
        .get("geometry")
        .ok_or_else(|| malformed("missing 'geometry'"))?;
    let coordinates = geometry
        .get("coordinates")
        .ok_or_else(|| malformed("missing 'coordinates'"))?;

    let ring = coordinates
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("'coordinates' has no first ring"))?;

    let positions = ring
        .iter()
        .map(|position| {
            let lon = position.get(0).and_then(Value::as_f64);
            let lat = position.get(1).and_then(Value::as_f64);
            match (lon, lat) {
                (Some(lon), Some(lat)) => Ok([lon, lat]),
                _ => Err(malformed("ring position is not a [lon, lat] pair")),
            }
        })
        .collect::<GeoResult<Vec<_>>>()?;

    let bbox = BoundingBox::from_ring(&positions).ok_or_else(|| malformed("empty ring"))?;

    let name = match properties.get("name") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => Zone::default_name(&bbox),
        Some(other) => other.to_string(),
    };

    Ok(Zone { name, bbox })
}
