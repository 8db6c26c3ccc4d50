//! Sentinel-1 annotation XML: image extent and geolocation grid

use crate::types::{
    BoundingBox, GeoError, GeoResult, GeolocationPoint, GeolocationTable, ImageExtent,
};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;

/// Subset of a Sentinel-1 annotation file needed for geolocation
/// This represents the root <product> element directly
#[derive(Debug, Deserialize)]
pub struct AnnotationRoot {
    #[serde(rename = "imageAnnotation")]
    pub image_annotation: Option<ImageAnnotation>,
    #[serde(rename = "geolocationGrid")]
    pub geolocation_grid: Option<GeolocationGrid>,
}

#[derive(Debug, Deserialize)]
pub struct ImageAnnotation {
    #[serde(rename = "imageInformation")]
    pub image_information: ImageInformation,
}

#[derive(Debug, Deserialize)]
pub struct ImageInformation {
    #[serde(rename = "numberOfSamples")]
    pub number_of_samples: usize,
    #[serde(rename = "numberOfLines")]
    pub number_of_lines: usize,
}

/// Geolocation grid for geographic coordinate extraction
#[derive(Debug, Deserialize)]
pub struct GeolocationGrid {
    #[serde(rename = "geolocationGridPointList")]
    pub geolocation_grid_point_list: GeolocationGridPointList,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGridPointList {
    #[serde(rename = "geolocationGridPoint", default)]
    pub geolocation_grid_points: Vec<GeolocationGridPoint>,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGridPoint {
    #[serde(rename = "line")]
    pub line: i64,
    #[serde(rename = "pixel")]
    pub pixel: i64,
    #[serde(rename = "latitude")]
    pub latitude: f64,
    #[serde(rename = "longitude")]
    pub longitude: f64,
    #[serde(rename = "incidenceAngle")]
    pub incidence_angle: f64,
    #[serde(rename = "elevationAngle")]
    pub elevation_angle: f64,
}

/// Parser for Sentinel-1 annotation XML files
pub struct AnnotationParser;

impl AnnotationParser {
    /// Parse annotation XML
    pub fn parse_annotation(xml_content: &str) -> GeoResult<AnnotationRoot> {
        from_str::<AnnotationRoot>(xml_content)
            .map_err(|e| GeoError::XmlParsing(format!("Failed to parse annotation XML: {}", e)))
    }

    /// Image extent declared in the annotation
    pub fn extract_extent(annotation: &AnnotationRoot) -> GeoResult<ImageExtent> {
        let info = &annotation
            .image_annotation
            .as_ref()
            .ok_or_else(|| GeoError::XmlParsing("No imageAnnotation in annotation".to_string()))?
            .image_information;

        Ok(ImageExtent {
            height: info.number_of_lines,
            width: info.number_of_samples,
        })
    }

    /// Geolocation grid points as a table over the annotated image extent
    pub fn extract_geolocation(annotation: &AnnotationRoot) -> GeoResult<GeolocationTable> {
        let extent = Self::extract_extent(annotation)?;

        let grid = annotation
            .geolocation_grid
            .as_ref()
            .ok_or_else(|| GeoError::XmlParsing("No geolocation grid found in annotation".to_string()))?;

        let samples: Vec<GeolocationPoint> = grid
            .geolocation_grid_point_list
            .geolocation_grid_points
            .iter()
            .map(|p| GeolocationPoint {
                line: p.line,
                pixel: p.pixel,
                lat: p.latitude,
                lon: p.longitude,
                incidence: p.incidence_angle,
                elevation: p.elevation_angle,
            })
            .collect();

        if samples.is_empty() {
            return Err(GeoError::XmlParsing(
                "No geolocation grid points found".to_string(),
            ));
        }

        log::debug!(
            "Read {} geolocation points for {}x{} image",
            samples.len(),
            extent.height,
            extent.width
        );
        Ok(GeolocationTable::new(samples, extent))
    }

    /// Extract bounding box from geolocation grid
    pub fn extract_bounding_box(annotation: &AnnotationRoot) -> GeoResult<BoundingBox> {
        Self::extract_geolocation(annotation)?
            .coverage()
            .ok_or_else(|| GeoError::XmlParsing("No geolocation grid points found".to_string()))
    }
}

impl GeolocationTable {
    /// Parse the geolocation grid of an annotation document
    pub fn from_annotation(xml_content: &str) -> GeoResult<Self> {
        let annotation = AnnotationParser::parse_annotation(xml_content)?;
        AnnotationParser::extract_geolocation(&annotation)
    }

    /// Read the geolocation grid of an annotation file
    pub fn from_annotation_file<P: AsRef<Path>>(path: P) -> GeoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_annotation(&content)
    }
}
