//! Coarse-to-fine location of geographic zones in sensor (line, pixel) space

use crate::core::interpolate::{GridSpec, LinearInterpolator};
use crate::io::zones::{Zone, ZoneCatalog};
use crate::types::{BoundingBox, GeoError, GeoResult, GeolocationTable, SensorImage};
use ndarray::{s, Array2, Zip};
use serde::{Deserialize, Serialize};

/// Rectification parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectifyParams {
    /// Coarse sampling stride in lines and pixels. Larger values make the
    /// coarse search cheaper but widen the window refined at full resolution.
    pub step: usize,
}

impl Default for RectifyParams {
    fn default() -> Self {
        Self { step: 5 }
    }
}

/// Half-open pixel window `[x0, x1) x [y0, y1)`; x runs along pixels, y along lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelWindow {
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    /// (rows, cols) of arrays covering the window
    pub fn dim(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn contains(&self, line: usize, pixel: usize) -> bool {
        pixel >= self.x0 && pixel < self.x1 && line >= self.y0 && line < self.y1
    }
}

/// Sub-window of a sensor image covering a zone, with its membership mask
#[derive(Debug, Clone)]
pub struct SensorWindow {
    pub pixel_bbox: PixelWindow,
    /// Mean incidence angle over member pixels, `None` when no member has a value
    pub incidence: Option<f64>,
    /// Mean elevation angle over member pixels, `None` when no member has a value
    pub elevation: Option<f64>,
    /// Zone center minus swath center, in degrees
    pub lat_delta: f64,
    pub lon_delta: f64,
    /// Window center minus image center, in pixels
    pub pixel_delta_x: f64,
    pub pixel_delta_y: f64,
    /// Interpolated coordinates over the window, NaN outside the sample hull
    pub lat_grid: Array2<f64>,
    pub lon_grid: Array2<f64>,
    pub membership: Array2<bool>,
}

impl SensorWindow {
    pub fn member_count(&self) -> usize {
        self.membership.iter().filter(|&&m| m).count()
    }

    /// Cut the window out of a full sensor raster, setting non-member pixels to NaN
    pub fn extract(&self, image: &SensorImage) -> GeoResult<SensorImage> {
        let (lines, pixels) = image.dim();
        let w = &self.pixel_bbox;
        if w.y1 > lines || w.x1 > pixels {
            return Err(GeoError::DimensionMismatch(format!(
                "Window {:?} exceeds image of {}x{}",
                w, lines, pixels
            )));
        }

        let view = image.slice(s![w.y0..w.y1, w.x0..w.x1]);
        Ok(Zip::from(&view)
            .and(&self.membership)
            .map_collect(|&v, &member| if member { v } else { f32::NAN }))
    }
}

/// Locates a geographic zone in orbital (line, pixel) coordinates
pub struct Rectifier {
    params: RectifyParams,
}

impl Rectifier {
    /// Create a rectifier with the default coarse step
    pub fn new() -> Self {
        Self {
            params: RectifyParams::default(),
        }
    }

    /// Create a rectifier with custom parameters
    pub fn with_params(params: RectifyParams) -> GeoResult<Self> {
        if params.step == 0 {
            return Err(GeoError::InvalidStep(params.step));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &RectifyParams {
        &self.params
    }

    /// Rectify a catalog zone against a geolocation table
    pub fn rectify_zone(&self, zone: &Zone, table: &GeolocationTable) -> GeoResult<SensorWindow> {
        self.rectify_bbox(&zone.name, &zone.bbox, table)
    }

    /// Rectify every zone of `catalog`, in catalog order.
    ///
    /// Per-zone failures (typically `ZoneOutsideSwath`) are returned alongside
    /// the zone name instead of aborting the batch.
    #[cfg(feature = "parallel")]
    pub fn rectify_catalog<'a>(
        &self,
        catalog: &'a ZoneCatalog,
        table: &GeolocationTable,
    ) -> Vec<(&'a str, GeoResult<SensorWindow>)> {
        use rayon::prelude::*;

        log::debug!("Rectifying {} zones in parallel", catalog.count());
        let zones: Vec<&Zone> = catalog.iter().collect();
        zones
            .into_par_iter()
            .map(|zone| (zone.name.as_str(), self.rectify_zone(zone, table)))
            .collect()
    }

    /// Rectify every zone of `catalog`, in catalog order.
    #[cfg(not(feature = "parallel"))]
    pub fn rectify_catalog<'a>(
        &self,
        catalog: &'a ZoneCatalog,
        table: &GeolocationTable,
    ) -> Vec<(&'a str, GeoResult<SensorWindow>)> {
        catalog
            .iter()
            .map(|zone| (zone.name.as_str(), self.rectify_zone(zone, table)))
            .collect()
    }

    /// Two-pass search for the pixel window and membership mask of `bbox`.
    ///
    /// A strided grid over the whole image localizes the zone cheaply; only the
    /// window around the matched coarse samples is interpolated pixel by pixel.
    pub fn rectify_bbox(
        &self,
        label: &str,
        bbox: &BoundingBox,
        table: &GeolocationTable,
    ) -> GeoResult<SensorWindow> {
        let step = self.params.step;
        if step == 0 {
            return Err(GeoError::InvalidStep(step));
        }

        let extent = table.extent;
        log::info!(
            "Rectifying zone {} {} on {}x{} image (step {})",
            label,
            bbox,
            extent.height,
            extent.width,
            step
        );

        let positions: Vec<[f64; 2]> = table
            .samples
            .iter()
            .map(|s| [s.line as f64, s.pixel as f64])
            .collect();
        let interpolator = LinearInterpolator::new(&positions)?;

        let lat_values = table.field(|s| s.lat);
        let lon_values = table.field(|s| s.lon);

        // Coarse pass over the full extent
        let coarse = GridSpec::coarse(extent.height, extent.width, step);
        let coarse_fields = interpolator.interpolate_fields(&coarse, &[&lat_values, &lon_values]);
        let coarse_mask = membership_mask(bbox, &coarse_fields[0], &coarse_fields[1]);
        log::debug!(
            "Coarse grid {:?}: {} of {} samples inside zone",
            coarse.dim(),
            coarse_mask.iter().filter(|&&m| m).count(),
            coarse_mask.len()
        );

        let window = coarse_window(&coarse_mask, step, extent.height, extent.width).ok_or_else(
            || GeoError::ZoneOutsideSwath {
                zone: label.to_string(),
            },
        )?;
        log::debug!("Pixel window {:?}", window);

        // Parallax diagnostics; the swath center uses every sample, matched or not
        let (zone_lat, zone_lon) = bbox.center();
        let (swath_lat, swath_lon) = table
            .coverage()
            .map(|c| c.center())
            .unwrap_or((f64::NAN, f64::NAN));
        let lat_delta = zone_lat - swath_lat;
        let lon_delta = zone_lon - swath_lon;
        let pixel_delta_x = (window.x0 + window.x1) as f64 / 2.0 - extent.width as f64 / 2.0;
        let pixel_delta_y = (window.y0 + window.y1) as f64 / 2.0 - extent.height as f64 / 2.0;

        // Fine pass over the window only
        let fine = GridSpec::dense(window.x0, window.y0, window.x1, window.y1);
        let located = interpolator.locate(&fine);
        let lat_grid = located.interpolate(&lat_values);
        let lon_grid = located.interpolate(&lon_values);
        let membership = membership_mask(bbox, &lat_grid, &lon_grid);

        let incidence_grid = located.interpolate(&table.field(|s| s.incidence));
        let elevation_grid = located.interpolate(&table.field(|s| s.elevation));
        let incidence = masked_mean(&incidence_grid, &membership);
        let elevation = masked_mean(&elevation_grid, &membership);

        let members = membership.iter().filter(|&&m| m).count();
        if members == 0 {
            log::warn!(
                "Zone {} matched at coarse resolution but no pixel of window {:?} is a member",
                label,
                window
            );
        }

        log::info!(
            "Zone {} -> window {:?}, {} member pixels, incidence {:?}, elevation {:?}",
            label,
            window,
            members,
            incidence,
            elevation
        );

        Ok(SensorWindow {
            pixel_bbox: window,
            incidence,
            elevation,
            lat_delta,
            lon_delta,
            pixel_delta_x,
            pixel_delta_y,
            lat_grid,
            lon_grid,
            membership,
        })
    }
}

impl Default for Rectifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Inclusive bbox test per cell; NaN coordinates never match
fn membership_mask(bbox: &BoundingBox, lat: &Array2<f64>, lon: &Array2<f64>) -> Array2<bool> {
    Zip::from(lat)
        .and(lon)
        .map_collect(|&la, &lo| bbox.contains(la, lo))
}

/// Pixel window around the matched coarse samples, widened by one step on each side
fn coarse_window(mask: &Array2<bool>, step: usize, height: usize, width: usize) -> Option<PixelWindow> {
    let mut rows: Option<(usize, usize)> = None;
    let mut cols: Option<(usize, usize)> = None;

    for ((i, j), _) in mask.indexed_iter().filter(|(_, m)| **m) {
        rows = Some(rows.map_or((i, i), |(lo, hi)| (lo.min(i), hi.max(i))));
        cols = Some(cols.map_or((j, j), |(lo, hi)| (lo.min(j), hi.max(j))));
    }

    let ((row_lo, row_hi), (col_lo, col_hi)) = (rows?, cols?);
    Some(PixelWindow {
        x0: col_lo.saturating_mul(step).saturating_sub(step).min(width),
        y0: row_lo.saturating_mul(step).saturating_sub(step).min(height),
        x1: col_hi.saturating_add(1).saturating_mul(step).min(width),
        y1: row_hi.saturating_add(1).saturating_mul(step).min(height),
    })
}

/// Mean of the finite values under the mask
fn masked_mean(values: &Array2<f64>, mask: &Array2<bool>) -> Option<f64> {
    let (sum, count) = Zip::from(values)
        .and(mask)
        .fold((0.0_f64, 0_usize), |(sum, count), &v, &m| {
            if m && v.is_finite() {
                (sum + v, count + 1)
            } else {
                (sum, count)
            }
        });

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeolocationPoint, ImageExtent};
    use approx::assert_abs_diff_eq;

    fn corner_table() -> GeolocationTable {
        let corners = [
            (0, 0, -1.0, -1.0),
            (0, 100, -1.0, 1.0),
            (100, 0, 1.0, -1.0),
            (100, 100, 1.0, 1.0),
        ];
        let samples = corners
            .iter()
            .map(|&(line, pixel, lat, lon)| GeolocationPoint {
                line,
                pixel,
                lat,
                lon,
                incidence: 30.0,
                elevation: 400.0,
            })
            .collect();
        GeolocationTable::new(samples, ImageExtent { height: 100, width: 100 })
    }

    #[test]
    fn test_coarse_window_margin() {
        let mut mask = Array2::from_elem((20, 20), false);
        mask[[5, 6]] = true;
        mask[[15, 14]] = true;
        let w = coarse_window(&mask, 5, 100, 100).unwrap();
        assert_eq!(w, PixelWindow { x0: 25, y0: 20, x1: 75, y1: 80 });

        let mut edge = Array2::from_elem((20, 20), false);
        edge[[0, 19]] = true;
        let w = coarse_window(&edge, 5, 100, 100).unwrap();
        assert_eq!(w, PixelWindow { x0: 90, y0: 0, x1: 100, y1: 5 });

        assert!(coarse_window(&Array2::from_elem((3, 3), false), 5, 15, 15).is_none());

        let mut single = Array2::from_elem((1, 1), false);
        single[[0, 0]] = true;
        let w = coarse_window(&single, usize::MAX, 100, 100).unwrap();
        assert_eq!(w, PixelWindow { x0: 0, y0: 0, x1: 100, y1: 100 });
    }

    #[test]
    fn test_masked_mean_ignores_missing() {
        let values = Array2::from_shape_vec((1, 4), vec![1.0, f64::NAN, 3.0, 100.0]).unwrap();
        let mask = Array2::from_shape_vec((1, 4), vec![true, true, true, false]).unwrap();
        assert_eq!(masked_mean(&values, &mask), Some(2.0));
        assert_eq!(masked_mean(&values, &Array2::from_elem((1, 4), false)), None);
    }

    #[test]
    fn test_zero_step_is_rejected() {
        assert!(matches!(
            Rectifier::with_params(RectifyParams { step: 0 }),
            Err(GeoError::InvalidStep(0))
        ));
    }

    #[test]
    fn test_corner_table_window() {
        let rectifier = Rectifier::new();
        let bbox = BoundingBox::new(-0.5, -0.5, 0.5, 0.5).unwrap();
        let window = rectifier.rectify_bbox("center", &bbox, &corner_table()).unwrap();

        // Lines/pixels 25..=75 are inside; the window adds up to one step around them
        let w = window.pixel_bbox;
        for bound in [w.x0, w.y0] {
            assert!((20..=25).contains(&bound), "low bound {}", bound);
        }
        for bound in [w.x1, w.y1] {
            assert!((75..=80).contains(&bound), "high bound {}", bound);
        }
        assert_eq!(window.membership.dim(), w.dim());
        assert_eq!(window.lat_grid.dim(), w.dim());
        assert_eq!(window.lon_grid.dim(), w.dim());
        assert_eq!(window.incidence, Some(30.0));
        assert_eq!(window.elevation, Some(400.0));
        assert_abs_diff_eq!(window.lat_delta, 0.0);
        assert_abs_diff_eq!(window.lon_delta, 0.0);
        assert!(window.pixel_delta_x.abs() <= 2.5);
        assert!(window.pixel_delta_y.abs() <= 2.5);
    }

    #[test]
    fn test_extract_masks_non_members() {
        let rectifier = Rectifier::new();
        let bbox = BoundingBox::new(-0.5, -0.5, 0.5, 0.5).unwrap();
        let window = rectifier.rectify_bbox("center", &bbox, &corner_table()).unwrap();

        let image = SensorImage::from_shape_fn((100, 100), |(i, j)| (i * 100 + j) as f32);
        let cut = window.extract(&image).unwrap();
        let w = window.pixel_bbox;
        assert_eq!(cut.dim(), w.dim());

        let (ci, cj) = (50 - w.y0, 50 - w.x0);
        assert_eq!(cut[[ci, cj]], (50 * 100 + 50) as f32);
        for ((i, j), &v) in cut.indexed_iter() {
            assert_eq!(v.is_nan(), !window.membership[[i, j]]);
        }

        let small = SensorImage::zeros((50, 50));
        assert!(matches!(window.extract(&small), Err(GeoError::DimensionMismatch(_))));
    }
}
