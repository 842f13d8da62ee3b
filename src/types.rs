use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored digital numbers as delivered in Landsat Collection 2 GeoTIFFs
/// (surface reflectance, surface temperature and QA bands are all u16)
pub type DnBand = Array2<u16>;

/// Derived or composited raster values
pub type RasterBand = Array2<f32>;

/// Sentinel written to the output table when a region has no value
pub const NO_DATA: f64 = -9999.0;

/// Band keys for Landsat 8/9 Collection 2 Level-2 products
pub const RED_BAND: &str = "SR_B4";
pub const NIR_BAND: &str = "SR_B5";
pub const THERMAL_BAND: &str = "ST_B10";
pub const QA_BAND: &str = "QA_PIXEL";

/// Geospatial bounding box in map coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Smallest box covering both inputs
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Geospatial transformation parameters (GDAL six-parameter affine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        GeoTransform {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    /// Map coordinates to fractional (column, row). North-up rasters only;
    /// the rotation terms are carried for completeness but assumed zero.
    pub fn col_row(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.top_left_x) / self.pixel_width,
            (y - self.top_left_y) / self.pixel_height,
        )
    }

    /// Map extent of a raster with the given pixel dimensions
    pub fn extent(&self, width: usize, height: usize) -> BoundingBox {
        let x1 = self.top_left_x + width as f64 * self.pixel_width;
        let y1 = self.top_left_y + height as f64 * self.pixel_height;
        BoundingBox {
            min_x: self.top_left_x.min(x1),
            max_x: self.top_left_x.max(x1),
            min_y: self.top_left_y.min(y1),
            max_y: self.top_left_y.max(y1),
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        GeoTransform::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, -1.0])
    }
}

/// Polygon or multipolygon geometry flattened to a list of rings.
/// Containment uses the even-odd rule, so interior rings act as holes and
/// disjoint parts of a multipolygon are handled uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionGeometry {
    pub rings: Vec<Vec<(f64, f64)>>,
}

impl RegionGeometry {
    pub fn new(rings: Vec<Vec<(f64, f64)>>) -> Self {
        RegionGeometry { rings }
    }

    /// Even-odd point-in-polygon test over all rings
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for ring in &self.rings {
            let n = ring.len();
            if n < 3 {
                continue;
            }
            let mut j = n - 1;
            for i in 0..n {
                let (xi, yi) = ring[i];
                let (xj, yj) = ring[j];
                if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for ring in &self.rings {
            for &(x, y) in ring {
                bbox.min_x = bbox.min_x.min(x);
                bbox.max_x = bbox.max_x.max(x);
                bbox.min_y = bbox.min_y.min(y);
                bbox.max_y = bbox.max_y.max(y);
            }
        }
        bbox
    }
}

/// One administrative boundary polygon with its input attributes.
/// Loaded once and never mutated; derived metrics live in [`RegionSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub geoid: String,
    pub name: String,
    pub population: f64,
    pub income: f64,
    pub geometry: RegionGeometry,
}

/// One Landsat acquisition: per-band DN rasters plus the packed QA bitmask.
/// All rasters share the same grid and geotransform.
#[derive(Debug, Clone)]
pub struct Scene {
    pub product_id: String,
    pub acquired: NaiveDate,
    /// Scene-level cloud cover percentage from the MTL file, when known
    pub cloud_cover: Option<f64>,
    pub geo: GeoTransform,
    pub bounds: BoundingBox,
    pub bands: HashMap<String, DnBand>,
    pub qa: DnBand,
}

/// Per-pixel temporal mean across the filtered, cloud-masked scene set.
/// Pixels with no clear observation are NaN; a band observed in no surviving
/// scene is absent from the map entirely.
#[derive(Debug, Clone)]
pub struct Composite {
    pub bands: HashMap<String, RasterBand>,
    pub geo: GeoTransform,
    pub scenes_used: usize,
}

impl Composite {
    /// Composite of an empty scene selection: no bands at all, matching the
    /// behaviour of a mean over an empty image collection.
    pub fn empty() -> Self {
        Composite {
            bands: HashMap::new(),
            geo: GeoTransform::default(),
            scenes_used: 0,
        }
    }

    pub fn band(&self, name: &str) -> Option<&RasterBand> {
        self.bands.get(name)
    }
}

/// Result of reducing one band over one region. The two no-data causes are
/// kept distinct here and only collapse to the common sentinel at export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ZonalValue {
    /// Spatial mean over the region footprint
    Mean(f64),
    /// Band present but every sample inside the region was masked
    NoValidPixels,
    /// Band absent from the composite for this run
    BandMissing,
}

impl ZonalValue {
    /// Value written to the output table
    pub fn export_value(&self) -> f64 {
        match self {
            ZonalValue::Mean(v) => *v,
            ZonalValue::NoValidPixels | ZonalValue::BandMissing => NO_DATA,
        }
    }

    pub fn is_no_data(&self) -> bool {
        !matches!(self, ZonalValue::Mean(_))
    }
}

/// One output table row: the region's retained attributes plus the two
/// derived metrics, geometry dropped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSummary {
    pub geoid: String,
    pub name: String,
    pub population: f64,
    pub income: f64,
    pub lst: ZonalValue,
    pub ndvi: ZonalValue,
}

/// Error types for the extraction pipeline
#[derive(Debug, thiserror::Error)]
pub enum ZonalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),
}

/// Result type for pipeline operations
pub type ZonalResult<T> = Result<T, ZonalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox { min_x: 0.0, max_x: 10.0, min_y: 0.0, max_y: 10.0 };
        let b = BoundingBox { min_x: 5.0, max_x: 15.0, min_y: 5.0, max_y: 15.0 };
        let c = BoundingBox { min_x: 11.0, max_x: 12.0, min_y: 0.0, max_y: 10.0 };
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_geo_transform_roundtrip() {
        let geo = GeoTransform::from_gdal([500_000.0, 30.0, 0.0, 4_100_000.0, 0.0, -30.0]);
        let (col, row) = geo.col_row(500_045.0, 4_099_945.0);
        assert_eq!(col as usize, 1);
        assert_eq!(row as usize, 1);

        let extent = geo.extent(100, 200);
        assert_eq!(extent.min_x, 500_000.0);
        assert_eq!(extent.max_x, 503_000.0);
        assert_eq!(extent.max_y, 4_100_000.0);
        assert_eq!(extent.min_y, 4_094_000.0);
    }

    #[test]
    fn test_polygon_contains_with_hole() {
        let outer = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let hole = vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0)];
        let geom = RegionGeometry::new(vec![outer, hole]);

        assert!(geom.contains(2.0, 2.0));
        assert!(!geom.contains(5.0, 5.0)); // inside the hole
        assert!(!geom.contains(11.0, 5.0));
    }

    #[test]
    fn test_multipolygon_contains() {
        let part_a = vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];
        let part_b = vec![(5.0, 5.0), (7.0, 5.0), (7.0, 7.0), (5.0, 7.0)];
        let geom = RegionGeometry::new(vec![part_a, part_b]);

        assert!(geom.contains(1.0, 1.0));
        assert!(geom.contains(6.0, 6.0));
        assert!(!geom.contains(3.5, 3.5)); // between the parts
    }

    #[test]
    fn test_zonal_value_export() {
        assert_eq!(ZonalValue::Mean(1.5).export_value(), 1.5);
        assert_eq!(ZonalValue::NoValidPixels.export_value(), NO_DATA);
        assert_eq!(ZonalValue::BandMissing.export_value(), NO_DATA);
        assert!(ZonalValue::BandMissing.is_no_data());
        assert!(!ZonalValue::Mean(0.0).is_no_data());
    }
}
