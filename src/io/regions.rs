use crate::types::{Region, RegionGeometry, ZonalError, ZonalResult};
use gdal::vector::{Geometry, LayerAccess};
use gdal::Dataset;
use std::path::Path;

/// Attribute field names in the boundary dataset
pub const GEOID_FIELD: &str = "GEOID";
pub const NAME_FIELD: &str = "NAME";
pub const POP_FIELD: &str = "Pop";
pub const INCOME_FIELD: &str = "Income";

/// Administrative boundary polygon reader
pub struct RegionReader;

impl RegionReader {
    /// Read every polygon feature from the first layer of a vector dataset
    /// (shapefile, GeoPackage, GeoJSON - anything GDAL can open).
    ///
    /// `GEOID` is required; the other attributes default when absent so that
    /// boundary files without demographic joins still load.
    pub fn read_regions<P: AsRef<Path>>(path: P) -> ZonalResult<Vec<Region>> {
        log::info!("Reading region polygons from: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let mut layer = dataset.layer(0)?;
        let mut regions = Vec::new();

        for feature in layer.features() {
            let geoid = feature
                .field_as_string_by_name(GEOID_FIELD)?
                .ok_or_else(|| {
                    ZonalError::Metadata(format!("Feature missing required {} field", GEOID_FIELD))
                })?;
            let name = feature
                .field_as_string_by_name(NAME_FIELD)?
                .unwrap_or_default();
            let population = feature
                .field_as_double_by_name(POP_FIELD)?
                .unwrap_or(0.0);
            let income = feature
                .field_as_double_by_name(INCOME_FIELD)?
                .unwrap_or(0.0);

            let geom = feature.geometry().ok_or_else(|| {
                ZonalError::InvalidFormat(format!("Region {} has no geometry", geoid))
            })?;
            let mut rings = Vec::new();
            collect_rings(geom, &mut rings);
            if rings.is_empty() {
                return Err(ZonalError::InvalidFormat(format!(
                    "Region {} geometry contains no usable rings",
                    geoid
                )));
            }

            regions.push(Region {
                geoid,
                name,
                population,
                income,
                geometry: RegionGeometry::new(rings),
            });
        }

        log::info!("Loaded {} region polygons", regions.len());
        Ok(regions)
    }
}

/// Walk an OGR geometry tree and collect every leaf ring. Polygons nest
/// rings one level down, multipolygons two; recursing on the sub-geometry
/// count handles both without inspecting WKB type codes.
fn collect_rings(geom: &Geometry, rings: &mut Vec<Vec<(f64, f64)>>) {
    let count = geom.geometry_count();
    if count == 0 {
        let points = geom.get_point_vec();
        if points.len() >= 3 {
            rings.push(points.into_iter().map(|(x, y, _)| (x, y)).collect());
        }
        return;
    }
    for i in 0..count {
        collect_rings(&geom.get_geometry(i), rings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_rings_polygon_with_hole() {
        let wkt = "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0), (4 4, 6 4, 6 6, 4 6, 4 4))";
        let geom = Geometry::from_wkt(wkt).expect("valid WKT");
        let mut rings = Vec::new();
        collect_rings(&geom, &mut rings);

        assert_eq!(rings.len(), 2);
        let region = RegionGeometry::new(rings);
        assert!(region.contains(1.0, 1.0));
        assert!(!region.contains(5.0, 5.0));
    }

    #[test]
    fn test_collect_rings_multipolygon() {
        let wkt = "MULTIPOLYGON (((0 0, 2 0, 2 2, 0 2, 0 0)), ((5 5, 7 5, 7 7, 5 7, 5 5)))";
        let geom = Geometry::from_wkt(wkt).expect("valid WKT");
        let mut rings = Vec::new();
        collect_rings(&geom, &mut rings);

        assert_eq!(rings.len(), 2);
        let region = RegionGeometry::new(rings);
        assert!(region.contains(1.0, 1.0));
        assert!(region.contains(6.0, 6.0));
        assert!(!region.contains(3.5, 3.5));
    }
}
