use crate::types::{DnBand, GeoTransform, Scene, ZonalError, ZonalResult, QA_BAND};
use chrono::NaiveDate;
use gdal::Dataset;
use ndarray::Array2;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Subset of the Collection 2 MTL metadata file we care about
#[derive(Debug, Deserialize)]
pub struct MtlMetadata {
    #[serde(rename = "PRODUCT_CONTENTS")]
    pub product_contents: ProductContents,
    #[serde(rename = "IMAGE_ATTRIBUTES")]
    pub image_attributes: ImageAttributes,
}

#[derive(Debug, Deserialize)]
pub struct ProductContents {
    #[serde(rename = "LANDSAT_PRODUCT_ID")]
    pub landsat_product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageAttributes {
    #[serde(rename = "DATE_ACQUIRED")]
    pub date_acquired: String,
    #[serde(rename = "CLOUD_COVER")]
    pub cloud_cover: f64,
}

/// Landsat Collection 2 scene directory reader
pub struct SceneReader;

impl SceneReader {
    /// Read one scene directory laid out the Collection 2 way: the directory
    /// is named after the product ID and bands live in
    /// `{PRODUCT_ID}_{BAND}.TIF` files next to an optional `{PRODUCT_ID}_MTL.xml`.
    ///
    /// The QA_PIXEL band is always read and defines the scene grid; requested
    /// bands that have no file are skipped with a warning, so a scene missing
    /// the thermal band still contributes to reflectance composites.
    pub fn read_scene<P: AsRef<Path>>(dir: P, band_names: &[&str]) -> ZonalResult<Scene> {
        let dir = dir.as_ref();
        let product_id = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ZonalError::Metadata(format!("Cannot derive product ID from {}", dir.display()))
            })?
            .to_string();

        log::info!("Reading scene: {}", product_id);

        let mtl = Self::read_mtl(dir, &product_id)?;
        let (acquired, cloud_cover) = match &mtl {
            Some(mtl) => {
                let date = NaiveDate::parse_from_str(&mtl.image_attributes.date_acquired, "%Y-%m-%d")
                    .map_err(|e| {
                        ZonalError::Metadata(format!("Invalid DATE_ACQUIRED in MTL: {}", e))
                    })?;
                (date, Some(mtl.image_attributes.cloud_cover))
            }
            None => (Self::parse_acquisition_date(&product_id)?, None),
        };

        let (qa, geo) = Self::read_band_file(&dir.join(format!("{}_{}.TIF", product_id, QA_BAND)))?;

        let mut bands = HashMap::new();
        for name in band_names {
            let path = dir.join(format!("{}_{}.TIF", product_id, name));
            if !path.exists() {
                log::warn!("Scene {} has no {} file, skipping band", product_id, name);
                continue;
            }
            // Bands of one scene share a grid; the QA geotransform is
            // authoritative
            let (band, _) = Self::read_band_file(&path)?;
            if band.dim() != qa.dim() {
                return Err(ZonalError::InvalidFormat(format!(
                    "Band {} of scene {} does not match the QA grid",
                    name, product_id
                )));
            }
            bands.insert(name.to_string(), band);
        }

        let (rows, cols) = qa.dim();
        let bounds = geo.extent(cols, rows);
        log::debug!(
            "Scene {} acquired {} ({} band(s), {}x{})",
            product_id,
            acquired,
            bands.len(),
            cols,
            rows
        );

        Ok(Scene {
            product_id,
            acquired,
            cloud_cover,
            geo,
            bounds,
            bands,
            qa,
        })
    }

    /// Acquisition date from a Collection 2 product identifier, e.g.
    /// `LC08_L2SP_044034_20190615_20200827_02_T1` -> 2019-06-15
    pub fn parse_acquisition_date(product_id: &str) -> ZonalResult<NaiveDate> {
        let pattern = Regex::new(r"^L[CTOEM]0[45789]_[A-Z0-9]{4}_\d{6}_(\d{8})_")
            .map_err(|e| ZonalError::Processing(format!("Regex error: {}", e)))?;
        let captures = pattern.captures(product_id).ok_or_else(|| {
            ZonalError::Metadata(format!(
                "Product ID {} does not look like a Collection 2 identifier",
                product_id
            ))
        })?;
        NaiveDate::parse_from_str(&captures[1], "%Y%m%d").map_err(|e| {
            ZonalError::Metadata(format!("Invalid date in product ID {}: {}", product_id, e))
        })
    }

    fn read_mtl(dir: &Path, product_id: &str) -> ZonalResult<Option<MtlMetadata>> {
        let path = dir.join(format!("{}_MTL.xml", product_id));
        if !path.exists() {
            log::debug!("No MTL file for {}, falling back to product ID", product_id);
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let mtl: MtlMetadata = from_str(&contents)
            .map_err(|e| ZonalError::XmlParsing(format!("{}: {}", path.display(), e)))?;
        Ok(Some(mtl))
    }

    /// Read the first band of a GeoTIFF as u16 together with its geotransform
    fn read_band_file(path: &Path) -> ZonalResult<(DnBand, GeoTransform)> {
        let dataset = Dataset::open(path)?;
        let geo = GeoTransform::from_gdal(dataset.geo_transform()?);
        let (width, height) = dataset.raster_size();

        let rasterband = dataset.rasterband(1)?;
        let buffer = rasterband.read_as::<u16>((0, 0), (width, height), (width, height), None)?;
        let band = Array2::from_shape_vec((height, width), buffer.data).map_err(|e| {
            ZonalError::Processing(format!("Failed to reshape band data: {}", e))
        })?;

        Ok((band, geo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_acquisition_date() {
        let date =
            SceneReader::parse_acquisition_date("LC08_L2SP_044034_20190615_20200827_02_T1")
                .unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 6, 15).unwrap());

        // Landsat 5 and 7 identifiers parse the same way
        let date = SceneReader::parse_acquisition_date("LT05_L2SP_044034_20110812_20200820_02_T1")
            .unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2011, 8, 12).unwrap());
    }

    #[test]
    fn test_parse_acquisition_date_rejects_garbage() {
        assert!(SceneReader::parse_acquisition_date("not_a_product_id").is_err());
        assert!(SceneReader::parse_acquisition_date("LC08_L2SP_044034_2019_x").is_err());
    }

    #[test]
    fn test_mtl_parsing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <LANDSAT_METADATA_FILE>
          <PRODUCT_CONTENTS>
            <LANDSAT_PRODUCT_ID>LC08_L2SP_044034_20190615_20200827_02_T1</LANDSAT_PRODUCT_ID>
          </PRODUCT_CONTENTS>
          <IMAGE_ATTRIBUTES>
            <DATE_ACQUIRED>2019-06-15</DATE_ACQUIRED>
            <CLOUD_COVER>12.34</CLOUD_COVER>
          </IMAGE_ATTRIBUTES>
        </LANDSAT_METADATA_FILE>"#;

        let mtl: MtlMetadata = from_str(xml).expect("MTL should parse");
        assert_eq!(
            mtl.product_contents.landsat_product_id,
            "LC08_L2SP_044034_20190615_20200827_02_T1"
        );
        assert_eq!(mtl.image_attributes.date_acquired, "2019-06-15");
        assert!((mtl.image_attributes.cloud_cover - 12.34).abs() < 1e-9);
    }
}
