use crate::types::{Composite, GeoTransform, RasterBand, NIR_BAND, RED_BAND, THERMAL_BAND};
use ndarray::Zip;

/// Collection 2 Level-2 surface reflectance rescaling: DN * scale + offset
pub const SR_SCALE: f64 = 0.0000275;
pub const SR_OFFSET: f64 = -0.2;

/// Collection 2 Level-2 surface temperature rescaling, output in Kelvin
pub const ST_SCALE: f64 = 0.00341802;
pub const ST_OFFSET: f64 = 149.0;

/// The two index rasters derived from one composite. An index is None when
/// its source bands were absent from the composite.
#[derive(Debug, Clone)]
pub struct DerivedIndices {
    pub ndvi: Option<RasterBand>,
    pub lst: Option<RasterBand>,
    pub geo: GeoTransform,
}

/// Convert stored surface reflectance DNs to physical reflectance
pub fn scale_reflectance(band: &RasterBand) -> RasterBand {
    band.mapv(|v| (v as f64 * SR_SCALE + SR_OFFSET) as f32)
}

/// Convert stored surface temperature DNs to Kelvin
pub fn scale_temperature(band: &RasterBand) -> RasterBand {
    band.mapv(|v| (v as f64 * ST_SCALE + ST_OFFSET) as f32)
}

/// Normalized difference (a - b) / (a + b), NaN where undefined
pub fn normalized_difference(a: &RasterBand, b: &RasterBand) -> RasterBand {
    Zip::from(a).and(b).map_collect(|&a, &b| {
        let denom = a + b;
        if a.is_finite() && b.is_finite() && denom != 0.0 {
            (a - b) / denom
        } else {
            f32::NAN
        }
    })
}

/// Compute NDVI and LST from a mean composite.
///
/// NDVI = ND(NIR, red) over rescaled reflectance; LST is the rescaled
/// thermal band. Masked composite pixels stay NaN throughout.
pub fn derive(composite: &Composite) -> DerivedIndices {
    let ndvi = match (composite.band(NIR_BAND), composite.band(RED_BAND)) {
        (Some(nir), Some(red)) => {
            log::debug!("Computing NDVI from {} and {}", NIR_BAND, RED_BAND);
            Some(normalized_difference(
                &scale_reflectance(nir),
                &scale_reflectance(red),
            ))
        }
        _ => {
            log::warn!("NDVI source bands missing from composite");
            None
        }
    };

    let lst = match composite.band(THERMAL_BAND) {
        Some(thermal) => {
            log::debug!("Computing LST from {}", THERMAL_BAND);
            Some(scale_temperature(thermal))
        }
        None => {
            log::warn!("LST source band {} missing from composite", THERMAL_BAND);
            None
        }
    };

    DerivedIndices {
        ndvi,
        lst,
        geo: composite.geo.clone(),
    }
}
