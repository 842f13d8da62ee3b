use crate::core::indices::DerivedIndices;
use crate::types::{
    GeoTransform, RasterBand, Region, RegionGeometry, RegionSummary, ZonalError, ZonalResult,
    ZonalValue,
};

/// Sampling parameters for the per-region reduction.
///
/// `scale` is the sampling resolution in map units; 60 sits between the 30 m
/// reflectance grid and the ~100 m native thermal grid.
#[derive(Debug, Clone)]
pub struct ZonalParams {
    pub scale: f64,
    /// Upper bound on grid samples per region, mirroring the source
    /// platform's maxPixels guard
    pub max_samples: u64,
}

impl Default for ZonalParams {
    fn default() -> Self {
        ZonalParams {
            scale: 60.0,
            max_samples: 9_999_999_999_999_999,
        }
    }
}

/// Reduces index rasters to one statistic per region polygon
pub struct RegionalReducer {
    params: ZonalParams,
}

impl RegionalReducer {
    pub fn new(params: ZonalParams) -> Self {
        RegionalReducer { params }
    }

    /// Spatial mean of one band over one polygon footprint.
    ///
    /// The polygon's bounding box is sampled on a regular grid at `scale`;
    /// cell centers inside the polygon are resolved to their nearest pixel
    /// and finite values averaged. Accumulation order is deterministic, so
    /// identical inputs always give identical means.
    pub fn reduce_region(
        &self,
        band: Option<&RasterBand>,
        geo: &GeoTransform,
        geometry: &RegionGeometry,
    ) -> ZonalResult<ZonalValue> {
        let Some(band) = band else {
            return Ok(ZonalValue::BandMissing);
        };

        let (rows, cols) = band.dim();
        let bbox = geometry.bounding_box();
        let step = self.params.scale;
        if step <= 0.0 {
            return Err(ZonalError::Processing(format!(
                "Invalid sampling scale: {}",
                step
            )));
        }

        let nx = ((bbox.max_x - bbox.min_x) / step).ceil().max(0.0) as u64;
        let ny = ((bbox.max_y - bbox.min_y) / step).ceil().max(0.0) as u64;
        if nx.saturating_mul(ny) > self.params.max_samples {
            return Err(ZonalError::Processing(format!(
                "Region sample grid {}x{} exceeds max_samples {}",
                nx, ny, self.params.max_samples
            )));
        }

        let mut sum = 0.0f64;
        let mut count = 0u64;

        let mut y = bbox.max_y - step / 2.0;
        while y > bbox.min_y {
            let mut x = bbox.min_x + step / 2.0;
            while x < bbox.max_x {
                if geometry.contains(x, y) {
                    let (col_f, row_f) = geo.col_row(x, y);
                    if col_f >= 0.0 && row_f >= 0.0 {
                        let (col, row) = (col_f as usize, row_f as usize);
                        if row < rows && col < cols {
                            let v = band[[row, col]];
                            if v.is_finite() {
                                sum += v as f64;
                                count += 1;
                            }
                        }
                    }
                }
                x += step;
            }
            y -= step;
        }

        if count == 0 {
            Ok(ZonalValue::NoValidPixels)
        } else {
            Ok(ZonalValue::Mean(sum / count as f64))
        }
    }

    fn summarize_one(
        &self,
        indices: &DerivedIndices,
        region: &Region,
    ) -> ZonalResult<RegionSummary> {
        let lst = self.reduce_region(indices.lst.as_ref(), &indices.geo, &region.geometry)?;
        let ndvi = self.reduce_region(indices.ndvi.as_ref(), &indices.geo, &region.geometry)?;

        if lst.is_no_data() || ndvi.is_no_data() {
            log::debug!(
                "Region {} has no data: LST={:?}, NDVI={:?}",
                region.geoid,
                lst,
                ndvi
            );
        }

        Ok(RegionSummary {
            geoid: region.geoid.clone(),
            name: region.name.clone(),
            population: region.population,
            income: region.income,
            lst,
            ndvi,
        })
    }

    /// Reduce both indices over every region, preserving input order
    pub fn summarize_regions(
        &self,
        indices: &DerivedIndices,
        regions: &[Region],
    ) -> ZonalResult<Vec<RegionSummary>> {
        log::info!("Reducing indices over {} regions", regions.len());
        regions
            .iter()
            .map(|region| self.summarize_one(indices, region))
            .collect()
    }

    /// Parallel variant; regions are independent, output order is preserved
    #[cfg(feature = "parallel")]
    pub fn summarize_regions_parallel(
        &self,
        indices: &DerivedIndices,
        regions: &[Region],
    ) -> ZonalResult<Vec<RegionSummary>> {
        use rayon::prelude::*;

        log::info!("Reducing indices over {} regions (parallel)", regions.len());
        regions
            .par_iter()
            .map(|region| self.summarize_one(indices, region))
            .collect()
    }
}
