use crate::core::composite::{CompositeBuilder, CompositeParams};
use crate::core::indices;
use crate::core::zonal::{RegionalReducer, ZonalParams};
use crate::types::{
    Region, RegionSummary, Scene, ZonalError, ZonalResult, NIR_BAND, RED_BAND, THERMAL_BAND,
};

/// Parameters for a full extraction run
#[derive(Debug, Clone, Default)]
pub struct PipelineParams {
    pub composite: CompositeParams,
    pub zonal: ZonalParams,
}

/// Single-pass extraction pipeline: composite, index, reduce.
///
/// No retries and no partial results; the first error aborts the run.
pub struct Pipeline {
    params: PipelineParams,
}

impl Pipeline {
    pub fn new(params: PipelineParams) -> Self {
        Pipeline { params }
    }

    /// Run the full extraction over in-memory scenes and regions.
    /// Returns one summary per input region, in input order.
    pub fn run(&self, scenes: &[Scene], regions: &[Region]) -> ZonalResult<Vec<RegionSummary>> {
        if regions.is_empty() {
            return Err(ZonalError::Processing(
                "No region polygons to summarize".to_string(),
            ));
        }

        // regions is non-empty, checked above
        let mut bounds = regions[0].geometry.bounding_box();
        for region in &regions[1..] {
            bounds = bounds.union(&region.geometry.bounding_box());
        }
        log::info!(
            "Processing {} scenes over {} regions, bounds ({:.2}, {:.2})..({:.2}, {:.2})",
            scenes.len(),
            regions.len(),
            bounds.min_x,
            bounds.min_y,
            bounds.max_x,
            bounds.max_y
        );

        let builder = CompositeBuilder::new(
            self.params.composite.clone(),
            &[RED_BAND, NIR_BAND, THERMAL_BAND],
        );
        let composite = builder.build(scenes, &bounds)?;

        let derived = indices::derive(&composite);

        let reducer = RegionalReducer::new(self.params.zonal.clone());
        #[cfg(feature = "parallel")]
        let summaries = reducer.summarize_regions_parallel(&derived, regions)?;
        #[cfg(not(feature = "parallel"))]
        let summaries = reducer.summarize_regions(&derived, regions)?;

        let no_data = summaries
            .iter()
            .filter(|s| s.lst.is_no_data() || s.ndvi.is_no_data())
            .count();
        log::info!(
            "Summarized {} regions ({} with at least one no-data metric)",
            summaries.len(),
            no_data
        );

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoTransform, RegionGeometry};
    use chrono::NaiveDate;
    use ndarray::Array2;
    use std::collections::HashMap;

    fn region(geoid: &str) -> Region {
        Region {
            geoid: geoid.to_string(),
            name: format!("Tract {}", geoid),
            population: 1000.0,
            income: 50000.0,
            geometry: RegionGeometry::new(vec![vec![
                (0.0, 0.0),
                (4.0, 0.0),
                (4.0, 4.0),
                (0.0, 4.0),
            ]]),
        }
    }

    fn scene(dn: u16) -> Scene {
        let geo = GeoTransform::from_gdal([0.0, 1.0, 0.0, 4.0, 0.0, -1.0]);
        let mut bands = HashMap::new();
        for name in [RED_BAND, NIR_BAND, THERMAL_BAND] {
            bands.insert(name.to_string(), Array2::from_elem((4, 4), dn));
        }
        Scene {
            product_id: "LC08_L2SP_044034_20190615_20200827_02_T1".to_string(),
            acquired: NaiveDate::from_ymd_opt(2019, 6, 15).unwrap(),
            cloud_cover: None,
            bounds: geo.extent(4, 4),
            geo,
            bands,
            qa: Array2::zeros((4, 4)),
        }
    }

    fn unit_params() -> PipelineParams {
        PipelineParams {
            zonal: ZonalParams {
                scale: 1.0,
                ..ZonalParams::default()
            },
            ..PipelineParams::default()
        }
    }

    #[test]
    fn test_row_count_matches_region_count() {
        let pipeline = Pipeline::new(unit_params());
        let regions = vec![region("a"), region("b"), region("c")];
        let summaries = pipeline.run(&[scene(20000)], &regions).unwrap();
        assert_eq!(summaries.len(), 3);
        let geoids: Vec<&str> = summaries.iter().map(|s| s.geoid.as_str()).collect();
        assert_eq!(geoids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_scenes_yields_sentinels() {
        let pipeline = Pipeline::new(unit_params());
        let summaries = pipeline.run(&[], &[region("a")]).unwrap();
        assert!(summaries[0].lst.is_no_data());
        assert!(summaries[0].ndvi.is_no_data());
    }

    #[test]
    fn test_no_regions_is_an_error() {
        let pipeline = Pipeline::new(unit_params());
        assert!(pipeline.run(&[scene(20000)], &[]).is_err());
    }
}
