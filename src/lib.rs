//! zonalsat: Zonal Land Surface Statistics from Landsat
//!
//! This library computes per-region land surface temperature (LST) and
//! vegetation index (NDVI) summaries from Landsat Collection 2 Level-2
//! imagery: it builds a cloud-masked seasonal mean composite, derives the
//! two indices, reduces them over administrative boundary polygons and
//! exports the result as a flat CSV table.

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, Composite, DnBand, GeoTransform, RasterBand, Region, RegionGeometry,
    RegionSummary, Scene, ZonalError, ZonalResult, ZonalValue, NO_DATA,
};

pub use crate::core::{CompositeBuilder, CompositeParams, Pipeline, PipelineParams, ZonalParams};
pub use io::{ExportParams, RegionReader, SceneReader, TableExporter};

#[cfg(feature = "python")]
mod python {
    use crate::core::{indices, CompositeBuilder, Pipeline, PipelineParams};
    use crate::io::{ExportParams, RegionReader, SceneReader, TableExporter};
    use crate::types::{BoundingBox, NIR_BAND, RED_BAND, THERMAL_BAND};
    use numpy::{IntoPyArray, PyArray2};
    use pyo3::prelude::*;

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyPipeline>()?;
        Ok(())
    }

    fn runtime_err(e: impl std::fmt::Display) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
    }

    /// Python wrapper for the extraction pipeline
    #[pyclass(name = "Pipeline")]
    struct PyPipeline {
        params: PipelineParams,
    }

    #[pymethods]
    impl PyPipeline {
        #[new]
        fn new() -> Self {
            PyPipeline {
                params: PipelineParams::default(),
            }
        }

        /// Run the full extraction and export; returns the output CSV path
        fn run(
            &self,
            regions_path: String,
            scene_dirs: Vec<String>,
            output_dir: Option<String>,
        ) -> PyResult<String> {
            let regions = RegionReader::read_regions(&regions_path).map_err(runtime_err)?;

            let band_names = [RED_BAND, NIR_BAND, THERMAL_BAND];
            let scenes = scene_dirs
                .iter()
                .map(|dir| SceneReader::read_scene(dir, &band_names))
                .collect::<Result<Vec<_>, _>>()
                .map_err(runtime_err)?;

            let pipeline = Pipeline::new(self.params.clone());
            let summaries = pipeline.run(&scenes, &regions).map_err(runtime_err)?;

            let mut export = ExportParams::default();
            if let Some(dir) = output_dir {
                export.folder = dir.into();
            }
            let path = TableExporter::new(export)
                .export(&summaries)
                .map_err(runtime_err)?;
            Ok(path.display().to_string())
        }

        /// Build the seasonal composite over the given bounds and return the
        /// NDVI raster as a numpy array
        fn ndvi_composite<'py>(
            &self,
            py: Python<'py>,
            scene_dirs: Vec<String>,
            bounds: (f64, f64, f64, f64),
        ) -> PyResult<&'py PyArray2<f32>> {
            let band_names = [RED_BAND, NIR_BAND];
            let scenes = scene_dirs
                .iter()
                .map(|dir| SceneReader::read_scene(dir, &band_names))
                .collect::<Result<Vec<_>, _>>()
                .map_err(runtime_err)?;

            let bounds = BoundingBox {
                min_x: bounds.0,
                min_y: bounds.1,
                max_x: bounds.2,
                max_y: bounds.3,
            };
            let builder =
                CompositeBuilder::new(self.params.composite.clone(), &[RED_BAND, NIR_BAND]);
            let composite = builder.build(&scenes, &bounds).map_err(runtime_err)?;
            let derived = indices::derive(&composite);
            let ndvi = derived.ndvi.ok_or_else(|| {
                runtime_err("NDVI source bands missing from the selected scenes")
            })?;
            Ok(ndvi.into_pyarray(py))
        }
    }
}
