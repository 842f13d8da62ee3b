//! Input readers and the table exporter

pub mod export;
pub mod regions;
pub mod scene;

pub use export::{ExportParams, TableExporter};
pub use regions::RegionReader;
pub use scene::SceneReader;
