//! Core extraction stages: QA masking, compositing, index math, zonal
//! reduction and pipeline orchestration

pub mod composite;
pub mod indices;
pub mod pipeline;
pub mod qa;
pub mod zonal;

// Re-export main types
pub use composite::{day_of_year_in_window, CompositeBuilder, CompositeParams};
pub use indices::{derive, DerivedIndices};
pub use pipeline::{Pipeline, PipelineParams};
pub use qa::{clear_sky_mask, cloud_mask, cloud_shadow_mask, extract_qa_bits};
pub use zonal::{RegionalReducer, ZonalParams};
