use crate::types::{RegionSummary, ZonalResult, ZonalValue};
use std::path::{Path, PathBuf};

/// Output table column order, fixed by the downstream consumers
pub const COLUMNS: [&str; 6] = ["LST", "NDVI", "GEOID", "NAME", "Pop", "Income"];

/// Destination folder and file name for the exported table
#[derive(Debug, Clone)]
pub struct ExportParams {
    pub folder: PathBuf,
    pub file_name: String,
}

impl Default for ExportParams {
    fn default() -> Self {
        ExportParams {
            folder: PathBuf::from("CBG_data"),
            file_name: "Landsat_direct_Summer_2018_2022.csv".to_string(),
        }
    }
}

/// Writes region summaries as a flat delimited table, geometry dropped
pub struct TableExporter {
    params: ExportParams,
}

impl TableExporter {
    pub fn new(params: ExportParams) -> Self {
        TableExporter { params }
    }

    /// Write one CSV row per summary under the configured folder and name.
    ///
    /// Both no-data causes render as exactly `-9999`; all other numbers use
    /// the shortest round-trip decimal form, so identical inputs produce
    /// byte-identical files.
    pub fn export(&self, summaries: &[RegionSummary]) -> ZonalResult<PathBuf> {
        std::fs::create_dir_all(&self.params.folder)?;
        let path = self.params.folder.join(&self.params.file_name);
        log::info!(
            "Exporting {} rows to {}",
            summaries.len(),
            path.display()
        );

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(COLUMNS)?;
        for summary in summaries {
            writer.write_record([
                format_metric(&summary.lst),
                format_metric(&summary.ndvi),
                summary.geoid.clone(),
                summary.name.clone(),
                format_number(summary.population),
                format_number(summary.income),
            ])?;
        }
        writer.flush()?;

        Ok(path)
    }

    /// Convenience for exporting somewhere other than the configured folder
    pub fn export_to<P: AsRef<Path>>(summaries: &[RegionSummary], folder: P) -> ZonalResult<PathBuf> {
        let exporter = TableExporter::new(ExportParams {
            folder: folder.as_ref().to_path_buf(),
            ..ExportParams::default()
        });
        exporter.export(summaries)
    }
}

fn format_metric(value: &ZonalValue) -> String {
    match value {
        ZonalValue::Mean(v) => format_number(*v),
        // The integer sentinel, not -9999.0
        ZonalValue::NoValidPixels | ZonalValue::BandMissing => "-9999".to_string(),
    }
}

fn format_number(v: f64) -> String {
    format!("{}", v)
}
