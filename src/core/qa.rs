use crate::types::{DnBand, RasterBand};
use ndarray::{Array2, Zip};

/// Collection 2 QA_PIXEL bit positions for the conditions we mask on
pub const CLOUD_BIT: u8 = 3;
pub const CLOUD_SHADOW_BIT: u8 = 4;

/// Extract an inclusive bit range from a packed QA band via mask-and-shift.
/// The result holds the raw value of those bits for every pixel.
pub fn extract_qa_bits(qa: &DnBand, start: u8, end: u8) -> DnBand {
    let mut pattern: u16 = 0;
    for bit in start..=end {
        pattern |= 1 << bit;
    }
    qa.mapv(|v| (v & pattern) >> start)
}

/// Boolean raster, true where the cloud flag is clear
pub fn cloud_mask(qa: &DnBand) -> Array2<bool> {
    extract_qa_bits(qa, CLOUD_BIT, CLOUD_BIT).mapv(|v| v == 0)
}

/// Boolean raster, true where the cloud-shadow flag is clear
pub fn cloud_shadow_mask(qa: &DnBand) -> Array2<bool> {
    extract_qa_bits(qa, CLOUD_SHADOW_BIT, CLOUD_SHADOW_BIT).mapv(|v| v == 0)
}

/// Conjunction of the cloud and cloud-shadow masks
pub fn clear_sky_mask(qa: &DnBand) -> Array2<bool> {
    let cloud = cloud_mask(qa);
    let shadow = cloud_shadow_mask(qa);
    Zip::from(&cloud).and(&shadow).map_collect(|&c, &s| c && s)
}

/// Apply a boolean mask to a DN band, turning masked pixels into NaN
pub fn apply_mask(band: &DnBand, mask: &Array2<bool>) -> RasterBand {
    Zip::from(band)
        .and(mask)
        .map_collect(|&v, &keep| if keep { v as f32 } else { f32::NAN })
}
