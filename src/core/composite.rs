use crate::core::qa::clear_sky_mask;
use crate::types::{BoundingBox, Composite, Scene, ZonalError, ZonalResult};
use chrono::{Datelike, NaiveDate};
use ndarray::{Array2, Zip};
use std::collections::HashMap;

/// Scene selection parameters for the composite.
///
/// The date range is half-open (`end_date` exclusive) while the day-of-year
/// window is inclusive on both ends, matching the source archive's filter
/// semantics. The window restricts the composite to one season across all
/// years of the range.
#[derive(Debug, Clone)]
pub struct CompositeParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub doy_window: (u32, u32),
    /// Skip scenes whose MTL cloud cover exceeds this percentage
    pub max_cloud_cover: Option<f64>,
}

impl Default for CompositeParams {
    /// Summers 2018-2022: June 1st through August 31st of each year
    fn default() -> Self {
        CompositeParams {
            start_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            doy_window: (152, 243),
            max_cloud_cover: None,
        }
    }
}

/// True when the date's ordinal day falls inside the inclusive window,
/// independent of year
pub fn day_of_year_in_window(date: NaiveDate, window: (u32, u32)) -> bool {
    let doy = date.ordinal();
    window.0 <= doy && doy <= window.1
}

/// Builds a cloud-masked per-pixel temporal mean over a filtered scene set
pub struct CompositeBuilder {
    params: CompositeParams,
    band_names: Vec<String>,
}

impl CompositeBuilder {
    pub fn new(params: CompositeParams, band_names: &[&str]) -> Self {
        CompositeBuilder {
            params,
            band_names: band_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Spatial, date-range, seasonal and cloud-cover filters for one scene
    pub fn scene_passes_filters(&self, scene: &Scene, bounds: &BoundingBox) -> bool {
        if !scene.bounds.intersects(bounds) {
            return false;
        }
        if scene.acquired < self.params.start_date || scene.acquired >= self.params.end_date {
            return false;
        }
        if !day_of_year_in_window(scene.acquired, self.params.doy_window) {
            return false;
        }
        if let (Some(cap), Some(cover)) = (self.params.max_cloud_cover, scene.cloud_cover) {
            if cover > cap {
                return false;
            }
        }
        true
    }

    /// Filter the scene set, mask out cloud and cloud-shadow pixels, and
    /// average each requested band across the surviving scenes.
    ///
    /// An empty selection yields a band-less composite; a band present in no
    /// surviving scene is simply absent from the result. Pixels with zero
    /// clear observations come out as NaN.
    pub fn build(&self, scenes: &[Scene], bounds: &BoundingBox) -> ZonalResult<Composite> {
        let selected: Vec<&Scene> = scenes
            .iter()
            .filter(|s| self.scene_passes_filters(s, bounds))
            .collect();

        log::info!(
            "Selected {} of {} scenes for compositing",
            selected.len(),
            scenes.len()
        );

        if selected.is_empty() {
            log::warn!("No scenes survived filtering; composite has no bands");
            return Ok(Composite::empty());
        }

        let dims = selected[0].qa.dim();
        let geo = selected[0].geo.clone();
        for scene in &selected {
            if scene.qa.dim() != dims {
                return Err(ZonalError::InvalidFormat(format!(
                    "Scene {} grid {:?} does not match composite grid {:?}",
                    scene.product_id,
                    scene.qa.dim(),
                    dims
                )));
            }
            // Equal pixel counts are not enough: averaging only makes sense
            // for co-registered scenes, so the geotransform must match too
            if scene.geo != geo {
                return Err(ZonalError::InvalidFormat(format!(
                    "Scene {} geotransform {:?} does not match composite geotransform {:?}",
                    scene.product_id, scene.geo, geo
                )));
            }
        }

        // One clear-sky mask per scene, shared across bands
        let clear_masks: Vec<Array2<bool>> =
            selected.iter().map(|s| clear_sky_mask(&s.qa)).collect();

        let mut bands = HashMap::new();
        for name in &self.band_names {
            let mut sum = Array2::<f64>::zeros(dims);
            let mut count = Array2::<u32>::zeros(dims);
            let mut observed = false;

            for (scene, clear) in selected.iter().zip(&clear_masks) {
                let Some(band) = scene.bands.get(name) else {
                    log::debug!("Scene {} has no {} band", scene.product_id, name);
                    continue;
                };
                if band.dim() != dims {
                    return Err(ZonalError::InvalidFormat(format!(
                        "Band {} of scene {} has mismatched dimensions",
                        name, scene.product_id
                    )));
                }
                observed = true;
                Zip::from(&mut sum)
                    .and(&mut count)
                    .and(band)
                    .and(clear)
                    .for_each(|s, c, &v, &keep| {
                        if keep {
                            *s += v as f64;
                            *c += 1;
                        }
                    });
            }

            if !observed {
                log::warn!("Band {} missing from every selected scene", name);
                continue;
            }

            let mean = Zip::from(&sum).and(&count).map_collect(|&s, &c| {
                if c > 0 {
                    (s / c as f64) as f32
                } else {
                    f32::NAN
                }
            });
            bands.insert(name.clone(), mean);
        }

        log::debug!("Composite built with {} band(s)", bands.len());
        Ok(Composite {
            bands,
            geo,
            scenes_used: selected.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;
    use ndarray::arr2;

    fn scene(product_id: &str, acquired: NaiveDate, red: u16, qa: u16) -> Scene {
        let geo = GeoTransform::default();
        let bounds = geo.extent(2, 2);
        let mut bands = HashMap::new();
        bands.insert("SR_B4".to_string(), Array2::from_elem((2, 2), red));
        Scene {
            product_id: product_id.to_string(),
            acquired,
            cloud_cover: None,
            geo,
            bounds,
            bands,
            qa: Array2::from_elem((2, 2), qa),
        }
    }

    fn full_bounds() -> BoundingBox {
        GeoTransform::default().extent(2, 2)
    }

    #[test]
    fn test_doy_window_boundaries() {
        let window = (152, 243);
        // Ordinal days directly, so the check holds in leap years too
        for year in [2019, 2020] {
            assert!(day_of_year_in_window(
                NaiveDate::from_yo_opt(year, 152).unwrap(),
                window
            ));
            assert!(day_of_year_in_window(
                NaiveDate::from_yo_opt(year, 243).unwrap(),
                window
            ));
            assert!(!day_of_year_in_window(
                NaiveDate::from_yo_opt(year, 151).unwrap(),
                window
            ));
            assert!(!day_of_year_in_window(
                NaiveDate::from_yo_opt(year, 244).unwrap(),
                window
            ));
        }
    }

    #[test]
    fn test_date_range_end_exclusive() {
        let builder = CompositeBuilder::new(CompositeParams::default(), &["SR_B4"]);
        let in_range = scene("a", NaiveDate::from_ymd_opt(2022, 7, 1).unwrap(), 10, 0);
        // Ordinal 182 would pass the seasonal window, but 2023 is out of range
        let past_end = scene("b", NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(), 10, 0);
        assert!(builder.scene_passes_filters(&in_range, &full_bounds()));
        assert!(!builder.scene_passes_filters(&past_end, &full_bounds()));
    }

    #[test]
    fn test_mean_excludes_masked_pixels() {
        let june = NaiveDate::from_ymd_opt(2019, 6, 15).unwrap();
        let july = NaiveDate::from_ymd_opt(2019, 7, 15).unwrap();
        let clear = scene("a", june, 100, 0);
        let cloudy = scene("b", july, 300, 0b01000); // cloud bit set everywhere

        let builder = CompositeBuilder::new(CompositeParams::default(), &["SR_B4"]);
        let composite = builder.build(&[clear, cloudy], &full_bounds()).unwrap();

        assert_eq!(composite.scenes_used, 2);
        let band = composite.band("SR_B4").unwrap();
        // Only the clear scene contributes
        assert_eq!(band[[0, 0]], 100.0);
    }

    #[test]
    fn test_mean_across_scenes() {
        let june = NaiveDate::from_ymd_opt(2019, 6, 15).unwrap();
        let july = NaiveDate::from_ymd_opt(2019, 7, 15).unwrap();
        let builder = CompositeBuilder::new(CompositeParams::default(), &["SR_B4"]);
        let composite = builder
            .build(&[scene("a", june, 100, 0), scene("b", july, 300, 0)], &full_bounds())
            .unwrap();
        assert_eq!(composite.band("SR_B4").unwrap()[[1, 1]], 200.0);
    }

    #[test]
    fn test_out_of_window_scene_excluded() {
        let winter = NaiveDate::from_ymd_opt(2019, 1, 15).unwrap();
        let june = NaiveDate::from_ymd_opt(2019, 6, 15).unwrap();
        let builder = CompositeBuilder::new(CompositeParams::default(), &["SR_B4"]);
        let composite = builder
            .build(
                &[scene("winter", winter, 9999, 0), scene("summer", june, 100, 0)],
                &full_bounds(),
            )
            .unwrap();
        assert_eq!(composite.scenes_used, 1);
        assert_eq!(composite.band("SR_B4").unwrap()[[0, 0]], 100.0);
    }

    #[test]
    fn test_empty_selection_has_no_bands() {
        let winter = NaiveDate::from_ymd_opt(2019, 1, 15).unwrap();
        let builder = CompositeBuilder::new(CompositeParams::default(), &["SR_B4"]);
        let composite = builder
            .build(&[scene("winter", winter, 1, 0)], &full_bounds())
            .unwrap();
        assert_eq!(composite.scenes_used, 0);
        assert!(composite.band("SR_B4").is_none());
    }

    #[test]
    fn test_fully_masked_pixel_is_nan() {
        let june = NaiveDate::from_ymd_opt(2019, 6, 15).unwrap();
        let geo = GeoTransform::default();
        let mut bands = HashMap::new();
        bands.insert("SR_B4".to_string(), arr2(&[[100u16, 100], [100, 100]]));
        let s = Scene {
            product_id: "a".to_string(),
            acquired: june,
            cloud_cover: None,
            bounds: geo.extent(2, 2),
            geo,
            bands,
            // one cloudy pixel, rest clear
            qa: arr2(&[[0b01000u16, 0], [0, 0]]),
        };

        let builder = CompositeBuilder::new(CompositeParams::default(), &["SR_B4"]);
        let composite = builder.build(&[s], &full_bounds()).unwrap();
        let band = composite.band("SR_B4").unwrap();
        assert!(band[[0, 0]].is_nan());
        assert_eq!(band[[0, 1]], 100.0);
    }

    #[test]
    fn test_shifted_scene_rejected() {
        let june = NaiveDate::from_ymd_opt(2019, 6, 15).unwrap();
        let july = NaiveDate::from_ymd_opt(2019, 7, 15).unwrap();
        let aligned = scene("a", june, 100, 0);
        // Same pixel count as scene a, but an adjacent footprint
        let mut shifted = scene("b", july, 200, 0);
        shifted.geo = GeoTransform::from_gdal([100.0, 1.0, 0.0, 104.0, 0.0, -1.0]);
        shifted.bounds = shifted.geo.extent(2, 2);

        // Bounds wide enough that the spatial filter selects both scenes
        let bounds = aligned.bounds.union(&shifted.bounds);
        let builder = CompositeBuilder::new(CompositeParams::default(), &["SR_B4"]);
        assert!(builder.scene_passes_filters(&aligned, &bounds));
        assert!(builder.scene_passes_filters(&shifted, &bounds));

        let err = builder.build(&[aligned, shifted], &bounds).unwrap_err();
        assert!(matches!(err, crate::types::ZonalError::InvalidFormat(_)));
    }

    #[test]
    fn test_cloud_cover_cap() {
        let june = NaiveDate::from_ymd_opt(2019, 6, 15).unwrap();
        let mut hazy = scene("hazy", june, 100, 0);
        hazy.cloud_cover = Some(80.0);
        let params = CompositeParams {
            max_cloud_cover: Some(50.0),
            ..CompositeParams::default()
        };
        let builder = CompositeBuilder::new(params, &["SR_B4"]);
        assert!(!builder.scene_passes_filters(&hazy, &full_bounds()));

        // Unknown cover is never filtered on
        let unknown = scene("unknown", june, 100, 0);
        assert!(builder.scene_passes_filters(&unknown, &full_bounds()));
    }
}
