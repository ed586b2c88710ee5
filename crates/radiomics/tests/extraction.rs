use approx::assert_relative_eq;
use radiomics::{
    ExtractionContext, Extractor, ExtractorBuilder, FeatureValue, Geometry, LabelMap, RadiomicsError, Settings,
    ValidationError, VolumetricImage, io, settings::FilterParams,
};
use serde_json::json;
use std::{
    io::Write,
    sync::{Arc, Mutex},
};

fn extractor(builder: ExtractorBuilder, workers: usize) -> Extractor {
    let context = ExtractionContext::with_workers(workers).unwrap();
    let config = builder.build(&context).unwrap();
    Extractor::new(context, config)
}

fn params(value: serde_json::Value) -> FilterParams {
    value.as_object().cloned().unwrap()
}

fn float(value: Option<&FeatureValue>) -> f64 {
    value.and_then(FeatureValue::as_f64).expect("numeric value")
}

/// 4x4x1 image whose centre 2x2 block holds 1 2 / 3 4, surrounded by 100s.
fn centre_square() -> (VolumetricImage, LabelMap) {
    let image = VolumetricImage::from_fn([4, 4, 1], Geometry::default(), |[x, y, _]| match (x, y) {
        (1, 1) => 1.0,
        (2, 1) => 2.0,
        (1, 2) => 3.0,
        (2, 2) => 4.0,
        _ => 100.0,
    });
    let mask = LabelMap::from_fn([4, 4, 1], Geometry::default(), |[x, y, _]| {
        ((1..=2).contains(&x) && (1..=2).contains(&y)) as i64
    });
    (image, mask)
}

/// 8x8x6 textured volume with a 4x4x3 cube labelled 1.
fn textured_volume() -> (VolumetricImage, LabelMap) {
    let geometry = Geometry::with_spacing([1.0, 1.0, 2.0]);
    let image = VolumetricImage::from_fn([8, 8, 6], geometry.clone(), |[x, y, z]| {
        ((x * 7 + y * 13 + z * 29) % 17) as f64 * 10.0
    });
    let mask = LabelMap::from_fn([8, 8, 6], geometry, |[x, y, z]| {
        ((2..=5).contains(&x) && (2..=5).contains(&y) && (1..=3).contains(&z)) as i64
    });
    (image, mask)
}

#[test]
fn test_small_square_scenario() {
    let extractor = extractor(
        Extractor::builder()
            .with_settings(Settings {
                bin_width: 1.0,
                ..Settings::default()
            })
            .enable_filter("Original", FilterParams::new())
            .enable_features("firstorder", ["Mean"])
            .enable_features("glcm", ["Contrast", "JointAverage"]),
        2,
    );
    let (image, mask) = centre_square();
    let record = extractor.execute(&image, &mask).unwrap();

    assert_eq!(record.get("diagnostics_Mask-original_VoxelNum"), Some(&FeatureValue::Int(4)));
    assert_relative_eq!(float(record.get("original_firstorder_Mean")), 2.5);
    // horizontal 1, vertical 4, diagonals 9 and 1; outside voxels never pair
    assert_relative_eq!(float(record.get("original_glcm_Contrast")), 3.75, epsilon = 1e-12);
    assert_relative_eq!(float(record.get("original_glcm_JointAverage")), 2.5, epsilon = 1e-12);
}

#[test]
fn test_original_and_log_key_count() {
    let extractor = extractor(
        Extractor::builder()
            .enable_filter("Original", FilterParams::new())
            .enable_filter("LoG", params(json!({ "sigma": [1.0] })))
            .enable_feature_class("firstorder"),
        2,
    );
    let (image, mask) = textured_volume();
    let record = extractor.execute(&image, &mask).unwrap();

    let keys: Vec<&str> = record.features().map(|(k, _)| k).collect();
    assert_eq!(keys.len(), 2 * 18);
    assert!(keys[..18].iter().all(|k| k.starts_with("original_firstorder_")));
    assert!(keys[18..].iter().all(|k| k.starts_with("log-sigma-1-0-mm-3D_firstorder_")));
    assert!(record.features().all(|(_, v)| !v.is_error()));
}

#[test]
fn test_constant_region_marks_glcm_only() {
    let extractor = extractor(
        Extractor::builder()
            .enable_filter("Original", FilterParams::new())
            .enable_feature_class("firstorder")
            .enable_feature_class("glcm"),
        1,
    );
    let image = VolumetricImage::from_fn([5, 5, 1], Geometry::default(), |_| 42.0);
    let mask = LabelMap::from_fn([5, 5, 1], Geometry::default(), |[x, y, _]| (x > 0 && y > 0) as i64);
    let record = extractor.execute(&image, &mask).unwrap();

    let glcm: Vec<&FeatureValue> = record
        .iter()
        .filter(|(k, _)| k.starts_with("original_glcm_"))
        .map(|(_, v)| v)
        .collect();
    assert_eq!(glcm.len(), 23);
    assert!(glcm.iter().all(|v| v.is_error()));

    assert_eq!(float(record.get("original_firstorder_Mean")), 42.0);
    assert_eq!(float(record.get("original_firstorder_Entropy")), 0.0);
    assert_eq!(float(record.get("original_firstorder_Uniformity")), 1.0);
}

#[test]
fn test_small_region_returns_no_record() {
    let extractor = extractor(
        Extractor::builder()
            .with_settings(Settings {
                minimum_roi_size: Some(5),
                ..Settings::default()
            })
            .enable_filter("Original", FilterParams::new())
            .enable_feature_class("firstorder"),
        1,
    );
    let (image, mask) = centre_square();
    let err = extractor.execute(&image, &mask).unwrap_err();
    assert!(matches!(
        err,
        RadiomicsError::Validation(ValidationError::RegionTooSmall { voxels: 4, minimum: 5 })
    ));
}

#[test]
fn test_output_is_identical_across_worker_counts() {
    let builder = Extractor::builder()
        .with_settings(Settings {
            bin_width: 10.0,
            ..Settings::default()
        })
        .enable_all_filters()
        .enable_filter("LoG", params(json!({ "sigma": [1.0, 2.0] })))
        .enable_all_features();
    let (image, mask) = textured_volume();

    let serial = extractor(builder.clone(), 1).execute(&image, &mask).unwrap();
    let parallel = extractor(builder, 4).execute(&image, &mask).unwrap();
    assert_eq!(
        serde_json::to_string(&serial).unwrap(),
        serde_json::to_string(&parallel).unwrap()
    );

    // original + 2 LoG + 8 wavelet bands + 4 pointwise
    let derived = 1 + 2 + 8 + 4;
    assert_eq!(serial.features().count(), derived * (18 + 23));
}

#[test]
fn test_diagnostics_come_first_in_fixed_order() {
    let extractor = extractor(
        Extractor::builder()
            .with_settings(Settings {
                normalize: true,
                ..Settings::default()
            })
            .enable_filter("Original", FilterParams::new())
            .enable_features("firstorder", ["Mean"]),
        1,
    );
    let (image, mask) = textured_volume();
    let record = extractor.execute(&image, &mask).unwrap();
    let keys: Vec<&str> = record.keys().collect();

    let expected = [
        "diagnostics_Versions_Radiomics",
        "diagnostics_Configuration_Settings",
        "diagnostics_Configuration_EnabledImageTypes",
        "diagnostics_Image-original_Hash",
        "diagnostics_Image-original_Dimensionality",
        "diagnostics_Image-original_Spacing",
        "diagnostics_Image-original_Size",
        "diagnostics_Image-original_Mean",
        "diagnostics_Image-original_Minimum",
        "diagnostics_Image-original_Maximum",
        "diagnostics_Mask-original_Hash",
        "diagnostics_Mask-original_Spacing",
        "diagnostics_Mask-original_Size",
        "diagnostics_Mask-original_BoundingBox",
        "diagnostics_Mask-original_VoxelNum",
        "diagnostics_Mask-original_VolumeNum",
        "diagnostics_Mask-original_CenterOfMassIndex",
        "diagnostics_Mask-original_CenterOfMass",
        "diagnostics_Image-interpolated_Spacing",
        "diagnostics_Image-interpolated_Size",
        "diagnostics_Image-interpolated_Mean",
        "diagnostics_Image-interpolated_Minimum",
        "diagnostics_Image-interpolated_Maximum",
        "diagnostics_Mask-interpolated_Spacing",
        "diagnostics_Mask-interpolated_Size",
        "diagnostics_Mask-interpolated_BoundingBox",
        "diagnostics_Mask-interpolated_VoxelNum",
        "original_firstorder_Mean",
    ];
    assert_eq!(keys, expected);
    assert_eq!(record.get("diagnostics_Mask-original_VolumeNum"), Some(&FeatureValue::Int(1)));
}

#[test]
fn test_deprecated_feature_is_still_valued() {
    let extractor = extractor(
        Extractor::builder()
            .enable_filter("Original", FilterParams::new())
            .enable_features("firstorder", ["StandardDeviation", "Variance"]),
        1,
    );
    let (image, mask) = textured_volume();
    let record = extractor.execute(&image, &mask).unwrap();
    let std = float(record.get("original_firstorder_StandardDeviation"));
    let variance = float(record.get("original_firstorder_Variance"));
    assert_relative_eq!(std * std, variance, epsilon = 1e-9);
}

/// Log sink shared with a `fmt` subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Run `f` with a warn-level subscriber on this thread and return what it logged.
fn captured_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let buffer = LogBuffer::default();
    let sink = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || sink.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, buffer.lines())
}

#[test]
fn test_deprecated_feature_warns_once_per_run() {
    let extractor = extractor(
        Extractor::builder()
            .enable_filter("Original", FilterParams::new())
            .enable_filter("Square", FilterParams::new())
            .enable_features("firstorder", ["Mean", "StandardDeviation"]),
        2,
    );
    let (image, mask) = textured_volume();

    for _ in 0..2 {
        let (record, lines) = captured_warnings(|| extractor.execute(&image, &mask));
        let record = record.unwrap();
        assert!(record.get("square_firstorder_StandardDeviation").is_some());

        let warnings: Vec<&String> = lines
            .iter()
            .filter(|line| line.contains("deprecated feature enabled"))
            .collect();
        assert_eq!(warnings.len(), 1, "{lines:#?}");
        assert!(warnings[0].contains("StandardDeviation"));
    }
}

#[test]
fn test_zero_spacing_fails_before_filtering() {
    let geometry = Geometry::with_spacing([0.0, 1.0, 1.0]);
    let image = VolumetricImage::from_fn([6, 6, 1], geometry.clone(), |[x, y, _]| (x * y) as f64);
    let mask = LabelMap::from_fn([6, 6, 1], geometry, |[x, y, _]| (x > 0 && y > 0) as i64);
    let extractor = extractor(
        Extractor::builder()
            .enable_filter("LoG", params(json!({ "sigma": [1.0] })))
            .enable_features("firstorder", ["Mean"]),
        1,
    );
    let err = extractor.execute(&image, &mask).unwrap_err();
    assert!(matches!(err, RadiomicsError::Validation(ValidationError::InvalidGeometry(_))));
}

#[test]
fn test_execute_paths_reads_documents() {
    let dir = tempfile::tempdir().unwrap();
    let (image, mask) = centre_square();
    let image_path = dir.path().join("image.json");
    let mask_path = dir.path().join("mask.json");
    io::save_image(&image, &image_path).unwrap();
    io::save_label_map(&mask, &mask_path).unwrap();

    let extractor = extractor(
        Extractor::builder()
            .enable_filter("Original", FilterParams::new())
            .enable_features("firstorder", ["Maximum"]),
        1,
    );
    let from_disk = extractor.execute_paths(&image_path, &mask_path, Some(1)).unwrap();
    let in_memory = extractor.execute(&image, &mask).unwrap();
    assert_eq!(from_disk, in_memory);
    assert_eq!(float(from_disk.get("original_firstorder_Maximum")), 4.0);
}
