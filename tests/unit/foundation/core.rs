use super::*;

#[test]
fn canvas_rejects_zero_dimensions() {
    assert!(Canvas::new(0, 720).is_err());
    assert!(Canvas::new(1280, 0).is_err());
    assert_eq!(
        Canvas::new(1280, 720).unwrap(),
        Canvas {
            width: 1280,
            height: 720
        }
    );
}

#[test]
fn clamp_or_falls_back_on_non_finite() {
    assert_eq!(clamp_or(f64::NAN, 0.0, 1.0, 0.5), 0.5);
    assert_eq!(clamp_or(f64::INFINITY, 0.0, 1.0, 0.25), 0.25);
    assert_eq!(clamp_or(3.0, 0.0, 1.0, 0.5), 1.0);
    assert_eq!(clamp_or(-3.0, 0.0, 1.0, 0.5), 0.0);
    assert_eq!(clamp_or(0.7, 0.0, 1.0, 0.5), 0.7);
}

#[test]
fn ensure_parent_dir_creates_nested_directories() {
    let root = tempfile::tempdir().unwrap();
    let target = root.path().join("a").join("b").join("render.mp4");
    ensure_parent_dir(&target).unwrap();
    assert!(root.path().join("a").join("b").is_dir());
}

#[test]
fn round2_follows_exact_binary_value() {
    // exact ties go up
    assert_eq!(round2(0.125), 0.13);
    assert_eq!(round2(0.375), 0.38);
    assert_eq!(round2(-0.125), -0.13);
    // stored just below the tie
    assert_eq!(round2(2.675), 2.67);
    assert_eq!(round2(1.115), 1.11);
    assert_eq!(round2(1.005), 1.0);
    // stored just above the tie
    assert_eq!(round2(8.345), 8.35);
    assert_eq!(round2(97.0181), 97.02);
    assert_eq!(round2(100.0), 100.0);
    assert!(round2(f64::NAN).is_nan());
}
