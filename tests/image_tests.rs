use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use marlin_codec::image::{
    compress_image, decompress_image, read_pgm, write_pgm, GrayImage, NorthPredictor,
};

/// A smooth synthetic image with mild noise, like a natural gradient.
fn synthetic_image(rows: usize, cols: usize, seed: u64) -> GrayImage {
    let mut rng = SmallRng::seed_from_u64(seed);
    let pixels = (0..rows * cols)
        .map(|i| {
            let base = ((i / cols) / 2 + (i % cols) / 3) as u8;
            base.wrapping_add(rng.gen_range(0..3))
        })
        .collect();
    GrayImage { rows, cols, pixels }
}

#[test]
fn predictor_inverts_exactly() {
    let image = synthetic_image(64, 96, 1);
    let predictor = NorthPredictor::new(32, 1).unwrap();
    let transformed = predictor
        .transform_direct(&image.pixels, image.rows, image.cols)
        .unwrap();
    let back = predictor
        .transform_inverse(&transformed, image.rows, image.cols)
        .unwrap();
    assert_eq!(back, image.pixels);
}

#[test]
fn pgm_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.pgm");
    let image = synthetic_image(32, 48, 2);
    write_pgm(&path, &image).unwrap();
    let back = read_pgm(&path).unwrap();
    assert_eq!(back.rows, image.rows);
    assert_eq!(back.cols, image.cols);
    assert_eq!(back.pixels, image.pixels);
}

#[test]
fn image_pipeline_is_lossless_at_unit_quantization() {
    let image = synthetic_image(128, 64, 3);
    let compressed = compress_image(&image, 64, 1).unwrap();
    let restored = decompress_image(&compressed).unwrap();
    assert_eq!(restored.rows, image.rows);
    assert_eq!(restored.cols, image.cols);
    assert_eq!(restored.pixels, image.pixels);
}

#[test]
fn smooth_images_actually_compress() {
    let image = synthetic_image(256, 256, 4);
    let compressed = compress_image(&image, 64, 1).unwrap();
    assert!(
        compressed.len() < image.pixels.len() / 2,
        "{} bytes out of {}",
        compressed.len(),
        image.pixels.len()
    );
}

#[test]
fn quantized_pipeline_bounds_the_error() {
    let image = synthetic_image(64, 64, 5);
    let compressed = compress_image(&image, 32, 4).unwrap();
    let restored = decompress_image(&compressed).unwrap();
    for (a, b) in image.pixels.iter().zip(&restored.pixels) {
        assert!((*a as i16 - *b as i16).abs() < 4);
    }
}

#[test]
fn misaligned_dimensions_are_rejected() {
    let image = synthetic_image(64, 64, 6);
    assert!(compress_image(&image, 60, 1).is_err());
}
