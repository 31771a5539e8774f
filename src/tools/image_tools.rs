use base64::{engine::general_purpose::STANDARD, Engine};
use derive_more::From;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into_with, Interpolation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};

use super::log::{log_debug, LogServiceType};
use super::alignment::{estimate, AlignmentError, AlignmentResult, KeypointSet, Point, SimilarityTransform, REFERENCE_TEMPLATE};

pub type ImageResult<T> = core::result::Result<T, ImageError>;

/// Side of the square canonical face crop fed to the embedding model.
pub const CANONICAL_SIZE: u32 = 112;

/// Destination pixels whose source falls outside the input are painted white.
pub const BORDER_FILL: Rgb<u8> = Rgb([255, 255, 255]);

lazy_static! {
    static ref DATA_URL_PREFIX: Regex = Regex::new(r"^data:image/[\w.+-]+;base64,").unwrap();
}

#[serde_as]
#[derive(Debug, Serialize, strum_macros::AsRefStr, From)]
pub enum ImageError {
    EmptyImage,

	#[from]
	Base64(#[serde_as(as = "DisplayFromStr")] base64::DecodeError),

	#[from]
	RsImageError(#[serde_as(as = "DisplayFromStr")] image::ImageError),
}

// region:    --- Error Boilerplate

impl core::fmt::Display for ImageError {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for ImageError {}

// endregion: --- Error Boilerplate

/// Accepts plain base64 or a `data:image/...;base64,` URL. Alpha is dropped.
pub fn decode_image(encoded: &str) -> ImageResult<RgbImage> {
    let payload = DATA_URL_PREFIX.replace(encoded.trim(), "");
    if payload.is_empty() {
        return Err(ImageError::EmptyImage);
    }
    let bytes = STANDARD.decode(payload.as_bytes())?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image.to_rgb8())
}

/// Replicated edge pixels added around the source so the 4x4 bicubic taps of any in-bounds position stay inside.
const SAMPLING_PAD: u32 = 2;

/// Any coordinate this far out makes the interpolation fall back to [`BORDER_FILL`].
const OUTSIDE: (f32, f32) = (-16.0, -16.0);

/// Warps `image` through `transform` into the fixed canonical crop.
///
/// Every destination pixel is pulled from the inverse-mapped source position with bicubic
/// interpolation. A position is inside the source when it lies within the area covered by its
/// pixels (`-0.5 <= x < width - 0.5`); taps reaching past the edge reuse the edge pixel.
/// Positions outside the source get [`BORDER_FILL`]. Pixels are computed independently, so the
/// output only depends on the inputs.
pub fn resample(image: &RgbImage, transform: &SimilarityTransform) -> AlignmentResult<RgbImage> {
    let inverse = transform.inverse().ok_or(AlignmentError::DegenerateInput)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(RgbImage::from_pixel(CANONICAL_SIZE, CANONICAL_SIZE, BORDER_FILL));
    }

    let padded = RgbImage::from_fn(width + 2 * SAMPLING_PAD, height + 2 * SAMPLING_PAD, |x, y| {
        let sx = x.saturating_sub(SAMPLING_PAD).min(width - 1);
        let sy = y.saturating_sub(SAMPLING_PAD).min(height - 1);
        *image.get_pixel(sx, sy)
    });
    let (max_x, max_y) = (width as f64 - 0.5, height as f64 - 0.5);
    let pad = SAMPLING_PAD as f64;

    let mut canonical = RgbImage::new(CANONICAL_SIZE, CANONICAL_SIZE);
    warp_into_with(&padded, |u, v| {
        let source = inverse.apply(&Point::new(u as f64, v as f64));
        if source.x >= -0.5 && source.x < max_x && source.y >= -0.5 && source.y < max_y {
            ((source.x + pad) as f32, (source.y + pad) as f32)
        } else {
            OUTSIDE
        }
    }, Interpolation::Bicubic, BORDER_FILL, &mut canonical);
    Ok(canonical)
}

pub fn align_face(image: &RgbImage, keypoints: &[Point]) -> AlignmentResult<RgbImage> {
    let source = KeypointSet::from_points(keypoints)?;
    let transform = estimate(&source, &REFERENCE_TEMPLATE)?;
    log_debug(LogServiceType::Recognition, format!("Alignment matrix {:?} (scale {:.3}, rotation {:.3})", transform.matrix(), transform.scale(), transform.rotation()));
    resample(image, &transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]))
    }

    fn assert_pixel_near(actual: &Rgb<u8>, expected: &Rgb<u8>, tolerance: i16) {
        for c in 0..3 {
            let diff = (actual[c] as i16 - expected[c] as i16).abs();
            assert!(diff <= tolerance, "{:?} != {:?}", actual, expected);
        }
    }

    fn draw_disc(img: &mut RgbImage, center: &Point, radius: f64, color: Rgb<u8>) {
        for y in 0..img.height() {
            for x in 0..img.width() {
                if (x as f64 - center.x).powi(2) + (y as f64 - center.y).powi(2) <= radius * radius {
                    img.put_pixel(x, y, color);
                }
            }
        }
    }

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn output_size_is_constant() {
        let transform = SimilarityTransform::from_parts(0.5, 0.3, 10.0, -5.0);
        for (w, h) in [(640, 480), (50, 300), (112, 112), (1, 1)] {
            let out = resample(&gradient(w, h), &transform).unwrap();
            assert_eq!(out.dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
        }
    }

    #[test]
    fn resample_is_deterministic() {
        let source = gradient(400, 300);
        let transform = SimilarityTransform::from_parts(0.31, -0.27, 14.5, 3.25);
        let first = resample(&source, &transform).unwrap();
        let second = resample(&source, &transform).unwrap();
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn identity_keeps_every_pixel() {
        let source = gradient(CANONICAL_SIZE, CANONICAL_SIZE);
        let out = resample(&source, &SimilarityTransform::identity()).unwrap();
        for y in 0..CANONICAL_SIZE {
            for x in 0..CANONICAL_SIZE {
                assert_pixel_near(out.get_pixel(x, y), source.get_pixel(x, y), 1);
            }
        }
    }

    #[test]
    fn translation_shifts_content() {
        let source = gradient(200, 200);
        let transform = SimilarityTransform { a: 1.0, b: 0.0, tx: -20.0, ty: -30.0 };
        let out = resample(&source, &transform).unwrap();
        for (x, y) in [(10, 10), (50, 60), (100, 90)] {
            assert_pixel_near(out.get_pixel(x, y), source.get_pixel(x + 20, y + 30), 1);
        }
    }

    #[test]
    fn outside_source_uses_border_fill() {
        let source = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let out = resample(&source, &SimilarityTransform::identity()).unwrap();
        assert_eq!(*out.get_pixel(100, 100), BORDER_FILL);
        assert_eq!(*out.get_pixel(60, 5), BORDER_FILL);
        assert_pixel_near(out.get_pixel(8, 8), &Rgb([0, 0, 0]), 0);
    }

    #[test]
    fn edge_pixels_keep_source_color() {
        let source = RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]));
        let out = resample(&source, &SimilarityTransform::identity()).unwrap();
        for i in 0..40 {
            for (x, y) in [(0, i), (1, i), (38, i), (39, i), (i, 0), (i, 1), (i, 38), (i, 39)] {
                assert_eq!(*out.get_pixel(x, y), Rgb([0, 0, 0]), "({}, {})", x, y);
            }
        }
        assert_eq!(*out.get_pixel(40, 20), BORDER_FILL);
        assert_eq!(*out.get_pixel(20, 40), BORDER_FILL);
    }

    #[test]
    fn tiny_source_is_sampled() {
        let source = RgbImage::from_pixel(3, 3, Rgb([0, 0, 0]));
        let out = resample(&source, &SimilarityTransform::identity()).unwrap();
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(*out.get_pixel(x, y), Rgb([0, 0, 0]));
            }
        }
        assert_eq!(*out.get_pixel(3, 1), BORDER_FILL);

        let single = RgbImage::from_pixel(1, 1, Rgb([40, 50, 60]));
        let upscaled = resample(&single, &SimilarityTransform::from_parts(4.0, 0.0, 0.0, 0.0)).unwrap();
        assert_pixel_near(upscaled.get_pixel(0, 0), &Rgb([40, 50, 60]), 1);
        assert_pixel_near(upscaled.get_pixel(1, 1), &Rgb([40, 50, 60]), 1);
        assert_eq!(*upscaled.get_pixel(2, 2), BORDER_FILL);
    }

    #[test]
    fn collapsed_transform_is_rejected() {
        let transform = SimilarityTransform { a: 0.0, b: 0.0, tx: 5.0, ty: 5.0 };
        let result = resample(&gradient(50, 50), &transform);
        assert!(matches!(result, Err(AlignmentError::DegenerateInput)));
    }

    #[test]
    fn landmarks_land_on_reference() {
        let colors = [Rgb([220, 20, 20]), Rgb([20, 220, 20]), Rgb([20, 20, 220]), Rgb([200, 200, 20])];
        let placement = SimilarityTransform::from_parts(3.0, 0.2, 180.0, 120.0);
        let mut source = RgbImage::from_pixel(640, 640, Rgb([128, 128, 128]));
        let mut landmarks = vec![];
        for (reference, color) in REFERENCE_TEMPLATE.points().iter().zip(colors.iter()) {
            let projected = placement.apply(reference);
            draw_disc(&mut source, &projected, 15.0, *color);
            landmarks.push(projected);
        }

        let aligned = align_face(&source, &landmarks).unwrap();
        for (reference, color) in REFERENCE_TEMPLATE.points().iter().zip(colors.iter()) {
            let pixel = aligned.get_pixel(reference.x.round() as u32, reference.y.round() as u32);
            assert_pixel_near(pixel, color, 2);
        }
    }

    #[test]
    fn align_needs_four_keypoints() {
        let result = align_face(&gradient(10, 10), &[Point::new(1.0, 1.0)]);
        assert!(matches!(result, Err(AlignmentError::InsufficientKeypoints(1))));
    }

    #[test]
    fn decodes_data_url_and_drops_alpha() {
        let rgba = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40]));
        let encoded = STANDARD.encode(encode_png(&DynamicImage::ImageRgba8(rgba)));

        let plain = decode_image(&encoded).unwrap();
        assert_eq!(plain.dimensions(), (3, 2));
        assert_eq!(*plain.get_pixel(1, 1), Rgb([10, 20, 30]));

        let with_prefix = decode_image(&format!("data:image/png;base64,{}", encoded)).unwrap();
        assert_eq!(plain.as_raw(), with_prefix.as_raw());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_image("not base64 at all!"), Err(ImageError::Base64(_))));
        assert!(matches!(decode_image(&STANDARD.encode(b"plain text")), Err(ImageError::RsImageError(_))));
        assert!(matches!(decode_image("data:image/png;base64,"), Err(ImageError::EmptyImage)));
    }
}
