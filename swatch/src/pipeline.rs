//! Runs every stage in order for a single image

use crate::{
	blur, color, kmeans, normalize, render, validate, ClusterCount, KernelSize, KmeansOptions, LabCounts, PaletteEntry,
	PaletteError, RawImage,
};
use image::RgbImage;
use palette::Srgb;
use std::time::Instant;

/// Record the running time of an expression, logging the elapsed time at debug level
macro_rules! time {
	($name: literal, $expr: expr) => {{
		let start = Instant::now();
		let result = $expr;
		log::debug!("{} took {}ms", $name, start.elapsed().as_millis());
		result
	}};
}

/// Every parameter of a pipeline run, validated up front
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaletteOptions {
	/// The number of colors to extract
	pub k: ClusterCount,
	/// The size of the Gaussian blur kernel applied before clustering
	pub blur_kernel: KernelSize,
	/// k-means tuning
	pub kmeans: KmeansOptions,
}

impl PaletteOptions {
	/// Build options from loosely typed request parameters.
	///
	/// Missing or blank values take their defaults; anything else must parse.
	///
	/// # Errors
	/// Returns [`PaletteError::InvalidParameter`] if either value is present but invalid.
	pub fn from_params(k: Option<&str>, blur_kernel: Option<&str>) -> Result<Self, PaletteError> {
		/// The value, unless it is missing or blank
		fn present(s: Option<&str>) -> Option<&str> {
			s.filter(|s| !s.trim().is_empty())
		}

		Ok(Self {
			k: present(k).map(str::parse).transpose()?.unwrap_or_default(),
			blur_kernel: present(blur_kernel).map(str::parse).transpose()?.unwrap_or_default(),
			kmeans: KmeansOptions::default(),
		})
	}
}

/// The result of one pipeline run
#[derive(Debug, Clone)]
pub struct PaletteArtifact {
	/// One entry per extracted color, in centroid order
	pub entries: Vec<PaletteEntry>,
	/// The rendered swatch strip
	pub swatch: RgbImage,
	/// The number of colors that were extracted
	pub k_used: u8,
	/// The blur kernel size that was applied
	pub blur_kernel_used: u32,
}

impl PaletteArtifact {
	/// The `#rrggbb` hex codes, in palette order
	#[must_use]
	pub fn hex_codes(&self) -> Vec<&str> {
		self.entries.iter().map(|entry| entry.hex.as_str()).collect()
	}

	/// The 8-bit sRGB colors, in palette order
	#[must_use]
	pub fn colors(&self) -> Vec<Srgb<u8>> {
		self.entries.iter().map(|entry| entry.rgb).collect()
	}

	/// The hex codes joined into one string, the form in which palettes are stored
	#[must_use]
	pub fn codes(&self) -> String {
		self.hex_codes().join(&render::CODE_SEPARATOR.to_string())
	}

	/// The swatch strip encoded as PNG
	///
	/// # Errors
	/// See [`render::encode_png`].
	pub fn swatch_png(&self) -> Result<Vec<u8>, PaletteError> {
		render::encode_png(&self.swatch)
	}
}

/// Extract the dominant colors of an uploaded image.
///
/// The image is validated, decoded, resized to the working canvas, blurred,
/// converted to CIELAB, and clustered; the centroids are converted back to sRGB and rendered.
/// The first failing stage ends the run.
///
/// # Errors
/// - [`PaletteError::UnsupportedFormat`] or [`PaletteError::CorruptInput`] from validation.
/// - [`PaletteError::Decode`] if decoding fails.
/// - [`PaletteError::InvalidParameter`] if the k-means options are unusable.
/// - [`PaletteError::ClusteringFailure`] if the smoothed canvas has fewer than `k` distinct colors.
pub fn extract_palette(raw: &RawImage, options: &PaletteOptions) -> Result<PaletteArtifact, PaletteError> {
	options.kmeans.validate()?;

	let validated = time!("Validation", validate::validate(raw))?;
	let (width, height) = validated.dimensions();
	log::debug!("Validated {width}x{height} {} image", validated.format());

	let decoded = time!("Decoding", normalize::decode(&validated))?;
	extract_from_rgb(&decoded, options)
}

/// Extract the dominant colors of an already decoded image.
///
/// This runs every stage after decoding, see [`extract_palette`].
///
/// # Errors
/// - [`PaletteError::InvalidParameter`] if the k-means options are unusable.
/// - [`PaletteError::ClusteringFailure`] if the smoothed canvas has fewer than `k` distinct colors.
pub fn extract_from_rgb(image: &RgbImage, options: &PaletteOptions) -> Result<PaletteArtifact, PaletteError> {
	options.kmeans.validate()?;
	let k = options.k.get();

	let canvas = time!("Resizing", normalize::resize(image));
	let smoothed = time!("Blurring", blur::gaussian_blur(&canvas, options.blur_kernel));
	let labs = time!("LAB conversion", LabCounts::from_rgbimage(&smoothed));

	let distinct = labs.num_colors();
	log::debug!("Reduced canvas to {distinct} distinct colors");
	if u32::from(k) > distinct {
		return Err(PaletteError::ClusteringFailure { k, distinct });
	}

	let result = time!("k-means", kmeans::run(&labs, k, &options.kmeans));
	log::debug!(
		"Best k-means trial took {} iterations with variance {}",
		result.iterations,
		result.variance
	);

	if result.centroids.len() != usize::from(k) {
		return Err(PaletteError::ClusteringFailure { k, distinct });
	}

	let colors = color::centroids_to_srgb(&result.centroids);
	let swatch = time!("Swatch rendering", render::render_swatch(&colors));
	let entries = colors
		.into_iter()
		.zip(result.counts)
		.map(|(rgb, pixels)| PaletteEntry::new(rgb, pixels))
		.collect();

	Ok(PaletteArtifact {
		entries,
		swatch,
		k_used: k,
		blur_kernel_used: options.blur_kernel.get(),
	})
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use crate::{normalize::CANVAS_SIZE, parse_hex_code, ErrorKind, SWATCH_SIZE};
	use image::{codecs::jpeg::JpegEncoder, DynamicImage, Rgb};
	use std::io::Cursor;

	fn png(image: RgbImage) -> RawImage {
		let mut bytes = Vec::new();
		DynamicImage::ImageRgb8(image)
			.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
			.unwrap();
		RawImage::from_named_bytes(bytes, "upload.png")
	}

	fn jpeg(image: &RgbImage) -> RawImage {
		let mut bytes = Vec::new();
		JpegEncoder::new_with_quality(&mut bytes, 100).encode_image(image).unwrap();
		RawImage::from_named_bytes(bytes, "upload.jpg")
	}

	fn options(k: i64, blur_kernel: i64) -> PaletteOptions {
		PaletteOptions {
			k: ClusterCount::new(k).unwrap(),
			blur_kernel: KernelSize::new(blur_kernel).unwrap(),
			kmeans: KmeansOptions { trials: 2, max_iter: 100, ..KmeansOptions::default() },
		}
	}

	/// A smooth, colorful image with plenty of distinct colors
	fn gradient(width: u32, height: u32) -> RgbImage {
		RgbImage::from_fn(width, height, |x, y| {
			#[allow(clippy::cast_possible_truncation)]
			Rgb([
				(x * 255 / width) as u8,
				(y * 255 / height) as u8,
				((x + y) * 127 / (width + height)) as u8,
			])
		})
	}

	fn assert_near(code: &str, expected: Srgb<u8>, tolerance: u8) {
		let color = parse_hex_code(code).unwrap();
		assert!(
			color.red.abs_diff(expected.red) <= tolerance
				&& color.green.abs_diff(expected.green) <= tolerance
				&& color.blue.abs_diff(expected.blue) <= tolerance,
			"{code} is not near {expected:?}"
		);
	}

	#[test]
	fn solid_red_jpeg_gives_red() {
		let raw = jpeg(&RgbImage::from_pixel(400, 300, Rgb([255, 0, 0])));
		let options = PaletteOptions { k: ClusterCount::new(1).unwrap(), ..PaletteOptions::default() };

		let artifact = extract_palette(&raw, &options).unwrap();

		assert_eq!(artifact.k_used, 1);
		assert_eq!(artifact.blur_kernel_used, 5);
		assert_eq!(artifact.entries.len(), 1);
		assert_near(&artifact.entries[0].hex, Srgb::new(255, 0, 0), 1);
		assert_eq!(artifact.entries[0].pixels, CANVAS_SIZE * CANVAS_SIZE);

		let Srgb { red, green, blue, .. } = artifact.entries[0].rgb;
		assert!(red >= 254 && green <= 1 && blue <= 1, "{:?}", artifact.entries[0].rgb);
		assert_eq!(artifact.swatch.dimensions(), (SWATCH_SIZE, SWATCH_SIZE));
		assert!(artifact.swatch.pixels().all(|&p| p == Rgb([red, green, blue])));
	}

	#[test]
	fn solid_red_png_is_exact() {
		let raw = png(RgbImage::from_pixel(400, 300, Rgb([255, 0, 0])));
		let artifact = extract_palette(&raw, &options(1, 5)).unwrap();
		assert_eq!(artifact.hex_codes(), ["#ff0000"]);
		assert!(artifact.swatch.pixels().all(|&p| p == Rgb([255, 0, 0])));
	}

	#[test]
	fn returns_exactly_k_colors() {
		let raw = png(gradient(320, 240));
		for k in [1, 2, 5, 8] {
			let artifact = extract_palette(&raw, &options(k, 5)).unwrap();
			assert_eq!(artifact.entries.len(), k as usize);
			assert_eq!(artifact.swatch.dimensions(), (SWATCH_SIZE * k as u32, SWATCH_SIZE));
			assert_eq!(
				artifact.entries.iter().map(|e| u64::from(e.pixels)).sum::<u64>(),
				u64::from(CANVAS_SIZE * CANVAS_SIZE)
			);
		}
	}

	#[test]
	fn hex_codes_are_well_formed_and_match_the_swatch() {
		let raw = png(gradient(300, 200));
		let artifact = extract_palette(&raw, &options(6, 3)).unwrap();

		for (i, entry) in artifact.entries.iter().enumerate() {
			assert_eq!(entry.hex.len(), 7);
			assert!(entry.hex.starts_with('#'));
			assert!(entry.hex[1..].bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
			assert_eq!(parse_hex_code(&entry.hex).unwrap(), entry.rgb);

			#[allow(clippy::cast_possible_truncation)]
			let pixel = *artifact.swatch.get_pixel(SWATCH_SIZE * i as u32 + SWATCH_SIZE / 2, SWATCH_SIZE / 2);
			assert_eq!(pixel, Rgb([entry.rgb.red, entry.rgb.green, entry.rgb.blue]));
		}
	}

	#[test]
	fn identical_input_gives_identical_palette() {
		let raw = png(gradient(256, 256));
		let options = PaletteOptions { k: ClusterCount::new(5).unwrap(), ..PaletteOptions::default() };

		let first = extract_palette(&raw, &options).unwrap();
		let second = extract_palette(&raw, &options).unwrap();

		assert_eq!(first.hex_codes(), second.hex_codes());
		assert_eq!(first.swatch, second.swatch);
	}

	#[test]
	fn two_color_image_gives_both_colors() {
		let image = RgbImage::from_fn(CANVAS_SIZE, CANVAS_SIZE, |x, _| {
			if x < CANVAS_SIZE / 2 {
				Rgb([255, 0, 0])
			} else {
				Rgb([0, 0, 255])
			}
		});

		let artifact = extract_from_rgb(&image, &options(2, 1)).unwrap();

		let mut codes = artifact.hex_codes();
		codes.sort_unstable();
		assert_eq!(codes, ["#0000ff", "#ff0000"]);
		assert_eq!(artifact.entries[0].pixels, CANVAS_SIZE * CANVAS_SIZE / 2);
	}

	#[test]
	fn text_file_is_unsupported() {
		let raw = RawImage::from_named_bytes(b"just some notes".to_vec(), "notes.txt");
		let error = extract_palette(&raw, &PaletteOptions::default()).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::UnsupportedFormat);

		let raw = RawImage::new(b"test_content".to_vec(), "text/plain");
		assert_eq!(extract_palette(&raw, &PaletteOptions::default()).unwrap_err().kind(), ErrorKind::UnsupportedFormat);
	}

	#[test]
	fn empty_jpeg_is_corrupt() {
		let raw = RawImage::from_named_bytes(Vec::new(), "image.jpg");
		let error = extract_palette(&raw, &PaletteOptions::default()).unwrap_err();
		assert_eq!(error.kind(), ErrorKind::CorruptInput);
	}

	#[test]
	fn too_many_colors_for_a_solid_image_fails() {
		let raw = png(RgbImage::from_pixel(50, 50, Rgb([12, 200, 80])));
		match extract_palette(&raw, &options(2, 5)).unwrap_err() {
			PaletteError::ClusteringFailure { k, distinct } => {
				assert_eq!(k, 2);
				assert_eq!(distinct, 1);
			},
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn kernel_of_one_is_accepted() {
		let raw = png(gradient(120, 80));
		let artifact = extract_palette(&raw, &options(3, 1)).unwrap();
		assert_eq!(artifact.blur_kernel_used, 1);
		assert_eq!(artifact.entries.len(), 3);
	}

	#[test]
	fn unusable_kmeans_options_fail_before_decoding() {
		let raw = RawImage::from_named_bytes(Vec::new(), "image.jpg");
		let options = PaletteOptions {
			kmeans: KmeansOptions { trials: 0, ..KmeansOptions::default() },
			..PaletteOptions::default()
		};
		assert_eq!(extract_palette(&raw, &options).unwrap_err().kind(), ErrorKind::InvalidParameter);
	}

	#[test]
	fn params_use_defaults_when_missing() {
		let options = PaletteOptions::from_params(None, Some("  ")).unwrap();
		assert_eq!(options, PaletteOptions::default());

		let options = PaletteOptions::from_params(Some(""), None).unwrap();
		assert_eq!(options.k, ClusterCount::DEFAULT);

		let options = PaletteOptions::from_params(Some("8"), Some("3")).unwrap();
		assert_eq!(options.k.get(), 8);
		assert_eq!(options.blur_kernel.get(), 3);
	}

	#[test]
	fn params_are_validated() {
		for (k, blur) in [(Some("0"), None), (Some("-2"), None), (Some("many"), None), (None, Some("4")), (None, Some("0"))] {
			let error = PaletteOptions::from_params(k, blur).unwrap_err();
			assert_eq!(error.kind(), ErrorKind::InvalidParameter, "{k:?} {blur:?}");
		}
	}

	#[test]
	fn stored_codes_round_trip() {
		let raw = png(gradient(100, 100));
		let artifact = extract_palette(&raw, &options(4, 5)).unwrap();

		let codes = artifact.codes();
		assert_eq!(codes.matches('|').count(), 3);
		assert_eq!(crate::parse_codes(&codes).unwrap(), artifact.colors());
		assert_eq!(crate::render_swatch(&artifact.colors()), artifact.swatch);
	}

	#[test]
	fn swatch_png_is_encoded() {
		let raw = png(gradient(64, 64));
		let artifact = extract_palette(&raw, &options(2, 5)).unwrap();
		let bytes = artifact.swatch_png().unwrap();
		let decoded = image::load_from_memory(&bytes).unwrap().into_rgb8();
		assert_eq!(decoded, artifact.swatch);
	}
}
