//! Conversions between 8-bit sRGB and CIELAB, and the deduplicated LAB samples k-means runs on

use image::RgbImage;
use palette::{Clamp, FromColor, Lab, LinSrgb, Srgb};
use std::collections::HashMap;

/// Convert an 8-bit sRGB color to CIELAB (D65 white point)
#[must_use]
pub fn srgb_to_lab(srgb: Srgb<u8>) -> Lab {
	Lab::from_color(srgb.into_linear())
}

/// Convert a CIELAB color to the nearest displayable 8-bit sRGB color.
///
/// Colors outside the sRGB gamut are clamped per channel.
#[must_use]
pub fn lab_to_srgb(lab: Lab) -> Srgb<u8> {
	let srgb: Srgb = LinSrgb::from_color(lab).into_encoding();
	srgb.clamp().into_format()
}

/// Convert each centroid to a displayable 8-bit sRGB color, keeping their order
#[must_use]
pub fn centroids_to_srgb(centroids: &[Lab]) -> Vec<Srgb<u8>> {
	centroids.iter().map(|&lab| lab_to_srgb(lab)).collect()
}

/// Deduplicated CIELAB colors converted from sRGB pixels
///
/// k-means is weighted by `counts`, so this is equivalent to clustering every pixel individually.
#[derive(Debug, Clone, Default)]
pub struct LabCounts {
	/// CIELAB colors
	pub(crate) colors: Vec<Lab>,
	/// The number of duplicate sRGB pixels for each CIELAB color
	pub(crate) counts: Vec<u32>,
}

impl LabCounts {
	/// Convert a slice of sRGB colors to CIELAB colors, merging duplicate sRGB colors in the process.
	///
	/// # Panics
	/// If more than `u32::MAX` pixels share the same color.
	#[must_use]
	pub fn from_srgb(pixels: &[Srgb<u8>]) -> Self {
		let mut data = Self::default();

		// Converting to CIELAB is expensive.
		// Memoizing the results only converts each distinct color once
		// and groups identical pixels, speeding up k-means.

		// Packed sRGB -> data index
		let mut memo: HashMap<u32, u32> = HashMap::new();

		for srgb in pixels {
			let key = srgb.into_u32::<palette::rgb::channels::Rgba>();
			let index = *memo.entry(key).or_insert_with(|| {
				// data.len() < u32::MAX because there are only (2^8)^3 < u32::MAX possible sRGB colors
				#[allow(clippy::cast_possible_truncation)]
				let index = data.colors.len() as u32;

				data.colors.push(srgb_to_lab(*srgb));
				data.counts.push(0);
				index
			});

			data.counts[index as usize] += 1;
		}

		data
	}

	/// Flatten an image into deduplicated CIELAB colors
	#[must_use]
	pub fn from_rgbimage(image: &RgbImage) -> Self {
		Self::from_srgb(palette::cast::from_component_slice(image.as_raw()))
	}

	/// The number of distinct colors
	#[must_use]
	pub fn num_colors(&self) -> u32 {
		// at most (2^8)^3 distinct colors
		#[allow(clippy::cast_possible_truncation)]
		{
			self.colors.len() as u32
		}
	}

	/// The total number of pixels these colors were taken from
	#[must_use]
	pub fn num_pixels(&self) -> u64 {
		self.counts.iter().copied().map(u64::from).sum()
	}

	/// The distinct colors
	#[must_use]
	pub fn colors(&self) -> &[Lab] {
		&self.colors
	}

	/// The number of pixels for each distinct color
	#[must_use]
	pub fn counts(&self) -> &[u32] {
		&self.counts
	}

	/// Each distinct color alongside its number of pixels
	pub fn pairs(&self) -> impl Iterator<Item = (Lab, u32)> + '_ {
		self.colors.iter().copied().zip(self.counts.iter().copied())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;
	use image::Rgb;

	fn assert_within_one(expected: Srgb<u8>, actual: Srgb<u8>) {
		let close = |x: u8, y: u8| x.abs_diff(y) <= 1;
		assert!(
			close(expected.red, actual.red) && close(expected.green, actual.green) && close(expected.blue, actual.blue),
			"{expected:?} became {actual:?}"
		);
	}

	#[test]
	fn round_trip_within_one_over_the_cube() {
		let range = (0..=u8::MAX).step_by(5);
		for r in range.clone() {
			for g in range.clone() {
				for b in range.clone() {
					let color = Srgb::new(r, g, b);
					assert_within_one(color, lab_to_srgb(srgb_to_lab(color)));
				}
			}
		}
	}

	#[test]
	#[ignore = "sweeps all 2^24 colors, run with --release -- --ignored"]
	fn round_trip_within_one_over_the_full_cube() {
		for r in 0..=u8::MAX {
			for g in 0..=u8::MAX {
				for b in 0..=u8::MAX {
					let color = Srgb::new(r, g, b);
					assert_within_one(color, lab_to_srgb(srgb_to_lab(color)));
				}
			}
		}
	}

	#[test]
	fn round_trip_within_one_for_grays_and_primaries() {
		for v in 0..=u8::MAX {
			for color in [
				Srgb::new(v, v, v),
				Srgb::new(v, 0, 0),
				Srgb::new(0, v, 0),
				Srgb::new(0, 0, v),
				Srgb::new(u8::MAX, v, 0),
			] {
				assert_within_one(color, lab_to_srgb(srgb_to_lab(color)));
			}
		}
	}

	#[test]
	fn known_lab_values() {
		assert_relative_eq!(srgb_to_lab(Srgb::new(255, 255, 255)), Lab::new(100.0, 0.0, 0.0), epsilon = 0.01);
		assert_relative_eq!(srgb_to_lab(Srgb::new(0, 0, 0)), Lab::new(0.0, 0.0, 0.0), epsilon = 0.01);

		let red = srgb_to_lab(Srgb::new(255, 0, 0));
		assert!((red.l - 53.24).abs() < 0.1);
		assert!((red.a - 80.09).abs() < 0.1);
		assert!((red.b - 67.20).abs() < 0.1);
	}

	#[test]
	fn out_of_gamut_is_clamped() {
		assert_eq!(lab_to_srgb(Lab::new(150.0, 0.0, 0.0)), Srgb::new(255, 255, 255));
		assert_eq!(lab_to_srgb(Lab::new(-10.0, 0.0, 0.0)), Srgb::new(0, 0, 0));

		let saturated = lab_to_srgb(Lab::new(50.0, 127.0, -127.0));
		assert_eq!(saturated.green, 0);
	}

	#[test]
	fn centroids_keep_their_order() {
		let colors = [Srgb::new(255, 0, 0), Srgb::new(0, 0, 255), Srgb::new(0, 255, 0)];
		let labs = colors.iter().map(|&c| srgb_to_lab(c)).collect::<Vec<_>>();
		assert_eq!(centroids_to_srgb(&labs), colors);
	}

	#[test]
	fn counts_merge_duplicates() {
		let image = RgbImage::from_fn(10, 4, |x, _| if x < 3 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
		let labs = LabCounts::from_rgbimage(&image);

		assert_eq!(labs.num_colors(), 2);
		assert_eq!(labs.counts(), [12, 28]);
		assert_eq!(labs.num_pixels(), 40);
		assert_relative_eq!(labs.colors()[0], srgb_to_lab(Srgb::new(255, 0, 0)));
		assert_eq!(labs.pairs().count(), 2);
	}

	#[test]
	fn empty_image_has_no_colors() {
		let labs = LabCounts::from_srgb(&[]);
		assert_eq!(labs.num_colors(), 0);
		assert_eq!(labs.num_pixels(), 0);
	}
}
