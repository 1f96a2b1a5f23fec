//! Gaussian smoothing with a caller-chosen odd kernel size

use crate::KernelSize;
use image::{Rgb, RgbImage};

/// Fixed kernels used for small sizes when no standard deviation is given.
///
/// These are the binomial coefficients, which closely approximate a Gaussian at these sizes.
const SMALL_KERNELS: [&[f32]; 4] = [
	&[1.0],
	&[0.25, 0.5, 0.25],
	&[0.0625, 0.25, 0.375, 0.25, 0.0625],
	&[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
];

/// The standard deviation derived from a kernel size
#[must_use]
pub fn auto_sigma(size: KernelSize) -> f64 {
	0.3 * ((f64::from(size.get()) - 1.0) * 0.5 - 1.0) + 0.8
}

/// Compute the normalized 1D Gaussian kernel for the given size.
///
/// Sizes up to 7 use fixed binomial kernels, larger sizes sample a Gaussian with [`auto_sigma`].
#[must_use]
pub fn gaussian_kernel(size: KernelSize) -> Vec<f32> {
	let n = size.get();
	if let Some(kernel) = SMALL_KERNELS.get((n / 2) as usize) {
		return kernel.to_vec();
	}

	let sigma = auto_sigma(size);
	let scale = -0.5 / (sigma * sigma);
	let radius = f64::from(size.radius());
	let weights = (0..n)
		.map(|i| {
			let x = f64::from(i) - radius;
			(scale * x * x).exp()
		})
		.collect::<Vec<_>>();

	let sum = weights.iter().sum::<f64>();

	#[allow(clippy::cast_possible_truncation)]
	weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Blur an image with a square Gaussian kernel of the given size.
///
/// The kernel is applied separably, reflecting pixels past the border around the edge pixel.
/// A kernel size of 1 returns an unchanged copy.
#[must_use]
pub fn gaussian_blur(image: &RgbImage, size: KernelSize) -> RgbImage {
	if size.get() == 1 {
		return image.clone();
	}

	let kernel = gaussian_kernel(size);
	let radius = i64::from(size.radius());
	let (width, height) = image.dimensions();

	// Reflect past the border without repeating the edge pixel (`dcb|abcd|cba`),
	// falling back to the edge if the image is narrower than the radius.
	// Offsets are at most 255 and dimensions fit in u32, so the index always fits in u32
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
	let reflected = |center: u32, offset: usize, len: u32| -> u32 {
		let last = i64::from(len) - 1;
		let i = (i64::from(center) + offset as i64 - radius).abs();
		let i = if i > last { 2 * last - i } else { i };
		i.clamp(0, last) as u32
	};

	let mut horizontal = vec![[0.0f32; 3]; width as usize * height as usize];
	for y in 0..height {
		for x in 0..width {
			let mut acc = [0.0f32; 3];
			for (offset, &weight) in kernel.iter().enumerate() {
				let Rgb(pixel) = *image.get_pixel(reflected(x, offset, width), y);
				for (sum, &channel) in acc.iter_mut().zip(&pixel) {
					*sum += weight * f32::from(channel);
				}
			}
			horizontal[y as usize * width as usize + x as usize] = acc;
		}
	}

	RgbImage::from_fn(width, height, |x, y| {
		let mut acc = [0.0f32; 3];
		for (offset, &weight) in kernel.iter().enumerate() {
			let row = reflected(y, offset, height) as usize;
			let pixel = horizontal[row * width as usize + x as usize];
			for (sum, &channel) in acc.iter_mut().zip(&pixel) {
				*sum += weight * channel;
			}
		}

		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
	})
}
