//! Specifies the CLI and handles arg parsing

use clap::{Parser, ValueEnum};
use std::{fmt::Display, path::PathBuf, str::FromStr};
use swatch::{ClusterCount, KernelSize};

/// Supported output formats for the final colors
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatOutput {
	/// sRGB hexcode
	Hex,
	/// sRGB (r,g,b) triple
	Rgb,
	/// Whitespace with true color background
	Swatch,
	/// A JSON object with the hex codes and the parameters used, or the error
	Json,
}

/// Sort orders for the final colors
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortOutput {
	/// The order k-means produced
	None,
	/// Ascending CIELAB lightness
	L,
	/// Descending number of pixels
	N,
}

/// Ways to colorize the output text
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorizeOutput {
	/// Foreground
	Fg,
	/// Background
	Bg,
}

/// Extract the dominant colors of a JPEG or PNG image by performing k-means clustering in the CIELAB color space.
///
/// The image is resized to 200x200 and blurred before clustering,
/// so the colors describe broad regions of the image rather than fine detail.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Options {
	/// The path to the input image
	pub image: PathBuf,

	/// The MIME type of the image
	///
	/// By default, this is guessed from the file extension.
	/// Accepted types are image/jpeg, image/jpg, image/pjpeg, and image/png.
	#[arg(long)]
	pub mime: Option<String>,

	/// The number of colors to find
	#[arg(short, default_value_t = ClusterCount::DEFAULT, value_parser = parse_validated::<ClusterCount>)]
	pub k: ClusterCount,

	/// The size of the Gaussian blur kernel applied before clustering
	///
	/// This must be an odd number from 1 to 255. A size of 1 disables blurring.
	/// Larger kernels smooth away more detail.
	#[arg(short, long, default_value_t = KernelSize::DEFAULT, value_parser = parse_validated::<KernelSize>)]
	pub blur_kernel: KernelSize,

	/// The format to print the colors in
	#[arg(short, long, default_value = "hex")]
	pub output: FormatOutput,

	/// Color the foreground or background for each printed color
	#[arg(short, long)]
	pub colorize: Option<ColorizeOutput>,

	/// The order to print the colors in
	#[arg(short, long, default_value = "none")]
	pub sort: SortOutput,

	/// Reverse the printed order of the colors
	#[arg(short, long)]
	pub reverse: bool,

	/// Write the swatch strip to this path as a PNG
	#[arg(long)]
	pub swatch: Option<PathBuf>,

	/// The number of trials of k-means to run
	///
	/// k-means can get stuck in a local minimum, so multiple trials with different seeds are run.
	/// The trial with the lowest variance is picked.
	#[arg(short = 'n', long, default_value_t = 10, value_parser = parse_positive)]
	pub trials: u32,

	/// The maximum number of iterations for each k-means trial
	///
	/// You can use the --verbose option to see how many iterations the best k-means trial took.
	#[arg(short = 'i', long, default_value_t = 1000, value_parser = parse_positive)]
	pub max_iter: u32,

	/// The threshold number used to determine k-means convergence
	///
	/// k-means stops once no centroid moves more than this distance in CIELAB.
	#[arg(short = 'e', long, default_value_t = 0.01, value_parser = parse_valid_convergence)]
	pub convergence_threshold: f32,

	/// The seed value used for the random number generator
	#[arg(long, default_value_t = 42)]
	pub seed: u64,

	/// The number of threads to use
	///
	/// A value of 0 indicates to automatically choose the number of threads.
	#[cfg(feature = "threads")]
	#[arg(short, long, default_value_t = 0)]
	pub threads: u8,

	/// Print additional information, such as the time taken by each stage
	#[arg(long)]
	pub verbose: bool,
}

/// Parse a value with one of the validated library types, reporting the validation message
fn parse_validated<T>(s: &str) -> Result<T, String>
where
	T: FromStr,
	T::Err: Display,
{
	s.parse().map_err(|e| format!("{e}"))
}

/// Parse an integer and ensure it is at least `1`
fn parse_positive(s: &str) -> Result<u32, String> {
	let value: u32 = s.parse().map_err(|e| format!("{e}"))?;
	if value == 0 {
		Err("0 is not in 1..".to_owned())
	} else {
		Ok(value)
	}
}

/// Parse the convergence number and ensure it is >= `0.0`
fn parse_valid_convergence(s: &str) -> Result<f32, String> {
	let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
	if value >= 0.0 {
		Ok(value)
	} else {
		Err(format!("{value} is not in 0.0.."))
	}
}
