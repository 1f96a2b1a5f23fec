//! Print the dominant colors of an image found by performing k-means clustering in the CIELAB color space.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
	clippy::pedantic,
	clippy::cargo,
	clippy::use_debug,
	clippy::dbg_macro,
	clippy::todo,
	clippy::unimplemented,
	clippy::unwrap_used,
	clippy::unwrap_in_result,
	clippy::unneeded_field_pattern,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::unnecessary_self_imports,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::string_slice,
	missing_docs,
	clippy::missing_docs_in_private_items,
	rustdoc::all,
	clippy::float_cmp_const,
	clippy::lossy_float_literal
)]
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

mod cli;

#[allow(clippy::wildcard_imports)]
use cli::*;

use std::{path::PathBuf, process::ExitCode, time::Instant};

use clap::Parser;
use colored::Colorize;
use palette::Srgb;
use serde_json::json;
use swatch::{KmeansOptions, PaletteArtifact, PaletteEntry, PaletteError, PaletteOptions, RawImage};

/// Record the running time of a function and log the elapsed time
macro_rules! time {
	($name: literal, $func_call: expr) => {{
		let start = Instant::now();
		let result = $func_call;
		log::info!("{} took {}ms", $name, start.elapsed().as_millis());
		result
	}};
}

/// Error cases for running the CLI
#[derive(Debug, thiserror::Error)]
enum CliError {
	/// Failed to read the image file
	#[error("failed to read {}: {source}", path.display())]
	Read {
		/// The image path
		path: PathBuf,
		/// The underlying error
		source: std::io::Error,
	},
	/// Failed to write the swatch file
	#[error("failed to write {}: {source}", path.display())]
	Write {
		/// The swatch path
		path: PathBuf,
		/// The underlying error
		source: std::io::Error,
	},
	/// A pipeline stage failed
	#[error(transparent)]
	Palette(#[from] PaletteError),
	/// Failed to build the thread pool
	#[cfg(feature = "threads")]
	#[error("failed to build the thread pool: {0}")]
	ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl CliError {
	/// The machine readable name of this error, for JSON output
	fn kind(&self) -> &'static str {
		match self {
			CliError::Read { .. } | CliError::Write { .. } => "io_error",
			CliError::Palette(e) => e.kind().as_str(),
			#[cfg(feature = "threads")]
			CliError::ThreadPool(_) => "thread_pool_error",
		}
	}
}

fn main() -> ExitCode {
	let options = Options::parse();

	env_logger::Builder::from_env(
		env_logger::Env::default().default_filter_or(if options.verbose { "debug" } else { "warn" }),
	)
	.init();

	let result = run_generate_and_print_palette(&options);

	// Returning Result<_> uses Debug printing instead of Display
	if let Err(e) = result {
		if options.output == FormatOutput::Json {
			println!("{}", error_json(&e));
		} else {
			eprintln!("{e}");
		}
		ExitCode::FAILURE
	} else {
		ExitCode::SUCCESS
	}
}

/// Builds a thread pool and then runs `generate_and_print_palette`
#[cfg(feature = "threads")]
fn run_generate_and_print_palette(options: &Options) -> Result<(), CliError> {
	let pool = rayon::ThreadPoolBuilder::new()
		.num_threads(usize::from(options.threads))
		.build()?;

	pool.install(|| generate_and_print_palette(options))
}

/// Runs `generate_and_print_palette` on a single thread
#[cfg(not(feature = "threads"))]
fn run_generate_and_print_palette(options: &Options) -> Result<(), CliError> {
	generate_and_print_palette(options)
}

/// Load an image, generate its palette, and print the result using the given options
fn generate_and_print_palette(options: &Options) -> Result<(), CliError> {
	let raw = time!("Image loading", load_image(options))?;

	let artifact = time!(
		"Palette generation",
		swatch::extract_palette(&raw, &palette_options(options))
	)?;

	if let Some(path) = &options.swatch {
		let png = artifact.swatch_png()?;
		std::fs::write(path, png).map_err(|source| CliError::Write { path: path.clone(), source })?;
		log::info!("Wrote the swatch to {}", path.display());
	}

	if let Some(output) = text_output(options.output) {
		let entries = sorted_entries(&artifact, options);
		print_palette(&entries, output, options);
	} else {
		println!("{}", artifact_json(&artifact, options.swatch.as_ref()));
	}

	Ok(())
}

/// Read the image file, using the given MIME type or guessing it from the file extension
fn load_image(options: &Options) -> Result<RawImage, CliError> {
	let path = &options.image;
	let bytes = std::fs::read(path).map_err(|source| CliError::Read { path: path.clone(), source })?;

	Ok(match &options.mime {
		Some(mime) => RawImage::new(bytes, mime.as_str()),
		None => RawImage::from_named_bytes(bytes, path),
	})
}

/// Collect the pipeline options from the CLI options
fn palette_options(options: &Options) -> PaletteOptions {
	PaletteOptions {
		k: options.k,
		blur_kernel: options.blur_kernel,
		kmeans: KmeansOptions {
			trials: options.trials,
			max_iter: options.max_iter,
			convergence_threshold: options.convergence_threshold,
			seed: options.seed,
		},
	}
}

/// The JSON object printed for a successful run
fn artifact_json(artifact: &PaletteArtifact, swatch: Option<&PathBuf>) -> serde_json::Value {
	json!({
		"hex_codes": artifact.hex_codes(),
		"pixels": artifact.entries.iter().map(|entry| entry.pixels).collect::<Vec<_>>(),
		"swatch_image": swatch.map(|path| path.display().to_string()),
		"k_used": artifact.k_used,
		"blur_kernel_used": artifact.blur_kernel_used,
	})
}

/// The JSON object printed for a failed run
fn error_json(error: &CliError) -> serde_json::Value {
	json!({
		"error_kind": error.kind(),
		"message": error.to_string(),
	})
}

/// Sort the palette entries by the given metric
fn sorted_entries<'a>(artifact: &'a PaletteArtifact, options: &Options) -> Vec<&'a PaletteEntry> {
	let mut entries = artifact.entries.iter().collect::<Vec<_>>();

	match options.sort {
		SortOutput::None => (),
		SortOutput::L => entries.sort_by(|x, y| {
			f32::total_cmp(&swatch::srgb_to_lab(x.rgb).l, &swatch::srgb_to_lab(y.rgb).l)
		}),
		SortOutput::N => entries.sort_by_key(|entry| std::cmp::Reverse(entry.pixels)),
	}

	if options.reverse {
		entries.reverse();
	}

	entries
}

/// The output formats printed as a single line of colors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TextOutput {
	/// See [`FormatOutput::Hex`]
	Hex,
	/// See [`FormatOutput::Rgb`]
	Rgb,
	/// See [`FormatOutput::Swatch`]
	Swatch,
}

/// The line format for `output`, or `None` for JSON
const fn text_output(output: FormatOutput) -> Option<TextOutput> {
	match output {
		FormatOutput::Hex => Some(TextOutput::Hex),
		FormatOutput::Rgb => Some(TextOutput::Rgb),
		FormatOutput::Swatch => Some(TextOutput::Swatch),
		FormatOutput::Json => None,
	}
}

/// Print the given colors based off the provided options
fn print_palette(entries: &[&PaletteEntry], output: TextOutput, options: &Options) {
	let colors = entries.iter().map(|entry| entry.rgb).collect::<Vec<_>>();
	println!("{}", format_palette(&colors, output, options));
}

/// Format a line of colors based off the provided options
fn format_palette(colors: &[Srgb<u8>], output: TextOutput, options: &Options) -> String {
	match output {
		TextOutput::Hex => color_format(colors, options, " ", swatch::hex_code),

		TextOutput::Rgb => color_format(colors, options, " ", |color| {
			format!("({},{},{})", color.red, color.green, color.blue)
		}),

		TextOutput::Swatch => format_colors(colors, "", |color| {
			"   ".on_truecolor(color.red, color.green, color.blue).to_string()
		}),
	}
}

/// Format a line of colors using the given format
fn format_colors(colors: &[Srgb<u8>], delimiter: &str, format: impl Fn(Srgb<u8>) -> String) -> String {
	colors.iter().map(|&color| format(color)).collect::<Vec<_>>().join(delimiter)
}

/// Format and then colorize the text for all colors
fn color_format(
	colors: &[Srgb<u8>],
	options: &Options,
	delimiter: &str,
	format: impl Fn(Srgb<u8>) -> String,
) -> String {
	match options.colorize {
		Some(ColorizeOutput::Fg) => format_colors(colors, delimiter, |color| {
			format(color).truecolor(color.red, color.green, color.blue).to_string()
		}),

		Some(ColorizeOutput::Bg) => format_colors(colors, delimiter, |color| {
			format(color).on_truecolor(color.red, color.green, color.blue).to_string()
		}),

		None => format_colors(colors, delimiter, format),
	}
}
