//! Provides the implementation for weighted k-means over CIELAB colors

use crate::{LabCounts, PaletteError};
use palette::Lab;
use rand::{
	distributions::{Distribution, WeightedError, WeightedIndex},
	Rng, SeedableRng,
};
use rand_xoshiro::Xoroshiro128PlusPlus;

/// Squared euclidean distance in CIELAB, i.e., the squared CIE76 color difference
fn squared_distance(x: Lab, y: Lab) -> f32 {
	let dl = x.l - y.l;
	let da = x.a - y.a;
	let db = x.b - y.b;
	dl * dl + da * da + db * db
}

/// Vector sum of CIELAB colors, kept in higher precision
type LabSum = [f64; 3];

/// Add `n` copies of `color` to `sum`
fn add_color(sum: &mut LabSum, color: Lab, n: u32) {
	let n = f64::from(n);
	sum[0] += n * f64::from(color.l);
	sum[1] += n * f64::from(color.a);
	sum[2] += n * f64::from(color.b);
}

/// Remove `n` copies of `color` from `sum`
fn remove_color(sum: &mut LabSum, color: Lab, n: u32) {
	let n = f64::from(n);
	sum[0] -= n * f64::from(color.l);
	sum[1] -= n * f64::from(color.a);
	sum[2] -= n * f64::from(color.b);
}

/// Parameters controlling how hard k-means works to converge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansOptions {
	/// The number of independent runs, taking the one with the lowest variance
	pub trials: u32,
	/// The maximum number of iterations for each trial
	pub max_iter: u32,
	/// Stop a trial once the centroids move less than this in total (CIELAB units)
	pub convergence_threshold: f32,
	/// The seed for choosing initial centroids
	pub seed: u64,
}

impl KmeansOptions {
	/// Check that at least one iteration of one trial will run.
	///
	/// # Errors
	/// Returns [`PaletteError::InvalidParameter`] if `trials` or `max_iter` is zero,
	/// or if the convergence threshold is negative or not a number.
	pub fn validate(&self) -> Result<(), PaletteError> {
		if self.trials == 0 {
			Err(PaletteError::invalid("trials", "at least one trial is required"))
		} else if self.max_iter == 0 {
			Err(PaletteError::invalid("max_iter", "at least one iteration is required"))
		} else if self.convergence_threshold.is_nan() || self.convergence_threshold < 0.0 {
			Err(PaletteError::invalid(
				"convergence_threshold",
				format!("{} is not a non-negative number", self.convergence_threshold),
			))
		} else {
			Ok(())
		}
	}
}

impl Default for KmeansOptions {
	fn default() -> Self {
		Self {
			trials: 10,
			max_iter: 1000,
			convergence_threshold: 0.01,
			seed: 42,
		}
	}
}

/// Bookkeeping for each k-means data point
struct PointData {
	/// Center assignment for this data point
	assignment: Vec<u8>,
	/// Squared distance to the closest chosen centroid, used by k-means++
	weight: Vec<f32>,
}

impl PointData {
	/// Create a [`PointData`] with the given number data points
	fn new(n: u32) -> Self {
		let n = n as usize;
		Self {
			assignment: vec![0; n],
			weight: vec![f32::INFINITY; n],
		}
	}

	/// Reset data for the next k-means trial
	fn reset(&mut self) {
		// every trial starts from the same assignments so that trials are independent of each other
		self.assignment.fill(0);
		self.weight.fill(f32::INFINITY);
	}
}

/// Data for each center/centroid
struct CenterData {
	/// The centroid point
	centroid: Vec<Lab>,
	/// Vector sum for all data points in this center
	sum: Vec<LabSum>,
	/// Number of pixels in this center
	count: Vec<u32>,
}

impl CenterData {
	/// Create a [`CenterData`] with the given number of centers
	fn new(k: u8) -> Self {
		let k = usize::from(k);
		Self {
			centroid: Vec::new(),
			sum: vec![[0.0; 3]; k],
			count: vec![0; k],
		}
	}

	/// Reset data for the next k-means trial
	fn reset(&mut self) {
		self.centroid.clear();
		self.sum.fill([0.0; 3]);
		self.count.fill(0);
	}
}

/// Holds all the state used by k-means
struct KmeansState {
	/// Data for each center
	centers: CenterData,
	/// One fourth of the squared distance between each pairs of centers
	distances: Vec<(u8, f32)>,
	/// Data for each point
	points: PointData,
}

impl KmeansState {
	/// Initialize a new [`KmeansState`] with `k` centers and `n` data points
	fn new(k: u8, n: u32) -> Self {
		Self {
			centers: CenterData::new(k),
			distances: vec![(0, 0.0); usize::from(k) * usize::from(k)],
			points: PointData::new(n),
		}
	}
}

/// Result from running k-means
#[derive(Debug, Clone)]
pub struct KmeansResult {
	/// Pixel-weighted sum of squared distances from each color to its centroid
	///
	/// A lower variance indicates a higher accuracy.
	pub variance: f64,
	/// Final centroid colors
	pub centroids: Vec<Lab>,
	/// Number of pixels in each centroid
	pub counts: Vec<u32>,
	/// Number of elapsed iterations
	pub iterations: u32,
}

impl KmeansResult {
	/// Create an empty result, representing that no k-means trials were able to be run
	const fn empty() -> Self {
		Self {
			variance: 0.0,
			centroids: Vec::new(),
			counts: Vec::new(),
			iterations: 0,
		}
	}
}

/// Choose the starting centroids using the k-means++ algorithm, weighting each color by its pixel count
fn kmeans_plus_plus(k: u8, rng: &mut impl Rng, labs: &LabCounts, centroids: &mut Vec<Lab>, weights: &mut [f32]) {
	use WeightedError::*;

	// Pick a random first centroid, proportional to pixel count
	let first = match WeightedIndex::new(&labs.counts) {
		Ok(sampler) => sampler.sample(rng),
		Err(_) => return, // no pixels
	};
	centroids.push(labs.colors[first]);

	// Pick each next centroid with a weighted probability based off the squared distance to its closest centroid
	for i in 1..usize::from(k) {
		let centroid = centroids[i - 1];
		for (weight, &color) in weights.iter_mut().zip(&labs.colors) {
			*weight = f32::min(*weight, squared_distance(color, centroid));
		}

		#[allow(clippy::cast_precision_loss)]
		let weighted = weights.iter().zip(&labs.counts).map(|(&w, &n)| w * n as f32);

		match WeightedIndex::new(weighted) {
			Ok(sampler) => centroids.push(labs.colors[sampler.sample(rng)]),
			Err(AllWeightsZero) => return, // all points exactly match a centroid
			Err(InvalidWeight | NoItem | TooMany) => {
				unreachable!("distances are >= 0 and colors.len() is in 1..=2.pow(24)")
			},
		}
	}
}

/// Initializes the center sums and counts based off the initial assignments
fn compute_initial_sums(labs: &LabCounts, centers: &mut CenterData, assignment: &[u8]) {
	for ((color, n), &center) in labs.pairs().zip(assignment) {
		let i = usize::from(center);
		add_color(&mut centers.sum[i], color, n);
		centers.count[i] += n;
	}
}

/// For each pair of centers, update their distances and sort each center's row by increasing distance
// i and j are < centroids.len() <= u8::MAX
#[allow(clippy::cast_possible_truncation)]
fn update_distances(centroids: &[Lab], distances: &mut [(u8, f32)]) {
	let k = centroids.len();
	for i in 0..k {
		let ci = centroids[i];
		distances[i * k + i] = (i as u8, 0.0);
		for j in (i + 1)..k {
			let cj = centroids[j];
			let dist = squared_distance(ci, cj) / 4.0;
			distances[j * k + i] = (i as u8, dist);
			distances[i * k + j] = (j as u8, dist);
		}
	}

	for row in distances[..(k * k)].chunks_exact_mut(k) {
		row.sort_by(|(_, x), (_, y)| f32::total_cmp(x, y));
	}
}

/// For each data point, update its assigned center
fn update_assignments(labs: &LabCounts, centers: &mut CenterData, distances: &[(u8, f32)], points: &mut PointData) {
	let k = centers.centroid.len();
	for ((color, n), center) in labs.pairs().zip(&mut points.assignment) {
		let ci = usize::from(*center);
		let dist = squared_distance(color, centers.centroid[ci]);

		// Find the closest center, skipping centers that are too far away to be closer (triangle inequality)
		let mut min_dist = dist;
		let mut min_center = *center;
		for &(other_center, half_dist) in &distances[(ci * k + 1)..((ci + 1) * k)] {
			if dist < half_dist {
				break;
			}

			let other_dist = squared_distance(color, centers.centroid[usize::from(other_center)]);
			if other_dist < min_dist {
				min_dist = other_dist;
				min_center = other_center;
			}
		}

		// Move this point to its new center
		if min_center != *center {
			remove_color(&mut centers.sum[ci], color, n);
			centers.count[ci] -= n;

			let cj = usize::from(min_center);
			add_color(&mut centers.sum[cj], color, n);
			centers.count[cj] += n;

			*center = min_center;
		}
	}
}

/// Give each empty center the point farthest from its own centroid.
///
/// Points are only taken from centers that keep at least one other point,
/// so this never creates a new empty center.
// centers.len() <= u8::MAX
#[allow(clippy::cast_possible_truncation)]
fn relocate_empty_centers(labs: &LabCounts, centers: &mut CenterData, points: &mut PointData) {
	for empty in 0..centers.centroid.len() {
		if centers.count[empty] != 0 {
			continue;
		}

		let farthest = labs
			.pairs()
			.zip(&points.assignment)
			.enumerate()
			.filter(|&(_, ((_, n), &center))| centers.count[usize::from(center)] > n)
			.map(|(i, ((color, _), &center))| (i, squared_distance(color, centers.centroid[usize::from(center)])))
			.max_by(|(_, x), (_, y)| f32::total_cmp(x, y));

		if let Some((i, _)) = farthest {
			let color = labs.colors[i];
			let n = labs.counts[i];
			let old = usize::from(points.assignment[i]);

			remove_color(&mut centers.sum[old], color, n);
			centers.count[old] -= n;

			add_color(&mut centers.sum[empty], color, n);
			centers.count[empty] += n;

			points.assignment[i] = empty as u8;
			centers.centroid[empty] = color;
		}
	}
}

/// For each center, update its centroid using the vector sums and return the total distance moved
fn update_centroids(centers: &mut CenterData) -> f32 {
	let mut total_delta = 0.0;
	for ((centroid, &n), sum) in centers.centroid.iter_mut().zip(&centers.count).zip(&centers.sum) {
		if n == 0 {
			continue;
		}

		let n = f64::from(n);
		// Sums may need greater precision, but the average can fall back down to a reduced precision
		#[allow(clippy::cast_possible_truncation)]
		let new_centroid = Lab::new((sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32);

		total_delta += squared_distance(*centroid, new_centroid).sqrt();
		*centroid = new_centroid;
	}

	total_delta
}

/// Run a trial of k-means
fn kmeans(
	labs: &LabCounts,
	KmeansState { centers, distances, points }: &mut KmeansState,
	k: u8,
	max_iter: u32,
	convergence: f32,
	seed: u64,
) -> KmeansResult {
	let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
	kmeans_plus_plus(k, &mut rng, labs, &mut centers.centroid, &mut points.weight);
	compute_initial_sums(labs, centers, &points.assignment);

	let mut iterations = 0;
	let mut total_delta = f32::INFINITY;
	while iterations < max_iter && total_delta > convergence {
		update_distances(&centers.centroid, distances);
		update_assignments(labs, centers, distances, points);
		relocate_empty_centers(labs, centers, points);
		total_delta = update_centroids(centers);
		iterations += 1;
	}

	let variance = labs
		.pairs()
		.zip(&points.assignment)
		.map(|((color, n), &center)| {
			f64::from(n) * f64::from(squared_distance(color, centers.centroid[usize::from(center)]))
		})
		.sum();

	let centroids = centers.centroid.clone();
	let counts = centers.count[..centroids.len()].to_vec();

	centers.reset();
	points.reset();

	KmeansResult { variance, centroids, counts, iterations }
}

/// Take the trial with the lowest variance, preferring earlier trials on ties
fn best_trial(trials: impl IntoIterator<Item = KmeansResult>) -> KmeansResult {
	trials
		.into_iter()
		.min_by(|x, y| f64::total_cmp(&x.variance, &y.variance))
		.unwrap_or_else(KmeansResult::empty)
}

/// Run multiple trials of k-means, taking the trial with the lowest variance
#[cfg(not(feature = "threads"))]
fn run_trials(labs: &LabCounts, k: u8, options: &KmeansOptions) -> KmeansResult {
	let mut state = KmeansState::new(k, labs.num_colors());

	best_trial((0..options.trials).map(|i| {
		kmeans(
			labs,
			&mut state,
			k,
			options.max_iter,
			options.convergence_threshold,
			options.seed ^ u64::from(i),
		)
	}))
}

/// Run multiple trials of k-means in parallel, taking the trial with the lowest variance
#[cfg(feature = "threads")]
fn run_trials(labs: &LabCounts, k: u8, options: &KmeansOptions) -> KmeansResult {
	use rayon::prelude::*;

	let trials = (0..options.trials)
		.into_par_iter()
		.map_init(
			|| KmeansState::new(k, labs.num_colors()),
			|state, i| {
				kmeans(
					labs,
					state,
					k,
					options.max_iter,
					options.convergence_threshold,
					options.seed ^ u64::from(i),
				)
			},
		)
		.collect::<Vec<_>>();

	best_trial(trials)
}

/// Run multiple trials of k-means, taking the trial with the lowest variance
///
/// An empty result with no centroids is returned if `labs` is empty, `trials` = 0, or `k` = 0.
/// Otherwise, there are exactly `k` centroids as long as `labs` has at least `k` distinct colors.
#[must_use]
pub fn run(labs: &LabCounts, k: u8, options: &KmeansOptions) -> KmeansResult {
	if k == 0 || labs.colors.is_empty() {
		KmeansResult::empty()
	} else {
		run_trials(labs, k, options)
	}
}
