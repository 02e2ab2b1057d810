//! # Line Segment Detection Module
//!
//! Progressive probabilistic Hough transform over a binary edge map. Edge
//! points are visited in a seeded pseudo-random order; every point votes for
//! all angle bins, and as soon as a bin reaches the vote threshold the line it
//! describes is walked in both directions through the edge map, tolerating
//! short gaps. Walked pixels are removed from the map so each edge pixel
//! contributes to at most one segment.

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing;

use super::types::{LineSegment, PreprocessingError};

/// Fixed-point precision used while walking along a candidate line.
const WALK_SHIFT: u32 = 16;

/// Seed for the point visiting order; fixed so detection is reproducible.
pub const DEFAULT_HOUGH_SEED: u64 = 0x0C2_5EED;

/// Tunable parameters for probabilistic Hough line detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    /// Distance resolution of the accumulator in pixels
    pub rho: f64,
    /// Angle resolution of the accumulator in degrees
    pub theta_degrees: f64,
    /// Minimum accumulator votes before a line is walked
    pub vote_threshold: u32,
    /// Minimum extent of a reported segment along x or y
    pub min_line_length: u32,
    /// Maximum run of missing edge pixels bridged while walking
    pub max_line_gap: u32,
    /// Seed for the point visiting order
    pub seed: u64,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta_degrees: 1.0,
            vote_threshold: 100,
            min_line_length: 100,
            max_line_gap: 5,
            seed: DEFAULT_HOUGH_SEED,
        }
    }
}

impl HoughParams {
    pub fn validate(&self) -> Result<(), PreprocessingError> {
        if self.rho <= 0.0 || !self.rho.is_finite() {
            return Err(PreprocessingError::InvalidParameter {
                name: "rho",
                message: format!("must be a positive number, got {}", self.rho),
            });
        }
        if self.theta_degrees.is_nan() || self.theta_degrees <= 0.0 || self.theta_degrees > 180.0 {
            return Err(PreprocessingError::InvalidParameter {
                name: "theta_degrees",
                message: format!("must be in (0, 180], got {}", self.theta_degrees),
            });
        }
        if self.vote_threshold == 0 {
            return Err(PreprocessingError::InvalidParameter {
                name: "vote_threshold",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EdgeState {
    Empty,
    Pending,
    Voted,
}

struct Accumulator {
    votes: Vec<i32>,
    trig: Vec<(f64, f64)>,
    num_rho: usize,
}

impl Accumulator {
    fn new(width: u32, height: u32, params: &HoughParams) -> Self {
        let theta = params.theta_degrees.to_radians();
        let num_angle = ((std::f64::consts::PI / theta).round() as usize).max(1);
        let num_rho = ((((width + height) * 2 + 1) as f64 / params.rho).round() as usize).max(1);
        let inverse_rho = 1.0 / params.rho;

        let trig = (0..num_angle)
            .map(|n| {
                let angle = n as f64 * theta;
                (angle.cos() * inverse_rho, angle.sin() * inverse_rho)
            })
            .collect();

        Self {
            votes: vec![0; num_angle * num_rho],
            trig,
            num_rho,
        }
    }

    fn bin(&self, n: usize, x: i32, y: i32) -> usize {
        let (cos, sin) = self.trig[n];
        let r = (x as f64 * cos + y as f64 * sin).round() as i64 + (self.num_rho as i64 - 1) / 2;
        n * self.num_rho + r.clamp(0, self.num_rho as i64 - 1) as usize
    }

    /// Adds the point's votes; returns the strongest angle bin and its count.
    fn vote(&mut self, x: i32, y: i32) -> (usize, i32) {
        let mut best = (0usize, i32::MIN);
        for n in 0..self.trig.len() {
            let bin = self.bin(n, x, y);
            self.votes[bin] += 1;
            if self.votes[bin] > best.1 {
                best = (n, self.votes[bin]);
            }
        }
        best
    }

    fn unvote(&mut self, x: i32, y: i32) {
        for n in 0..self.trig.len() {
            let bin = self.bin(n, x, y);
            self.votes[bin] -= 1;
        }
    }
}

/// Walks the image along one direction in fixed point, yielding pixel coordinates.
#[derive(Clone, Copy)]
struct LineWalk {
    x: i64,
    y: i64,
    dx: i64,
    dy: i64,
    steps_along_x: bool,
}

impl LineWalk {
    fn start(x: i32, y: i32, direction: (f64, f64)) -> Self {
        let (a, b) = direction;
        let one = 1i64 << WALK_SHIFT;
        let half = 1i64 << (WALK_SHIFT - 1);

        if a.abs() > b.abs() {
            Self {
                x: x as i64,
                y: ((y as i64) << WALK_SHIFT) + half,
                dx: if a > 0.0 { 1 } else { -1 },
                dy: (b * one as f64 / a.abs()).round() as i64,
                steps_along_x: true,
            }
        } else {
            Self {
                x: ((x as i64) << WALK_SHIFT) + half,
                y: y as i64,
                dx: (a * one as f64 / b.abs()).round() as i64,
                dy: if b > 0.0 { 1 } else { -1 },
                steps_along_x: false,
            }
        }
    }

    fn reversed(self) -> Self {
        Self {
            dx: -self.dx,
            dy: -self.dy,
            ..self
        }
    }

    fn pixel(&self) -> (i32, i32) {
        if self.steps_along_x {
            (self.x as i32, (self.y >> WALK_SHIFT) as i32)
        } else {
            ((self.x >> WALK_SHIFT) as i32, self.y as i32)
        }
    }

    fn advance(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
    }
}

/// Detects line segments in a binary edge map.
///
/// Any non-zero sample in `edges` is an edge point. Reported segments are
/// ordered so that `start.0 <= end.0`.
///
/// # Arguments
///
/// * `edges` - Edge map, non-zero samples are edge points
/// * `params` - Accumulator resolution, thresholds and seed
///
/// # Returns
///
/// Returns the detected segments in detection order (possibly empty)
pub fn detect_line_segments(
    edges: &image::GrayImage,
    params: &HoughParams,
) -> Result<Vec<LineSegment>, PreprocessingError> {
    params.validate()?;

    let start_time = std::time::Instant::now();
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::EmptyImage);
    }

    let w = width as i32;
    let h = height as i32;
    let index = |x: i32, y: i32| (y * w + x) as usize;

    let mut mask = vec![EdgeState::Empty; (width * height) as usize];
    let mut points: Vec<(i32, i32)> = Vec::new();
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel[0] != 0 {
            mask[index(x as i32, y as i32)] = EdgeState::Pending;
            points.push((x as i32, y as i32));
        }
    }

    let mut accumulator = Accumulator::new(width, height, params);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut segments = Vec::new();
    let vote_threshold = params.vote_threshold as i32;
    let min_length = params.min_line_length as i32;

    let mut remaining = points.len();
    while remaining > 0 {
        let pick = rng.random_range(0..remaining);
        let (px, py) = points[pick];
        points.swap(pick, remaining - 1);
        remaining -= 1;

        // Already consumed by an earlier segment
        if mask[index(px, py)] != EdgeState::Pending {
            continue;
        }

        mask[index(px, py)] = EdgeState::Voted;
        let (best_angle, best_votes) = accumulator.vote(px, py);
        if best_votes < vote_threshold {
            continue;
        }

        let (cos, sin) = accumulator.trig[best_angle];
        let forward = LineWalk::start(px, py, (-sin, cos));

        // Find the extent of the line in both directions
        let mut line_end = [(px, py); 2];
        for (k, end) in line_end.iter_mut().enumerate() {
            let mut walk = if k == 0 { forward } else { forward.reversed() };
            let mut gap = 0u32;
            loop {
                let (x, y) = walk.pixel();
                if x < 0 || x >= w || y < 0 || y >= h {
                    break;
                }
                if mask[index(x, y)] != EdgeState::Empty {
                    gap = 0;
                    *end = (x, y);
                } else {
                    gap += 1;
                    if gap > params.max_line_gap {
                        break;
                    }
                }
                walk.advance();
            }
        }

        let good_line = (line_end[1].0 - line_end[0].0).abs() >= min_length
            || (line_end[1].1 - line_end[0].1).abs() >= min_length;

        // Clear the walked pixels, returning their votes when the line is kept
        for (k, end) in line_end.iter().enumerate() {
            let mut walk = if k == 0 { forward } else { forward.reversed() };
            loop {
                let (x, y) = walk.pixel();
                if x < 0 || x >= w || y < 0 || y >= h {
                    break;
                }
                let cell = &mut mask[index(x, y)];
                if *cell != EdgeState::Empty {
                    if good_line && *cell == EdgeState::Voted {
                        accumulator.unvote(x, y);
                    }
                    *cell = EdgeState::Empty;
                }
                if (x, y) == *end {
                    break;
                }
                walk.advance();
            }
        }

        if good_line {
            let (start, end) = if line_end[0].0 <= line_end[1].0 {
                (line_end[0], line_end[1])
            } else {
                (line_end[1], line_end[0])
            };
            segments.push(LineSegment::new(start, end));
        }
    }

    tracing::debug!(
        target: "ocr_preprocessing",
        "Line segment detection completed in {:.2}ms: {} segments on {}x{} edge map",
        start_time.elapsed().as_millis(),
        segments.len(),
        width,
        height
    );

    Ok(segments)
}
