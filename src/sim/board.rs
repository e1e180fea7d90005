//! Board layout: a triangular peg field above a row of equal buckets
//!
//! The board is a pure function of the canvas size and the board tuning.
//! It is rebuilt on every resize and never mutated afterwards.

use std::ops::Range;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::DropError;
use crate::tuning::BoardTuning;

/// One-based bucket index, always in `1..=BUCKET_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BucketIndex(u8);

impl BucketIndex {
    pub fn new(index: u32) -> Result<Self, DropError> {
        if (1..=BUCKET_COUNT as u32).contains(&index) {
            Ok(Self(index as u8))
        } else {
            Err(DropError::InvalidTarget(index))
        }
    }

    /// Uniform draw over all buckets
    pub fn random(rng: &mut impl Rng) -> Self {
        Self(rng.random_range(1..=BUCKET_COUNT as u8))
    }

    /// Every bucket, left to right
    pub fn all() -> impl Iterator<Item = BucketIndex> {
        (1..=BUCKET_COUNT as u8).map(BucketIndex)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn zero_based(self) -> usize {
        self.0 as usize - 1
    }

    /// Leftmost or rightmost bucket
    pub fn is_edge(self) -> bool {
        self.0 == 1 || self.0 as usize == BUCKET_COUNT
    }
}

impl TryFrom<u32> for BucketIndex {
    type Error = DropError;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<BucketIndex> for u32 {
    fn from(index: BucketIndex) -> Self {
        index.get()
    }
}

impl std::fmt::Display for BucketIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fixed peg
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peg {
    pub pos: Vec2,
    pub radius: f32,
    pub row: u16,
    pub column: u16,
}

/// A catch slot at the bottom of the board
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub index: BucketIndex,
    pub left: f32,
    pub right: f32,
    pub top_y: f32,
    pub height: f32,
}

impl Bucket {
    #[inline]
    pub fn center_x(&self) -> f32 {
        (self.left + self.right) * 0.5
    }

    #[inline]
    pub fn half_width(&self) -> f32 {
        (self.right - self.left) * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Horizontal span with `margin_ratio` of the width trimmed from each side
    pub fn inner_span(&self, margin_ratio: f32) -> (f32, f32) {
        let margin = self.width() * margin_ratio;
        (self.left + margin, self.right - margin)
    }

    /// Strictly inside the span left after trimming the safety margin
    pub fn holds(&self, x: f32, margin_ratio: f32) -> bool {
        let (lo, hi) = self.inner_span(margin_ratio);
        x > lo && x < hi
    }
}

/// Pegs and buckets for one canvas size
#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub width: f32,
    pub height: f32,
    /// Horizontal distance between neighbouring pegs in a row
    pub spacing: f32,
    /// Vertical distance between rows
    pub row_spacing: f32,
    pub first_row_y: f32,
    pub peg_radius: f32,
    pub ball_radius: f32,
    /// Row-major, left to right inside a row
    pub pegs: Vec<Peg>,
    pub buckets: Vec<Bucket>,
    /// Index range into `pegs` for each row
    #[serde(skip)]
    rows: Vec<Range<usize>>,
}

/// Pegs in row `row` of a field with `rows` rows widening to `max_row_pegs`
pub fn pegs_in_row(row: u32, rows: u32, max_row_pegs: u32) -> u32 {
    let max_row_pegs = max_row_pegs.max(1);
    if rows <= 1 {
        return 1;
    }
    let t = row as f32 / (rows - 1) as f32;
    let count = (1.0 + t * (max_row_pegs - 1) as f32).round() as u32;
    count.clamp(1, max_row_pegs)
}

impl Board {
    /// Lay out pegs and buckets for a canvas. Never fails: degenerate sizes
    /// are clamped so spacing stays positive.
    pub fn layout(width: f32, height: f32, tuning: &BoardTuning) -> Self {
        let width = sanitize_dimension(width);
        let height = sanitize_dimension(height);

        let rows = tuning.peg_rows.max(2);
        let max_row_pegs = tuning.max_row_pegs.max(1);
        let first_row_y = height * tuning.top_margin;
        let bucket_top = height * tuning.bucket_margin_top;

        // Widest row fits the canvas, and the field fits above the buckets
        let fit_width = width / (max_row_pegs + 1) as f32;
        let field_rows = (rows - 1) as f32 * ROW_HEIGHT_RATIO + BOTTOM_CLEARANCE_ROWS;
        let fit_height = (bucket_top - first_row_y).max(0.0) / field_rows;
        let spacing = fit_width.min(fit_height).max(MIN_PEG_SPACING);
        let row_spacing = spacing * ROW_HEIGHT_RATIO;

        let bucket_width = width / BUCKET_COUNT as f32;
        let peg_radius = spacing * tuning.peg_radius_ratio;
        let ball_radius = (spacing * tuning.ball_radius_ratio)
            .min(bucket_width * 0.25)
            .max(0.5);

        let center_x = width * 0.5;
        let mut pegs = Vec::new();
        let mut row_ranges = Vec::with_capacity(rows as usize);
        for row in 0..rows {
            let count = pegs_in_row(row, rows, max_row_pegs);
            let y = first_row_y + row as f32 * row_spacing;
            let row_start = center_x - (count - 1) as f32 * spacing * 0.5;
            let begin = pegs.len();
            for column in 0..count {
                pegs.push(Peg {
                    pos: Vec2::new(row_start + column as f32 * spacing, y),
                    radius: peg_radius,
                    row: row as u16,
                    column: column as u16,
                });
            }
            row_ranges.push(begin..pegs.len());
        }

        let bucket_height = height * tuning.bucket_depth_ratio;
        let edge = |i: usize| {
            if i == BUCKET_COUNT {
                width
            } else {
                width * i as f32 / BUCKET_COUNT as f32
            }
        };
        let buckets = BucketIndex::all()
            .map(|index| {
                let i = index.zero_based();
                Bucket {
                    index,
                    left: edge(i),
                    right: edge(i + 1),
                    top_y: bucket_top,
                    height: bucket_height,
                }
            })
            .collect();

        log::debug!(
            "Board {}x{}: {} pegs, spacing {:.1}, ball radius {:.1}",
            width,
            height,
            pegs.len(),
            spacing,
            ball_radius
        );

        Self {
            width,
            height,
            spacing,
            row_spacing,
            first_row_y,
            peg_radius,
            ball_radius,
            pegs,
            buckets,
            rows: row_ranges,
        }
    }

    #[inline]
    pub fn bucket(&self, index: BucketIndex) -> &Bucket {
        &self.buckets[index.zero_based()]
    }

    /// y of the bucket line (all buckets share it)
    #[inline]
    pub fn bucket_top(&self) -> f32 {
        self.buckets[0].top_y
    }

    /// Bucket whose span contains `x`; positions past the walls belong to the edge buckets
    pub fn bucket_at(&self, x: f32) -> BucketIndex {
        let bucket_width = self.width / BUCKET_COUNT as f32;
        let slot = if x.is_nan() || x <= 0.0 {
            0
        } else {
            ((x / bucket_width) as usize).min(BUCKET_COUNT - 1)
        };
        BucketIndex(slot as u8 + 1)
    }

    pub fn diagonal(&self) -> f32 {
        Vec2::new(self.width, self.height).length()
    }

    /// Pegs (with their index into `pegs`) in rows close enough to `pos` to
    /// touch a circle of radius `reach`, in row-major order
    pub fn pegs_near(&self, pos: Vec2, reach: f32) -> impl Iterator<Item = (usize, &Peg)> {
        let rows = self.rows.len();
        let reach = reach + self.peg_radius;
        let lo = ((pos.y - reach - self.first_row_y) / self.row_spacing).floor();
        let hi = ((pos.y + reach - self.first_row_y) / self.row_spacing).ceil();
        let first = lo.max(0.0) as usize;
        let last = if hi < 0.0 { 0 } else { (hi as usize + 1).min(rows) };
        let span = if first < last {
            self.rows[first].start..self.rows[last - 1].end
        } else {
            0..0
        };
        let offset = span.start;
        self.pegs[span]
            .iter()
            .enumerate()
            .map(move |(i, peg)| (offset + i, peg))
    }

    /// Keep a start point inside the walls and above the bucket line
    pub fn clamp_start(&self, pos: Vec2) -> Vec2 {
        let r = self.ball_radius;
        let half = self.width * 0.5;
        let x_lo = r.min(half);
        let x_hi = (self.width - r).max(half);
        let top = self.bucket_top();
        let y_hi = (top - r).max(top * 0.5);
        let x = if pos.x.is_nan() { half } else { pos.x.clamp(x_lo, x_hi) };
        let y = if pos.y.is_nan() { 0.0 } else { pos.y.clamp(0.0, y_hi) };
        Vec2::new(x, y)
    }
}

fn sanitize_dimension(value: f32) -> f32 {
    if value.is_finite() {
        value.max(MIN_CANVAS_DIMENSION)
    } else {
        MIN_CANVAS_DIMENSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        Board::layout(800.0, 1040.0, &BoardTuning::default())
    }

    #[test]
    fn test_pegs_in_row_widens_then_clamps() {
        assert_eq!(pegs_in_row(0, 12, 12), 1);
        assert_eq!(pegs_in_row(11, 12, 12), 12);
        let counts: Vec<u32> = (0..12).map(|r| pegs_in_row(r, 12, 12)).collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(pegs_in_row(5, 1, 12), 1);
    }

    #[test]
    fn test_rows_are_centered() {
        let board = board();
        for range in &board.rows {
            let row = &board.pegs[range.clone()];
            let mid = (row[0].pos.x + row[row.len() - 1].pos.x) * 0.5;
            assert!((mid - board.width * 0.5).abs() < 1e-3);
        }
    }

    #[test]
    fn test_row_spacing_is_equilateral() {
        let board = board();
        assert!((board.row_spacing - board.spacing * 3f32.sqrt() / 2.0).abs() < 1e-3);
        assert!((board.first_row_y - 1040.0 * 0.08).abs() < 1e-3);
    }

    #[test]
    fn test_pegs_stay_above_buckets_and_inside_walls() {
        let board = board();
        for peg in &board.pegs {
            assert!(peg.pos.y + peg.radius < board.bucket_top());
            assert!(peg.pos.x - peg.radius > 0.0);
            assert!(peg.pos.x + peg.radius < board.width);
        }
    }

    #[test]
    fn test_buckets_partition_width() {
        let board = board();
        assert_eq!(board.buckets.len(), BUCKET_COUNT);
        assert_eq!(board.buckets[0].left, 0.0);
        assert_eq!(board.buckets[BUCKET_COUNT - 1].right, 800.0);
        for pair in board.buckets.windows(2) {
            assert_eq!(pair[0].right, pair[1].left);
        }
        assert!((board.bucket(BucketIndex::new(1).unwrap()).width() - 160.0).abs() < 1e-3);
        assert!((board.bucket_top() - 1040.0 * 0.84).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_sizes_clamp() {
        for (w, h) in [(0.0, 0.0), (-5.0, 10.0), (f32::NAN, f32::INFINITY), (3.0, 2.0)] {
            let board = Board::layout(w, h, &BoardTuning::default());
            assert!(board.width >= MIN_CANVAS_DIMENSION);
            assert!(board.height >= MIN_CANVAS_DIMENSION);
            assert!(board.spacing >= MIN_PEG_SPACING);
            assert!(board.row_spacing > 0.0);
            assert!(board.ball_radius > 0.0);
        }
    }

    #[test]
    fn test_bucket_at() {
        let board = board();
        assert_eq!(board.bucket_at(-10.0).get(), 1);
        assert_eq!(board.bucket_at(80.0).get(), 1);
        assert_eq!(board.bucket_at(400.0).get(), 3);
        assert_eq!(board.bucket_at(799.0).get(), 5);
        assert_eq!(board.bucket_at(900.0).get(), 5);
    }

    #[test]
    fn test_bucket_index_bounds() {
        assert!(BucketIndex::new(0).is_err());
        assert!(BucketIndex::new(6).is_err());
        assert_eq!(BucketIndex::new(3).unwrap().zero_based(), 2);
        assert!(BucketIndex::new(1).unwrap().is_edge());
        assert!(BucketIndex::new(5).unwrap().is_edge());
        assert!(!BucketIndex::new(3).unwrap().is_edge());
        assert_eq!(BucketIndex::all().count(), BUCKET_COUNT);
    }

    #[test]
    fn test_pegs_near_matches_brute_force() {
        let board = board();
        let reach = board.ball_radius;
        for y in [0.0, 90.0, 300.0, 612.5, 700.0, 900.0] {
            for x in [50.0, 400.0, 733.0] {
                let pos = Vec2::new(x, y);
                let near: Vec<_> = board.pegs_near(pos, reach).map(|(_, p)| (p.row, p.column)).collect();
                for peg in &board.pegs {
                    if peg.pos.distance(pos) < reach + peg.radius {
                        assert!(near.contains(&(peg.row, peg.column)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_clamp_start() {
        let board = board();
        let p = board.clamp_start(Vec2::new(-50.0, 2000.0));
        assert!(p.x >= board.ball_radius);
        assert!(p.y < board.bucket_top());
        let inside = Vec2::new(400.0, 30.0);
        assert_eq!(board.clamp_start(inside), inside);
    }
}
