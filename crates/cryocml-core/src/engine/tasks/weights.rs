use nalgebra::Vector3;
use std::f64::consts::{PI, TAU};
use tracing::warn;

const DEFAULT_LATTICE_POINTS: usize = 1024;

/// Quasi-uniform points on the upper unit hemisphere (Fibonacci lattice), each
/// standing for an equal share of its area.
#[derive(Debug, Clone, PartialEq)]
pub struct HemisphereLattice {
    points: Vec<Vector3<f64>>,
}

impl HemisphereLattice {
    pub fn new(count: usize) -> Self {
        let golden_angle = PI * (3.0 - 5f64.sqrt());
        let points = (0..count)
            .map(|i| {
                let z = (i as f64 + 0.5) / count as f64;
                let r = (1.0 - z * z).sqrt();
                let (s, c) = (golden_angle * i as f64).sin_cos();
                Vector3::new(r * c, r * s, z)
            })
            .collect();
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Hemisphere area represented by one point.
    #[inline]
    pub fn cell_area(&self) -> f64 {
        TAU / self.points.len().max(1) as f64
    }

    /// Approximate spherical Voronoi area of every direction, with antipodes
    /// identified. Each lattice point goes to the direction with the largest
    /// `|cos|`; ties go to the lowest index.
    pub fn cell_areas(&self, directions: &[Vector3<f64>]) -> Vec<f64> {
        let mut areas = vec![0.0; directions.len()];
        if directions.is_empty() {
            return areas;
        }
        let cell = self.cell_area();
        for p in &self.points {
            let mut best = 0;
            let mut best_dot = f64::NEG_INFINITY;
            for (k, d) in directions.iter().enumerate() {
                let dot = p.dot(d).abs();
                if dot > best_dot {
                    best = k;
                    best_dot = dot;
                }
            }
            areas[best] += cell;
        }
        areas
    }
}

impl Default for HemisphereLattice {
    fn default() -> Self {
        Self::new(DEFAULT_LATTICE_POINTS)
    }
}

/// Per-pair weight of the common-line discrepancy.
#[derive(Debug, Clone, PartialEq)]
pub enum LineWeights {
    /// Weighting disabled: every pair counts once.
    Uniform,
    Voronoi(Vec<f64>),
}

impl LineWeights {
    pub fn compute(enabled: bool, directions: &[Vector3<f64>], lattice: &HemisphereLattice) -> Self {
        if enabled {
            LineWeights::Voronoi(pair_weights(directions, lattice))
        } else {
            LineWeights::Uniform
        }
    }

    #[inline]
    pub fn get(&self, pair: usize) -> f64 {
        match self {
            LineWeights::Uniform => 1.0,
            LineWeights::Voronoi(weights) => weights[pair],
        }
    }
}

/// Weights of the common lines from their angular density: `max - area` per line,
/// normalised to sum one, then squared. Densely sampled directions get the larger
/// weights. A zero raw sum falls back to `2 * pi / n` for every line.
pub fn pair_weights(directions: &[Vector3<f64>], lattice: &HemisphereLattice) -> Vec<f64> {
    let n = directions.len();
    if n == 0 {
        return Vec::new();
    }
    let areas = lattice.cell_areas(directions);
    let max = areas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let raw: Vec<f64> = areas.iter().map(|&a| max - a).collect();
    let sum: f64 = raw.iter().sum();
    if sum <= f64::EPSILON {
        warn!(lines = n, "Degenerate common-line geometry; using uniform weights.");
        return vec![TAU / n as f64; n];
    }
    raw.into_iter().map(|w| (w / sum).powi(2)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_covers_the_upper_hemisphere() {
        let lattice = HemisphereLattice::new(500);
        assert_eq!(lattice.len(), 500);
        for p in &lattice.points {
            assert!((p.norm() - 1.0).abs() < 1e-12);
            assert!(p.z > 0.0);
        }
        assert!((lattice.cell_area() * 500.0 - TAU).abs() < 1e-12);
    }

    #[test]
    fn cell_areas_partition_the_hemisphere() {
        let lattice = HemisphereLattice::default();
        let dirs = vec![Vector3::x(), Vector3::y(), Vector3::z(), -Vector3::z()];
        let areas = lattice.cell_areas(&dirs);
        assert!((areas.iter().sum::<f64>() - TAU).abs() < 1e-9);
        // -z is the antipode of z and loses every tie to it.
        assert_eq!(areas[3], 0.0);
        assert!(areas[2] > 0.0);
    }

    #[test]
    fn clustered_lines_outweigh_isolated_ones() {
        let lattice = HemisphereLattice::default();
        let dirs = vec![
            Vector3::z(),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.05, 0.0).normalize(),
            Vector3::new(1.0, -0.05, 0.0).normalize(),
        ];
        let w = pair_weights(&dirs, &lattice);
        assert_eq!(w[0], 0.0);
        for &v in &w[1..] {
            assert!(v > 0.0);
        }
    }

    #[test]
    fn single_line_falls_back_to_uniform_weight() {
        let lattice = HemisphereLattice::default();
        let w = pair_weights(&[Vector3::z()], &lattice);
        assert_eq!(w, vec![TAU]);
        assert!(pair_weights(&[], &lattice).is_empty());
    }

    #[test]
    fn disabled_weights_are_all_one() {
        let lattice = HemisphereLattice::new(64);
        let dirs = vec![Vector3::x(), Vector3::z()];
        let weights = LineWeights::compute(false, &dirs, &lattice);
        assert_eq!(weights, LineWeights::Uniform);
        assert_eq!(weights.get(0), 1.0);
        assert_eq!(weights.get(1), 1.0);
        assert!(matches!(
            LineWeights::compute(true, &dirs, &lattice),
            LineWeights::Voronoi(ref w) if w.len() == 2
        ));
    }
}
