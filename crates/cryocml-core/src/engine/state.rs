use crate::core::projection::ProjectionParams;
use std::fmt;

/// Euler angles of one projection and the candidate slot it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
    pub slot: Option<usize>,
}

impl Orientation {
    pub fn new(phi: f64, theta: f64, psi: f64, slot: Option<usize>) -> Self {
        Self {
            phi,
            theta,
            psi,
            slot,
        }
    }

    pub fn from_params(params: &ProjectionParams) -> Self {
        Self::new(params.phi, params.theta, params.psi, None)
    }
}

/// One orientation per projection, in stack order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrientationSet {
    orientations: Vec<Orientation>,
}

impl OrientationSet {
    /// `n` projections with no prior: angles `-1` and no slot.
    pub fn unassigned(n: usize) -> Self {
        Self {
            orientations: vec![Orientation::new(-1.0, -1.0, -1.0, None); n],
        }
    }

    pub fn from_vec(orientations: Vec<Orientation>) -> Self {
        Self { orientations }
    }

    pub fn from_params(params: &[ProjectionParams]) -> Self {
        Self {
            orientations: params.iter().map(Orientation::from_params).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.orientations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orientations.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &Orientation {
        &self.orientations[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, orientation: Orientation) {
        self.orientations[index] = orientation;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Orientation> {
        self.orientations.iter()
    }

    pub fn as_slice(&self) -> &[Orientation] {
        &self.orientations
    }

    /// Flat layout of four values per projection: `phi, theta, psi, slot`, with an
    /// unassigned slot written as `-1`.
    pub fn to_flat(&self) -> Vec<f64> {
        self.orientations
            .iter()
            .flat_map(|o| {
                let slot = o.slot.map_or(-1.0, |s| s as f64);
                [o.phi, o.theta, o.psi, slot]
            })
            .collect()
    }

    /// Inverse of [`to_flat`](Self::to_flat). Returns `None` if the length is not a
    /// multiple of four.
    pub fn from_flat(flat: &[f64]) -> Option<Self> {
        if flat.len() % 4 != 0 {
            return None;
        }
        let orientations = flat
            .chunks_exact(4)
            .map(|c| {
                let slot = (c[3] >= 0.0).then_some(c[3] as usize);
                Orientation::new(c[0], c[1], c[2], slot)
            })
            .collect();
        Some(Self { orientations })
    }

    pub fn to_params(&self) -> Vec<ProjectionParams> {
        self.orientations
            .iter()
            .map(|o| ProjectionParams::angles(o.phi, o.theta, o.psi))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An iteration finished without changing any orientation.
    Converged,
    /// The iteration limit was reached.
    IterationLimit,
    /// The discrepancy oscillated with period two.
    Unstable,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Converged => "converged",
            StopReason::IterationLimit => "iteration limit reached",
            StopReason::Unstable => "unstable solution",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub orientations: OrientationSet,
    pub discrepancy: f64,
    pub iterations: usize,
    pub stop_reason: StopReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_layout_has_four_values_per_projection() {
        let set = OrientationSet::from_vec(vec![
            Orientation::new(10.0, 20.0, 30.0, Some(4)),
            Orientation::new(1.0, 2.0, 3.0, None),
        ]);
        let flat = set.to_flat();
        assert_eq!(flat.len(), 4 * set.len());
        assert_eq!(flat, vec![10.0, 20.0, 30.0, 4.0, 1.0, 2.0, 3.0, -1.0]);
        assert_eq!(OrientationSet::from_flat(&flat), Some(set));
    }

    #[test]
    fn from_flat_rejects_ragged_input() {
        assert!(OrientationSet::from_flat(&[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn unassigned_set_uses_negative_angles() {
        let set = OrientationSet::unassigned(2);
        assert_eq!(set.to_flat(), vec![-1.0; 8]);
    }

    #[test]
    fn priors_start_unassigned() {
        let params = vec![ProjectionParams::new(5.0, 6.0, 7.0, 1.0, 1.0)];
        let set = OrientationSet::from_params(&params);
        assert_eq!(set.get(0).slot, None);
        assert_eq!(set.to_params()[0], ProjectionParams::angles(5.0, 6.0, 7.0));
    }
}
