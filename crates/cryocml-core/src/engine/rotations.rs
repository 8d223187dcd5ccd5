use super::state::{Orientation, OrientationSet};
use crate::core::geometry::rotation_from_euler;
use nalgebra::Matrix3;

/// Rotation matrix of every projection, kept in step with the orientation set.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationCache {
    rotations: Vec<Matrix3<f64>>,
}

impl RotationCache {
    pub fn from_orientations(orientations: &OrientationSet) -> Self {
        Self {
            rotations: orientations
                .iter()
                .map(|o| rotation_from_euler(o.phi, o.theta, o.psi))
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &Matrix3<f64> {
        &self.rotations[index]
    }

    pub fn as_slice(&self) -> &[Matrix3<f64>] {
        &self.rotations
    }

    pub fn update(&mut self, index: usize, orientation: &Orientation) {
        self.rotations[index] =
            rotation_from_euler(orientation.phi, orientation.theta, orientation.psi);
    }
}
