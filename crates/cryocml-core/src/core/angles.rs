use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SymmetryParseError {
    #[error("Unsupported symmetry '{0}': expected a cyclic group such as 'c1' or 'c4'")]
    Unsupported(String),
}

/// Point-group symmetry of the reconstructed object. Only cyclic groups are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    Cyclic(u32),
}

impl Default for Symmetry {
    fn default() -> Self {
        Symmetry::Cyclic(1)
    }
}

impl Symmetry {
    #[inline]
    pub fn fold(&self) -> u32 {
        match self {
            Symmetry::Cyclic(n) => *n,
        }
    }
}

impl FromStr for Symmetry {
    type Err = SymmetryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        lower
            .strip_prefix('c')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|&n| n >= 1)
            .map(Symmetry::Cyclic)
            .ok_or_else(|| SymmetryParseError::Unsupported(s.to_string()))
    }
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symmetry::Cyclic(n) => write!(f, "c{}", n),
        }
    }
}

/// How the in-plane angle of generated directions is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PsiMode {
    #[default]
    Zero,
    /// `psi = -phi`, wrapped into `[0, 360)`.
    MinusPhi,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleRange {
    pub theta: (f64, f64),
    pub phi: (f64, f64),
}

impl Default for AngleRange {
    fn default() -> Self {
        Self {
            theta: (0.0, 179.9),
            phi: (0.0, 359.9),
        }
    }
}

/// Quasi-uniform directions on the sphere: theta rings spaced by `delta`, each ring
/// with a phi step of roughly `delta / sin(theta)`.
///
/// Returns `[phi, theta, psi]` triples in degrees.
pub fn even_angles(delta: f64, range: AngleRange, psi_mode: PsiMode) -> Vec<[f64; 3]> {
    let (t1, t2) = range.theta;
    let (p1, p2) = range.phi;
    let mut angles = Vec::new();
    if delta <= 0.0 || t2 < t1 {
        return angles;
    }
    let skip_equator_back = t1 < 90.0 && t2 == 90.0 && p1 == 0.0 && p2 > 180.0;
    let rings = ((t2 - t1) / delta + 1e-9).floor() as usize;

    for ring in 0..=rings {
        let theta = t1 + ring as f64 * delta;
        let steps = if theta == 0.0 || theta == 180.0 {
            1
        } else {
            let raw = delta / theta.to_radians().sin();
            (((p2 - p1) / raw) as i64 - 1).max(1) as usize
        };
        let detphi = (p2 - p1) / steps as f64;
        for k in 0..steps {
            let phi = p1 + k as f64 * detphi;
            if skip_equator_back && theta == 90.0 && phi > 180.0 {
                continue;
            }
            let psi = match psi_mode {
                PsiMode::Zero => 0.0,
                PsiMode::MinusPhi => (720.0 - phi) % 360.0,
            };
            angles.push([phi, theta, psi]);
        }
    }
    angles
}

/// Reference directions for a cyclic symmetry: the upper hemisphere with the phi
/// range divided by the symmetry fold, `psi = -phi`.
pub fn symmetric_even_angles(delta: f64, symmetry: Symmetry) -> Vec<[f64; 3]> {
    let range = AngleRange {
        theta: (0.0, 90.0),
        phi: (0.0, 359.99 / symmetry.fold() as f64),
    };
    even_angles(delta, range, PsiMode::MinusPhi)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateAngle {
    pub phi: f64,
    pub theta: f64,
}

/// The fixed, ordered list of projection directions a search may assign.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateAngles {
    angles: Vec<CandidateAngle>,
}

impl CandidateAngles {
    pub fn even(delta: f64) -> Self {
        Self::from_triples(&even_angles(delta, AngleRange::default(), PsiMode::Zero))
    }

    pub fn from_triples(triples: &[[f64; 3]]) -> Self {
        Self {
            angles: triples
                .iter()
                .map(|t| CandidateAngle {
                    phi: t[0],
                    theta: t[1],
                })
                .collect(),
        }
    }

    pub fn from_vec(angles: Vec<CandidateAngle>) -> Self {
        Self { angles }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.angles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&CandidateAngle> {
        self.angles.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateAngle> {
        self.angles.iter()
    }
}
