use crate::core::angles::Symmetry;
use crate::core::image::Volume;
use crate::core::projection::extract::Section;
use crate::core::projection::{
    InterpolationMethod, PreparedVolume, Projection, ProjectionParams, SectionOutput,
    prepare_volume, project_gridding, project_real_space, project_section,
    reference_projections,
};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::fmt;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Padding factor used for every interpolation method.
pub const DEFAULT_PADDING: usize = 2;

/// Which projections to generate.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionRequest {
    /// One projection per parameter set, in order.
    Explicit(Vec<ProjectionParams>),
    /// Quasi-even directions over the asymmetric unit of a cyclic symmetry.
    Reference { delta: f64, symmetry: Symmetry },
}

/// How projections are computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projector {
    /// Central sections of the prepared volume's spectrum.
    Fourier(InterpolationMethod),
    /// Trilinear ray sums inside a sphere; a `radius` of zero or less selects
    /// `n / 2 - 1`.
    RealSpace { radius: f64 },
}

impl fmt::Display for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projector::Fourier(method) => write!(f, "{} interpolation", method),
            Projector::RealSpace { radius } if *radius > 0.0 => {
                write!(f, "real-space ray sums within radius {}", radius)
            }
            Projector::RealSpace { .. } => f.write_str("real-space ray sums"),
        }
    }
}

fn project_one(
    prepared: &PreparedVolume,
    params: &ProjectionParams,
) -> Result<Projection, EngineError> {
    match prepared.method() {
        InterpolationMethod::Gridding => Ok(project_gridding(prepared, params)?),
        _ => match project_section(prepared, params, SectionOutput::Real)? {
            Section::Real(projection) => Ok(projection),
            Section::Fourier { .. } => Err(EngineError::Internal(
                "real-space section requested, Fourier section returned".to_string(),
            )),
        },
    }
}

/// Prepares `volume` once and projects it at every parameter set.
pub fn project_many(
    volume: &Volume,
    params: &[ProjectionParams],
    method: InterpolationMethod,
    reporter: &ProgressReporter,
) -> Result<Vec<Projection>, EngineError> {
    let prepared = prepare_volume(volume, DEFAULT_PADDING, method)?;
    reporter.report(Progress::TaskStart {
        total_steps: params.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = params.iter();

    #[cfg(feature = "parallel")]
    let iterator = params.par_iter();

    let projections = iterator
        .map(|p| {
            let projection = project_one(&prepared, p);
            reporter.report(Progress::TaskIncrement);
            projection
        })
        .collect::<Result<Vec<_>, _>>()?;

    reporter.report(Progress::TaskFinish);
    Ok(projections)
}

/// Real-space projection of `volume` at every parameter set.
pub fn project_many_real_space(
    volume: &Volume,
    params: &[ProjectionParams],
    radius: f64,
    reporter: &ProgressReporter,
) -> Result<Vec<Projection>, EngineError> {
    reporter.report(Progress::TaskStart {
        total_steps: params.len() as u64,
    });
    let projections = params
        .iter()
        .map(|p| {
            let projection = project_real_space(volume, p, radius);
            reporter.report(Progress::TaskIncrement);
            projection
        })
        .collect::<Result<Vec<_>, _>>()?;
    reporter.report(Progress::TaskFinish);
    Ok(projections)
}

#[instrument(skip_all, name = "projection_workflow")]
pub fn run(
    volume: &Volume,
    request: &ProjectionRequest,
    projector: Projector,
    reporter: &ProgressReporter,
) -> Result<Vec<Projection>, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Projection" });
    info!(dims = ?volume.dims(), %projector, "Projecting volume.");

    let projections = match (request, projector) {
        (ProjectionRequest::Explicit(params), Projector::Fourier(method)) => {
            project_many(volume, params, method, reporter)?
        }
        (ProjectionRequest::Explicit(params), Projector::RealSpace { radius }) => {
            project_many_real_space(volume, params, radius, reporter)?
        }
        (
            ProjectionRequest::Reference { delta, symmetry },
            Projector::Fourier(InterpolationMethod::Gridding),
        ) => {
            let prepared = prepare_volume(volume, DEFAULT_PADDING, InterpolationMethod::Gridding)?;
            reference_projections(&prepared, *delta, *symmetry)?
        }
        (ProjectionRequest::Reference { .. }, other) => {
            return Err(EngineError::Initialization(format!(
                "reference projections use gridding interpolation, not {}",
                other
            )));
        }
    };

    reporter.report(Progress::PhaseFinish);
    info!(count = projections.len(), "Projection finished.");
    Ok(projections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn blob() -> Volume {
        Volume::from_fn(12, 12, 12, |x, y, z| {
            let d = |v: usize| v as f64 - 6.0;
            (-(d(x).powi(2) + d(y).powi(2) + d(z).powi(2)) / 6.0).exp()
        })
    }

    #[test]
    fn explicit_request_keeps_the_order_and_reports_each_step() {
        let increments = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if matches!(event, Progress::TaskIncrement) {
                increments.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let params = vec![
            ProjectionParams::angles(0.0, 0.0, 0.0),
            ProjectionParams::new(30.0, 60.0, 10.0, 1.0, -2.0),
        ];
        let out = run(
            &blob(),
            &ProjectionRequest::Explicit(params.clone()),
            Projector::Fourier(InterpolationMethod::Gridding),
            &reporter,
        )
        .unwrap();
        drop(reporter);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].params.phi, 30.0);
        assert_eq!(out[1].params.sx, -1.0);
        assert_eq!(out[0].image.nx(), 12);
        assert_eq!(increments.into_inner(), 2);
    }

    #[test]
    fn trilinear_projection_goes_through_the_section_path() {
        let out = project_many(
            &blob(),
            &[ProjectionParams::angles(10.0, 20.0, 30.0)],
            InterpolationMethod::Trilinear,
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(out[0].image.ny(), 12);
    }

    #[test]
    fn reference_request_requires_gridding() {
        let request = ProjectionRequest::Reference {
            delta: 45.0,
            symmetry: Symmetry::default(),
        };
        for projector in [
            Projector::Fourier(InterpolationMethod::NearestNeighbor),
            Projector::RealSpace { radius: 0.0 },
        ] {
            assert!(matches!(
                run(&blob(), &request, projector, &ProgressReporter::new()),
                Err(EngineError::Initialization(_))
            ));
        }
        let refs = run(
            &blob(),
            &request,
            Projector::Fourier(InterpolationMethod::Gridding),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(!refs.is_empty());
    }

    #[test]
    fn real_space_projector_masks_outside_the_radius() {
        let params = vec![
            ProjectionParams::angles(0.0, 0.0, 0.0),
            ProjectionParams::new(40.0, 70.0, 15.0, 1.0, 0.0),
        ];
        let out = run(
            &blob(),
            &ProjectionRequest::Explicit(params),
            Projector::RealSpace { radius: 3.0 },
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].image.get(6, 0), 0.0);
        assert!(out[0].image.get(6, 6) > 0.0);
        assert_eq!(out[1].params.sx, -1.0);
        assert_eq!(
            Projector::RealSpace { radius: 3.0 }.to_string(),
            "real-space ray sums within radius 3"
        );
    }
}
