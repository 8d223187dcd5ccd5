use crate::cli::ProjectArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use cryocml::core::image::Image2D;
use cryocml::core::io::mrc::{read_volume, write_stack};
use cryocml::core::io::params::{read_params, write_params};
use cryocml::core::projection::ProjectionParams;
use cryocml::engine::progress::ProgressReporter;
use cryocml::workflows::{self, project::ProjectionRequest};
use std::path::PathBuf;
use tracing::info;

fn request_from_args(args: &ProjectArgs) -> Result<ProjectionRequest> {
    match (&args.angles.params, args.angles.reference_delta) {
        (Some(path), _) => {
            info!("Loading projection parameters from {:?}", path);
            let params = read_params(path).map_err(|e| CliError::params(path, e))?;
            if params.is_empty() {
                return Err(CliError::Argument(format!(
                    "Parameter file {} lists no projections.",
                    path.display()
                )));
            }
            Ok(ProjectionRequest::Explicit(params))
        }
        (None, Some(delta)) => {
            if !(delta > 0.0 && delta <= 90.0) {
                return Err(CliError::Argument(format!(
                    "--reference-delta must lie in (0, 90], got {}",
                    delta
                )));
            }
            Ok(ProjectionRequest::Reference {
                delta,
                symmetry: args.symmetry,
            })
        }
        (None, None) => Err(CliError::Argument(
            "either --params or --reference-delta is required".to_string(),
        )),
    }
}

fn params_path(output: &std::path::Path) -> PathBuf {
    output.with_extension("csv")
}

pub fn run(args: ProjectArgs) -> Result<()> {
    let request = request_from_args(&args)?;
    let projector = args.method.projector(args.radius);

    info!("Loading volume from {:?}", &args.input);
    let volume = read_volume(&args.input).map_err(|e| CliError::mrc(&args.input, e))?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Projecting volume with {}...", projector);
    let projections = workflows::project::run(&volume, &request, projector, &reporter)?;

    let (images, params): (Vec<Image2D>, Vec<ProjectionParams>) = projections
        .into_iter()
        .map(|p| (p.image, p.params))
        .unzip();

    write_stack(&args.output, &images).map_err(|e| CliError::mrc(&args.output, e))?;
    let params_out = params_path(&args.output);
    write_params(&params_out, &params).map_err(|e| CliError::params(&params_out, e))?;

    println!(
        "✓ {} projection(s) written to: {}",
        images.len(),
        args.output.display()
    );
    println!("  Parameters written to: {}", params_out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use cryocml::core::image::Volume;
    use cryocml::core::io::mrc::{read_stack, write_volume};

    fn project_args(argv: &[String]) -> ProjectArgs {
        let mut full = vec!["cryocml".to_string(), "project".to_string()];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Project(args) => args,
            _ => panic!("Expected 'project' subcommand"),
        }
    }

    fn write_blob(path: &std::path::Path) {
        let volume = Volume::from_fn(10, 10, 10, |x, y, z| {
            let d = |v: usize| v as f64 - 5.0;
            (-(d(x).powi(2) + 2.0 * d(y).powi(2) + d(z).powi(2)) / 5.0).exp()
        });
        write_volume(path, &volume).unwrap();
    }

    #[test]
    fn explicit_parameters_produce_an_annotated_stack() {
        let dir = tempfile::tempdir().unwrap();
        let volume = dir.path().join("vol.mrc");
        write_blob(&volume);
        let angles = dir.path().join("angles.csv");
        write_params(
            &angles,
            &[
                ProjectionParams::angles(0.0, 0.0, 0.0),
                ProjectionParams::new(45.0, 90.0, 0.0, 1.0, 0.0),
            ],
        )
        .unwrap();
        let output = dir.path().join("prj.mrc");

        run(project_args(&[
            "-i".into(),
            volume.to_string_lossy().into(),
            "-o".into(),
            output.to_string_lossy().into(),
            "--params".into(),
            angles.to_string_lossy().into(),
        ]))
        .unwrap();

        assert_eq!(read_stack(&output).unwrap().len(), 2);
        let written = read_params(&dir.path().join("prj.csv")).unwrap();
        assert_eq!(written[1].phi, 45.0);
        assert_eq!(written[1].sx, -1.0);
    }

    #[test]
    fn real_space_method_writes_masked_projections() {
        let dir = tempfile::tempdir().unwrap();
        let volume = dir.path().join("vol.mrc");
        write_blob(&volume);
        let angles = dir.path().join("angles.csv");
        write_params(&angles, &[ProjectionParams::angles(0.0, 0.0, 0.0)]).unwrap();
        let output = dir.path().join("rs.mrc");

        run(project_args(&[
            "-i".into(),
            volume.to_string_lossy().into(),
            "-o".into(),
            output.to_string_lossy().into(),
            "--params".into(),
            angles.to_string_lossy().into(),
            "-m".into(),
            "real-space".into(),
            "-r".into(),
            "2".into(),
        ]))
        .unwrap();

        let stack = read_stack(&output).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].get(5, 0), 0.0);
        assert!(stack[0].get(5, 5) > 0.0);
    }

    #[test]
    fn reference_directions_use_the_requested_step() {
        let dir = tempfile::tempdir().unwrap();
        let volume = dir.path().join("vol.mrc");
        write_blob(&volume);
        let output = dir.path().join("refs.mrc");

        run(project_args(&[
            "-i".into(),
            volume.to_string_lossy().into(),
            "-o".into(),
            output.to_string_lossy().into(),
            "--reference-delta".into(),
            "30".into(),
        ]))
        .unwrap();

        assert!(!read_stack(&output).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_reference_step_is_rejected() {
        let args = project_args(&[
            "-i".into(),
            "v.mrc".into(),
            "-o".into(),
            "p.mrc".into(),
            "--reference-delta".into(),
            "0".into(),
        ]);
        assert!(matches!(request_from_args(&args), Err(CliError::Argument(_))));
    }
}
