use crate::core::image::Image2D;
use crate::core::io::mrc::write_stack;
use crate::core::io::params::write_params;
use crate::engine::error::EngineError;
use crate::engine::state::OrientationSet;
use image::{GrayImage, Luma};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Side length of the orientation coverage plot.
pub const PLOT_SIZE: usize = 256;

/// Files written for one run by [`export_structure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub stack: PathBuf,
    pub params: PathBuf,
    pub plot: PathBuf,
}

/// Counts of projection directions seen from above the unit hemisphere. Directions
/// below the equator are mirrored through the origin.
pub fn plot_angles(orientations: &OrientationSet, nx: usize) -> Image2D {
    let mut plot = Image2D::zeros(nx, nx);
    if nx == 0 {
        return plot;
    }
    let ri = (nx / 2) as f64;
    let rr = ri - 1.0;
    let last = (nx - 1) as f64;
    for o in orientations.iter() {
        let (phi, theta) = if o.theta > 90.0 {
            (o.phi + 180.0, 180.0 - o.theta)
        } else {
            (o.phi, o.theta)
        };
        let rc = rr * theta.to_radians().sin();
        let (sp, cp) = phi.to_radians().sin_cos();
        let px = (ri + rc * cp + 0.5).floor().clamp(0.0, last) as usize;
        let py = (ri + rc * sp + 0.5).floor().clamp(0.0, last) as usize;
        plot.set(px, py, plot.get(px, py) + 1.0);
    }
    plot
}

/// Writes a plot as an 8-bit grayscale PNG, the largest count mapped to white.
pub fn save_plot(plot: &Image2D, path: &Path) -> Result<(), EngineError> {
    let max = plot.data().iter().copied().fold(0.0f64, f64::max);
    let scale = if max > 0.0 { 255.0 / max } else { 0.0 };
    let mut out = GrayImage::new(plot.nx() as u32, plot.ny() as u32);
    for y in 0..plot.ny() {
        for x in 0..plot.nx() {
            let v = (plot.get(x, y) * scale).round().clamp(0.0, 255.0);
            out.put_pixel(x as u32, y as u32, Luma([v as u8]));
        }
    }
    out.save(path).map_err(|e| EngineError::Plot {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Writes the stack annotated with the found orientations (`structure_NNN.mrc` and
/// its parameter file `structure_NNN.csv`) and the coverage plot `plot_agls_NNN.png`.
#[instrument(skip_all, name = "export_structure", fields(run = run))]
pub fn export_structure(
    images: &[Image2D],
    orientations: &OrientationSet,
    outdir: &Path,
    run: usize,
) -> Result<ExportedFiles, EngineError> {
    if images.len() != orientations.len() {
        return Err(EngineError::Initialization(format!(
            "{} images but {} orientations to export",
            images.len(),
            orientations.len()
        )));
    }
    let files = ExportedFiles {
        stack: outdir.join(format!("structure_{:03}.mrc", run)),
        params: outdir.join(format!("structure_{:03}.csv", run)),
        plot: outdir.join(format!("plot_agls_{:03}.png", run)),
    };

    write_stack(&files.stack, images)?;
    write_params(&files.params, &orientations.to_params())?;
    save_plot(&plot_angles(orientations, PLOT_SIZE), &files.plot)?;

    info!(
        stack = %files.stack.display(),
        plot = %files.plot.display(),
        "Exported structure."
    );
    Ok(files)
}
