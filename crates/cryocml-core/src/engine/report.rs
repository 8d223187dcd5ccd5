use super::state::OrientationSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

const TITLE_RULE_WIDTH: usize = 56;

/// Formats `value` like C's `%{width}.{precision}e`: the exponent carries a sign
/// and at least two digits.
pub fn format_scientific(value: f64, width: usize, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    let text = match raw.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs()),
            Err(_) => raw.clone(),
        },
        None => raw.clone(),
    };
    format!("{:>width$}", text, width = width)
}

/// Text sink receiving the orientations after every iteration, and optionally a
/// per-candidate progress log.
pub struct AngleReport {
    sink: Box<dyn Write + Send>,
    progress: Option<Box<dyn Write + Send>>,
}

impl AngleReport {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink,
            progress: None,
        }
    }

    /// A report that writes nothing.
    pub fn discard() -> Self {
        Self::new(Box::new(io::sink()))
    }

    /// Appends to the file at `path`, creating it if needed.
    pub fn append_to(path: &Path) -> io::Result<Self> {
        Ok(Self::new(Box::new(BufWriter::new(open_append(path)?))))
    }

    pub fn with_progress_log(mut self, log: Box<dyn Write + Send>) -> Self {
        self.progress = Some(log);
        self
    }

    pub fn with_progress_file(self, path: &Path) -> io::Result<Self> {
        Ok(self.with_progress_log(Box::new(BufWriter::new(open_append(path)?))))
    }

    pub fn write_iteration(
        &mut self,
        iteration: usize,
        orientations: &OrientationSet,
        discrepancy: f64,
    ) -> io::Result<()> {
        writeln!(
            self.sink,
            "|Ite: {:03}|{}",
            iteration,
            "-".repeat(TITLE_RULE_WIDTH)
        )?;
        for o in orientations.iter() {
            writeln!(self.sink, "{:10.3}\t{:10.3}\t{:10.3}", o.phi, o.theta, o.psi)?;
        }
        writeln!(
            self.sink,
            "\nDiscrepancy: {}\n",
            format_scientific(discrepancy, 12, 5)
        )?;
        self.sink.flush()
    }

    pub fn write_unstable(&mut self, period: &[f64]) -> io::Result<()> {
        writeln!(self.sink, "\nSTOP SOLUTION UNSTABLE")?;
        writeln!(self.sink, "Discrepancy period: {:?}", period)?;
        self.sink.flush()
    }

    /// Logs the score of one candidate; `None` marks an occupied candidate.
    pub fn write_candidate(
        &mut self,
        iteration: usize,
        projection: usize,
        candidate: usize,
        angles: (f64, f64),
        score: Option<(f64, f64)>,
    ) -> io::Result<()> {
        let Some(log) = self.progress.as_mut() else {
            return Ok(());
        };
        let (psi, disc) = score.unwrap_or((-1.0, -1.0));
        writeln!(
            log,
            "Ite: {:03} Prj: {:03} Agls: {:03} >> Agls (phi, theta, psi): {:10.3} {:10.3} {:10.3}   Disc: {:10.7}",
            iteration, projection, candidate, angles.0, angles.1, psi, disc
        )
    }

    pub fn write_choice(
        &mut self,
        iteration: usize,
        candidate: Option<usize>,
        angles: (f64, f64, f64),
        discrepancy: f64,
    ) -> io::Result<()> {
        let Some(log) = self.progress.as_mut() else {
            return Ok(());
        };
        let candidate = candidate.map_or_else(|| "---".to_string(), |c| format!("{:03}", c));
        writeln!(
            log,
            "Ite: {:03}  Select Agls: {} >> Agls (phi, theta, psi): {:10.3} {:10.3} {:10.3}   Disc: {:10.7}\n",
            iteration, candidate, angles.0, angles.1, angles.2, discrepancy
        )?;
        log.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
