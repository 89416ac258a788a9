//! Iteration log
//!
//! One line per time step:
//! `step  velocity_iterations  velocity_residual  poisson_iterations  poisson_residual`
use crate::error::Result;
use crate::solver::SolveInfo;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append only ascii log of linear solver statistics
#[derive(Debug)]
pub struct IterationLog {
    file: BufWriter<File>,
}

impl IterationLog {
    /// Open `path` for appending (created if missing)
    ///
    /// # Errors
    /// File can not be opened
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
        })
    }

    /// Write the line of one step
    ///
    /// # Errors
    /// Write failed
    pub fn record(&mut self, step: usize, velocity: &SolveInfo, poisson: &SolveInfo) -> Result<()> {
        writeln!(
            self.file,
            "{}\t{}\t{:e}\t{}\t{:e}",
            step, velocity.iterations, velocity.residual, poisson.iterations, poisson.residual
        )?;
        self.file.flush()?;
        Ok(())
    }
}
