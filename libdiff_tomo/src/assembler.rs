use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;

use ndarray::{Array1, ArrayView1};

use super::config::{Config, RadialAxisPolicy};
use super::error::{AssemblerError, ConversionError, SinogramWriterError};
use super::integrator::Reduction;
use super::sequence::{compute_position, SinogramPosition};
use super::sinogram_writer::SinogramWriter;
use super::timing::{FrameOutcome, RunSummary, TimingLog};
use super::worker_status::RunStatus;

/// Relative tolerance used when comparing radial axes
const RADIAL_TOLERANCE: f32 = 1.0e-6;

/// The subset of the configuration the assembler needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerSettings {
    pub n_trans: usize,
    pub n_diff: usize,
    pub offset: u64,
    pub n_rot: Option<usize>,
    pub radial_axis_policy: RadialAxisPolicy,
}

impl From<&Config> for AssemblerSettings {
    fn from(config: &Config) -> Self {
        Self {
            n_trans: config.n_trans,
            n_diff: config.n_diff,
            offset: config.offset,
            n_rot: config.n_rot,
            radial_axis_policy: config.radial_axis_policy,
        }
    }
}

/// Compare a reported radial axis against the recorded one and apply `policy`.
///
/// Nothing is recorded yet when `recorded` is `None`, which always passes. Values are compared
/// with a relative tolerance; `source` only names the exposure in messages.
pub fn check_radial_axis(
    policy: RadialAxisPolicy,
    recorded: Option<&Array1<f32>>,
    radial: ArrayView1<f32>,
    source: &Path,
) -> Result<(), AssemblerError> {
    let recorded = match recorded {
        Some(recorded) => recorded,
        None => return Ok(()),
    };
    let matches = recorded.len() == radial.len()
        && recorded.iter().zip(radial.iter()).all(|(&a, &b)| {
            (a - b).abs() <= RADIAL_TOLERANCE * a.abs().max(b.abs()).max(1.0)
        });
    if matches {
        return Ok(());
    }
    match policy {
        RadialAxisPolicy::Ignore => Ok(()),
        RadialAxisPolicy::Warn => {
            log::warn!(
                "Radial axis of {} differs from the recorded axis; keeping the recorded one",
                source.to_string_lossy()
            );
            Ok(())
        }
        RadialAxisPolicy::Error => Err(AssemblerError::RadialAxisMismatch(source.to_path_buf())),
    }
}

/// What happened to a single placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Written,
    /// The position predates the offset; nothing was touched
    Skipped,
}

/// Routes reduced patterns into the sinogram store.
///
/// Owns the store for the duration of a run along with the timing log. Each exposure maps
/// to the row `[index / n_trans, index % n_trans, :]`.
#[derive(Debug)]
pub struct SinogramAssembler {
    writer: SinogramWriter,
    settings: AssemblerSettings,
    timing: TimingLog,
}

impl SinogramAssembler {
    pub fn new(writer: SinogramWriter, settings: AssemblerSettings) -> Self {
        Self {
            writer,
            settings,
            timing: TimingLog::new(),
        }
    }

    pub fn writer(&self) -> &SinogramWriter {
        &self.writer
    }

    pub fn timing(&self) -> &TimingLog {
        &self.timing
    }

    pub fn compute_position(&self, path: &Path) -> Result<SinogramPosition, AssemblerError> {
        Ok(compute_position(
            path,
            self.settings.offset,
            self.settings.n_trans,
        )?)
    }

    /// Grow the rotation axis so that `rot` is addressable
    pub fn ensure_capacity(&mut self, rot: usize) -> Result<(), AssemblerError> {
        Ok(self.writer.ensure_capacity(rot)?)
    }

    /// Write `reduction` at `position`. Invalid positions are a no-op.
    ///
    /// The radial axis is recorded the first time a row is placed. Later axes are compared
    /// against it and handled according to the radial axis policy; `source` only names the
    /// exposure in messages.
    pub fn place(
        &mut self,
        position: SinogramPosition,
        reduction: &Reduction,
        source: &Path,
    ) -> Result<Placement, AssemblerError> {
        if !position.is_valid() {
            return Ok(Placement::Skipped);
        }
        if reduction.pattern.len() != self.settings.n_diff {
            return Err(ConversionError::BinCountMismatch {
                expected: self.settings.n_diff,
                found: reduction.pattern.len(),
            }
            .into());
        }
        if reduction.radial.len() != self.settings.n_diff {
            return Err(ConversionError::BinCountMismatch {
                expected: self.settings.n_diff,
                found: reduction.radial.len(),
            }
            .into());
        }
        check_radial_axis(
            self.settings.radial_axis_policy,
            self.writer.radial_axis(),
            reduction.radial.view(),
            source,
        )?;

        let rot = position.rot as usize;
        let trans = position.trans as usize;
        self.ensure_capacity(rot)?;
        self.writer.write_row(rot, trans, reduction.pattern.view())?;
        if self.writer.write_radial_axis(reduction.radial.view())? {
            log::info!("Recorded radial axis from {}", source.to_string_lossy());
        }
        Ok(Placement::Written)
    }

    /// Position, convert and place a single exposure
    fn process_file<F>(
        &mut self,
        path: &Path,
        convert: &mut F,
    ) -> Result<FrameOutcome, AssemblerError>
    where
        F: FnMut(&Path) -> Result<Reduction, ConversionError>,
    {
        let position = self.compute_position(path)?;
        if !position.is_valid() {
            log::debug!(
                "Skipping {} as it predates the offset {}",
                path.to_string_lossy(),
                self.settings.offset
            );
            return Ok(FrameOutcome::Skipped);
        }
        if let Some(n_rot) = self.settings.n_rot {
            if position.rot as usize >= n_rot {
                log::warn!(
                    "Skipping {} as rotation {} is beyond the configured {} rotations",
                    path.to_string_lossy(),
                    position.rot,
                    n_rot
                );
                return Ok(FrameOutcome::Skipped);
            }
        }
        let reduction = convert(path)?;
        match self.place(position, &reduction, path)? {
            Placement::Written => Ok(FrameOutcome::Processed),
            Placement::Skipped => Ok(FrameOutcome::Skipped),
        }
    }

    /// Process `files` in order.
    ///
    /// A file which cannot be positioned or converted is logged and skipped; rows already
    /// written stay valid. Store errors end the run. If `tx` is given, a status is sent after
    /// every file, and the run stops between files once the receiving end hangs up.
    pub fn run<F>(
        &mut self,
        files: &[PathBuf],
        mut convert: F,
        tx: Option<&Sender<RunStatus>>,
    ) -> Result<RunSummary, AssemblerError>
    where
        F: FnMut(&Path) -> Result<Reduction, ConversionError>,
    {
        for (count, path) in files.iter().enumerate() {
            let start = Instant::now();
            let outcome = match self.process_file(path, &mut convert) {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::error!(
                        "Failed to process {} after {:.3} s: {e}",
                        path.to_string_lossy(),
                        start.elapsed().as_secs_f64()
                    );
                    FrameOutcome::Failed
                }
            };
            self.timing.record(path.clone(), start.elapsed(), outcome);

            if let Some(tx) = tx {
                let status = RunStatus::new(
                    count + 1,
                    files.len(),
                    path.to_string_lossy().to_string(),
                );
                if tx.send(status).is_err() {
                    log::warn!(
                        "Status receiver hung up; stopping after {}",
                        path.to_string_lossy()
                    );
                    break;
                }
            }
        }
        Ok(self.timing.summary())
    }

    /// Flush the store and hand back the timing log
    pub fn close(self) -> Result<TimingLog, SinogramWriterError> {
        self.writer.close()?;
        Ok(self.timing)
    }
}
