use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;

use super::assembler::{check_radial_axis, AssemblerSettings, SinogramAssembler};
use super::config::{Config, RadialAxisPolicy};
use super::error::{
    AssemblerError, ConfigError, ConversionError, ProcessorError, SinogramWriterError,
};
use super::file_stack::resolve_input_files;
use super::image::{read_image, Corrections};
use super::integrator::{Integrator, LookupIntegrator, Reduction};
use super::pattern_writer::PatternWriter;
use super::sinogram_writer::SinogramWriter;
use super::timing::{FrameOutcome, RunSummary, TimingLog};
use super::worker_status::RunStatus;

/// Everything needed to convert exposures, resolved before any output is created
struct Setup {
    files: Vec<PathBuf>,
    corrections: Corrections,
    integrator: LookupIntegrator,
}

/// Validate the config and load inputs, references and calibration
fn prepare(config: &Config) -> Result<Setup, ProcessorError> {
    config.validate()?;
    let files = resolve_input_files(config)?;
    log::info!("Found {} input files.", files.len());

    let corrections = Corrections::load(config)?;
    // validate() guarantees the calibration path is set and exists
    let calibration = config
        .calibration_path
        .as_deref()
        .ok_or(ConfigError::MissingCalibration)?;
    log::info!("Loading calibration from {}...", calibration.to_string_lossy());
    let integrator = LookupIntegrator::open(calibration, config.accelerate)?;
    if integrator.n_bins() != config.n_diff {
        return Err(ConversionError::BinCountMismatch {
            expected: config.n_diff,
            found: integrator.n_bins(),
        }
        .into());
    }
    if config.accelerate {
        log::info!(
            "Accelerated integration enabled ({} threads).",
            rayon::current_num_threads()
        );
    }

    Ok(Setup {
        files,
        corrections,
        integrator,
    })
}

/// Read, correct and integrate a single exposure
pub fn convert_exposure<I: Integrator>(
    path: &Path,
    dataset: &str,
    corrections: &Corrections,
    integrator: &I,
) -> Result<Reduction, ConversionError> {
    let mut image = read_image(path, dataset)?;
    let valid = corrections.apply(&mut image)?;
    integrator.integrate(&image, &valid)
}

fn report_output(path: &Path, summary: &RunSummary) -> Result<(), ProcessorError> {
    let size = std::fs::metadata(path)?.len();
    log::info!(
        "Output {} is {}.",
        path.to_string_lossy(),
        human_bytes::human_bytes(size as f64)
    );
    log::info!("{summary}");
    Ok(())
}

/// The main loop for sinogram assembly.
///
/// Converts every input exposure and places its pattern in the sinogram at the position
/// given by its sequence number. Per-file problems are logged and skipped; configuration and
/// store problems end the run.
pub fn process_sinogram(
    config: &Config,
    tx: Option<&Sender<RunStatus>>,
) -> Result<RunSummary, ProcessorError> {
    let setup = prepare(config)?;

    let writer = if config.overwrite {
        SinogramWriter::create(
            &config.output_path,
            config.n_trans,
            config.n_diff,
            config.offset,
        )?
    } else {
        SinogramWriter::open_or_create(
            &config.output_path,
            config.n_trans,
            config.n_diff,
            config.offset,
        )?
    };
    let mut assembler = SinogramAssembler::new(writer, AssemblerSettings::from(config));

    log::info!(
        "Assembling sinogram with {} translations and {} bins per pattern...",
        config.n_trans,
        config.n_diff
    );
    let result = assembler.run(
        &setup.files,
        |path| {
            convert_exposure(
                path,
                &config.image_dataset,
                &setup.corrections,
                &setup.integrator,
            )
        },
        tx,
    );
    // Close even on failure so everything written so far is flushed
    let closed = assembler.close();
    let timing = finish_run(result, closed)?;

    let summary = timing.summary();
    report_output(&config.output_path, &summary)?;
    Ok(summary)
}

/// Combine the outcome of a run with the outcome of closing its store.
///
/// A run error is reported ahead of a close error; the close error is only logged then.
fn finish_run(
    result: Result<RunSummary, AssemblerError>,
    closed: Result<TimingLog, SinogramWriterError>,
) -> Result<TimingLog, ProcessorError> {
    match (result, closed) {
        (Ok(_), closed) => Ok(closed?),
        (Err(e), Ok(_)) => Err(e.into()),
        (Err(e), Err(close_error)) => {
            log::error!("Failed to close the sinogram store after a failed run: {close_error}");
            Err(e.into())
        }
    }
}

/// Reduce every input exposure to a 1D pattern and store them as a stack, in input order
pub fn process_reduce(
    config: &Config,
    tx: Option<&Sender<RunStatus>>,
) -> Result<RunSummary, ProcessorError> {
    let setup = prepare(config)?;
    let mut writer = PatternWriter::create(&config.output_path, config.n_diff)?;

    log::info!("Reducing {} exposures...", setup.files.len());
    let result = reduce_files(
        &setup.files,
        &mut writer,
        config.radial_axis_policy,
        |path| {
            convert_exposure(
                path,
                &config.image_dataset,
                &setup.corrections,
                &setup.integrator,
            )
        },
        tx,
    );
    let closed = writer.close();
    let timing = match (result, closed) {
        (Ok(timing), closed) => {
            closed?;
            timing
        }
        (Err(e), Ok(())) => return Err(e),
        (Err(e), Err(close_error)) => {
            log::error!("Failed to close the pattern stack after a failed run: {close_error}");
            return Err(e);
        }
    };

    let summary = timing.summary();
    report_output(&config.output_path, &summary)?;
    Ok(summary)
}

/// Convert and append `files` in order.
///
/// Conversion failures and radial axes rejected by `policy` fail only that file. Store errors
/// end the loop. Stops between files once the status receiver hangs up.
fn reduce_files<F>(
    files: &[PathBuf],
    writer: &mut PatternWriter,
    policy: RadialAxisPolicy,
    mut convert: F,
    tx: Option<&Sender<RunStatus>>,
) -> Result<TimingLog, ProcessorError>
where
    F: FnMut(&Path) -> Result<Reduction, ConversionError>,
{
    let mut timing = TimingLog::new();
    for (count, path) in files.iter().enumerate() {
        let start = Instant::now();
        let checked = convert(path)
            .map_err(AssemblerError::from)
            .and_then(|reduction| {
                check_radial_axis(policy, writer.radial_axis(), reduction.radial.view(), path)?;
                Ok(reduction)
            });
        let outcome = match checked {
            Ok(reduction) => {
                writer.append(path, reduction.radial.view(), reduction.pattern.view())?;
                FrameOutcome::Processed
            }
            Err(e) => {
                log::error!(
                    "Failed to reduce {} after {:.3} s: {e}",
                    path.to_string_lossy(),
                    start.elapsed().as_secs_f64()
                );
                FrameOutcome::Failed
            }
        };
        timing.record(path.clone(), start.elapsed(), outcome);

        if let Some(tx) = tx {
            let status = RunStatus::new(count + 1, files.len(), path.to_string_lossy().to_string());
            if tx.send(status).is_err() {
                log::warn!("Status receiver hung up; stopping reduction.");
                break;
            }
        }
    }
    Ok(timing)
}
