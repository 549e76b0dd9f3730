use hdf5::File;
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libdiff_tomo::config::{Config, RadialAxisPolicy};
use libdiff_tomo::error::{ConfigError, ProcessorError, SinogramWriterError};
use libdiff_tomo::integrator::LookupTable;
use libdiff_tomo::pattern_writer::{FILES_NAME, PATTERNS_NAME, REDUCED_GROUP_NAME};
use libdiff_tomo::process::{process_reduce, process_sinogram};
use libdiff_tomo::sinogram_writer::{GROUP_NAME, RADIAL_NAME, SINOGRAM_NAME};
use libdiff_tomo::worker_status::RunStatus;

const HEIGHT: usize = 4;
const WIDTH: usize = 6;
const N_DIFF: usize = 3;

/// Each bin is a pair of detector columns, equally weighted
fn write_calibration(path: &Path) {
    let mut indptr = vec![0u64];
    let mut indices = vec![];
    for bin in 0..N_DIFF {
        for row in 0..HEIGHT {
            for col in [2 * bin, 2 * bin + 1] {
                indices.push((row * WIDTH + col) as u64);
            }
        }
        indptr.push(indices.len() as u64);
    }
    let table = LookupTable {
        height: HEIGHT,
        width: WIDTH,
        radial: Array1::from(vec![10.0f32, 20.0, 30.0]),
        weights: vec![1.0; indices.len()],
        indptr,
        indices,
    };
    table.save(path).unwrap();
}

fn write_frame(path: &Path, value: f32) {
    let image = Array2::from_elem((HEIGHT, WIDTH), value);
    let file = File::create(path).unwrap();
    file.new_dataset_builder()
        .with_data(&image)
        .create("data")
        .unwrap();
}

/// Frames `scan_000.h5 .. scan_{n-1}.h5` where frame i has every pixel set to i + 1
fn write_scan(dir: &Path, n: usize) -> PathBuf {
    let scan_dir = dir.join("scan");
    std::fs::create_dir(&scan_dir).unwrap();
    for i in 0..n {
        write_frame(&scan_dir.join(format!("scan_{i:03}.h5")), (i + 1) as f32);
    }
    scan_dir
}

fn base_config(dir: &Path, scan_dir: PathBuf) -> Config {
    let calibration = dir.join("calibration.h5");
    write_calibration(&calibration);
    Config {
        output_path: dir.join("sinogram.h5"),
        input_directory: Some(scan_dir),
        input_prefix: String::from("scan_"),
        input_extension: String::from("h5"),
        calibration_path: Some(calibration),
        n_trans: 5,
        n_diff: N_DIFF,
        radial_axis_policy: RadialAxisPolicy::Error,
        ..Default::default()
    }
}

fn read_sinogram(path: &Path) -> ndarray::Array3<f32> {
    let file = File::open(path).unwrap();
    file.group(GROUP_NAME)
        .unwrap()
        .dataset(SINOGRAM_NAME)
        .unwrap()
        .read::<f32, ndarray::Ix3>()
        .unwrap()
}

#[test]
fn test_sinogram_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let scan_dir = write_scan(dir.path(), 10);
    let config = base_config(dir.path(), scan_dir);

    let (tx, rx) = mpsc::channel::<RunStatus>();
    let summary = process_sinogram(&config, Some(&tx)).unwrap();
    assert_eq!(summary.processed, 10);
    assert_eq!(summary.failed, 0);
    assert_eq!(rx.try_iter().count(), 10);

    let sinogram = read_sinogram(&config.output_path);
    assert_eq!(sinogram.shape(), &[2, 5, N_DIFF]);
    for i in 0..10 {
        for bin in 0..N_DIFF {
            assert_eq!(sinogram[[i / 5, i % 5, bin]], (i + 1) as f32);
        }
    }

    let file = File::open(&config.output_path).unwrap();
    let radial = file
        .group(GROUP_NAME)
        .unwrap()
        .dataset(RADIAL_NAME)
        .unwrap()
        .read_1d::<f32>()
        .unwrap();
    assert_eq!(radial, Array1::from(vec![10.0f32, 20.0, 30.0]));
}

#[test]
fn test_sinogram_with_offset_and_corrections() {
    let dir = tempfile::tempdir().unwrap();
    let scan_dir = write_scan(dir.path(), 10);
    let mut config = base_config(dir.path(), scan_dir);
    config.offset = 3;

    let dark = dir.path().join("dark_000.h5");
    write_frame(&dark, 1.0);
    let flat = dir.path().join("flat_000.h5");
    write_frame(&flat, 2.0);
    config.dark_files = vec![dark];
    config.flat_files = vec![flat];

    let summary = process_sinogram(&config, None).unwrap();
    assert_eq!(summary.processed, 7);
    assert_eq!(summary.skipped, 3);

    let sinogram = read_sinogram(&config.output_path);
    assert_eq!(sinogram.shape(), &[2, 5, N_DIFF]);
    // scan_003 holds 4.0: (4 - 1) / 2
    assert_eq!(sinogram[[0, 0, 0]], 1.5);
    // scan_009 is index 6
    assert_eq!(sinogram[[1, 1, 2]], 4.5);
    assert_eq!(sinogram[[1, 2, 0]], 0.0);
}

#[test]
fn test_broken_exposure_does_not_abort_run() {
    let dir = tempfile::tempdir().unwrap();
    let scan_dir = write_scan(dir.path(), 6);
    std::fs::write(scan_dir.join("scan_002.h5"), b"not an hdf5 file").unwrap();
    let config = base_config(dir.path(), scan_dir);

    let summary = process_sinogram(&config, None).unwrap();
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.failed, 1);

    let sinogram = read_sinogram(&config.output_path);
    assert_eq!(sinogram[[0, 1, 0]], 2.0);
    assert_eq!(sinogram[[0, 2, 0]], 0.0);
    assert_eq!(sinogram[[1, 0, 0]], 6.0);
}

#[test]
fn test_append_to_existing_store() {
    let dir = tempfile::tempdir().unwrap();
    let scan_dir = write_scan(dir.path(), 10);
    let mut config = base_config(dir.path(), scan_dir.clone());
    config.input_directory = None;
    config.input_files = (0..5)
        .map(|i| scan_dir.join(format!("scan_{i:03}.h5")))
        .collect();
    process_sinogram(&config, None).unwrap();
    assert_eq!(read_sinogram(&config.output_path).shape(), &[1, 5, N_DIFF]);

    config.overwrite = false;
    config.input_files = (5..10)
        .map(|i| scan_dir.join(format!("scan_{i:03}.h5")))
        .collect();
    process_sinogram(&config, None).unwrap();
    let sinogram = read_sinogram(&config.output_path);
    assert_eq!(sinogram.shape(), &[2, 5, N_DIFF]);
    assert_eq!(sinogram[[0, 0, 0]], 1.0);
    assert_eq!(sinogram[[1, 4, 0]], 10.0);
}

#[test]
fn test_reopen_with_other_offset_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let scan_dir = write_scan(dir.path(), 10);
    let mut config = base_config(dir.path(), scan_dir.clone());
    config.input_directory = None;
    config.input_files = (0..5)
        .map(|i| scan_dir.join(format!("scan_{i:03}.h5")))
        .collect();
    process_sinogram(&config, None).unwrap();

    config.overwrite = false;
    config.offset = 5;
    config.input_files = (5..10)
        .map(|i| scan_dir.join(format!("scan_{i:03}.h5")))
        .collect();
    assert!(matches!(
        process_sinogram(&config, None),
        Err(ProcessorError::StoreError(
            SinogramWriterError::IncompatibleStore {
                name: "offset",
                expected: 5,
                found: 0
            }
        ))
    ));

    let sinogram = read_sinogram(&config.output_path);
    assert_eq!(sinogram.shape(), &[1, 5, N_DIFF]);
    assert_eq!(sinogram[[0, 0, 0]], 1.0);
    let file = File::open(&config.output_path).unwrap();
    let offset = file
        .group(GROUP_NAME)
        .unwrap()
        .attr("offset")
        .unwrap()
        .read_scalar::<u64>()
        .unwrap();
    assert_eq!(offset, 0);
}

#[test]
fn test_configuration_errors_create_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let scan_dir = write_scan(dir.path(), 3);

    let mut config = base_config(dir.path(), scan_dir.clone());
    config.calibration_path = None;
    assert!(matches!(
        process_sinogram(&config, None),
        Err(ProcessorError::ConfigError(ConfigError::MissingCalibration))
    ));
    assert!(!config.output_path.exists());

    let mut config = base_config(dir.path(), scan_dir);
    config.input_prefix = String::from("nothing_");
    assert!(matches!(
        process_sinogram(&config, None),
        Err(ProcessorError::ConfigError(ConfigError::NoInputFiles))
    ));
    assert!(!config.output_path.exists());

    let mut config = base_config(dir.path(), dir.path().join("scan"));
    config.n_diff = N_DIFF + 1;
    assert!(process_sinogram(&config, None).is_err());
    assert!(!config.output_path.exists());
}

#[test]
fn test_reduce_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let scan_dir = write_scan(dir.path(), 4);
    let mut config = base_config(dir.path(), scan_dir);
    config.output_path = dir.path().join("reduced.h5");
    config.accelerate = true;

    let summary = process_reduce(&config, None).unwrap();
    assert_eq!(summary.processed, 4);

    let file = File::open(&config.output_path).unwrap();
    let patterns = file
        .group(REDUCED_GROUP_NAME)
        .unwrap()
        .dataset(PATTERNS_NAME)
        .unwrap()
        .read_2d::<f32>()
        .unwrap();
    assert_eq!(patterns.shape(), &[4, N_DIFF]);
    assert_eq!(patterns[[3, 1]], 4.0);
    let files = file
        .group(REDUCED_GROUP_NAME)
        .unwrap()
        .dataset(FILES_NAME)
        .unwrap()
        .read_raw::<hdf5::types::VarLenUnicode>()
        .unwrap();
    assert_eq!(files.len(), 4);
    assert!(files[0].as_str().ends_with("scan_000.h5"));
}
