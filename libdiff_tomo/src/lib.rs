//! # diff_tomo
//!
//! diff_tomo turns 2D diffraction detector exposures into reduced 1D diffraction patterns
//! and assembles them into a 3D sinogram (rotation × translation × diffraction bin) for
//! diffraction tomography. Output is written to HDF5.
//!
//! The detector geometry is not modelled here. The calibration tooling exports a
//! precomputed lookup table mapping detector pixels onto radial bins, and diff_tomo
//! applies it to every (dark/flat corrected, masked) exposure.
//!
//! ## Installation
//!
//! Currently the only method of install is from source.
//!
//! ### HDF5
//!
//! The `hdf5` dependency is built statically from source, so no system HDF5 install is
//! required. A C compiler and CMake must be available.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./diff_tomo_cli` from the top
//! level repository. The binary is installed to your cargo install location (typically
//! `~/.cargo/bin/`).
//!
//! ## Configuration
//!
//! Runs are described by a YAML file. A template can be generated with
//! `diff_tomo_cli new -p config.yml`. The format is as follows:
//!
//! ```yml
//! output_path: sinogram.h5
//! input_files: []
//! input_directory: /data/scan
//! input_prefix: scan_
//! input_extension: h5
//! image_dataset: data
//! calibration_path: calibration.h5
//! dark_files: []
//! flat_files: []
//! mask_path: null
//! n_trans: 1
//! n_rot: null
//! n_diff: 1000
//! offset: 0
//! accelerate: false
//! overwrite: true
//! radial_axis_policy: warn
//! ```
//!
//! - `input_files` takes precedence over the directory search. Inputs are processed in
//! lexical order.
//! - Every exposure file name must end with its acquisition sequence number, e.g.
//! `scan_00042.h5`. The exposure with sequence number `offset` is the first of the scan;
//! earlier ones are skipped.
//! - Exposure `i` (after subtracting the offset) lands at rotation `i / n_trans`,
//! translation `i % n_trans`.
//! - `n_rot` optionally caps the number of rotations; exposures beyond it are skipped.
//! - `radial_axis_policy` decides what happens when an exposure reports a radial axis
//! different from the one already recorded: `ignore`, `warn` (row still written) or
//! `error` (exposure rejected). It applies to both sinogram and reduce runs.
//! - With `overwrite: false` an existing sinogram is reopened and appended to. Its
//! `n_trans`, `n_diff` and `offset` must match the configuration.
//!
//! ### Calibration Format
//!
//! ```text
//! calibration.h5
//! integrator - height, width
//! |---- radial(dset) - (n_bins) f32
//! |---- indptr(dset) - (n_bins + 1) u64
//! |---- indices(dset) - (n_entries) u64, row-major pixel index
//! |---- weights(dset) - (n_entries) f32
//! ```
//!
//! ## Output
//!
//! ### Sinogram
//!
//! ```text
//! sinogram.h5
//! tomography - n_trans, n_diff, offset, version, created
//! |---- sinogram(dset) - (n_rot, n_trans, n_diff) f32, chunk (1, n_trans, n_diff)
//! |---- 2theta(dset) - (n_diff) f32
//! ```
//!
//! The rotation axis grows as exposures arrive; unvisited rows read as zero.
//!
//! ### Reduced patterns
//!
//! ```text
//! reduced.h5
//! reduced - n_diff, version
//! |---- patterns(dset) - (n_frames, n_diff) f32
//! |---- 2theta(dset) - (n_diff) f32
//! |---- files(dset) - (n_frames) string
//! ```
pub mod assembler;
pub mod config;
pub mod error;
pub mod file_stack;
pub mod image;
pub mod integrator;
pub mod pattern_writer;
pub mod process;
pub mod sequence;
pub mod sinogram_writer;
pub mod timing;
pub mod worker_status;
