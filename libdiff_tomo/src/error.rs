use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config did not resolve any input files")]
    NoInputFiles,
    #[error("Config requires a calibration file but none was given")]
    MissingCalibration,
    #[error("Config requires at least one translation step per rotation")]
    InvalidTranslationCount,
    #[error("Config requires at least one diffraction bin")]
    InvalidBinCount,
    #[error("Config requires an output path")]
    MissingOutput,
}

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("File name {0:?} does not end with a sequence number")]
    NoSequenceNumber(PathBuf),
    #[error("Sequence number of file {0:?} could not be parsed: {1}")]
    BadSequenceNumber(PathBuf, std::num::ParseIntError),
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Could not open image because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Image in {0:?} is not two dimensional; found shape {1:?}")]
    BadShape(PathBuf, Vec<usize>),
    #[error("Image shape {found:?} does not match expected shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Cannot average an empty list of images")]
    NoImages,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Conversion failed due to image error: {0}")]
    ImageError(#[from] ImageError),
    #[error("Conversion failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Could not open calibration because file {0:?} does not exist")]
    BadCalibrationPath(PathBuf),
    #[error("Calibration lookup table is malformed: {0}")]
    BadLookupTable(String),
    #[error("Image has {found} pixels but the lookup table expects {expected}")]
    PixelCountMismatch { expected: usize, found: usize },
    #[error("Conversion produced {found} bins; expected {expected}")]
    BinCountMismatch { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum SinogramWriterError {
    #[error("SinogramWriter failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("SinogramWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Existing store has {name} = {found}, but the run was configured with {expected}")]
    IncompatibleStore {
        name: &'static str,
        expected: u64,
        found: u64,
    },
    #[error("Row has {found} bins; the store holds {expected}")]
    RowLengthMismatch { expected: usize, found: usize },
    #[error("Row (rot {rot}, trans {trans}) lies outside the allocated sinogram")]
    RowOutOfRange { rot: usize, trans: usize },
    #[error("SinogramWriter could not encode attribute string: {0}")]
    BadAttribute(String),
    #[error("SinogramWriter failed to format timestamp: {0}")]
    TimeFormat(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("Assembler failed due to SinogramWriter error: {0}")]
    StoreError(#[from] SinogramWriterError),
    #[error("Assembler failed to place file: {0}")]
    ParseError(#[from] SequenceError),
    #[error("Assembler failed to convert file: {0}")]
    ConversionError(#[from] ConversionError),
    #[error("Radial axis of {0:?} does not match the recorded radial axis")]
    RadialAxisMismatch(PathBuf),
}

impl AssemblerError {
    /// Errors which leave the store unusable; everything else only affects one file
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StoreError(_))
    }
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to conversion setup error: {0}")]
    ConversionError(#[from] ConversionError),
    #[error("Processor failed due to image error: {0}")]
    ImageError(#[from] ImageError),
    #[error("Processor failed due to SinogramWriter error: {0}")]
    StoreError(#[from] SinogramWriterError),
    #[error("Processor failed due to Assembler error: {0}")]
    AssemblerError(#[from] AssemblerError),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
