use hdf5::types::VarLenUnicode;
use hdf5::{Dataset, File, Group};
use ndarray::{s, Array1, ArrayView1};
use std::path::Path;
use std::str::FromStr;

use super::error::SinogramWriterError;
use super::sinogram_writer::{write_str_attr, RADIAL_NAME};

pub const REDUCED_GROUP_NAME: &str = "reduced";
pub const PATTERNS_NAME: &str = "patterns";
pub const FILES_NAME: &str = "files";

// Structure
// reduced - n_diff, version
// |---- patterns(dset) - (n_frames, n_diff) f32, chunk (1, n_diff)
// |---- 2theta(dset) - (n_diff) f32
// |---- files(dset) - (n_frames) string

/// Writes one reduced 1D pattern per exposure into an extendable 2D stack
#[derive(Debug)]
pub struct PatternWriter {
    file_handle: File,
    group: Group,
    patterns: Dataset,
    files: Dataset,
    n_diff: usize,
    radial: Option<Array1<f32>>,
    sources: Vec<String>,
}

impl PatternWriter {
    /// Create the writer, truncating any existing file at path
    pub fn create(path: &Path, n_diff: usize) -> Result<Self, SinogramWriterError> {
        let file_handle = File::create(path)?;
        let group = file_handle.create_group(REDUCED_GROUP_NAME)?;
        group
            .new_attr::<u64>()
            .create("n_diff")?
            .write_scalar(&(n_diff as u64))?;
        write_str_attr(&group, "version", env!("CARGO_PKG_VERSION"))?;
        let patterns = group
            .new_dataset::<f32>()
            .shape((0.., n_diff))
            .chunk((1, n_diff))
            .create(PATTERNS_NAME)?;
        let files = group
            .new_dataset::<VarLenUnicode>()
            .shape((0..,))
            .chunk((64,))
            .create(FILES_NAME)?;

        Ok(Self {
            file_handle,
            group,
            patterns,
            files,
            n_diff,
            radial: None,
            sources: vec![],
        })
    }

    pub fn n_frames(&self) -> usize {
        self.sources.len()
    }

    /// The radial axis of the first appended pattern
    pub fn radial_axis(&self) -> Option<&Array1<f32>> {
        self.radial.as_ref()
    }

    /// Append a pattern and its source file name, recording the radial axis the first time
    /// one is seen
    pub fn append(
        &mut self,
        source: &Path,
        radial: ArrayView1<f32>,
        pattern: ArrayView1<f32>,
    ) -> Result<(), SinogramWriterError> {
        for len in [radial.len(), pattern.len()] {
            if len != self.n_diff {
                return Err(SinogramWriterError::RowLengthMismatch {
                    expected: self.n_diff,
                    found: len,
                });
            }
        }
        if self.radial.is_none() {
            self.group
                .new_dataset_builder()
                .with_data(radial)
                .create(RADIAL_NAME)?;
            self.radial = Some(radial.to_owned());
        }

        let name = source.to_string_lossy().to_string();
        let encoded = VarLenUnicode::from_str(&name)
            .map_err(|e| SinogramWriterError::BadAttribute(e.to_string()))?;

        let row = self.sources.len();
        self.patterns.resize((row + 1, self.n_diff))?;
        self.files.resize((row + 1,))?;
        self.patterns.write_slice(pattern, s![row, ..])?;
        self.files
            .write_slice(ArrayView1::from(&[encoded]), s![row..row + 1])?;
        self.file_handle.flush()?;
        self.sources.push(name);
        Ok(())
    }

    /// Flush and consume the writer
    pub fn close(self) -> Result<(), SinogramWriterError> {
        self.file_handle.flush()?;
        log::info!("{} reduced patterns written.", self.sources.len());
        Ok(())
    }
}
