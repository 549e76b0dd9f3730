use hdf5::types::VarLenUnicode;
use hdf5::{Dataset, File, Group};
use ndarray::{s, Array1, ArrayView1};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::error::SinogramWriterError;

pub const GROUP_NAME: &str = "tomography";
pub const SINOGRAM_NAME: &str = "sinogram";
pub const RADIAL_NAME: &str = "2theta";

/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

/// A simple struct which wraps around the hdf5-rust library.
///
/// Owns the output file for the whole run. Both datasets are created lazily: the sinogram on
/// the first `ensure_capacity`, the radial axis on the first `write_radial_axis`.
#[derive(Debug)]
pub struct SinogramWriter {
    file_handle: File,
    path: PathBuf,
    group: Group,
    sinogram: Option<Dataset>,
    radial: Option<Array1<f32>>,
    n_trans: usize,
    n_diff: usize,
    rows_written: u64,
}
// Structure
// tomography - n_trans, n_diff, offset, version, created
// |---- sinogram(dset) - (n_rot, n_trans, n_diff) f32, chunk (1, n_trans, n_diff)
// |---- 2theta(dset) - (n_diff) f32

impl SinogramWriter {
    /// Create a fresh store at path, truncating any existing file
    pub fn create(
        path: &Path,
        n_trans: usize,
        n_diff: usize,
        offset: u64,
    ) -> Result<Self, SinogramWriterError> {
        let file_handle = File::create(path)?;
        let group = file_handle.create_group(GROUP_NAME)?;
        write_group_attrs(&group, n_trans, n_diff, offset)?;

        Ok(Self {
            file_handle,
            path: path.to_path_buf(),
            group,
            sinogram: None,
            radial: None,
            n_trans,
            n_diff,
            rows_written: 0,
        })
    }

    /// Reopen an existing store to append to it, or create one if there is none.
    ///
    /// The stored `n_trans`, `n_diff` and `offset` must match. A previously recorded radial
    /// axis stays recorded.
    pub fn open_or_create(
        path: &Path,
        n_trans: usize,
        n_diff: usize,
        offset: u64,
    ) -> Result<Self, SinogramWriterError> {
        if !path.exists() {
            return Self::create(path, n_trans, n_diff, offset);
        }
        let file_handle = File::open_rw(path)?;
        let group = match file_handle.group(GROUP_NAME) {
            Ok(group) => {
                check_attr(&group, "n_trans", n_trans as u64)?;
                check_attr(&group, "n_diff", n_diff as u64)?;
                check_attr(&group, "offset", offset)?;
                group
            }
            Err(_) => {
                let group = file_handle.create_group(GROUP_NAME)?;
                write_group_attrs(&group, n_trans, n_diff, offset)?;
                group
            }
        };

        let sinogram = match group.dataset(SINOGRAM_NAME) {
            Ok(dset) => {
                let shape = dset.shape();
                if shape.len() != 3 || shape[1] != n_trans {
                    return Err(SinogramWriterError::IncompatibleStore {
                        name: "n_trans",
                        expected: n_trans as u64,
                        found: shape.get(1).copied().unwrap_or(0) as u64,
                    });
                }
                if shape[2] != n_diff {
                    return Err(SinogramWriterError::IncompatibleStore {
                        name: "n_diff",
                        expected: n_diff as u64,
                        found: shape[2] as u64,
                    });
                }
                Some(dset)
            }
            Err(_) => None,
        };
        let radial = match group.dataset(RADIAL_NAME) {
            Ok(dset) => Some(dset.read_1d::<f32>()?),
            Err(_) => None,
        };
        log::info!(
            "Reopened existing sinogram store {} with {} rotations",
            path.to_string_lossy(),
            sinogram.as_ref().map(|d| d.shape()[0]).unwrap_or(0)
        );

        Ok(Self {
            file_handle,
            path: path.to_path_buf(),
            group,
            sinogram,
            radial,
            n_trans,
            n_diff,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn n_trans(&self) -> usize {
        self.n_trans
    }

    pub fn n_diff(&self) -> usize {
        self.n_diff
    }

    /// Current length of the rotation axis; zero before the sinogram exists
    pub fn n_rot(&self) -> usize {
        self.sinogram
            .as_ref()
            .map(|dset| dset.shape()[0])
            .unwrap_or(0)
    }

    /// Shape of the sinogram dataset, if it has been created
    pub fn shape(&self) -> Option<[usize; 3]> {
        self.sinogram
            .as_ref()
            .map(|_| [self.n_rot(), self.n_trans, self.n_diff])
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Grow the rotation axis to exactly `rot + 1` if it is shorter. Never shrinks.
    pub fn ensure_capacity(&mut self, rot: usize) -> Result<(), SinogramWriterError> {
        let dset = match &self.sinogram {
            Some(dset) => dset.clone(),
            None => {
                let dset = self
                    .group
                    .new_dataset::<f32>()
                    .shape((0.., self.n_trans.., self.n_diff))
                    .chunk((1, self.n_trans, self.n_diff))
                    .create(SINOGRAM_NAME)?;
                self.sinogram = Some(dset.clone());
                dset
            }
        };
        if rot + 1 > dset.shape()[0] {
            dset.resize((rot + 1, self.n_trans, self.n_diff))?;
        }
        Ok(())
    }

    /// Overwrite row `[rot, trans, :]`. The rotation axis must already be large enough.
    ///
    /// The row goes out in a single slice write followed by a flush, so readers see either
    /// the previous content or the whole new row.
    pub fn write_row(
        &mut self,
        rot: usize,
        trans: usize,
        pattern: ArrayView1<f32>,
    ) -> Result<(), SinogramWriterError> {
        if pattern.len() != self.n_diff {
            return Err(SinogramWriterError::RowLengthMismatch {
                expected: self.n_diff,
                found: pattern.len(),
            });
        }
        let dset = match &self.sinogram {
            Some(dset) if rot < self.n_rot() && trans < self.n_trans => dset,
            _ => return Err(SinogramWriterError::RowOutOfRange { rot, trans }),
        };
        dset.write_slice(pattern, s![rot, trans, ..])?;
        self.file_handle.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Read back row `[rot, trans, :]`
    pub fn read_row(&self, rot: usize, trans: usize) -> Result<Array1<f32>, SinogramWriterError> {
        match &self.sinogram {
            Some(dset) if rot < self.n_rot() && trans < self.n_trans => {
                Ok(dset.read_slice_1d::<f32, _>(s![rot, trans, ..])?)
            }
            _ => Err(SinogramWriterError::RowOutOfRange { rot, trans }),
        }
    }

    /// The recorded radial axis, if any
    pub fn radial_axis(&self) -> Option<&Array1<f32>> {
        self.radial.as_ref()
    }

    /// Record the radial axis unless one is already recorded.
    ///
    /// Returns true if the axis was written by this call.
    pub fn write_radial_axis(
        &mut self,
        radial: ArrayView1<f32>,
    ) -> Result<bool, SinogramWriterError> {
        if self.radial.is_some() {
            return Ok(false);
        }
        if radial.len() != self.n_diff {
            return Err(SinogramWriterError::RowLengthMismatch {
                expected: self.n_diff,
                found: radial.len(),
            });
        }
        self.group
            .new_dataset_builder()
            .with_data(radial)
            .create(RADIAL_NAME)?;
        self.file_handle.flush()?;
        self.radial = Some(radial.to_owned());
        Ok(true)
    }

    /// Flush and report, consume the writer
    pub fn close(self) -> Result<(), SinogramWriterError> {
        self.file_handle.flush()?;
        match self.shape() {
            Some(shape) => log::info!(
                "{} rows written to {}. Sinogram shape is {:?}.",
                self.rows_written,
                self.path.to_string_lossy(),
                shape
            ),
            None => log::warn!(
                "No rows were written to {}; the sinogram was never created.",
                self.path.to_string_lossy()
            ),
        }
        if self.radial.is_none() {
            log::warn!("No radial axis was recorded.");
        }
        Ok(())
    }
}

fn write_group_attrs(
    group: &Group,
    n_trans: usize,
    n_diff: usize,
    offset: u64,
) -> Result<(), SinogramWriterError> {
    group
        .new_attr::<u64>()
        .create("n_trans")?
        .write_scalar(&(n_trans as u64))?;
    group
        .new_attr::<u64>()
        .create("n_diff")?
        .write_scalar(&(n_diff as u64))?;
    group
        .new_attr::<u64>()
        .create("offset")?
        .write_scalar(&offset)?;
    let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);
    write_str_attr(group, "version", &version)?;
    let created = OffsetDateTime::now_utc().format(&Rfc3339)?;
    write_str_attr(group, "created", &created)?;
    Ok(())
}

/// Write a string attribute on a group
pub(crate) fn write_str_attr(
    group: &Group,
    name: &str,
    value: &str,
) -> Result<(), SinogramWriterError> {
    let value = VarLenUnicode::from_str(value)
        .map_err(|e| SinogramWriterError::BadAttribute(e.to_string()))?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

/// Compare a stored u64 group attribute against the value a run was configured with
fn check_attr(group: &Group, name: &'static str, expected: u64) -> Result<(), SinogramWriterError> {
    let found = group.attr(name)?.read_scalar::<u64>()?;
    if found != expected {
        return Err(SinogramWriterError::IncompatibleStore {
            name,
            expected,
            found,
        });
    }
    Ok(())
}
