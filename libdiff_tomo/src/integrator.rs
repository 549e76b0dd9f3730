use hdf5::File;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::borrow::Cow;
use std::path::Path;

use super::error::ConversionError;
use super::image::Image;

const INTEGRATOR_NAME: &str = "integrator";
const RADIAL_NAME: &str = "radial";
const INDPTR_NAME: &str = "indptr";
const INDICES_NAME: &str = "indices";
const WEIGHTS_NAME: &str = "weights";

/// The result of reducing one exposure: the shared radial axis and the intensity per bin
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub radial: Array1<f32>,
    pub pattern: Array1<f32>,
}

/// Anything able to reduce a corrected detector frame to a 1D pattern
pub trait Integrator {
    fn n_bins(&self) -> usize;

    /// Reduce `image`, ignoring every pixel whose entry in `valid` is false
    fn integrate(&self, image: &Image, valid: &Array2<bool>) -> Result<Reduction, ConversionError>;
}

/// Pixel to bin lookup table in compressed sparse row form.
///
/// Row `b` lists the flat (row-major) pixel indices contributing to bin `b` and their
/// weights: `indices[indptr[b]..indptr[b + 1]]`. The table is produced by the external
/// calibration tooling from the detector geometry; nothing here knows about geometry.
///
/// On disk it lives in the group `integrator`, with `height` and `width` attributes and the
/// datasets `radial`, `indptr`, `indices` and `weights`.
#[derive(Debug, Clone)]
pub struct LookupTable {
    pub height: usize,
    pub width: usize,
    pub radial: Array1<f32>,
    pub indptr: Vec<u64>,
    pub indices: Vec<u64>,
    pub weights: Vec<f32>,
}

impl LookupTable {
    /// Read a lookup table from a calibration file and check it is self-consistent
    pub fn open(path: &Path) -> Result<Self, ConversionError> {
        if !path.exists() {
            return Err(ConversionError::BadCalibrationPath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let group = file.group(INTEGRATOR_NAME)?;
        let table = Self {
            height: group.attr("height")?.read_scalar::<u64>()? as usize,
            width: group.attr("width")?.read_scalar::<u64>()? as usize,
            radial: group.dataset(RADIAL_NAME)?.read_1d::<f32>()?,
            indptr: group.dataset(INDPTR_NAME)?.read_raw::<u64>()?,
            indices: group.dataset(INDICES_NAME)?.read_raw::<u64>()?,
            weights: group.dataset(WEIGHTS_NAME)?.read_raw::<f32>()?,
        };
        table.validate()?;
        Ok(table)
    }

    /// Write the table in the layout `open` expects
    pub fn save(&self, path: &Path) -> Result<(), ConversionError> {
        let file = File::create(path)?;
        let group = file.create_group(INTEGRATOR_NAME)?;
        group
            .new_attr::<u64>()
            .create("height")?
            .write_scalar(&(self.height as u64))?;
        group
            .new_attr::<u64>()
            .create("width")?
            .write_scalar(&(self.width as u64))?;
        group
            .new_dataset_builder()
            .with_data(&self.radial)
            .create(RADIAL_NAME)?;
        group
            .new_dataset_builder()
            .with_data(self.indptr.as_slice())
            .create(INDPTR_NAME)?;
        group
            .new_dataset_builder()
            .with_data(self.indices.as_slice())
            .create(INDICES_NAME)?;
        group
            .new_dataset_builder()
            .with_data(self.weights.as_slice())
            .create(WEIGHTS_NAME)?;
        Ok(())
    }

    pub fn n_bins(&self) -> usize {
        self.radial.len()
    }

    pub fn n_pixels(&self) -> usize {
        self.height * self.width
    }

    fn validate(&self) -> Result<(), ConversionError> {
        if self.indptr.len() != self.n_bins() + 1 {
            return Err(ConversionError::BadLookupTable(format!(
                "indptr has {} entries for {} bins",
                self.indptr.len(),
                self.n_bins()
            )));
        }
        if self.indices.len() != self.weights.len() {
            return Err(ConversionError::BadLookupTable(format!(
                "{} indices but {} weights",
                self.indices.len(),
                self.weights.len()
            )));
        }
        if self.indptr.first() != Some(&0)
            || self.indptr.windows(2).any(|w| w[0] > w[1])
            || self.indptr.last().map(|&l| l as usize) != Some(self.indices.len())
        {
            return Err(ConversionError::BadLookupTable(String::from(
                "indptr is not a monotonic offset table over the indices",
            )));
        }
        if let Some(&bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.n_pixels())
        {
            return Err(ConversionError::BadLookupTable(format!(
                "pixel index {bad} is outside the {}x{} detector",
                self.height, self.width
            )));
        }
        Ok(())
    }

    /// Weighted mean over the valid pixels of one bin
    fn bin_value(&self, bin: usize, pixels: &[f32], valid: &[bool]) -> f32 {
        let start = self.indptr[bin] as usize;
        let stop = self.indptr[bin + 1] as usize;
        let mut signal = 0.0f64;
        let mut norm = 0.0f64;
        for (&pixel, &weight) in self.indices[start..stop]
            .iter()
            .zip(&self.weights[start..stop])
        {
            let pixel = pixel as usize;
            if valid[pixel] {
                signal += weight as f64 * pixels[pixel] as f64;
                norm += weight as f64;
            }
        }
        if norm > 0.0 {
            (signal / norm) as f32
        } else {
            0.0
        }
    }
}

/// Integrator applying a precomputed [`LookupTable`]
#[derive(Debug, Clone)]
pub struct LookupIntegrator {
    table: LookupTable,
    accelerate: bool,
}

impl LookupIntegrator {
    pub fn new(table: LookupTable, accelerate: bool) -> Self {
        Self { table, accelerate }
    }

    pub fn open(path: &Path, accelerate: bool) -> Result<Self, ConversionError> {
        Ok(Self::new(LookupTable::open(path)?, accelerate))
    }
}

fn flat_view<T: Copy>(array: &Array2<T>) -> Cow<'_, [T]> {
    match array.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(array.iter().copied().collect()),
    }
}

impl Integrator for LookupIntegrator {
    fn n_bins(&self) -> usize {
        self.table.n_bins()
    }

    fn integrate(&self, image: &Image, valid: &Array2<bool>) -> Result<Reduction, ConversionError> {
        if image.len() != self.table.n_pixels() || valid.len() != image.len() {
            return Err(ConversionError::PixelCountMismatch {
                expected: self.table.n_pixels(),
                found: image.len(),
            });
        }
        let pixels = flat_view(image);
        let valid = flat_view(valid);

        let values: Vec<f32> = if self.accelerate {
            (0..self.n_bins())
                .into_par_iter()
                .map(|bin| self.table.bin_value(bin, &pixels, &valid))
                .collect()
        } else {
            (0..self.n_bins())
                .map(|bin| self.table.bin_value(bin, &pixels, &valid))
                .collect()
        };

        Ok(Reduction {
            radial: self.table.radial.clone(),
            pattern: Array1::from(values),
        })
    }
}
