use hdf5::File;
use ndarray::{Array2, Zip};
use std::path::{Path, PathBuf};

use super::config::Config;
use super::error::ImageError;

/// A single detector frame
pub type Image = Array2<f32>;

/// Read the 2D frame stored at `dataset` in an HDF5 file
///
/// A 3D dataset with a single frame (shape `[1, h, w]`) is accepted as well, as most
/// acquisition software writes frames that way.
pub fn read_image(path: &Path, dataset: &str) -> Result<Image, ImageError> {
    if !path.exists() {
        return Err(ImageError::BadFilePath(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let dset = file.dataset(dataset)?;
    let shape = dset.shape();
    match shape.as_slice() {
        [_, _] => Ok(dset.read_2d::<f32>()?),
        [1, h, w] => {
            let flat = dset.read_raw::<f32>()?;
            Array2::from_shape_vec((*h, *w), flat)
                .map_err(|_| ImageError::BadShape(path.to_path_buf(), shape.clone()))
        }
        _ => Err(ImageError::BadShape(path.to_path_buf(), shape.to_vec())),
    }
}

/// Pixel-wise mean of a list of frames, used for dark and flat references
pub fn average_images(paths: &[PathBuf], dataset: &str) -> Result<Image, ImageError> {
    let (first, rest) = paths.split_first().ok_or(ImageError::NoImages)?;
    let mut sum = read_image(first, dataset)?;
    for path in rest {
        let image = read_image(path, dataset)?;
        check_shape(sum.shape(), image.shape())?;
        sum += &image;
    }
    sum /= paths.len() as f32;
    Ok(sum)
}

fn check_shape(expected: &[usize], found: &[usize]) -> Result<(), ImageError> {
    if expected != found {
        return Err(ImageError::ShapeMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

/// Dark, flat and mask references applied to every exposure before integration
#[derive(Debug, Clone, Default)]
pub struct Corrections {
    dark: Option<Image>,
    flat: Option<Image>,
    mask: Option<Array2<bool>>,
}

impl Corrections {
    pub fn new(dark: Option<Image>, flat: Option<Image>, mask: Option<Array2<bool>>) -> Self {
        Self { dark, flat, mask }
    }

    /// Load the references named in the config. Darks and flats are averaged.
    pub fn load(config: &Config) -> Result<Self, ImageError> {
        let dark = if config.has_darks() {
            log::info!("Averaging {} dark frames...", config.dark_files.len());
            Some(average_images(&config.dark_files, &config.image_dataset)?)
        } else {
            None
        };
        let flat = if config.has_flats() {
            log::info!("Averaging {} flat frames...", config.flat_files.len());
            Some(average_images(&config.flat_files, &config.image_dataset)?)
        } else {
            None
        };
        let mask = match &config.mask_path {
            Some(path) => {
                log::info!("Loading mask from {}", path.to_string_lossy());
                Some(read_image(path, &config.image_dataset)?.mapv(|v| v != 0.0))
            }
            None => None,
        };

        if let (Some(d), Some(f)) = (&dark, &flat) {
            check_shape(d.shape(), f.shape())?;
        }
        if let (Some(d), Some(m)) = (&dark, &mask) {
            check_shape(d.shape(), m.shape())?;
        }
        if let (Some(f), Some(m)) = (&flat, &mask) {
            check_shape(f.shape(), m.shape())?;
        }

        Ok(Self::new(dark, flat, mask))
    }

    /// Apply `(raw - dark) / flat` in place and return the validity of each pixel.
    ///
    /// Masked pixels and pixels with a non-positive flat response are invalid; their value
    /// is left at zero and they must be excluded from integration.
    pub fn apply(&self, image: &mut Image) -> Result<Array2<bool>, ImageError> {
        let mut valid = Array2::from_elem(image.raw_dim(), true);

        if let Some(dark) = &self.dark {
            check_shape(dark.shape(), image.shape())?;
            *image -= dark;
        }
        if let Some(flat) = &self.flat {
            check_shape(flat.shape(), image.shape())?;
            Zip::from(&mut *image)
                .and(&mut valid)
                .and(flat)
                .for_each(|pixel, ok, &f| {
                    if f > 0.0 {
                        *pixel /= f;
                    } else {
                        *ok = false;
                    }
                });
        }
        if let Some(mask) = &self.mask {
            check_shape(mask.shape(), image.shape())?;
            Zip::from(&mut valid).and(mask).for_each(|ok, &masked| {
                if masked {
                    *ok = false;
                }
            });
        }
        Zip::from(&mut *image).and(&valid).for_each(|pixel, &ok| {
            if !ok {
                *pixel = 0.0;
            }
        });

        Ok(valid)
    }
}
