use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// What to do when a converted exposure reports a radial axis which differs from the one
/// already recorded in the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadialAxisPolicy {
    /// Keep the first axis and say nothing
    Ignore,
    /// Keep the first axis, write the row, and log a warning
    #[default]
    Warn,
    /// Reject the exposure; its row is not written
    Error,
}

/// Structure representing the application configuration. Contains pathing and scan geometry
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
///
/// Missing fields take their value from `Config::default()`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HDF5 file the sinogram (or reduced pattern stack) is written to
    pub output_path: PathBuf,
    /// Explicit list of exposures. Takes precedence over the directory search
    pub input_files: Vec<PathBuf>,
    /// Directory searched for exposures when no explicit list is given
    pub input_directory: Option<PathBuf>,
    pub input_prefix: String,
    pub input_extension: String,
    /// Dataset holding the detector frame inside every image file (exposures, darks, flats, mask)
    pub image_dataset: String,
    /// Lookup table exported by the calibration tooling
    pub calibration_path: Option<PathBuf>,
    pub dark_files: Vec<PathBuf>,
    pub flat_files: Vec<PathBuf>,
    pub mask_path: Option<PathBuf>,
    /// Translation steps per rotation
    pub n_trans: usize,
    /// Optional upper limit on the number of rotations. Exposures beyond it are skipped
    pub n_rot: Option<usize>,
    /// Number of diffraction bins per pattern
    pub n_diff: usize,
    /// Sequence number of the first exposure belonging to the scan
    pub offset: u64,
    /// Evaluate the integration in parallel
    pub accelerate: bool,
    /// Truncate an existing output file instead of appending to it
    pub overwrite: bool,
    pub radial_axis_policy: RadialAxisPolicy,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("None"),
            input_files: vec![],
            input_directory: None,
            input_prefix: String::from(""),
            input_extension: String::from("h5"),
            image_dataset: String::from("data"),
            calibration_path: None,
            dark_files: vec![],
            flat_files: vec![],
            mask_path: None,
            n_trans: 1,
            n_rot: None,
            n_diff: 1000,
            offset: 0,
            accelerate: false,
            overwrite: true,
            radial_axis_policy: RadialAxisPolicy::Warn,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check everything that can be checked before touching any input or output.
    ///
    /// Input resolution is done separately by the file stack, as it needs the file system.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_path.as_os_str().is_empty() || self.output_path == Path::new("None") {
            return Err(ConfigError::MissingOutput);
        }
        if self.n_trans == 0 {
            return Err(ConfigError::InvalidTranslationCount);
        }
        if self.n_diff == 0 {
            return Err(ConfigError::InvalidBinCount);
        }
        let calibration = self
            .calibration_path
            .as_ref()
            .ok_or(ConfigError::MissingCalibration)?;
        if !calibration.exists() {
            return Err(ConfigError::BadFilePath(calibration.clone()));
        }
        for path in self
            .dark_files
            .iter()
            .chain(self.flat_files.iter())
            .chain(self.mask_path.iter())
        {
            if !path.exists() {
                return Err(ConfigError::BadFilePath(path.clone()));
            }
        }
        Ok(())
    }

    pub fn has_darks(&self) -> bool {
        !self.dark_files.is_empty()
    }

    pub fn has_flats(&self) -> bool {
        !self.flat_files.is_empty()
    }

    pub fn has_mask(&self) -> bool {
        self.mask_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(dir: &Path) -> Config {
        let calibration = dir.join("calib.h5");
        std::fs::write(&calibration, b"").unwrap();
        Config {
            output_path: dir.join("out.h5"),
            calibration_path: Some(calibration),
            n_trans: 5,
            n_diff: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(valid_config(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_requires_calibration() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.calibration_path = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCalibration)
        ));

        config.calibration_path = Some(dir.path().join("missing.h5"));
        assert!(matches!(config.validate(), Err(ConfigError::BadFilePath(_))));
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.n_trans = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTranslationCount)
        ));

        let mut config = valid_config(dir.path());
        config.n_diff = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBinCount)));
    }

    #[test]
    fn test_validate_requires_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.output_path = PathBuf::from("None");
        assert!(matches!(config.validate(), Err(ConfigError::MissingOutput)));
    }

    #[test]
    fn test_yaml_round_trip_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "output_path: scan.h5\nn_trans: 5\nradial_axis_policy: error\n",
        )
        .unwrap();

        let config = Config::read_config_file(&path).unwrap();
        assert_eq!(config.output_path, PathBuf::from("scan.h5"));
        assert_eq!(config.n_trans, 5);
        assert_eq!(config.n_diff, 1000);
        assert_eq!(config.offset, 0);
        assert_eq!(config.radial_axis_policy, RadialAxisPolicy::Error);

        config.write_config_file(&path).unwrap();
        let reread = Config::read_config_file(&path).unwrap();
        assert_eq!(reread.n_trans, 5);
        assert_eq!(reread.radial_axis_policy, RadialAxisPolicy::Error);
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::read_config_file(Path::new("/definitely/not/here.yml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }
}
