use std::path::{Path, PathBuf};

use super::config::Config;
use super::error::ConfigError;

/// Resolve the exposures a run should process.
///
/// An explicit file list in the config wins; otherwise the input directory is searched for
/// files matching the prefix and extension. Either way the result is lexically sorted, which
/// for zero padded sequence numbers is acquisition order.
pub fn resolve_input_files(config: &Config) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = if !config.input_files.is_empty() {
        for path in config.input_files.iter() {
            if !path.exists() {
                return Err(ConfigError::BadFilePath(path.clone()));
            }
        }
        config.input_files.clone()
    } else if let Some(dir) = &config.input_directory {
        get_file_stack(dir, &config.input_prefix, &config.input_extension)?
    } else {
        vec![]
    };

    if files.is_empty() {
        return Err(ConfigError::NoInputFiles);
    }

    files.sort();
    Ok(files)
}

/// Get all files in a directory whose name starts with `prefix` and has extension `extension`
///
/// An empty prefix or extension matches anything. The extension is given without the dot.
fn get_file_stack(
    parent_path: &Path,
    prefix: &str,
    extension: &str,
) -> Result<Vec<PathBuf>, ConfigError> {
    if !parent_path.is_dir() {
        return Err(ConfigError::BadFilePath(parent_path.to_path_buf()));
    }
    let extension = extension.trim_start_matches('.');
    let mut file_list: Vec<PathBuf> = Vec::new();
    for item in parent_path.read_dir()? {
        let item_path = item?.path();
        if !item_path.is_file() {
            continue;
        }
        let name_matches = item_path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with(prefix))
            .unwrap_or(false);
        let ext_matches = extension.is_empty()
            || item_path
                .extension()
                .map(|ext| ext.to_string_lossy() == extension)
                .unwrap_or(false);
        if name_matches && ext_matches {
            file_list.push(item_path);
        }
    }
    Ok(file_list)
}
