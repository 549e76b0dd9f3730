use std::path::Path;

use super::error::SequenceError;

/// Where an exposure lands in the sinogram.
///
/// `index` is the acquisition sequence number minus the configured offset. It is negative for
/// exposures taken before the scan started; such positions are not valid and must never
/// touch the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinogramPosition {
    pub index: i64,
    pub rot: i64,
    pub trans: i64,
}

impl SinogramPosition {
    /// Split an exposure index into rotation and translation steps (floor semantics)
    pub fn from_index(index: i64, n_trans: usize) -> Self {
        let n_trans = n_trans as i64;
        Self {
            index,
            rot: index.div_euclid(n_trans),
            trans: index.rem_euclid(n_trans),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.index >= 0 && self.rot >= 0 && self.trans >= 0
    }
}

/// Extract the run of digits immediately preceding the file extension
///
/// `scan_007.h5` gives 7. A name like `scan.h5` or `scan_007a.h5` has no sequence number.
pub fn parse_sequence_number(path: &Path) -> Result<i64, SequenceError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .ok_or_else(|| SequenceError::NoSequenceNumber(path.to_path_buf()))?;

    let n_digits = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if n_digits == 0 {
        return Err(SequenceError::NoSequenceNumber(path.to_path_buf()));
    }

    // Digits are single byte so slicing on the count is safe
    let digits = &stem[stem.len() - n_digits..];
    digits
        .parse::<i64>()
        .map_err(|e| SequenceError::BadSequenceNumber(path.to_path_buf(), e))
}

/// Compute the sinogram position of an exposure from its file name
pub fn compute_position(
    path: &Path,
    offset: u64,
    n_trans: usize,
) -> Result<SinogramPosition, SequenceError> {
    let number = parse_sequence_number(path)?;
    // Both operands are non-negative
    let index = number - i64::try_from(offset).unwrap_or(i64::MAX);
    Ok(SinogramPosition::from_index(index, n_trans))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_trailing_digits() {
        assert_eq!(parse_sequence_number(Path::new("scan_007.edf")).unwrap(), 7);
        assert_eq!(
            parse_sequence_number(Path::new("/data/run2/img0123.h5")).unwrap(),
            123
        );
        assert_eq!(parse_sequence_number(Path::new("42")).unwrap(), 42);
    }

    #[test]
    fn test_parse_without_digits() {
        for name in ["scan.h5", "scan_007a.h5", "scan_.h5", ""] {
            assert!(
                matches!(
                    parse_sequence_number(&PathBuf::from(name)),
                    Err(SequenceError::NoSequenceNumber(_))
                ),
                "{name} should not parse"
            );
        }
    }

    #[test]
    fn test_parse_overflow() {
        let result = parse_sequence_number(Path::new("scan_99999999999999999999999.h5"));
        assert!(matches!(result, Err(SequenceError::BadSequenceNumber(_, _))));
    }

    #[test]
    fn test_extreme_numbers_and_offsets() {
        let largest = format!("scan_{}.h5", i64::MAX);
        assert_eq!(parse_sequence_number(Path::new(&largest)).unwrap(), i64::MAX);
        let pos = compute_position(Path::new(&largest), 0, 7).unwrap();
        assert!(pos.is_valid());
        assert_eq!(pos.trans, i64::MAX % 7);

        let pos = compute_position(Path::new("scan_000.h5"), u64::MAX, 5).unwrap();
        assert_eq!(pos.index, -i64::MAX);
        assert!(!pos.is_valid());
    }

    #[test]
    fn test_position_arithmetic() {
        for n_trans in 1..8usize {
            for index in 0..50i64 {
                let pos = SinogramPosition::from_index(index, n_trans);
                assert_eq!(pos.rot, index / n_trans as i64);
                assert_eq!(pos.trans, index % n_trans as i64);
                assert!(pos.trans >= 0 && pos.trans < n_trans as i64);
                assert!(pos.is_valid());
            }
        }
    }

    #[test]
    fn test_position_before_offset_is_invalid() {
        for number in 0..3 {
            let pos = compute_position(&PathBuf::from(format!("scan_{number:03}.edf")), 3, 5)
                .unwrap();
            assert!(pos.index < 0);
            assert!(!pos.is_valid());
        }
        let pos = compute_position(Path::new("scan_003.edf"), 3, 5).unwrap();
        assert_eq!(pos, SinogramPosition { index: 0, rot: 0, trans: 0 });
    }

    #[test]
    fn test_position_of_scan_007() {
        let pos = compute_position(Path::new("scan_007.edf"), 0, 5).unwrap();
        assert_eq!(pos.rot, 1);
        assert_eq!(pos.trans, 2);
    }
}
