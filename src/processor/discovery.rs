//! Batch discovery for monthly trip record files
//!
//! Finds `<prefix>_<YYYY>-<MM>.<ext>` files in the input directory and
//! selects the batches of the year being processed.

use crate::constants::BATCH_FILE_REGEX;
use crate::error::{Result, TripError};
use crate::models::{BatchMonth, BatchSource, FileFormat};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Batch discovery for one input directory and file prefix
#[derive(Debug)]
pub struct BatchDiscovery {
    input_dir: PathBuf,
    prefix: String,
    name_pattern: Regex,
}

impl BatchDiscovery {
    pub fn new(input_dir: PathBuf, prefix: impl Into<String>) -> Result<Self> {
        let name_pattern = Regex::new(BATCH_FILE_REGEX)
            .map_err(|e| TripError::configuration(format!("invalid batch name pattern: {}", e)))?;
        Ok(Self {
            input_dir,
            prefix: prefix.into(),
            name_pattern,
        })
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Glob matching candidate batch files
    pub fn glob_pattern(&self) -> String {
        let dir = glob::Pattern::escape(&self.input_dir.to_string_lossy());
        let prefix = glob::Pattern::escape(&self.prefix);
        format!("{}/{}_*", dir, prefix)
    }

    /// Discover all batches, sorted by month.
    ///
    /// Files that do not follow the naming scheme or have an unsupported
    /// extension are ignored. When a month exists as both parquet and csv,
    /// the parquet file is used.
    pub fn discover(&self) -> Result<Vec<BatchSource>> {
        if !self.input_dir.is_dir() {
            return Err(TripError::InputNotFound {
                path: self.input_dir.clone(),
            });
        }

        let pattern = self.glob_pattern();
        debug!("Searching for batches matching {}", pattern);

        let entries = glob::glob(&pattern)
            .map_err(|e| TripError::configuration(format!("invalid glob '{}': {}", pattern, e)))?;

        let mut batches = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            match self.parse_batch_name(&path) {
                Ok(batch) => batches.push(batch),
                Err(e) => debug!("Ignoring {}: {}", path.display(), e),
            }
        }

        batches.sort_by(|a, b| (a.month, a.format).cmp(&(b.month, b.format)));
        batches.dedup_by(|later, first| {
            let same_month = later.month == first.month;
            if same_month {
                warn!(
                    "Month {} present twice, using {} and ignoring {}",
                    first.month,
                    first.path.display(),
                    later.path.display()
                );
            }
            same_month
        });

        if batches.is_empty() {
            return Err(TripError::NoInputBatches {
                path: self.input_dir.clone(),
                pattern,
            });
        }

        debug!("Found {} batches", batches.len());
        Ok(batches)
    }

    /// Parse a batch file name into its prefix, month and format
    pub fn parse_batch_name(&self, path: &Path) -> Result<BatchSource> {
        let invalid = || TripError::InvalidBatchName {
            path: path.to_path_buf(),
        };

        let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
        let captures = self.name_pattern.captures(file_name).ok_or_else(invalid)?;

        let prefix = &captures["prefix"];
        if prefix != self.prefix {
            return Err(invalid());
        }

        let year: i32 = captures["year"].parse().map_err(|_| invalid())?;
        let month: u32 = captures["month"].parse().map_err(|_| invalid())?;
        let month = BatchMonth::new(year, month).ok_or_else(invalid)?;

        let format = FileFormat::from_path(path).ok_or_else(|| TripError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;

        Ok(BatchSource {
            path: path.to_path_buf(),
            prefix: prefix.to_string(),
            month,
            format,
        })
    }
}

/// Keep the batches of the processing year.
///
/// With no explicit year, all batches must share one.
pub fn select_year(
    batches: Vec<BatchSource>,
    year: Option<i32>,
    input_dir: &Path,
) -> Result<(i32, Vec<BatchSource>)> {
    let year = match year {
        Some(year) => year,
        None => {
            let mut years: Vec<i32> = batches.iter().map(|b| b.month.year).collect();
            years.dedup();
            match years.as_slice() {
                [single] => *single,
                [] => {
                    return Err(TripError::NoInputBatches {
                        path: input_dir.to_path_buf(),
                        pattern: "<any year>".to_string(),
                    });
                }
                many => {
                    return Err(TripError::configuration(format!(
                        "batches span several years ({:?}); select one with --year",
                        many
                    )));
                }
            }
        }
    };

    let selected: Vec<BatchSource> = batches
        .into_iter()
        .filter(|b| b.month.year == year)
        .collect();

    if selected.is_empty() {
        return Err(TripError::NoInputBatches {
            path: input_dir.to_path_buf(),
            pattern: format!("*_{}-*", year),
        });
    }

    Ok((year, selected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), "x").unwrap();
    }

    fn discovery(dir: &TempDir) -> BatchDiscovery {
        BatchDiscovery::new(dir.path().to_path_buf(), "yellow_tripdata").unwrap()
    }

    #[test]
    fn test_parse_batch_name() {
        let temp_dir = TempDir::new().unwrap();
        let batch = discovery(&temp_dir)
            .parse_batch_name(Path::new("/data/yellow_tripdata_2019-03.parquet"))
            .unwrap();
        assert_eq!(batch.month, BatchMonth::new(2019, 3).unwrap());
        assert_eq!(batch.format, FileFormat::Parquet);
        assert_eq!(batch.stem(), "yellow_tripdata_2019-03");
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        let temp_dir = TempDir::new().unwrap();
        let d = discovery(&temp_dir);
        assert!(matches!(
            d.parse_batch_name(Path::new("yellow_tripdata_2019-13.csv")),
            Err(TripError::InvalidBatchName { .. })
        ));
        assert!(matches!(
            d.parse_batch_name(Path::new("green_tripdata_2019-01.csv")),
            Err(TripError::InvalidBatchName { .. })
        ));
        assert!(matches!(
            d.parse_batch_name(Path::new("yellow_tripdata_2019-01.json")),
            Err(TripError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "yellow_tripdata_2019-02.csv");
        touch(&temp_dir, "yellow_tripdata_2019-01.parquet");
        touch(&temp_dir, "yellow_tripdata_2019-01.csv");
        touch(&temp_dir, "yellow_tripdata_notes.txt");
        touch(&temp_dir, "green_tripdata_2019-01.csv");

        let batches = discovery(&temp_dir).discover().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].month.month, 1);
        assert_eq!(batches[0].format, FileFormat::Parquet);
        assert_eq!(batches[1].month.month, 2);
    }

    #[test]
    fn test_discover_no_batches() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "readme.md");
        assert!(matches!(
            discovery(&temp_dir).discover(),
            Err(TripError::NoInputBatches { .. })
        ));
    }

    #[test]
    fn test_discover_missing_directory() {
        let d = BatchDiscovery::new(PathBuf::from("/nonexistent/trips"), "yellow_tripdata").unwrap();
        assert!(matches!(d.discover(), Err(TripError::InputNotFound { .. })));
    }

    #[test]
    fn test_select_year() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir, "yellow_tripdata_2019-12.csv");
        touch(&temp_dir, "yellow_tripdata_2020-01.csv");
        let batches = discovery(&temp_dir).discover().unwrap();

        assert!(matches!(
            select_year(batches.clone(), None, temp_dir.path()),
            Err(TripError::Configuration { .. })
        ));

        let (year, selected) = select_year(batches.clone(), Some(2020), temp_dir.path()).unwrap();
        assert_eq!(year, 2020);
        assert_eq!(selected.len(), 1);

        assert!(matches!(
            select_year(batches, Some(2018), temp_dir.path()),
            Err(TripError::NoInputBatches { .. })
        ));
    }
}
