//! Product files indexed by acquisition date and revision

use crate::types::{GeoError, GeoResult};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One product file of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFile {
    pub date: NaiveDateTime,
    pub revision: u32,
    pub path: PathBuf,
}

/// Product files indexed by acquisition date, one file (the latest revision) per date
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    entries: Vec<ProductFile>,
}

impl ProductCatalog {
    /// List the product files of `dir` whose names match `pattern`
    pub fn scan<P: AsRef<Path>>(dir: P, pattern: &str) -> GeoResult<Self> {
        let dir = dir.as_ref();
        log::info!("Scanning product directory {}", dir.display());

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        Self::from_paths(paths, pattern)
    }

    /// Build a catalog from candidate paths; names not matching `pattern` are skipped
    pub fn from_paths<I>(paths: I, pattern: &str) -> GeoResult<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let regex = Regex::new(pattern)
            .map_err(|e| GeoError::Config(format!("Invalid file pattern {:?}: {}", pattern, e)))?;
        let names: Vec<_> = regex.capture_names().flatten().collect();
        if !names.contains(&"date") || !names.contains(&"revision") {
            return Err(GeoError::Config(format!(
                "File pattern {:?} needs 'date' and 'revision' groups",
                pattern
            )));
        }

        let mut by_date: BTreeMap<NaiveDateTime, ProductFile> = BTreeMap::new();
        let mut skipped = 0;

        for path in paths {
            let file = match parse_file_name(&regex, &path) {
                Some(file) => file,
                None => {
                    skipped += 1;
                    continue;
                }
            };

            match by_date.get(&file.date) {
                Some(existing) if existing.revision >= file.revision => {
                    log::debug!(
                        "Keeping revision {} over {} for {}",
                        existing.revision,
                        file.revision,
                        file.date
                    );
                }
                _ => {
                    by_date.insert(file.date, file);
                }
            }
        }

        if skipped > 0 {
            log::debug!("Skipped {} files not matching {:?}", skipped, pattern);
        }

        let entries: Vec<ProductFile> = by_date.into_values().collect();
        log::info!("Catalog holds {} product dates", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by date
    pub fn entries(&self) -> &[ProductFile] {
        &self.entries
    }

    pub fn dates(&self) -> Vec<NaiveDateTime> {
        self.entries.iter().map(|e| e.date).collect()
    }

    /// First product acquired on `date`
    pub fn file_by_date(&self, date: NaiveDate) -> GeoResult<&ProductFile> {
        self.entries
            .iter()
            .find(|e| e.date.date() == date)
            .ok_or_else(|| GeoError::ProductNotFound(format!("no product for {}", date)))
    }
}

fn parse_file_name(regex: &Regex, path: &Path) -> Option<ProductFile> {
    let name = path.file_name()?.to_str()?;
    let caps = regex.captures(name)?;
    let date = NaiveDateTime::parse_from_str(caps.name("date")?.as_str(), "%Y%m%d%H%M").ok()?;
    let revision = caps.name("revision")?.as_str().parse().ok()?;
    Some(ProductFile {
        date,
        revision,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FILE_PATTERN;

    fn names(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(|n| PathBuf::from("/data/fcover").join(n)).collect()
    }

    #[test]
    fn test_latest_revision_wins() {
        let paths = names(&[
            "c_gls_FCOVER300-RT2_202301200000_GLOBE_OLCI_V1.1.2.nc",
            "c_gls_FCOVER300-RT0_202301100000_GLOBE_OLCI_V1.1.2.nc",
            "c_gls_FCOVER300-RT6_202301100000_GLOBE_OLCI_V1.1.2.nc",
            "c_gls_FCOVER300-RT1_202301100000_GLOBE_OLCI_V1.1.2.nc",
            "readme.txt",
        ]);
        let catalog = ProductCatalog::from_paths(paths, DEFAULT_FILE_PATTERN).unwrap();
        assert_eq!(catalog.len(), 2);

        let first = &catalog.entries()[0];
        assert_eq!(first.revision, 6);
        assert_eq!(first.date.date(), NaiveDate::from_ymd_opt(2023, 1, 10).unwrap());
        assert_eq!(catalog.entries()[1].revision, 2);
    }

    #[test]
    fn test_file_by_date() {
        let paths = names(&["c_gls_FCOVER300-RT0_202302100000_GLOBE_OLCI_V1.1.2.nc"]);
        let catalog = ProductCatalog::from_paths(paths, DEFAULT_FILE_PATTERN).unwrap();

        let file = catalog
            .file_by_date(NaiveDate::from_ymd_opt(2023, 2, 10).unwrap())
            .unwrap();
        assert!(file.path.ends_with("c_gls_FCOVER300-RT0_202302100000_GLOBE_OLCI_V1.1.2.nc"));

        assert!(matches!(
            catalog.file_by_date(NaiveDate::from_ymd_opt(2023, 2, 11).unwrap()),
            Err(GeoError::ProductNotFound(_))
        ));
    }

    #[test]
    fn test_pattern_validation() {
        assert!(matches!(
            ProductCatalog::from_paths(Vec::new(), r"(unclosed"),
            Err(GeoError::Config(_))
        ));
        assert!(matches!(
            ProductCatalog::from_paths(Vec::new(), r"RT(\d+)"),
            Err(GeoError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_dates_are_skipped() {
        let paths = names(&["c_gls_FCOVER300-RT0_202313400000_GLOBE_OLCI_V1.1.2.nc"]);
        let catalog = ProductCatalog::from_paths(paths, DEFAULT_FILE_PATTERN).unwrap();
        assert!(catalog.is_empty());
    }
}
