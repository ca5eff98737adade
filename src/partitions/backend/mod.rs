// Partition backends
// A backend only knows how to fetch the raw bytes of a named partition file

pub mod bucket;

#[cfg(test)]
mod tests;

use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::Result;

pub use bucket::BucketPartitions;

/// Source of partition files
pub trait PartitionSource: Debug {
    /// Raw bytes of the partition file `name`, `None` when no such partition exists
    fn fetch_partition(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Human readable location for log messages
    fn location(&self) -> String;
}

/// Partitions stored as files in a local directory
#[derive(Debug, Clone)]
pub struct LocalPartitions {
    dir: PathBuf,
}

impl LocalPartitions {
    #[inline]
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PartitionSource for LocalPartitions {
    #[inline]
    fn fetch_partition(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(name);
        debug!("Reading partition {}", path.display());

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[inline]
    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}
