//! CSV master store.
//!
//! The master file only ever grows: rows are appended, existing rows are
//! never rewritten. Each append is serialized into one buffer and written
//! with a single `write_all` on a handle opened in append mode, so readers
//! always see a prefix of complete rows unless the process dies mid-write.
//! New rows follow the column layout of the header already in the file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Offer;
use crate::storage::{
    OfferStore, csv_columns, id_set, offers_from_csv, offers_to_csv, offers_to_csv_columns,
};

/// Master store backed by a local CSV file.
#[derive(Debug, Clone)]
pub struct CsvMasterStore {
    path: PathBuf,
}

impl CsvMasterStore {
    /// Create a store for the given file. Nothing is touched until used.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Append raw bytes; the handle is closed when this returns, on success or error.
    async fn append_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl OfferStore for CsvMasterStore {
    async fn exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn load(&self) -> Result<Vec<Offer>> {
        match self.read_bytes().await? {
            Some(bytes) if !bytes.is_empty() => offers_from_csv(&bytes),
            Some(_) => Ok(Vec::new()),
            None => {
                log::info!("No master store at {} yet", self.path.display());
                Ok(Vec::new())
            }
        }
    }

    async fn append(&self, offers: &[Offer]) -> Result<usize> {
        let existing = self.read_bytes().await?;
        let existing = existing.as_deref().filter(|bytes| !bytes.is_empty());

        let mut known: HashSet<String> = match existing {
            Some(bytes) => id_set(&offers_from_csv(bytes)?),
            None => HashSet::new(),
        };

        let rows: Vec<Offer> = offers
            .iter()
            .filter(|offer| known.insert(offer.id.clone()))
            .cloned()
            .collect();

        let bytes = match existing {
            None => offers_to_csv(&rows, true)?,
            Some(_) if rows.is_empty() => return Ok(0),
            Some(current) => {
                // rows must line up with the header already in the file
                let columns = csv_columns(current)?;
                let mut bytes = if columns == Offer::COLUMNS {
                    offers_to_csv(&rows, false)?
                } else {
                    log::warn!(
                        "{} has columns {:?}, appending rows in that layout",
                        self.path.display(),
                        columns
                    );
                    offers_to_csv_columns(&rows, &columns)?
                };
                if !current.ends_with(b"\n") {
                    bytes.insert(0, b'\n');
                }
                bytes
            }
        };

        self.append_bytes(&bytes).await?;

        log::debug!("Appended {} rows to {}", rows.len(), self.path.display());
        Ok(rows.len())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
