//! Daily export of a run's new offers.
//!
//! The same files are attached to the notification email, so they are
//! rendered in memory first and written to disk separately.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::Offer;
use crate::storage::offers_to_csv;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A rendered export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Writer for `<prefix>YYYYMMDD.{csv,xlsx}` files.
#[derive(Debug, Clone)]
pub struct DailyExport {
    dir: PathBuf,
    prefix: String,
}

impl DailyExport {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Base file name (without extension) for a day.
    pub fn stem(&self, date: NaiveDate) -> String {
        format!("{}{}", self.prefix, date.format("%Y%m%d"))
    }

    /// Render the CSV export, plus the XLSX table when requested.
    ///
    /// The CSV always carries a header, even with no offers.
    pub fn render(
        &self,
        offers: &[Offer],
        date: NaiveDate,
        include_xlsx: bool,
    ) -> Result<Vec<ExportedFile>> {
        let stem = self.stem(date);
        let mut files = vec![ExportedFile {
            filename: format!("{stem}.csv"),
            content_type: CSV_CONTENT_TYPE,
            bytes: offers_to_csv(offers, true)?,
        }];

        if include_xlsx {
            #[cfg(feature = "xlsx")]
            files.push(ExportedFile {
                filename: format!("{stem}.xlsx"),
                content_type: XLSX_CONTENT_TYPE,
                bytes: xlsx::render(offers)?,
            });

            #[cfg(not(feature = "xlsx"))]
            log::debug!("XLSX export requested but the `xlsx` feature is disabled");
        }

        Ok(files)
    }

    /// Write rendered files into the export directory. Returns their paths.
    pub async fn save(&self, files: &[ExportedFile]) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            let path = self.dir.join(&file.filename);
            write_atomic(&path, &file.bytes).await?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Write bytes atomically (write to temp, then rename).
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(feature = "xlsx")]
mod xlsx {
    use rust_xlsxwriter::{Format, Workbook, XlsxError};

    use crate::error::{AppError, Result};
    use crate::models::Offer;

    const HEADERS: [(&str, f64); 9] = [
        ("Title", 40.0),
        ("Company", 30.0),
        ("Location", 24.0),
        ("Industry", 20.0),
        ("Posted", 30.0),
        ("Link", 60.0),
        ("First seen", 24.0),
        ("Source", 12.0),
        ("Id", 14.0),
    ];

    fn export_error(e: XlsxError) -> AppError {
        AppError::Export(format!("XLSX: {e}"))
    }

    /// Render offers as a single-sheet workbook named `NEW`.
    pub fn render(offers: &[Offer]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();

        let worksheet = workbook.add_worksheet();
        worksheet.set_name("NEW").map_err(export_error)?;

        for (col, (name, width)) in HEADERS.iter().enumerate() {
            let col = col as u16;
            worksheet
                .write_string_with_format(0, col, *name, &bold)
                .map_err(export_error)?;
            worksheet.set_column_width(col, *width).map_err(export_error)?;
        }

        for (idx, offer) in offers.iter().enumerate() {
            let row = idx as u32 + 1;
            let cells = [
                offer.title.as_str(),
                offer.company.as_deref().unwrap_or(""),
                offer.location.as_deref().unwrap_or(""),
                offer.industry.as_deref().unwrap_or(""),
                offer.posted_date.as_deref().unwrap_or(""),
                offer.url.as_str(),
                offer.first_seen.as_str(),
                offer.source.as_str(),
                offer.id.as_str(),
            ];
            for (col, value) in cells.iter().enumerate() {
                worksheet
                    .write_string(row, col as u16, *value)
                    .map_err(export_error)?;
            }
        }

        workbook.save_to_buffer().map_err(export_error)
    }
}
