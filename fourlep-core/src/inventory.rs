use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use parquet::file::reader::{FileReader, SerializedFileReader};
use fourlep_common::{FourLepError, Result};

use crate::gcs_reader::is_gcs_uri;
use crate::processor::sample_from_filename;
use crate::s3_reader::is_s3_uri;
use crate::selection::LEPTON_COLUMNS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub file_count: usize,
    pub total_events: i64,
    pub total_bytes: u64,
    pub files: Vec<FileInventory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInventory {
    pub path: String,
    pub sample: Option<String>, // None for data files
    pub event_count: i64,
    pub row_group_count: usize,
    pub file_size: u64,
    pub missing_columns: Vec<String>,
}

/// reads only the Parquet footer; row data is never touched
pub fn inspect_file(path: &Path) -> Result<FileInventory> {
    let file = std::fs::File::open(path)?;
    let file_size = file.metadata()?.len();
    let reader = SerializedFileReader::new(file).map_err(FourLepError::Parquet)?;
    let meta = reader.metadata();
    let schema = meta.file_metadata().schema_descr();
    // leaf paths look like "lep_pt.list.element"; match on the root column
    let roots: Vec<String> = (0..schema.num_columns())
        .map(|i| schema.column(i).path().parts()[0].clone())
        .collect();
    let missing_columns = LEPTON_COLUMNS
        .iter()
        .filter(|c| !roots.iter().any(|r| r == *c))
        .map(|c| c.to_string())
        .collect();
    let name = path.to_string_lossy().into_owned();
    Ok(FileInventory {
        sample: sample_from_filename(&name).ok(),
        path: name,
        event_count: meta.file_metadata().num_rows(),
        row_group_count: meta.num_row_groups(),
        file_size,
        missing_columns,
    })
}

/// footer-only scan of local event files, one rayon task per file
pub fn read_inventory_parallel(paths: &[String]) -> Result<Inventory> {
    if let Some(remote) = paths.iter().find(|p| is_s3_uri(p) || is_gcs_uri(p)) {
        return Err(FourLepError::Config(format!(
            "inventory reads local files only, got {remote}"
        )));
    }
    let results: Vec<Result<FileInventory>> = paths
        .par_iter()
        .map(|p| inspect_file(Path::new(p)))
        .collect();

    let mut files = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for r in results {
        match r {
            Ok(f) => files.push(f),
            Err(e) => errors.push(e),
        }
    }
    if files.is_empty() && !errors.is_empty() {
        return Err(errors.remove(0));
    }
    for e in &errors {
        tracing::warn!(error = %e, "skipping unreadable file");
    }

    Ok(Inventory {
        file_count: files.len(),
        total_events: files.iter().map(|f| f.event_count).sum(),
        total_bytes: files.iter().map(|f| f.file_size).sum(),
        files,
    })
}
