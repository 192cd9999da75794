use fourlep_common::{Config, DatasetConfig, FourLepError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One dataset category and the files that feed it; the unit the driver fans out over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub category: String,
    pub files: Vec<String>,
}

fn is_parquet(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("parquet")
}

pub fn scan_directory(base: &Path) -> Result<Vec<String>> {
    let mut results = Vec::new();
    scan_recursive(base, &mut results)?;
    results.sort();
    Ok(results)
}

fn scan_recursive(dir: &Path, out: &mut Vec<String>) -> Result<()> {
    let entries = std::fs::read_dir(dir)?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            scan_recursive(&path, out)?;
        } else if is_parquet(&path) {
            out.push(path.to_string_lossy().into_owned());
        }
    }
    Ok(())
}

/// resolve a path string: single file, directory, glob pattern, or S3/GCS URI (async)
pub async fn resolve_paths(input: &str, s3_endpoint: Option<&str>) -> Result<Vec<String>> {
    use crate::gcs_reader::{is_gcs_uri, list_gcs_parquet};
    use crate::s3_reader::{is_s3_uri, list_s3_parquet};
    if is_s3_uri(input) {
        // a full object key is taken as-is, a prefix is listed
        if input.ends_with(".parquet") {
            return Ok(vec![input.to_owned()]);
        }
        return list_s3_parquet(input, s3_endpoint).await;
    }
    if is_gcs_uri(input) {
        if input.ends_with(".parquet") {
            return Ok(vec![input.to_owned()]);
        }
        return list_gcs_parquet(input).await;
    }
    // local path resolution (sync ops are fine in async context)
    let path = Path::new(input);
    if path.is_file() {
        return Ok(vec![input.to_owned()]);
    }
    if path.is_dir() {
        return scan_directory(path);
    }
    let mut results = Vec::new();
    let entries = glob::glob(input)
        .map_err(|e| FourLepError::Config(format!("bad path pattern {input}: {e}")))?;
    for entry in entries.flatten() {
        if entry.is_file() && is_parquet(&entry) {
            results.push(entry.to_string_lossy().into_owned());
        }
    }
    Ok(results)
}

/// expand every dataset entry into a [`DataSource`], merging entries that share a category
pub async fn build_sources(datasets: &[DatasetConfig], s3_endpoint: Option<&str>) -> Result<Vec<DataSource>> {
    let mut sources: Vec<DataSource> = Vec::new();
    for ds in datasets {
        let mut files = Vec::new();
        for pattern in &ds.files {
            let resolved = resolve_paths(pattern, s3_endpoint).await?;
            if resolved.is_empty() {
                tracing::warn!(category = %ds.category, pattern = %pattern, "no input files matched");
            }
            files.extend(resolved);
        }
        match sources.iter_mut().find(|s| s.category == ds.category) {
            Some(existing) => existing.files.extend(files),
            None => sources.push(DataSource { category: ds.category.clone(), files }),
        }
    }
    Ok(sources)
}

pub async fn sources_from_config(cfg: &Config) -> Result<Vec<DataSource>> {
    build_sources(&cfg.datasets, cfg.s3.endpoint_url.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_dirs_globs_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let mc = dir.path().join("MC");
        std::fs::create_dir_all(&mc).unwrap();
        for name in ["mc_361106.Zee.4lep.parquet", "mc_361107.Zmumu.4lep.parquet", "notes.txt"] {
            std::fs::write(mc.join(name), b"x").unwrap();
        }
        std::fs::write(dir.path().join("data_A.4lep.parquet"), b"x").unwrap();

        let all = resolve_paths(dir.path().to_str().unwrap(), None).await.unwrap();
        assert_eq!(all.len(), 3);

        let pattern = format!("{}/MC/mc_*.parquet", dir.path().display());
        let mc_files = resolve_paths(&pattern, None).await.unwrap();
        assert_eq!(mc_files.len(), 2);

        let single = dir.path().join("data_A.4lep.parquet");
        let one = resolve_paths(single.to_str().unwrap(), None).await.unwrap();
        assert_eq!(one, vec![single.to_string_lossy().into_owned()]);

        let none = resolve_paths(&format!("{}/nothing_*.parquet", dir.path().display()), None).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn sources_group_by_category() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("mc_1.A.4lep.parquet");
        let b = dir.path().join("mc_2.B.4lep.parquet");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"x").unwrap();
        let datasets = vec![
            DatasetConfig { category: "Signal".into(), files: vec![a.to_string_lossy().into_owned()] },
            DatasetConfig { category: "Signal".into(), files: vec![b.to_string_lossy().into_owned()] },
        ];
        let sources = build_sources(&datasets, None).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].files.len(), 2);
    }

    #[tokio::test]
    async fn remote_object_keys_pass_through() {
        let out = resolve_paths("s3://bucket/MC/mc_361106.Zee.4lep.parquet", None).await.unwrap();
        assert_eq!(out, vec!["s3://bucket/MC/mc_361106.Zee.4lep.parquet".to_string()]);
    }
}
