use bytes::Bytes;
use fourlep_common::{FourLepError, Result};

/// parsed s3:// URI
#[derive(Debug, Clone, PartialEq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

pub fn parse_s3_uri(uri: &str) -> Option<S3Uri> {
    let stripped = uri.strip_prefix("s3://")?;
    let (bucket, key) = stripped.split_once('/')?;
    Some(S3Uri { bucket: bucket.to_owned(), key: key.to_owned() })
}

pub fn is_s3_uri(path: &str) -> bool {
    path.starts_with("s3://")
}

async fn client(endpoint_url: Option<&str>) -> aws_sdk_s3::Client {
    let config = aws_config::load_from_env().await;
    let mut builder = aws_sdk_s3::config::Builder::from(&config);
    if let Some(ep) = endpoint_url {
        builder = builder.endpoint_url(ep).force_path_style(true);
    }
    aws_sdk_s3::Client::from_conf(builder.build())
}

/// list all .parquet objects under s3://bucket/prefix
pub async fn list_s3_parquet(uri: &str, endpoint_url: Option<&str>) -> Result<Vec<String>> {
    let s3_uri = parse_s3_uri(uri).ok_or_else(|| FourLepError::Other(format!("invalid S3 URI: {uri}")))?;
    let client = client(endpoint_url).await;
    let mut keys = Vec::new();
    let mut paginator = client
        .list_objects_v2()
        .bucket(&s3_uri.bucket)
        .prefix(&s3_uri.key)
        .into_paginator()
        .send();
    while let Some(page) = paginator.next().await {
        let page = page.map_err(|e| FourLepError::Other(e.to_string()))?;
        for obj in page.contents() {
            if let Some(k) = obj.key() {
                if k.ends_with(".parquet") {
                    keys.push(format!("s3://{}/{}", s3_uri.bucket, k));
                }
            }
        }
    }
    keys.sort();
    Ok(keys)
}

/// fetch a whole object; event files are decoded in memory
pub async fn fetch_s3_bytes(uri: &str, endpoint_url: Option<&str>) -> Result<Bytes> {
    let s3_uri = parse_s3_uri(uri).ok_or_else(|| FourLepError::Other(format!("invalid S3 URI: {uri}")))?;
    let client = client(endpoint_url).await;
    let resp = client
        .get_object()
        .bucket(&s3_uri.bucket)
        .key(&s3_uri.key)
        .send()
        .await
        .map_err(|e| FourLepError::Other(format!("{uri}: {e}")))?;
    let data = resp.body.collect().await
        .map_err(|e| FourLepError::Other(format!("{uri}: {e}")))?;
    tracing::debug!(uri, "fetched object from S3");
    Ok(data.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_key() {
        let u = parse_s3_uri("s3://opendata/4lep/MC/mc_361106.Zee.4lep.parquet").unwrap();
        assert_eq!(u.bucket, "opendata");
        assert_eq!(u.key, "4lep/MC/mc_361106.Zee.4lep.parquet");
        assert!(parse_s3_uri("s3://bucket-only").is_none());
        assert!(parse_s3_uri("gs://b/k").is_none());
        assert!(is_s3_uri("s3://b/k"));
        assert!(!is_s3_uri("/tmp/s3://b"));
    }
}
