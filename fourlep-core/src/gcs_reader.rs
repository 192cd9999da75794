use bytes::Bytes;
use fourlep_common::{FourLepError, Result};
use serde::Deserialize;

/// parsed gs:// URI
#[derive(Debug, Clone, PartialEq)]
pub struct GcsUri {
    pub bucket: String,
    pub object: String,
}

pub fn parse_gcs_uri(uri: &str) -> Option<GcsUri> {
    let stripped = uri.strip_prefix("gs://")?;
    let (bucket, object) = stripped.split_once('/')?;
    Some(GcsUri { bucket: bucket.to_owned(), object: object.to_owned() })
}

pub fn is_gcs_uri(path: &str) -> bool {
    path.starts_with("gs://")
}

const GCS_API: &str = "https://storage.googleapis.com/storage/v1";

/// one page of the JSON API object listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

fn list_url(bucket: &str, prefix: &str, page_token: Option<&str>) -> String {
    let mut url = format!(
        "{GCS_API}/b/{}/o?prefix={}&fields=items/name,nextPageToken",
        percent_encode(bucket),
        percent_encode(prefix)
    );
    if let Some(token) = page_token {
        url.push_str("&pageToken=");
        url.push_str(&percent_encode(token));
    }
    url
}

fn check_status(status: reqwest::StatusCode, uri: &str) -> Result<()> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(FourLepError::Auth(format!("GCS returned HTTP {status} for {uri}")));
    }
    if !status.is_success() {
        return Err(FourLepError::Other(format!("GCS returned HTTP {status} for {uri}")));
    }
    Ok(())
}

/// list the .parquet objects under gs://bucket/prefix, following every result page
pub async fn list_gcs_parquet(uri: &str) -> Result<Vec<String>> {
    let gcs_uri = parse_gcs_uri(uri).ok_or_else(|| FourLepError::Other(format!("invalid GCS URI: {uri}")))?;
    let token = get_adc_token().await?;
    let client = reqwest::Client::new();
    let mut keys = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let resp = client
            .get(list_url(&gcs_uri.bucket, &gcs_uri.object, page_token.as_deref()))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| FourLepError::Other(format!("{uri}: {e}")))?;
        check_status(resp.status(), uri)?;
        let page: ObjectList = resp.json().await.map_err(|e| FourLepError::Other(format!("{uri}: {e}")))?;
        keys.extend(
            page.items
                .into_iter()
                .filter(|o| o.name.ends_with(".parquet"))
                .map(|o| format!("gs://{}/{}", gcs_uri.bucket, o.name)),
        );
        match page.next_page_token {
            Some(next) => page_token = Some(next),
            None => break,
        }
    }
    keys.sort();
    tracing::debug!(uri, objects = keys.len(), "listed GCS prefix");
    Ok(keys)
}

pub async fn fetch_gcs_bytes(uri: &str) -> Result<Bytes> {
    let gcs_uri = parse_gcs_uri(uri).ok_or_else(|| FourLepError::Other(format!("invalid GCS URI: {uri}")))?;
    let token = get_adc_token().await?;
    let url = format!(
        "{GCS_API}/b/{}/o/{}?alt=media",
        percent_encode(&gcs_uri.bucket),
        percent_encode(&gcs_uri.object)
    );
    let client = reqwest::Client::new();
    let resp = client.get(&url)
        .bearer_auth(&token)
        .send().await
        .map_err(|e| FourLepError::Other(e.to_string()))?;
    check_status(resp.status(), uri)?;
    let bytes = resp.bytes().await.map_err(|e| FourLepError::Other(e.to_string()))?;
    tracing::debug!(uri, size = bytes.len(), "fetched object from GCS");
    Ok(bytes)
}

/// `$GOOGLE_OAUTH_ACCESS_TOKEN` when set, otherwise the metadata server token (GCE/GKE)
async fn get_adc_token() -> Result<String> {
    if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
        if !token.is_empty() {
            return Ok(token);
        }
    }
    let url = "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
    let resp = reqwest::Client::new()
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| FourLepError::Auth(format!("metadata server unreachable: {e}")))?;
    if !resp.status().is_success() {
        return Err(FourLepError::Auth(format!("metadata server returned HTTP {}", resp.status())));
    }
    let token: AccessToken = resp.json().await.map_err(|e| FourLepError::Auth(e.to_string()))?;
    Ok(token.access_token)
}

/// percent-encode everything outside the RFC 3986 unreserved set
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_object() {
        let u = parse_gcs_uri("gs://atlas-open/4lep/Data/data_A.4lep.parquet").unwrap();
        assert_eq!(u.bucket, "atlas-open");
        assert_eq!(u.object, "4lep/Data/data_A.4lep.parquet");
        assert_eq!(percent_encode(&u.object), "4lep%2FData%2Fdata_A.4lep.parquet");
        assert!(is_gcs_uri("gs://x/y"));
        assert!(parse_gcs_uri("gs://x").is_none());
    }

    #[test]
    fn listing_url_encodes_prefix_and_page_token() {
        assert_eq!(
            list_url("atlas-open", "4lep/MC run&2", None),
            "https://storage.googleapis.com/storage/v1/b/atlas-open/o?prefix=4lep%2FMC%20run%262&fields=items/name,nextPageToken"
        );
        assert!(list_url("b", "p", Some("a+b=")).ends_with("&pageToken=a%2Bb%3D"));
    }

    #[test]
    fn listing_page_deserialises() {
        let page: ObjectList = serde_json::from_str(
            r#"{"items": [{"name": "4lep/MC/mc_1.A.4lep.parquet"}], "nextPageToken": "abc"}"#,
        )
        .unwrap();
        assert_eq!(page.items[0].name, "4lep/MC/mc_1.A.4lep.parquet");
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        let last: ObjectList = serde_json::from_str("{}").unwrap();
        assert!(last.items.is_empty() && last.next_page_token.is_none());
    }
}
