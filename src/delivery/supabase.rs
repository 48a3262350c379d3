use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;
use std::time::Duration;

use super::store::{PhotoRecord, RecordId, RemoteStore, StoreError};

/// Supabase storage bucket plus PostgREST table, over plain HTTP.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    bucket: String,
    table: String,
}

impl SupabaseStore {
    pub fn new(url: &str, key: &str, bucket: &str, table: &str) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|_| StoreError::Protocol("API key is not a valid header value".into()))?;
        let apikey = HeaderValue::from_str(key)
            .map_err(|_| StoreError::Protocol("API key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("apikey", apikey);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            table: table.to_string(),
        })
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, name)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn send(req: RequestBuilder) -> Result<Response, StoreError> {
        let response = req.send()?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().unwrap_or_default();
            Err(StoreError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-0/42` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

impl RemoteStore for SupabaseStore {
    fn put_object(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let req = self
            .client
            .post(self.object_url(name))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        Self::send(req)?;
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, name)
    }

    fn insert_record(&self, filename: &str, url: &str) -> Result<(), StoreError> {
        let req = self
            .client
            .post(self.table_url())
            .header("Prefer", "return=minimal")
            .json(&json!({ "filename": filename, "url": url }));
        Self::send(req)?;
        Ok(())
    }

    fn count_records(&self) -> Result<u64, StoreError> {
        let req = self
            .client
            .get(self.table_url())
            .query(&[("select", "id")])
            .header("Prefer", "count=exact")
            .header("Range", "0-0");
        let response = Self::send(req)?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Protocol("missing Content-Range".into()))?;
        parse_content_range_total(range).ok_or_else(|| StoreError::Protocol(format!("bad Content-Range '{}'", range)))
    }

    fn oldest_records(&self, limit: u64) -> Result<Vec<PhotoRecord>, StoreError> {
        let limit = limit.to_string();
        let req = self.client.get(self.table_url()).query(&[
            ("select", "id,filename"),
            ("order", "created_at.asc"),
            ("limit", limit.as_str()),
        ]);
        Ok(Self::send(req)?.json()?)
    }

    fn remove_objects(&self, names: &[String]) -> Result<(), StoreError> {
        let req = self
            .client
            .delete(format!("{}/storage/v1/object/{}", self.base_url, self.bucket))
            .json(&json!({ "prefixes": names }));
        Self::send(req)?;
        Ok(())
    }

    fn delete_record(&self, id: &RecordId) -> Result<(), StoreError> {
        let filter = format!("eq.{}", id);
        let req = self.client.delete(self.table_url()).query(&[("id", filter.as_str())]);
        Self::send(req)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-0/642"), Some(642));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-0/*"), None);
    }

    #[test]
    fn test_urls() {
        let store = SupabaseStore::new("https://x.supabase.co/", "key", "magic-photos", "photos").unwrap();
        assert_eq!(store.object_url("a.jpg"), "https://x.supabase.co/storage/v1/object/magic-photos/a.jpg");
        assert_eq!(
            store.public_url("a.jpg"),
            "https://x.supabase.co/storage/v1/object/public/magic-photos/a.jpg"
        );
        assert_eq!(store.table_url(), "https://x.supabase.co/rest/v1/photos");
    }
}
