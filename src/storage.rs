use http::StatusCode;
use serde::Serialize;
use url::Url;

/// Table holding one row per classified image.
const TABLE: &str = "garbage_classification";

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage insert failed: {status}: {message}")]
    Insert { status: StatusCode, message: String },

    #[error("storage HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct NewRecord<'a> {
    garbage_type: &'a str,
}

/// Insert client for the managed classification table.
///
/// The store speaks the PostgREST convention: one POST per insert against
/// the table resource, authenticated with the service key both as `apikey`
/// and as a bearer credential.
#[derive(Clone)]
pub struct RecordStore {
    client: reqwest::Client,
    insert_url: String,
    api_key: String,
}

impl RecordStore {
    pub fn new(base_url: &Url, api_key: String) -> Self {
        let insert_url = format!("{}/rest/v1/{TABLE}", base_url.as_str().trim_end_matches('/'));
        RecordStore {
            client: reqwest::Client::new(),
            insert_url,
            api_key,
        }
    }

    /// Write one record carrying only the label. Nothing else about the
    /// request is persisted.
    pub async fn insert_classification(&self, garbage_type: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .post(&self.insert_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(&[NewRecord { garbage_type }])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Insert { status, message });
        }

        Ok(())
    }
}
