//! Search index collaborator: a narrow upsert-only client.

#[async_trait::async_trait]
pub trait SearchIndexClient: Send + Sync {
    async fn upsert(&self, document_id: &str, fields: &serde_json::Value) -> anyhow::Result<()>;
}

/// HTTP search backend (one document per hotel).
pub struct HttpSearchIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl HttpSearchIndex {
    pub fn new(base_url: String, index: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            index,
        }
    }
}

#[async_trait::async_trait]
impl SearchIndexClient for HttpSearchIndex {
    async fn upsert(&self, document_id: &str, fields: &serde_json::Value) -> anyhow::Result<()> {
        let url = format!(
            "{}/indexes/{}/documents/{}",
            self.base_url, self.index, document_id
        );
        let resp = self.client.put(&url).json(fields).send().await?;
        resp.error_for_status()?;
        Ok(())
    }
}
