use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{JobApi, JobHandle, RunStatus};

/// Actor platform REST API (v2) over reqwest with a bearer token.
pub struct ApifyApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApifyApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let body = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl JobApi for ApifyApi {
    async fn whoami(&self) -> Result<String> {
        let body = self
            .get_json(&format!("{}/v2/users/me", self.base_url))
            .await
            .context("cannot reach actor platform")?;
        Ok(body["data"]["username"]
            .as_str()
            .unwrap_or("unknown")
            .to_string())
    }

    async fn submit(&self, actor_id: &str, input: &Value) -> Result<JobHandle> {
        // Actor ids use ~ in place of / in the path.
        let url = format!(
            "{}/v2/acts/{}/runs",
            self.base_url,
            actor_id.replace('/', "~")
        );
        let body: Value = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed run-submission response")?;

        let data = &body["data"];
        let run_id = data["id"]
            .as_str()
            .context("run id missing from submission response")?
            .to_string();
        let dataset_id = data["defaultDatasetId"]
            .as_str()
            .context("dataset id missing from submission response")?
            .to_string();
        Ok(JobHandle { run_id, dataset_id })
    }

    async fn status(&self, run_id: &str) -> Result<(RunStatus, String)> {
        let body = self
            .get_json(&format!("{}/v2/actor-runs/{}", self.base_url, run_id))
            .await?;
        let data = &body["data"];
        let status = RunStatus::parse(data["status"].as_str().unwrap_or(""));
        let message: String = data["statusMessage"]
            .as_str()
            .unwrap_or("")
            .chars()
            .take(70)
            .collect();
        Ok((status, message))
    }

    async fn items(&self, dataset_id: &str) -> Result<Vec<Value>> {
        let url = format!(
            "{}/v2/datasets/{}/items?format=json&clean=true",
            self.base_url, dataset_id
        );
        let items: Vec<Value> = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed dataset items response")?;
        Ok(items)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let api = ApifyApi::new("https://api.example.com/", "tok");
        assert_eq!(api.base_url, "https://api.example.com");
    }
}
