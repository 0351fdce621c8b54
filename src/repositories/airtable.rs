use std::time::Duration;

use anyhow::{anyhow, bail};
use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::settings;

#[derive(Deserialize)]
struct ListResponse<T> {
    records: Vec<T>,
    offset: Option<String>,
}

/// Thin REST client for one Airtable base.
pub struct AirtableClient {
    url: Url,
    base_id: String,
    api_key: String,
    client: reqwest::Client,
}

impl AirtableClient {
    pub fn new(settings: &settings::Airtable) -> Result<Self, anyhow::Error> {
        let url = Url::parse(&settings.url)
            .map_err(|e| anyhow!("Airtable: invalid url {}: {}", settings.url, e))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            url,
            base_id: settings.base_id.clone(),
            api_key: settings.api_key.clone(),
            client,
        })
    }

    fn table_url(&self, table: &str, record_id: Option<&str>) -> Result<Url, anyhow::Error> {
        let mut url = self.url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Airtable: url cannot be a base"))?;
            segments.pop_if_empty().extend(["v0", self.base_id.as_str(), table]);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }

        Ok(url)
    }

    /// Fetches every record matching `formula`, following pagination.
    pub async fn list<T: DeserializeOwned>(
        &self,
        table: &str,
        formula: Option<&str>,
    ) -> Result<Vec<T>, anyhow::Error> {
        let url = self.table_url(table, None)?;
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(formula) = formula {
                query.push(("filterByFormula", formula.to_string()));
            }
            if let Some(offset) = &offset {
                query.push(("offset", offset.clone()));
            }

            let request = self
                .client
                .get(url.clone())
                .bearer_auth(&self.api_key)
                .query(&query);
            let page: ListResponse<T> = self.send(request, "list", table).await?;

            records.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    pub async fn create<F: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        fields: &F,
    ) -> Result<T, anyhow::Error> {
        let url = self.table_url(table, None)?;
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields, "typecast": true }));

        self.send(request, "create", table).await
    }

    pub async fn update<F: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        record_id: &str,
        fields: &F,
    ) -> Result<T, anyhow::Error> {
        let url = self.table_url(table, Some(record_id))?;
        let request = self
            .client
            .request(Method::PATCH, url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "fields": fields, "typecast": true }));

        self.send(request, "update", table).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
        table: &str,
    ) -> Result<T, anyhow::Error> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Airtable: {} on {} failed with {}: {}", action, table, status, body);
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| anyhow!("Airtable: bad {} response from {}: {}", action, table, e))
    }
}

/// Quotes `value` as a formula string literal.
pub fn formula_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// `{field} = 'value'`
pub fn field_equals(field: &str, value: &str) -> String {
    format!("{{{}}} = {}", field, formula_string(value))
}

/// Case-insensitive comparison of a text field.
pub fn field_equals_ignore_case(field: &str, value: &str) -> String {
    format!(
        "LOWER(TRIM({{{}}})) = {}",
        field,
        formula_string(&value.trim().to_lowercase())
    )
}
