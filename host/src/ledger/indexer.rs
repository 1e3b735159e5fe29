//! GraphQL indexer client.

use blindquiz_core::{latest_rows, padded_address, TableRow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::Indexer;
use crate::error::LedgerError;

/// Latest row per key of one table; rows whose value was removed come back
/// with a null `decoded_value`.
pub const TABLE_ROWS_QUERY: &str = r#"query TableRows($handle: String!) {
  table_items(
    order_by: [{decoded_key: asc}, {transaction_version: desc}]
    distinct_on: decoded_key
    where: {table_handle: {_eq: $handle}}
  ) {
    decoded_key
    decoded_value
    transaction_version
  }
}"#;

pub struct GraphqlIndexer {
    http: Client,
    url: Url,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<TableItems>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Deserialize)]
struct TableItems {
    table_items: Vec<TableRow>,
}

impl GraphqlIndexer {
    pub fn new(url: Url) -> Self {
        Self {
            http: Client::new(),
            url,
        }
    }
}

impl Indexer for GraphqlIndexer {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn table_rows(&self, handle: &str) -> Result<Vec<TableRow>, LedgerError> {
        // the indexer stores handles zero-padded
        let handle = padded_address(handle).map_err(|e| LedgerError::Response(e.to_string()))?;
        let body = json!({
            "query": TABLE_ROWS_QUERY,
            "operationName": "TableRows",
            "variables": { "handle": handle },
        });
        let resp = self.http.post(self.url.clone()).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Api { status, message });
        }
        let parsed: GraphqlResponse = resp.json().await?;
        if !parsed.errors.is_empty() {
            return Err(LedgerError::Response(Value::Array(parsed.errors).to_string()));
        }
        let items = parsed
            .data
            .ok_or_else(|| LedgerError::Response("indexer returned no data".to_string()))?;
        Ok(latest_rows(items.table_items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses() {
        let json = json!({
            "data": {"table_items": [
                {"decoded_key": "0xab", "decoded_value": null, "transaction_version": 12},
                {"decoded_key": "0xcd", "decoded_value": {"quest": "1"}, "transaction_version": 15}
            ]}
        });
        let parsed: GraphqlResponse = serde_json::from_value(json).unwrap();
        let rows = latest_rows(parsed.data.unwrap().table_items);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version, 15);
    }

    #[test]
    fn query_orders_and_dedups() {
        assert!(TABLE_ROWS_QUERY.contains("distinct_on: decoded_key"));
        assert!(TABLE_ROWS_QUERY.contains("{transaction_version: desc}"));
    }
}
