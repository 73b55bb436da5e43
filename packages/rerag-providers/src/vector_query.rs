use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};
use rerag_config::VectorQueryProviderConfig;

/// One `{hash, score}` pair returned by the vector query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
	pub hash: String,
	pub score: f32,
}

pub async fn query(
	cfg: &VectorQueryProviderConfig,
	collection: &str,
	query_text: &str,
	limit: u32,
) -> Result<Vec<VectorHit>> {
	if collection.trim().is_empty() {
		return Err(Error::InvalidConfig {
			message: "Vector query collection must be non-empty.".to_string(),
		});
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"collection": collection,
		"query": query_text,
		"limit": limit,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_query_response(json)
}

/// Accepts either a bare array of hits or an object wrapping them under `results`.
pub fn parse_query_response(json: Value) -> Result<Vec<VectorHit>> {
	let items = match &json {
		Value::Array(items) => items,
		Value::Object(object) => object.get("results").and_then(Value::as_array).ok_or_else(|| {
			Error::InvalidResponse {
				message: "Vector query response is missing results array.".to_string(),
			}
		})?,
		_ => {
			return Err(Error::InvalidResponse {
				message: "Vector query response must be an array or object.".to_string(),
			});
		},
	};
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		let Some(hash) = item.get("hash").and_then(hash_to_string) else {
			return Err(Error::InvalidResponse {
				message: "Vector query hit is missing hash.".to_string(),
			});
		};
		let score = item.get("score").and_then(Value::as_f64).ok_or_else(|| {
			Error::InvalidResponse { message: format!("Vector query hit {hash} has no score.") }
		})?;

		out.push(VectorHit { hash, score: score as f32 });
	}

	Ok(out)
}

fn hash_to_string(value: &Value) -> Option<String> {
	match value {
		Value::String(text) => Some(text.clone()),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}
