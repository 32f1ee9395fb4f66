use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::application::settings_store::SettingsRemote;
use crate::domain::error::ApiError;
use crate::log;

const LIST_KEYS: &[&str] = &[
    "data",
    "items",
    "results",
    "users",
    "clients",
    "projects",
    "categories",
    "assignments",
];

pub struct ApiClient {
    pub base_url: String,
    pub token: String,
    pub client: Client,
}

impl ApiClient {
    pub fn new(base_url: String, token: String) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path);
        log!("GET {}", url);
        let mut request = self.client.get(&url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        log!("GET {} -> {}", url, status);
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                body: body.lines().next().unwrap_or("").to_string(),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|error| ApiError::Decode(snippet_error(&error, &body)))
    }

    pub fn post_json(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let url = self.url(path);
        log!("POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request
            .send()
            .map_err(|e| ApiError::Transport(format!("builder/send: {e}")))?;

        let status = response.status();
        log!("POST {} -> {}", url, status);
        let text = response.text().unwrap_or_default();
        if !status.is_success() {
            log!("POST Error Body: {}", text);
            return Err(ApiError::Status {
                code: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| ApiError::Decode(snippet_error(&error, &text)))
    }

    /// Fetches a collection endpoint such as `/users` whatever envelope it uses.
    pub fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let value = self.get_json(path)?;
        parse_list(&value, LIST_KEYS)
    }
}

impl SettingsRemote for ApiClient {
    fn fetch_settings(&self) -> Result<Option<Value>, ApiError> {
        let value = self.get_json("/settings")?;
        let document = match value {
            Value::Object(mut map) if map.contains_key("data") && map.len() == 1 => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        match document {
            Value::Object(map) if !map.is_empty() => Ok(Some(Value::Object(map))),
            _ => Ok(None),
        }
    }

    fn push_settings(&self, settings: &Value) -> Result<(), ApiError> {
        self.post_json("/settings", settings).map(|_| ())
    }
}

fn snippet_error(error: &serde_json::Error, body: &str) -> String {
    let snippet = body.lines().next().unwrap_or("");
    if snippet.is_empty() {
        error.to_string()
    } else {
        format!("{error} | Response start: {snippet:.50}")
    }
}

pub(crate) fn parse_list<T: DeserializeOwned>(value: &Value, keys: &[&str]) -> Result<Vec<T>, ApiError> {
    if let Some(list) = extract_list(value, keys) {
        return serde_json::from_value(list).map_err(|error| ApiError::Decode(error.to_string()));
    }

    Err(ApiError::Decode(format!(
        "json without list (keys: {})",
        keys.join(", ")
    )))
}

fn extract_list(value: &Value, keys: &[&str]) -> Option<Value> {
    match value {
        Value::Array(_) if is_object_array(value) => Some(value.clone()),
        Value::Object(map) => {
            for key in keys {
                if let Some(list) = map.get(*key) {
                    if is_object_array(list) {
                        return Some(list.clone());
                    }
                }
            }
            for entry in map.values() {
                if let Some(found) = extract_list(entry, keys) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}

fn is_object_array(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(|item| item.is_object()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Client as ClientRecord;
    use serde_json::json;

    #[test]
    fn lists_are_found_inside_envelopes() {
        let body = json!({
            "meta": {"page": 1},
            "payload": {"clients": [{"id": "cl-9", "name": "Acme"}]}
        });
        let clients: Vec<ClientRecord> = parse_list(&body, LIST_KEYS).unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].name, "Acme");
        assert_eq!(clients[0].currency, "USD");
    }

    #[test]
    fn bare_arrays_are_accepted() {
        let body = json!([{"id": "cl-1", "name": "Northwind"}]);
        let clients: Vec<ClientRecord> = parse_list(&body, LIST_KEYS).unwrap();
        assert_eq!(clients[0].id, "cl-1");
    }

    #[test]
    fn scalars_are_rejected() {
        let result: Result<Vec<ClientRecord>, _> = parse_list(&json!({"count": 3}), LIST_KEYS);
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }
}
