//! Marketplace product API collaborator
//!
//! The batch engine depends only on [`ProductApi`]: one `update` call per row
//! returning `{code, message, request_id}`. [`HttpProductApi`] is the reqwest
//! implementation; request signing and token refresh are left to the
//! gateway/SDK in front of `base_url`.

use crate::models::UpdateKind;
use crate::services::row_resolver::Resolution;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Response code for rate limiting
pub const RATE_LIMIT_CODE: &str = "429";
/// Message fragment the marketplace uses for rate limiting
pub const RATE_LIMIT_MESSAGE: &str = "frequency exceeds the limit";
/// Response codes worth retrying
pub const SERVER_ERROR_CODES: [&str; 4] = ["500", "502", "503", "504"];

const USER_AGENT: &str = concat!("mpu-updater/", env!("CARGO_PKG_VERSION"));

/// Failure to complete a call at all (as opposed to a non-success response)
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Payload serialization failed: {0}")]
    Serialization(String),
}

/// Per-variant price entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkuPrice {
    pub price: String,
    pub sku_id: String,
}

/// Per-variant inventory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkuInventory {
    pub sku_id: String,
    pub inventory: String,
}

/// One quantity break of a tiered price
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceTier {
    pub quantity: String,
    pub price: String,
}

/// Whole-product price, always sent as a single-tier `TIERED` structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TieredPrice {
    pub price_type: String,
    pub tiered_price: Vec<PriceTier>,
}

impl TieredPrice {
    pub fn single(price: &str) -> Self {
        Self {
            price_type: "TIERED".to_string(),
            tiered_price: vec![PriceTier {
                quantity: "1".to_string(),
                price: price.to_string(),
            }],
        }
    }
}

/// Update body: the two shapes for each update kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePayload {
    SkuPrice(Vec<SkuPrice>),
    TieredPrice(TieredPrice),
    SkuInventory(Vec<SkuInventory>),
    Inventory(String),
}

impl UpdatePayload {
    /// Choose the shape from the resolution: per-variant when the product has SKUs
    pub fn build(kind: UpdateKind, resolution: &Resolution, value: &str) -> Self {
        match (kind, resolution.has_variants) {
            (UpdateKind::Price, true) => UpdatePayload::SkuPrice(
                resolution
                    .sku_ids
                    .iter()
                    .map(|sku_id| SkuPrice {
                        price: value.to_string(),
                        sku_id: sku_id.clone(),
                    })
                    .collect(),
            ),
            (UpdateKind::Price, false) => UpdatePayload::TieredPrice(TieredPrice::single(value)),
            (UpdateKind::Inventory, true) => UpdatePayload::SkuInventory(
                resolution
                    .sku_ids
                    .iter()
                    .map(|sku_id| SkuInventory {
                        sku_id: sku_id.clone(),
                        inventory: value.to_string(),
                    })
                    .collect(),
            ),
            (UpdateKind::Inventory, false) => UpdatePayload::Inventory(value.to_string()),
        }
    }

    /// API parameter carrying the payload
    pub fn param_name(&self) -> &'static str {
        match self {
            UpdatePayload::SkuPrice(_) => "sku_price",
            UpdatePayload::TieredPrice(_) => "price",
            UpdatePayload::SkuInventory(_) => "sku_inventory",
            UpdatePayload::Inventory(_) => "inventory",
        }
    }

    /// Wire value: JSON text for structured shapes, the plain value for scalar inventory
    pub fn param_value(&self) -> Result<String, TransportError> {
        let json = match self {
            UpdatePayload::SkuPrice(items) => serde_json::to_string(items),
            UpdatePayload::TieredPrice(price) => serde_json::to_string(price),
            UpdatePayload::SkuInventory(items) => serde_json::to_string(items),
            UpdatePayload::Inventory(value) => return Ok(value.clone()),
        };
        json.map_err(|e| TransportError::Serialization(e.to_string()))
    }

    pub fn is_variant_update(&self) -> bool {
        matches!(self, UpdatePayload::SkuPrice(_) | UpdatePayload::SkuInventory(_))
    }
}

/// One update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub kind: UpdateKind,
    pub product_id: String,
    pub payload: UpdatePayload,
}

impl UpdateRequest {
    /// Business parameters of the call (credentials are added by the client)
    pub fn api_params(&self) -> Result<Vec<(&'static str, String)>, TransportError> {
        Ok(vec![
            ("product_id", self.product_id.clone()),
            (self.payload.param_name(), self.payload.param_value()?),
        ])
    }
}

/// Marketplace response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ApiResponse {
    pub fn success(request_id: Option<String>) -> Self {
        Self {
            code: "0".to_string(),
            message: String::new(),
            request_id,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == "0"
    }

    pub fn is_rate_limited(&self) -> bool {
        self.code == RATE_LIMIT_CODE || self.message.to_lowercase().contains(RATE_LIMIT_MESSAGE)
    }

    pub fn is_server_error(&self) -> bool {
        SERVER_ERROR_CODES.contains(&self.code.as_str())
    }

    /// Parse a marketplace JSON body
    ///
    /// `code` may arrive as a string or a number.
    pub fn from_json(body: &Value) -> Result<Self, TransportError> {
        let code = match body.get("code") {
            Some(Value::String(code)) => code.clone(),
            Some(Value::Number(code)) => code.to_string(),
            _ => {
                return Err(TransportError::InvalidResponse(format!(
                    "response has no code: {}",
                    body
                )))
            }
        };

        Ok(Self {
            code,
            message: body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            request_id: body
                .get("request_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Narrow contract the batch engine depends on
#[async_trait]
pub trait ProductApi: Send + Sync {
    async fn update(&self, request: &UpdateRequest) -> Result<ApiResponse, TransportError>;
}

/// Connection settings for [`HttpProductApi`]
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub base_url: String,
    pub app_key: String,
    pub access_token: String,
}

/// reqwest-backed marketplace client
pub struct HttpProductApi {
    http_client: reqwest::Client,
    credentials: ApiCredentials,
}

impl HttpProductApi {
    pub fn new(credentials: ApiCredentials, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            credentials,
        })
    }

    fn endpoint(&self, kind: UpdateKind) -> String {
        format!(
            "{}{}",
            self.credentials.base_url.trim_end_matches('/'),
            kind.api_path()
        )
    }
}

#[async_trait]
impl ProductApi for HttpProductApi {
    async fn update(&self, request: &UpdateRequest) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint(request.kind);
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();

        let mut params = request.api_params()?;
        params.push(("app_key", self.credentials.app_key.clone()));
        params.push(("access_token", self.credentials.access_token.clone()));
        params.push(("timestamp", timestamp));

        tracing::debug!(url = %url, product_id = %request.product_id, "Sending update request");

        let response = self
            .http_client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => ApiResponse::from_json(&body),
            // Gateways answer throttling and outages with bare HTTP errors
            Err(_) if !status.is_success() => Ok(ApiResponse::error(
                status.as_u16().to_string(),
                status.canonical_reason().unwrap_or("HTTP error").to_string(),
            )),
            Err(e) => Err(TransportError::InvalidResponse(format!(
                "non-JSON body ({}): {}",
                e,
                text.chars().take(200).collect::<String>()
            ))),
        }
    }
}
