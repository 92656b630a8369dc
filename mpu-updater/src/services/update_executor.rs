//! Update executor
//!
//! Turns one input row into exactly one [`UpdateOutcome`]: validate, resolve,
//! build the payload, then call the API with retry.
//!
//! **Retry policy:**
//! - Rate limited: raise the adaptive delay, sleep the fixed rate-limit
//!   backoff and retry, at most `max_rate_limit_retries` times
//! - Server error (500/502/503/504) while `retry_count < max_retries`:
//!   exponential backoff starting at `retry_backoff_ms`, capped at 1000ms
//! - Anything else, including transport faults: terminal

use crate::models::outcome::CODE_TRANSPORT_ERROR;
use crate::models::{
    LookupTable, OperationKind, StatisticsRecorder, UpdateKind, UpdateOutcome, UpdateRow,
};
use crate::services::adaptive_delay::AdaptiveDelay;
use crate::services::input_reader::validate_row;
use crate::services::product_api::{
    ApiResponse, ProductApi, TransportError, UpdatePayload, UpdateRequest,
};
use crate::services::row_resolver::resolve;
use std::sync::Arc;
use std::time::Duration;

const MAX_RETRY_BACKOFF_MS: u64 = 1000;

/// Retry budget for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Server-error retries allowed per row
    pub max_retries: u32,
    /// Rate-limit retries allowed per row
    pub max_rate_limit_retries: u32,
    /// Fixed sleep after a rate-limit response
    pub rate_limit_backoff: Duration,
    /// First server-error backoff; doubles per retry
    pub retry_backoff_ms: u64,
}

impl ExecutorSettings {
    pub fn for_kind(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::Price => Self {
                max_retries: 1,
                max_rate_limit_retries: 10,
                rate_limit_backoff: Duration::from_millis(500),
                retry_backoff_ms: 20,
            },
            UpdateKind::Inventory => Self {
                max_retries: 3,
                max_rate_limit_retries: 10,
                rate_limit_backoff: Duration::from_millis(500),
                retry_backoff_ms: 20,
            },
        }
    }

    /// Backoff before server-error retry number `attempt` (0-based)
    pub fn server_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
        let ms = self
            .retry_backoff_ms
            .saturating_mul(factor)
            .min(MAX_RETRY_BACKOFF_MS);
        Duration::from_millis(ms)
    }
}

/// Per-run executor shared by all worker tasks
pub struct UpdateExecutor {
    kind: UpdateKind,
    api: Arc<dyn ProductApi>,
    lookup: Arc<LookupTable>,
    delay: Arc<AdaptiveDelay>,
    stats: Arc<StatisticsRecorder>,
    settings: ExecutorSettings,
}

impl UpdateExecutor {
    pub fn new(
        kind: UpdateKind,
        api: Arc<dyn ProductApi>,
        lookup: Arc<LookupTable>,
        delay: Arc<AdaptiveDelay>,
        stats: Arc<StatisticsRecorder>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            kind,
            api,
            lookup,
            delay,
            stats,
            settings,
        }
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    /// Process one row; never fails
    pub async fn execute(&self, row: &UpdateRow) -> UpdateOutcome {
        if let Err(message) = validate_row(row, self.kind) {
            tracing::warn!(
                row = row.row_number,
                spu_id = %row.spu_id,
                error = %message,
                "Row failed validation"
            );
            return UpdateOutcome::validation_failure(
                row.row_number,
                &row.spu_id,
                self.kind,
                &row.value,
                message,
            );
        }

        let resolution = match resolve(row, &self.lookup) {
            Ok(resolution) => resolution,
            Err(failure) => {
                tracing::warn!(row = row.row_number, spu_id = %row.spu_id, "SPU_ID not found in lookup table");
                return UpdateOutcome::lookup_failure(
                    row.row_number,
                    &row.spu_id,
                    self.kind,
                    &row.value,
                    failure.to_string(),
                );
            }
        };

        let payload = UpdatePayload::build(self.kind, &resolution, &row.value);
        let operation = if payload.is_variant_update() {
            OperationKind::VariantUpdate
        } else {
            OperationKind::WholeItemUpdate
        };
        let request = UpdateRequest {
            kind: self.kind,
            product_id: resolution.product_id.clone(),
            payload,
        };

        let (result, retry_count) = self.call_with_retry(&request, &row.spu_id).await;

        let (success, code, message, request_id) = match result {
            Ok(response) => (
                response.is_success(),
                response.code,
                response.message,
                response.request_id,
            ),
            Err(fault) => (false, CODE_TRANSPORT_ERROR.to_string(), fault.to_string(), None),
        };

        if success {
            tracing::debug!(
                spu_id = %row.spu_id,
                product_id = %resolution.product_id,
                operation = operation.label(self.kind),
                retry_count,
                "Update succeeded"
            );
        } else {
            tracing::warn!(
                spu_id = %row.spu_id,
                product_id = %resolution.product_id,
                operation = operation.label(self.kind),
                code = %code,
                message = %message,
                retry_count,
                "Update failed"
            );
        }

        UpdateOutcome {
            row_number: row.row_number,
            spu_id: row.spu_id.clone(),
            product_id: resolution.product_id,
            update_kind: self.kind,
            operation,
            value: row.value.clone(),
            sku_ids: resolution.sku_ids,
            success,
            code,
            message,
            request_id,
            retry_count,
        }
    }

    /// Call loop; returns the final response (or fault) and the retry count
    async fn call_with_retry(
        &self,
        request: &UpdateRequest,
        spu_id: &str,
    ) -> (Result<ApiResponse, TransportError>, u32) {
        let mut retry_count = 0u32;
        let mut rate_limit_retries = 0u32;
        let mut server_retries = 0u32;

        loop {
            let delay = self.delay.current();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let response = match self.api.update(request).await {
                Ok(response) => response,
                Err(fault) => return (Err(fault), retry_count),
            };

            if response.is_success() {
                self.delay.on_success();
                return (Ok(response), retry_count);
            }

            if response.is_rate_limited() {
                self.stats.record_rate_limited();
                let raised = self.delay.on_rate_limited();

                if rate_limit_retries >= self.settings.max_rate_limit_retries {
                    tracing::warn!(
                        spu_id,
                        rate_limit_retries,
                        "Rate-limit retries exhausted"
                    );
                    return (Ok(response), retry_count);
                }

                rate_limit_retries += 1;
                retry_count += 1;
                tracing::debug!(
                    spu_id,
                    retry_count,
                    delay_ms = raised.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(self.settings.rate_limit_backoff).await;
                continue;
            }

            if response.is_server_error() && retry_count < self.settings.max_retries {
                let backoff = self.settings.server_backoff(server_retries);
                server_retries += 1;
                retry_count += 1;
                tracing::debug!(
                    spu_id,
                    code = %response.code,
                    attempt = retry_count,
                    max_retries = self.settings.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Server error, retrying"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            return (Ok(response), retry_count);
        }
    }
}
