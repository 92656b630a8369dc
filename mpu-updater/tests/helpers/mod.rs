//! Test helper utilities
//!
//! Shared fixtures for mpu-updater integration tests: a spy
//! [`ProductApi`], CSV fixture writers and fast batch settings.
#![allow(dead_code)]

use async_trait::async_trait;
use mpu_updater::services::{
    ApiResponse, BatchSettings, ExecutorSettings, ProductApi, TransportError, UpdateRequest,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Records every call and answers from a script, then with success
#[derive(Default)]
pub struct SpyApi {
    script: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<UpdateRequest>>,
    /// Fixed latency per call
    latency: Option<Duration>,
}

impl SpyApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(script: Vec<Result<ApiResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<UpdateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductApi for SpyApi {
    async fn update(&self, request: &UpdateRequest) -> Result<ApiResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(ApiResponse::success(Some(format!(
                "req-{}",
                self.calls.load(Ordering::SeqCst)
            ))))
        })
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Lookup CSV from `(spu, product, skus)` triples
pub fn write_lookup(dir: &Path, entries: &[(&str, &str, &str)]) -> PathBuf {
    let mut content = String::from("SPU_ID,Product_ID,SKU_IDs\n");
    for (spu, product, skus) in entries {
        content.push_str(&format!("{},{},\"{}\"\n", spu, product, skus));
    }
    write_file(dir, "lookup.csv", &content)
}

/// Input CSV from `(spu, price, inventory)` triples
pub fn write_input(dir: &Path, rows: &[(&str, &str, &str)]) -> PathBuf {
    let mut content = String::from("SPU_ID,price,inventory\n");
    for (spu, price, inventory) in rows {
        content.push_str(&format!("{},{},{}\n", spu, price, inventory));
    }
    write_file(dir, "input.csv", &content)
}

/// Settings with millisecond backoffs so retry tests stay fast
pub fn fast_settings(workers: usize, chunk_size: Option<usize>, max_retries: u32) -> BatchSettings {
    BatchSettings {
        workers,
        chunk_size,
        initial_delay: Duration::ZERO,
        adaptive_delay: true,
        executor: ExecutorSettings {
            max_retries,
            max_rate_limit_retries: 5,
            rate_limit_backoff: Duration::from_millis(1),
            retry_backoff_ms: 1,
        },
    }
}
