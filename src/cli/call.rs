//! Raw API calls from the command line

use std::error::Error;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::api_client::{ApiClient, Method, RequestOptions};

pub fn parse_method(method: &str) -> Result<Method, Box<dyn Error>> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("Invalid HTTP method: {method}").into())
}

pub fn parse_body(body: Option<&str>) -> Result<Option<Value>, Box<dyn Error>> {
    match body {
        Some(raw) => serde_json::from_str::<Value>(raw)
            .map(Some)
            .map_err(|e| format!("Invalid JSON body: {e}").into()),
        None => Ok(None),
    }
}

/// Issue one request and print the decoded response. Ctrl+C cancels it.
pub async fn run_call(
    api: &ApiClient,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let method = parse_method(method)?;
    let body = parse_body(body)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let result = api
        .request::<Value, Value>(
            method,
            path,
            body.as_ref(),
            RequestOptions::with_cancel(cancel),
        )
        .await;
    watcher.abort();

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    }
}
