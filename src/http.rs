//! Shared HTTP plumbing for the REST backend and artifact proxy.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::warn;

use crate::{Error, Result};

/// Error body returned by the tracking server.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Pass successful responses through; turn error replies into `Error`.
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
        error_code: String::new(),
        message: text,
    });
    warn!(status = status.as_u16(), code = %body.error_code, message = %body.message, "backend request failed");

    Err(match body.error_code.as_str() {
        "RESOURCE_DOES_NOT_EXIST" => Error::NotFound(body.message),
        "RESOURCE_ALREADY_EXISTS" => Error::AlreadyExists(body.message),
        "INVALID_PARAMETER_VALUE" => Error::InvalidArgument(body.message),
        _ if status == reqwest::StatusCode::NOT_FOUND && body.error_code.is_empty() => {
            Error::NotFound(body.message)
        }
        _ => Error::Backend {
            status: status.as_u16(),
            code: body.error_code,
            message: body.message,
        },
    })
}
