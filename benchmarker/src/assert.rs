//! Response assertions
//!
//! Each check inspects a captured [`Response`] without consuming it and
//! returns a classified [`Failure`] on violation. Callers decide whether to
//! stop at the first failure or keep checking.

use std::fmt::Display;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::agent::{AssetManifest, Response, sha256_hex};
use crate::failure::{ErrorKind, Failure};
use crate::step::BenchmarkStep;

/// Record a failed `/initialize` as critical
pub fn assert_initialize(step: &BenchmarkStep, res: &Response) {
    if let Err(failure) = assert_status_code(res, StatusCode::OK) {
        step.add_error(Failure::critical(format!(
            "Initialize failed: {}",
            failure.message
        )));
    }
}

pub fn assert_status_code(res: &Response, code: StatusCode) -> Result<(), Failure> {
    if res.status != code {
        return Err(Failure::new(
            ErrorKind::InvalidStatusCode,
            format!(
                "Invalid status code: {} (expected: {})",
                res.status.as_u16(),
                code.as_u16()
            ),
        ));
    }
    Ok(())
}

pub fn assert_content_type(res: &Response, content_type: &str) -> Result<(), Failure> {
    let actual = res.content_type();
    if !actual.starts_with(content_type) {
        return Err(Failure::new(
            ErrorKind::InvalidContentType,
            format!("Invalid content type: {actual} (expected: {content_type})"),
        ));
    }
    Ok(())
}

/// Decode the body as JSON into `T`
pub fn assert_json_body<T: DeserializeOwned>(res: &Response) -> Result<T, Failure> {
    serde_json::from_slice(&res.body)
        .map_err(|e| Failure::new(ErrorKind::InvalidJson, format!("Invalid JSON: {e}")))
}

pub fn assert_equal_string(expected: &str, actual: &str) -> Result<(), Failure> {
    if expected != actual {
        return Err(mismatch(expected, actual));
    }
    Ok(())
}

pub fn assert_equal_uint(expected: u64, actual: u64) -> Result<(), Failure> {
    if expected != actual {
        return Err(mismatch(expected, actual));
    }
    Ok(())
}

fn mismatch(expected: impl Display, actual: impl Display) -> Failure {
    Failure::new(
        ErrorKind::InvalidJson,
        format!("Mismatched value: {actual} (expected: {expected})"),
    )
}

/// Compare the body digest with the manifest; unknown assets pass
pub fn assert_checksum(path: &str, res: &Response, assets: &AssetManifest) -> Result<(), Failure> {
    let Some(expected) = assets.expected_digest(path) else {
        return Ok(());
    };

    let actual = sha256_hex(&res.body);
    if actual != expected {
        return Err(Failure::new(
            ErrorKind::InvalidAsset,
            format!("Asset checksum mismatch: {path}"),
        ));
    }
    Ok(())
}
