//! HTTP proxy-integration envelope around the batch scorer.
//!
//! The event is the JSON the gateway hands over; `body` is either a JSON string
//! or an already decoded object. Every outcome, including client errors, is
//! returned as a response rather than an `Err`.

use crate::{
    batch::Batch,
    config::Config,
    error::{OmrError, OmrResult},
    report::{ReportTable, report_columns},
    scorer::SurveyResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const SUCCESS_MESSAGE: &str = "Success";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ProxyResponse {
    pub fn new(status_code: u16, payload: &Value) -> Self {
        let headers = [
            ("Content-Type", "application/json"),
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Credentials", "true"),
            ("Access-Control-Allow-Methods", "POST, GET, OPTIONS"),
            ("Access-Control-Allow-Headers", "*"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            status_code,
            headers,
            body: payload.to_string(),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(status_code, &json!({ "message": message.into() }))
    }

    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

/// Successful scoring payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreOutput {
    pub message: String,
    pub data: Vec<SurveyResponse>,
    pub excel_base64: String,
}

pub fn handle_event(cfg: &Config, event: &Value) -> ProxyResponse {
    let body = match event.get("body") {
        Some(b) if !is_blank(b) => b,
        _ => return ProxyResponse::error(400, "Missing request body"),
    };

    let parsed = match parse_body(body) {
        Ok(v) => v,
        Err(msg) => return ProxyResponse::error(400, format!("Invalid JSON: {msg}")),
    };

    match handle_payload(cfg, &parsed) {
        Ok(out) => match serde_json::to_value(&out) {
            Ok(v) => ProxyResponse::new(200, &v),
            Err(e) => ProxyResponse::error(500, e.to_string()),
        },
        Err(err) => {
            warn!("request rejected: {err}");
            ProxyResponse::error(err.status_code(), err.to_string())
        }
    }
}

/// Scores the `images` of an already parsed payload and builds the report.
pub fn handle_payload(cfg: &Config, payload: &Value) -> OmrResult<ScoreOutput> {
    let images = extract_images(payload)?;

    let batch = Batch::new(cfg);
    batch.check_request(images.len())?;
    info!("scoring {} images", images.len());

    let data = batch.score_entries(images);
    let columns = report_columns(batch.grid());
    let table = ReportTable::build(&cfg.report, &columns, &data);
    let excel_base64 = table.to_xlsx_base64(&cfg.report.sheet_name)?;

    Ok(ScoreOutput {
        message: SUCCESS_MESSAGE.to_string(),
        data,
        excel_base64,
    })
}

fn parse_body(body: &Value) -> Result<Value, String> {
    match body {
        Value::String(raw) => serde_json::from_str(raw).map_err(|e| e.to_string()),
        Value::Object(_) => Ok(body.clone()),
        _ => Err("Unsupported body type".to_string()),
    }
}

/// Null, `false`, zero and empty strings, arrays or objects all count as no body.
fn is_blank(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// A missing, empty or non-array `images` rejects the request; a bad element
/// only fails its own slot.
fn extract_images(payload: &Value) -> OmrResult<Vec<OmrResult<&str>>> {
    let list = payload
        .get("images")
        .and_then(Value::as_array)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| OmrError::ClientInput("No images provided".into()))?;

    Ok(list
        .iter()
        .map(|v| {
            v.as_str().ok_or_else(|| {
                OmrError::ImageDecode(format!("expected a base64 string, got {}", json_type(v)))
            })
        })
        .collect())
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
