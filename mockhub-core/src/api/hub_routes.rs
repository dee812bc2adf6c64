use std::sync::Arc;
use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use serde_json::{json, Map, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use mockhub_common::models::{HubMode, HubSubscriptionRequest};

use crate::services::validation::MAX_SECRET_BYTES;
use crate::services::SubscriptionService;
use crate::Error;

/// Header whose value is recorded as the subscription's creator.
pub const CLIENT_ID_HEADER: &str = "Client-ID";

/// Shared state for the hub route.
#[derive(Clone)]
pub struct HubApiState {
    pub subscriptions: Arc<SubscriptionService>,
    pub log_errors: bool,
}

/// Error body the hub answers with: `{"status":"error","message":...}`.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({ "status": "error", "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Mounts the subscribe/unsubscribe endpoint at `path`.
pub fn hub_router(path: &str, state: HubApiState) -> Router {
    Router::new()
        .route(path, post(handle_hub_request))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn handle_hub_request(
    State(state): State<HubApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let client_id = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let result = match parse_hub_body(&headers, &body) {
        Ok(request) => state.subscriptions.handle_request(&request, client_id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(HubMode::Subscribe) => Ok(StatusCode::ACCEPTED),
        Ok(HubMode::Unsubscribe) => Ok(StatusCode::OK),
        Err(e) => {
            if state.log_errors && !e.is_bad_request() {
                error!("Hub request failed: {}", e);
            } else {
                debug!("Hub request rejected: {}", e);
            }
            Err(ApiError(e))
        }
    }
}

/// Parses a JSON or form-encoded body and applies the presence checks.
pub fn parse_hub_body(headers: &HeaderMap, body: &[u8]) -> Result<HubSubscriptionRequest, Error> {
    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let fields = if is_form {
        form_fields(body)
    } else {
        serde_json::from_slice::<Map<String, Value>>(body)
            .map_err(|e| Error::bad_request(format!("Request body must be a JSON object: {}", e)))?
    };
    request_from_fields(fields)
}

fn form_fields(body: &[u8]) -> Map<String, Value> {
    url::form_urlencoded::parse(body)
        .map(|(key, value)| {
            let value = if key == "hub.lease_seconds" {
                // numbers arrive as text in a form
                serde_json::from_str::<serde_json::Number>(&value)
                    .map(Value::Number)
                    .unwrap_or_else(|_| Value::String(value.into_owned()))
            } else {
                Value::String(value.into_owned())
            };
            (key.into_owned(), value)
        })
        .collect()
}

/// Falsy JSON (missing, null, "", false, 0) counts as absent.
fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

fn required_string(fields: &Map<String, Value>, name: &str) -> Result<String, Error> {
    let value = fields.get(name);
    if is_falsy(value) {
        return Err(Error::bad_request(format!("No {} on request object", name)));
    }
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        _ if name == "hub.secret" => Err(Error::bad_request(format!(
            "hub.secret must be a string that has a length less than {} bytes.",
            MAX_SECRET_BYTES
        ))),
        _ => Err(Error::bad_request(format!("{} must be a string", name))),
    }
}

fn lease_field(fields: &Map<String, Value>, required: bool) -> Result<Option<i64>, Error> {
    let missing = || Error::bad_request("No hub.lease_seconds on request object");
    match fields.get("hub.lease_seconds") {
        None | Some(Value::Null) => {
            if required {
                Err(missing())
            } else {
                Ok(None)
            }
        }
        Some(Value::Number(n)) => {
            let lease = match n.as_i64() {
                Some(lease) => lease,
                None => {
                    let f = n.as_f64().unwrap_or(f64::NAN);
                    if f.fract() != 0.0 || f.is_nan() {
                        return Err(Error::bad_request("hub.lease_seconds must be an integer"));
                    }
                    // out of i64 range; saturates and fails the range check later
                    f as i64
                }
            };
            if lease == 0 && required {
                return Err(missing());
            }
            Ok(Some(lease))
        }
        Some(_) => Err(Error::bad_request("hub.lease_seconds must be a number")),
    }
}

fn request_from_fields(fields: Map<String, Value>) -> Result<HubSubscriptionRequest, Error> {
    let callback = required_string(&fields, "hub.callback")?;
    let mode = required_string(&fields, "hub.mode")?;
    let topic = required_string(&fields, "hub.topic")?;
    let lease_seconds = lease_field(&fields, mode == "subscribe")?;
    let secret = required_string(&fields, "hub.secret")?;

    Ok(HubSubscriptionRequest { callback, mode, topic, lease_seconds, secret })
}
