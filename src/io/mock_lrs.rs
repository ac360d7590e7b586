//! In-process mock of the LRS locate and apply-edits endpoints
//!
//! Uses hyper for the HTTP server. Measures are the probe's x coordinate;
//! probes with an empty route id come back as `esriLocatingCannotFindRoute`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Number of requests answered with 503 before normal service
    pub transient_failures: usize,
    /// Answer apply-edits with `"success": false`
    pub reject_edits: bool,
}

#[derive(Debug, Default)]
pub struct MockState {
    behavior: MockBehavior,
    remaining_failures: AtomicUsize,
    locate_requests: AtomicUsize,
    edit_requests: AtomicUsize,
    events_added: AtomicUsize,
}

impl MockState {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            remaining_failures: AtomicUsize::new(behavior.transient_failures),
            behavior,
            ..Default::default()
        }
    }

    pub fn locate_requests(&self) -> usize {
        self.locate_requests.load(Ordering::Relaxed)
    }

    pub fn edit_requests(&self) -> usize {
        self.edit_requests.load(Ordering::Relaxed)
    }

    pub fn events_added(&self) -> usize {
        self.events_added.load(Ordering::Relaxed)
    }

    fn take_failure(&self) -> bool {
        self.remaining_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn form_field(body: &[u8], name: &str) -> Option<String> {
    form_urlencoded::parse(body).find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
}

fn json_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("static response should not fail")
}

fn locate_locations(locations: &[Value]) -> Vec<Value> {
    locations
        .iter()
        .map(|location| {
            let route_id = match &location["routeId"] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => String::new(),
            };
            match location["geometry"]["x"].as_f64() {
                Some(x) if !route_id.is_empty() => json!({
                    "status": "esriLocatingOK",
                    "results": [{"routeId": route_id, "measure": x, "geometryType": "esriGeometryPoint"}]
                }),
                _ => json!({"status": "esriLocatingCannotFindRoute", "results": []}),
            }
        })
        .collect()
}

fn handle_locate(state: &MockState, body: &[u8]) -> Response<Full<Bytes>> {
    state.locate_requests.fetch_add(1, Ordering::Relaxed);

    let parsed = form_field(body, "locations")
        .and_then(|raw| serde_json::from_str::<Vec<Value>>(&raw).ok());
    let Some(locations) = parsed else {
        return json_response(
            StatusCode::OK,
            json!({"error": {"code": 400, "message": "Invalid or missing 'locations' parameter"}}),
        );
    };

    debug!(probes = %locations.len(), "mock_locate");
    json_response(StatusCode::OK, json!({"locations": locate_locations(&locations)}))
}

fn handle_apply_edits(state: &MockState, body: &[u8]) -> Response<Full<Bytes>> {
    state.edit_requests.fetch_add(1, Ordering::Relaxed);

    if state.behavior.reject_edits {
        return json_response(
            StatusCode::OK,
            json!({"success": false, "error": {"code": 500, "message": "Edit rejected"}}),
        );
    }

    let edits = form_field(body, "edits")
        .and_then(|raw| serde_json::from_str::<Vec<Value>>(&raw).ok())
        .unwrap_or_default();
    let adds: usize = edits
        .iter()
        .map(|layer| layer["adds"].as_array().map_or(0, Vec::len))
        .sum();
    state.events_added.fetch_add(adds, Ordering::Relaxed);

    debug!(adds = %adds, "mock_apply_edits");
    json_response(StatusCode::OK, json!({"success": true}))
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<MockState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})));
        }
    };

    if method == Method::POST && state.take_failure() {
        return Ok(json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": {"code": 503, "message": "Service unavailable"}}),
        ));
    }

    let response = match method {
        Method::POST if path.ends_with("/geometryToMeasure") => handle_locate(&state, &body),
        Method::POST if path.ends_with("/applyEdits") => handle_apply_edits(&state, &body),
        _ => json_response(StatusCode::NOT_FOUND, json!({"error": "not found"})),
    };
    Ok(response)
}

/// Serve until `shutdown` flips to true
pub async fn serve(
    listener: TcpListener,
    state: Arc<MockState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "mock_lrs_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!(error = %e, "mock_lrs_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "mock_lrs_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mock_lrs_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
