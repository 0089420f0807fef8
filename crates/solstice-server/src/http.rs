//! HTTP surface.
//!
//! `GET /?lat=<deg>&lon=<deg>` renders the planet lit from that sub-solar
//! point and answers with a PNG. `GET /healthz` reports worker readiness.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::dispatch::{DispatchError, Dispatcher, Readiness};
use crate::encode;

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(render))
        .route("/healthz", get(healthz))
        .with_state(AppState { dispatcher })
}

/// Raw query values; parsed strictly by [`RenderQuery::coordinates`].
#[derive(Debug, Deserialize)]
struct RenderQuery {
    lat: Option<String>,
    lon: Option<String>,
}

impl RenderQuery {
    fn coordinates(&self) -> Option<(f64, f64)> {
        Some((
            parse_degrees(self.lat.as_deref()?)?,
            parse_degrees(self.lon.as_deref()?)?,
        ))
    }
}

/// The whole string must be a finite number.
fn parse_degrees(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, PartialEq)]
enum ApiError {
    InvalidCoordinates,
    Overloaded,
    Internal,
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Overloaded { .. } => ApiError::Overloaded,
            other => {
                log::error!("render request failed: {other}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidCoordinates => (
                StatusCode::BAD_REQUEST,
                "Invalid or missing lat/lon parameters",
            ),
            ApiError::Overloaded => (StatusCode::SERVICE_UNAVAILABLE, "Renderer is overloaded"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn render(
    State(state): State<AppState>,
    query: Result<Query<RenderQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|_| ApiError::InvalidCoordinates)?;
    let (lat, lon) = query.coordinates().ok_or(ApiError::InvalidCoordinates)?;

    let ticket = state.dispatcher.submit(lat, lon)?;
    let id = ticket.id();
    let pixels = ticket.wait().await?;

    let png = encode::encode_png_blocking(pixels).await.map_err(|e| {
        log::error!("job {id}: {e:#}");
        ApiError::Internal
    })?;
    log::debug!("job {id}: {} bytes of png for lat {lat}, lon {lon}", png.len());

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn healthz(State(state): State<AppState>) -> Response {
    let (status, label) = match state.dispatcher.readiness() {
        Readiness::Ready => (StatusCode::OK, "ready"),
        Readiness::Initializing => (StatusCode::SERVICE_UNAVAILABLE, "initializing"),
        Readiness::Failed => (StatusCode::SERVICE_UNAVAILABLE, "failed"),
    };
    (status, Json(json!({ "status": label }))).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use solstice_engine::{
        FrameRenderer, PixelBuffer, RenderError, RenderWorker, SunDirection, Viewport,
    };
    use tower::ServiceExt;

    use super::*;

    /// Solid frame whose red channel encodes the sun's x component.
    struct FakeRenderer {
        fail: bool,
    }

    impl FrameRenderer for FakeRenderer {
        fn render_frame(&mut self, sun: SunDirection) -> Result<PixelBuffer, RenderError> {
            if self.fail {
                return Err(RenderError::BufferMap("mapping failed".into()));
            }
            let viewport = Viewport::from_width(8).unwrap();
            let red = ((sun.vector().x + 1.0) * 127.5).round() as u8;
            PixelBuffer::from_rgba8(viewport, [red, 0, 0, 255].repeat(viewport.rgba_len() / 4))
        }
    }

    /// Spawns a fake worker plus the message pump. The worker waits on the
    /// returned sender before reporting ready.
    fn app(fail: bool, max_pending: usize) -> (Router, Arc<Dispatcher>, mpsc::Sender<()>) {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (worker, events) = RenderWorker::spawn(move || {
            let _ = release_rx.recv();
            Ok(FakeRenderer { fail })
        })
        .unwrap();

        let dispatcher = Arc::new(Dispatcher::new(worker.sender(), max_pending));
        tokio::spawn(crate::pump_worker_messages(Arc::clone(&dispatcher), events));
        (router(Arc::clone(&dispatcher)), dispatcher, release_tx)
    }

    async fn wait_until_ready(dispatcher: &Dispatcher) {
        while dispatcher.readiness() != Readiness::Ready {
            tokio::task::yield_now().await;
        }
    }

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn png_body(response: Response) -> image::RgbaImage {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        image::load_from_memory(&bytes).unwrap().to_rgba8()
    }

    #[test]
    fn coordinate_parsing_is_strict() {
        assert_eq!(parse_degrees("12.5"), Some(12.5));
        assert_eq!(parse_degrees("-90"), Some(-90.0));
        assert_eq!(parse_degrees("abc"), None);
        assert_eq!(parse_degrees("10abc"), None);
        assert_eq!(parse_degrees(""), None);
        assert_eq!(parse_degrees("NaN"), None);
        assert_eq!(parse_degrees("inf"), None);
    }

    #[tokio::test]
    async fn renders_png_of_the_output_size() {
        let (router, dispatcher, release) = app(false, 16);
        release.send(()).unwrap();
        wait_until_ready(&dispatcher).await;

        let response = get(router, "/?lat=0&lon=0").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let image = png_body(response).await;
        assert_eq!(image.dimensions(), (8, 4));
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn bad_coordinates_are_rejected_without_a_job() {
        let (router, dispatcher, release) = app(false, 16);
        release.send(()).unwrap();

        for uri in ["/?lat=abc&lon=10", "/?lat=10", "/", "/?lat=1&lon=2x"] {
            let response = get(router.clone(), uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(
                json_body(response).await,
                json!({ "error": "Invalid or missing lat/lon parameters" })
            );
        }
        assert_eq!(dispatcher.pending(), 0);
    }

    #[tokio::test]
    async fn requests_before_readiness_get_their_own_frames() {
        let (router, dispatcher, release) = app(false, 16);

        let noon = tokio::spawn(get(router.clone(), "/?lat=0&lon=0"));
        let midnight = tokio::spawn(get(router.clone(), "/?lat=0&lon=180"));
        while dispatcher.pending() < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dispatcher.readiness(), Readiness::Initializing);
        release.send(()).unwrap();

        let noon = noon.await.unwrap();
        let midnight = midnight.await.unwrap();
        assert_eq!(noon.status(), StatusCode::OK);
        assert_eq!(midnight.status(), StatusCode::OK);
        assert_eq!(png_body(noon).await.get_pixel(0, 0).0[0], 255);
        assert_eq!(png_body(midnight).await.get_pixel(0, 0).0[0], 0);
    }

    #[tokio::test]
    async fn render_failure_is_an_internal_error() {
        let (router, dispatcher, release) = app(true, 16);
        release.send(()).unwrap();
        wait_until_ready(&dispatcher).await;

        let response = get(router.clone(), "/?lat=10&lon=10").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "error": "Internal Server Error" }));

        // The worker keeps serving after a failed job.
        assert_eq!(dispatcher.readiness(), Readiness::Ready);
    }

    #[tokio::test]
    async fn overload_is_503() {
        let (router, dispatcher, _release) = app(false, 1);
        let _held = dispatcher.submit(0.0, 0.0).unwrap();

        let response = get(router, "/?lat=0&lon=0").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await, json!({ "error": "Renderer is overloaded" }));
    }

    #[tokio::test]
    async fn healthz_tracks_readiness() {
        let (router, dispatcher, release) = app(false, 16);

        let response = get(router.clone(), "/healthz").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await, json!({ "status": "initializing" }));

        release.send(()).unwrap();
        wait_until_ready(&dispatcher).await;
        let response = get(router, "/healthz").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ready" }));
    }

    #[tokio::test]
    async fn healthz_reports_a_failed_worker() {
        let (jobs, _jobs_rx) = mpsc::channel();
        let dispatcher = Arc::new(Dispatcher::new(jobs, 4));
        let error = solstice_engine::ConfigurationError::ProgramLink { log: "bad".into() };
        assert!(dispatcher.handle(solstice_engine::WorkerMessage::Failed { error }).is_err());

        let response = get(router(dispatcher), "/healthz").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await, json!({ "status": "failed" }));
    }
}
