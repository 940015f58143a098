//! REST API for the visualization service.
//!
//! Exposes the scene engine to a host application over HTTP: opening and
//! closing a visualization, pointer and selection input, the current render
//! frame and a Server-Sent-Events stream of session events.
//! Uses Axum as the web framework and supports CORS.

use std::convert::Infallible;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::camera::{PerspectiveCamera, Viewport};
use crate::client::FetchError;
use crate::config::ApiConfig;
use crate::engine::{EngineError, SceneEngine, SceneSummary};
use crate::events::{NotificationLevel, SessionEvent};
use crate::model::PlacedItem;
use crate::panel::PanelRow;
use crate::retrieval::RetrievalHint;
use crate::scene::{ContainerFrame, GridHelper, OpenFace};
use crate::session::{ItemView, RenderFrame};
use crate::types::Vec3;

#[derive(Clone)]
struct ApiState {
    engine: Arc<SceneEngine>,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>stowage-scene API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request to open a visualization.
///
/// `viewport` defaults to the configured output size.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({
    "container_id": "contA",
    "highlight_item_id": "001",
    "viewport": { "width": 1280.0, "height": 720.0 }
}))]
pub struct OpenRequest {
    pub container_id: String,
    #[serde(default)]
    #[schema(nullable = true)]
    pub highlight_item_id: Option<String>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub viewport: Option<Viewport>,
}

/// Pointer position in pixels, origin top-left of the viewport.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({ "x": 400.0, "y": 300.0 }))]
pub struct PointerRequest {
    pub x: f64,
    pub y: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct HighlightRequest {
    pub item_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PanelRequest {
    pub rows: Vec<PanelRow>,
}

/// Selection after an input.
#[derive(Serialize, ToSchema)]
pub struct SelectionResponse {
    pub selected: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ResizeResponse {
    /// `false` when the size was degenerate and ignored.
    pub applied: bool,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn engine_error(err: EngineError) -> Response {
    match &err {
        EngineError::NoSession => error_response(
            StatusCode::CONFLICT,
            "No visualization open",
            err.to_string(),
        ),
        EngineError::Superseded => error_response(
            StatusCode::CONFLICT,
            "Request superseded",
            err.to_string(),
        ),
        EngineError::Fetch(FetchError::InvalidId(_)) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid container id",
            err.to_string(),
        ),
        EngineError::Fetch(_) => error_response(
            StatusCode::BAD_GATEWAY,
            "Container could not be loaded",
            err.to_string(),
        ),
    }
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(payload)| payload)
        .map_err(json_deserialize_error)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_open,
        handle_close,
        handle_pointer,
        handle_pointer_leave,
        handle_click,
        handle_highlight,
        handle_resize,
        handle_panel,
        handle_frame,
        handle_events
    ),
    components(
        schemas(
            OpenRequest,
            PointerRequest,
            HighlightRequest,
            PanelRequest,
            SelectionResponse,
            ResizeResponse,
            ErrorResponse,
            SceneSummary,
            RenderFrame,
            ItemView,
            ContainerFrame,
            OpenFace,
            GridHelper,
            PerspectiveCamera,
            Viewport,
            Vec3,
            PanelRow,
            SessionEvent,
            NotificationLevel,
            PlacedItem,
            RetrievalHint
        )
    ),
    tags((name = "visualization", description = "Interactive 3D container visualization"))
)]
struct ApiDoc;

fn router(engine: Arc<SceneEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/visualization", post(handle_open).delete(handle_close))
        .route("/visualization/pointer", post(handle_pointer))
        .route("/visualization/pointer/leave", post(handle_pointer_leave))
        .route("/visualization/click", post(handle_click))
        .route("/visualization/highlight", post(handle_highlight))
        .route("/visualization/resize", post(handle_resize))
        .route("/visualization/panel", put(handle_panel))
        .route("/visualization/frame", get(handle_frame))
        .route("/visualization/events", get(handle_events))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { engine })
}

/// Starts the API server and blocks until it terminates.
///
/// Configures CORS for cross-origin requests from the host page.
pub async fn start_api_server(config: ApiConfig, engine: Arc<SceneEngine>) -> std::io::Result<()> {
    let app = router(engine);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let display_host = config.display_host().to_string();
    tracing::info!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        tracing::info!("💡 Local access: http://localhost:{}", config.port());
    }
    tracing::info!("📦 API Endpoints:");
    tracing::info!("   - POST   /visualization");
    tracing::info!("   - DELETE /visualization");
    tracing::info!("   - POST   /visualization/pointer | /pointer/leave | /click | /highlight | /resize");
    tracing::info!("   - PUT    /visualization/panel");
    tracing::info!("   - GET    /visualization/frame");
    tracing::info!("   - GET    /visualization/events (SSE)");
    tracing::info!("📑 Documentation:");
    tracing::info!("   - GET /docs");
    tracing::info!("   - GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /visualization.
///
/// Fetches the container, builds the scene and starts the frame loop. Any
/// open visualization is closed first.
#[utoipa::path(
    post,
    path = "/visualization",
    request_body = OpenRequest,
    responses(
        (status = 200, description = "Visualization opened", body = SceneSummary),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request or container id", body = ErrorResponse),
        (status = CONFLICT, description = "Superseded by a newer request", body = ErrorResponse),
        (status = BAD_GATEWAY, description = "Container could not be loaded", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_open(
    State(state): State<ApiState>,
    payload: Result<Json<OpenRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state
        .engine
        .initialize(
            &request.container_id,
            request.highlight_item_id.as_deref(),
            request.viewport,
        )
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// Handler for DELETE /visualization.
#[utoipa::path(
    delete,
    path = "/visualization",
    responses(
        (status = NO_CONTENT, description = "Visualization closed"),
        (status = CONFLICT, description = "No visualization open", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_close(State(state): State<ApiState>) -> Response {
    match state.engine.close().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => engine_error(err),
    }
}

/// Handler for POST /visualization/pointer.
///
/// Hover is evaluated on the next frame.
#[utoipa::path(
    post,
    path = "/visualization/pointer",
    request_body = PointerRequest,
    responses(
        (status = NO_CONTENT, description = "Pointer recorded"),
        (status = CONFLICT, description = "No visualization open", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_pointer(
    State(state): State<ApiState>,
    payload: Result<Json<PointerRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.engine.pointer_move(request.x, request.y).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => engine_error(err),
    }
}

#[utoipa::path(
    post,
    path = "/visualization/pointer/leave",
    responses(
        (status = NO_CONTENT, description = "Pointer left the viewport"),
        (status = CONFLICT, description = "No visualization open", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_pointer_leave(State(state): State<ApiState>) -> Response {
    match state.engine.pointer_leave().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => engine_error(err),
    }
}

/// Handler for POST /visualization/click.
///
/// Selects the nearest item under the position or clears the selection.
#[utoipa::path(
    post,
    path = "/visualization/click",
    request_body = PointerRequest,
    responses(
        (status = 200, description = "Selection after the click", body = SelectionResponse),
        (status = CONFLICT, description = "No visualization open", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_click(
    State(state): State<ApiState>,
    payload: Result<Json<PointerRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.engine.click(request.x, request.y).await {
        Ok(selected) => Json(SelectionResponse { selected }).into_response(),
        Err(err) => engine_error(err),
    }
}

/// Handler for POST /visualization/highlight.
///
/// An unknown id leaves the selection unchanged.
#[utoipa::path(
    post,
    path = "/visualization/highlight",
    request_body = HighlightRequest,
    responses(
        (status = 200, description = "Selection after the request", body = SelectionResponse),
        (status = CONFLICT, description = "No visualization open", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_highlight(
    State(state): State<ApiState>,
    payload: Result<Json<HighlightRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.engine.highlight_item(&request.item_id).await {
        Ok(selected) => Json(SelectionResponse { selected }).into_response(),
        Err(err) => engine_error(err),
    }
}

#[utoipa::path(
    post,
    path = "/visualization/resize",
    request_body = Viewport,
    responses(
        (status = 200, description = "Projection updated", body = ResizeResponse),
        (status = CONFLICT, description = "No visualization open", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_resize(
    State(state): State<ApiState>,
    payload: Result<Json<Viewport>, JsonRejection>,
) -> Response {
    let viewport = match parse_json(payload) {
        Ok(viewport) => viewport,
        Err(response) => return response,
    };
    match state.engine.resize(viewport).await {
        Ok(applied) => Json(ResizeResponse { applied }).into_response(),
        Err(err) => engine_error(err),
    }
}

/// Handler for PUT /visualization/panel.
///
/// Replaces the rows of the side-panel item list.
#[utoipa::path(
    put,
    path = "/visualization/panel",
    request_body = PanelRequest,
    responses(
        (status = NO_CONTENT, description = "Rows replaced"),
        (status = CONFLICT, description = "No visualization open", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_panel(
    State(state): State<ApiState>,
    payload: Result<Json<PanelRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.engine.set_panel_rows(request.rows).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => engine_error(err),
    }
}

/// Handler for GET /visualization/frame.
///
/// Returns an empty frame while no visualization is open.
#[utoipa::path(
    get,
    path = "/visualization/frame",
    responses((status = 200, description = "Current render frame", body = RenderFrame)),
    tag = "visualization"
)]
async fn handle_frame(State(state): State<ApiState>) -> Json<RenderFrame> {
    Json(state.engine.frame().await)
}

/// Handler for GET /visualization/events (SSE).
///
/// Streams session events as Server-Sent Events. The SSE event name is the
/// snake_case event kind; the data is the JSON event tagged by `type`.
#[utoipa::path(
    get,
    path = "/visualization/events",
    responses(
        (
            status = 200,
            description = "Streams session events in real-time",
            content_type = "text/event-stream",
            body = SessionEvent
        )
    ),
    tag = "visualization"
)]
async fn handle_events(State(state): State<ApiState>) -> impl IntoResponse {
    let stream = BroadcastStream::new(state.engine.subscribe()).filter_map(|event| match event {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok::<_, Infallible>(
                Event::default().event(event.kind()).data(json),
            )),
            Err(err) => {
                tracing::warn!("⚠️ Could not serialize {} event: {}", event.kind(), err);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "event subscriber lagged behind");
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("keep-alive"),
    )
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
