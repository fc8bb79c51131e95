//! HTTP and WebSocket surface
//!
//! | Route | |
//! |---|---|
//! | `GET /api/health` | [`HealthReport`](crate::HealthReport) |
//! | `GET /api/traefik-services` | current splits, fallback data on store failure |
//! | `POST /api/update-traffic-config` | validate and apply a split |
//! | `WS /ws/traefik-services` | snapshot, then live changes and echo |
//! | `GET /metrics` | prometheus text exposition |
//! | `/assets/*`, anything else | static dashboard when `http.static_dir` is set |

mod handlers;
mod observer;


use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

pub use handlers::*;
pub use observer::*;
use serde::Serialize;
use tracing::error;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::LifecycleCoordinator;
use crate::ResourceStore;
use crate::WebSocketConfig;

const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Everything a request handler needs
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn ResourceStore>,
    pub lifecycle: Arc<LifecycleCoordinator>,
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub fn error_reply(
    status: StatusCode,
    detail: impl Into<String>,
) -> Response {
    warp::reply::with_status(
        warp::reply::json(&ErrorBody { detail: detail.into() }),
        status,
    )
    .into_response()
}

fn with_context(ctx: AppContext) -> impl Filter<Extract = (AppContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Builds every route; static assets are only served when `static_dir` is set.
pub fn routes(
    ctx: AppContext,
    static_dir: Option<&Path>,
) -> BoxedFilter<(Response,)> {
    let health = warp::path!("api" / "health")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .map(|ctx: AppContext| warp::reply::json(&ctx.lifecycle.health()).into_response())
        .boxed();

    let list = warp::path!("api" / "traefik-services")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(list_traefik_services)
        .boxed();

    let update = warp::path!("api" / "update-traffic-config")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(update_traffic_config)
        .boxed();

    let ws = warp::path!("ws" / "traefik-services")
        .and(warp::ws())
        .and(with_context(ctx))
        .map(|ws: warp::ws::Ws, ctx: AppContext| {
            ws.on_upgrade(move |socket| observer_session(socket, ctx)).into_response()
        })
        .boxed();

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .map(|| crate::render_metrics().into_response())
        .boxed();

    let api = health
        .or(list)
        .unify()
        .or(update)
        .unify()
        .or(ws)
        .unify()
        .or(metrics)
        .unify()
        .boxed();

    let app = match static_dir {
        Some(dir) => api.or(static_files(dir)).unify().boxed(),
        None => api,
    };

    app.recover(handle_rejection).unify().boxed()
}

/// `/assets/*` from `dir/assets`, any other GET answered with the dashboard
/// index so client-side routing works.
fn static_files(dir: &Path) -> BoxedFilter<(Response,)> {
    let assets = warp::path("assets")
        .and(warp::fs::dir(dir.join("assets")))
        .map(Reply::into_response);
    let index = warp::get()
        .and(warp::fs::file(dir.join("index.html")))
        .map(Reply::into_response);
    assets.or(index).unify().boxed()
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let reply = if rejection.is_not_found() {
        error_reply(StatusCode::NOT_FOUND, "Not found")
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        error_reply(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        error!("Unhandled rejection: {:?}", rejection);
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(reply)
}
