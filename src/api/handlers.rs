use serde::Serialize;
use tracing::error;
use tracing::warn;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;
use warp::Reply;

use super::error_reply;
use super::AppContext;
use crate::apply_traffic_split;
use crate::list_services;
use crate::Error;
use crate::TrafficConfigRequest;

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub code: u16,
    pub message: String,
    pub data: UpdatedService,
}

#[derive(Debug, Serialize)]
pub struct UpdatedService {
    pub service_name: String,
}

pub async fn list_traefik_services(ctx: AppContext) -> Result<Response, Rejection> {
    let response = list_services(ctx.store.as_ref()).await;
    Ok(warp::reply::json(&response).into_response())
}

pub async fn update_traffic_config(
    request: TrafficConfigRequest,
    ctx: AppContext,
) -> Result<Response, Rejection> {
    let reply = match apply_traffic_split(ctx.store.as_ref(), &request).await {
        Ok(()) => warp::reply::json(&UpdateResponse {
            code: 200,
            message: "Traffic config updated".into(),
            data: UpdatedService {
                service_name: request.service_name,
            },
        })
        .into_response(),
        Err(Error::Validation(reason)) => {
            warn!(resource = %request.service_name, "Traffic split rejected: {}", reason);
            error_reply(StatusCode::BAD_REQUEST, reason)
        }
        Err(e) => {
            error!(resource = %request.service_name, "Failed to apply traffic split: {}", e);
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to update TraefikService: {}", e),
            )
        }
    };
    Ok(reply)
}
