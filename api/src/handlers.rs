use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use std::io;
use std::sync::Arc;
use storage::{CancellationToken, DistributionEngine};
use tokio_util::io::StreamReader;

use crate::{AddNodeResponse, ApiError, ApiResult, FileQuery, NodeStats, StatsResponse, UploadResponse};

pub struct AppState {
    pub engine: Arc<DistributionEngine>,
    pub max_upload_size: u64,
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Response> {
    let size = content_length(&headers)?;
    if size > state.max_upload_size {
        return Err(ApiError::PayloadTooLarge {
            size,
            limit: state.max_upload_size,
        });
    }

    let data = body.into_data_stream().map_err(io::Error::other);
    let mut reader = Box::pin(StreamReader::new(data));

    // a client that goes away drops this future, and the engine rolls back
    state
        .engine
        .store(&query.filename, size, &mut reader, &CancellationToken::new())
        .await?;

    let nodes = state
        .engine
        .object_meta(&query.filename)
        .map(|meta| meta.nodes)
        .unwrap_or_default();

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            name: query.filename,
            size,
            nodes,
        }),
    )
        .into_response())
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Response> {
    let (stream, size) = state.engine.load(&query.filename, &CancellationToken::new())?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_LENGTH, HeaderValue::from(size)),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatsResponse>> {
    let nodes = state
        .engine
        .stats()
        .await
        .into_iter()
        .enumerate()
        .map(|(id, free_space_ratio)| NodeStats { id, free_space_ratio })
        .collect();

    Ok(Json(StatsResponse {
        nodes,
        objects: state.engine.object_count(),
    }))
}

pub async fn add_node(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let id = state.engine.add_node().await?;

    Ok((StatusCode::CREATED, Json(AddNodeResponse { id })).into_response())
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let health_info = serde_json::json!({
        "status": "healthy",
        "nodes": state.engine.node_count().await,
        "objects": state.engine.object_count(),
    });

    Ok((StatusCode::OK, Json(health_info)).into_response())
}

fn content_length(headers: &HeaderMap) -> ApiResult<u64> {
    let value = headers
        .get(header::CONTENT_LENGTH)
        .ok_or(ApiError::LengthRequired)?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| ApiError::InvalidRequest("malformed Content-Length header".to_string()))
}
