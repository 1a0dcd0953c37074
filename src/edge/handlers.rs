//! HTTP surface for the edge (§6): `POST /request-stream`, `GET /day-index`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::model::{Day, RequestOptions, StationId};
use crate::state::ServerState;

use super::{EdgeCoordinator, StreamRequest};

#[derive(Debug, Deserialize)]
pub struct RequestStreamBody {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub location: String,
    pub channel: String,
    pub starttime: DateTime<Utc>,
    pub duration: i64,
    #[serde(default)]
    pub options: RequestOptions,
}

/// `POST /request-stream` (§6).
pub async fn request_stream_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<RequestStreamBody>,
) -> Result<impl IntoResponse, AppError> {
    let req = StreamRequest {
        sid: StationId::new(body.network, body.station, body.location, body.channel),
        start: body.starttime,
        duration_seconds: body.duration,
        options: body.options,
    };

    state.edge.validate(&req)?;

    let edge: Arc<EdgeCoordinator> = Arc::clone(&state.edge);
    let stream = edge.request_stream(req);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Deserialize)]
pub struct DayIndexQuery {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub location: String,
    pub channel: String,
    pub date: String,
    pub grouping: Option<String>,
}

/// `GET /day-index?network=...&station=...&location=...&channel=...&date=YYYY-MM-DD` (§6).
pub async fn day_index_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<DayIndexQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sid = StationId::new(params.network, params.station, params.location, params.channel);
    let day = Day::parse(&params.date).map_err(|e| AppError::Validation(e.to_string()))?;

    let index = state
        .day_index
        .load(&sid, &day, params.grouping.as_deref())
        .await?
        .ok_or_else(|| AppError::Validation("no day index for the requested station/date".into()))?;

    Ok(Json(index))
}
