//! Meeting processing API endpoints.
//!
//! - POST /meetings/process - run the full pipeline on an uploaded recording
//! - GET  /meetings         - list records, newest start time first
//! - GET  /meetings/:id     - get a single record

use axum::{
    extract::{Multipart, Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::db::{self, meetings::MeetingRepository};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/meetings/process", post(process_meeting))
        .route("/meetings", get(list_meetings))
        .route("/meetings/:id", get(get_meeting))
        .with_state(state)
}

struct ProcessForm {
    meet_link: String,
    user_email: String,
    filename: String,
    audio: Vec<u8>,
}

async fn read_process_form(mut multipart: Multipart) -> ApiResult<ProcessForm> {
    let mut meet_link = None;
    let mut user_email = None;
    let mut audio = None;
    let mut filename = "audio.bin".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart form: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("meet_link") => {
                meet_link = Some(field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read meet_link: {e}"))
                })?);
            }
            Some("user_email") => {
                user_email = Some(field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read user_email: {e}"))
                })?);
            }
            Some("audio_file") => {
                if let Some(name) = field.file_name() {
                    filename = name.to_string();
                }
                audio = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            ApiError::bad_request(format!("Failed to read audio_file: {e}"))
                        })?
                        .to_vec(),
                );
            }
            _ => {}
        }
    }

    Ok(ProcessForm {
        meet_link: meet_link
            .ok_or_else(|| ApiError::bad_request("Missing form field: meet_link"))?,
        user_email: user_email
            .ok_or_else(|| ApiError::bad_request("Missing form field: user_email"))?,
        filename,
        audio: audio.ok_or_else(|| ApiError::bad_request("Missing form field: audio_file"))?,
    })
}

/// POST /meetings/process - Process a recorded meeting end to end.
async fn process_meeting(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = read_process_form(multipart).await?;

    info!(
        "Received meeting: link={}, recipient={}, file={} ({} bytes)",
        form.meet_link,
        form.user_email,
        form.filename,
        form.audio.len()
    );

    let output = state
        .pipeline
        .process(form.audio, &form.filename, &form.meet_link, &form.user_email)
        .await?;

    Ok(Json(json!({
        "message": "Meeting processed successfully!",
        "meeting_id": output.meeting_id,
        "summary_file": output.summary_path.to_string_lossy(),
        "transcript_file": output.transcript_path.to_string_lossy(),
    })))
}

#[derive(Debug, Deserialize, Default)]
struct ListParams {
    limit: Option<usize>,
}

/// GET /meetings - List all meeting records, newest start time first.
async fn list_meetings(
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let db_path = state.pipeline.db_path().to_path_buf();
    let meetings = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        MeetingRepository::list(&conn, params.limit)
    })
    .await
    .map_err(|_| ApiError::internal("Record store task panicked"))?
    .map_err(ApiError::from)?;

    Ok(Json(json!({ "meetings": meetings })))
}

/// GET /meetings/:id - Get a single meeting record.
async fn get_meeting(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let db_path = state.pipeline.db_path().to_path_buf();
    let meeting = tokio::task::spawn_blocking(move || {
        let conn = db::open(&db_path)?;
        MeetingRepository::get(&conn, id)
    })
    .await
    .map_err(|_| ApiError::internal("Record store task panicked"))?
    .map_err(ApiError::from)?;

    match meeting {
        Some(record) => Ok(Json(json!(record))),
        None => Err(ApiError::not_found(format!("Meeting {id} not found"))),
    }
}
