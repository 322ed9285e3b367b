// ./api/src/handlers.rs
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use application::{
    ApplicationError, CreateNoteRequest, ListNotesQuery, NoteService, UpdateNoteRequest,
};

/// Shared handler state: the service owns the injected repository.
#[derive(Clone)]
pub struct AppState {
    pub note_service: Arc<NoteService>,
}

#[derive(Serialize, Debug)]
struct ErrorBody {
    error: String,
}

/// Builds the API router with all note endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route(
            "/api/notes",
            get(list_notes_handler).post(create_note_handler),
        )
        .route(
            "/api/notes/:id",
            get(get_note_handler)
                .put(update_note_handler)
                .delete(delete_note_handler),
        )
        // Provide the application state to the handlers
        .with_state(state)
}

// --- API Handlers ---

async fn health_check() -> impl IntoResponse {
    info!("Health check endpoint called");
    (
        StatusCode::OK,
        JsonResponse(json!({"status": "ok", "service": "notes-api"})),
    )
}

/// Handler for creating a note (POST /api/notes).
async fn create_note_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(payload)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };
    info!("Received request to create note");
    match state.note_service.create_note(payload).await {
        Ok(note) => (StatusCode::CREATED, JsonResponse(note)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for listing notes (GET /api/notes?limit=&offset=).
async fn list_notes_handler(
    State(state): State<AppState>,
    query: Result<Query<ListNotesQuery>, QueryRejection>,
) -> Response {
    let Ok(Query(query)) = query else {
        return error_response(StatusCode::BAD_REQUEST, "invalid pagination parameters");
    };
    info!(limit = ?query.limit, offset = query.offset, "Received request to list notes");
    match state.note_service.get_all_notes(query).await {
        Ok(response) => (StatusCode::OK, JsonResponse(response)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for fetching a note (GET /api/notes/:id).
async fn get_note_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Ok(Path(id)) = id else {
        return error_response(StatusCode::BAD_REQUEST, "invalid note ID");
    };
    info!(note_id = id, "Received request to get note");
    match state.note_service.get_note_by_id(id).await {
        Ok(note) => (StatusCode::OK, JsonResponse(note)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for replacing a note's title and content (PUT /api/notes/:id).
async fn update_note_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> Response {
    let Ok(Path(id)) = id else {
        return error_response(StatusCode::BAD_REQUEST, "invalid note ID");
    };
    let Ok(Json(payload)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body");
    };
    info!(note_id = id, "Received request to update note");
    match state.note_service.update_note(id, payload).await {
        Ok(note) => (StatusCode::OK, JsonResponse(note)).into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for deleting a note (DELETE /api/notes/:id).
async fn delete_note_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Ok(Path(id)) = id else {
        return error_response(StatusCode::BAD_REQUEST, "invalid note ID");
    };
    info!(note_id = id, "Received request to delete note");
    match state.note_service.delete_note(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => map_application_error_to_response(e),
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        JsonResponse(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Maps ApplicationError to an HTTP status and `{"error": ...}` body.
/// Storage failures are logged and reported generically.
fn map_application_error_to_response(err: ApplicationError) -> Response {
    let (status, message) = match err {
        ApplicationError::Validation(domain_err) => {
            warn!("Domain validation failed: {}", domain_err);
            (StatusCode::BAD_REQUEST, domain_err.to_string())
        }
        ApplicationError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        ApplicationError::NotFound(_) => (StatusCode::NOT_FOUND, "note not found".to_string()),
        ApplicationError::Storage(msg) => {
            error!("Underlying storage error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    };
    error_response(status, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::{NotePage, NoteRepository};
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use domain::{DomainError, Note, NoteDraft, NoteId};
    use infrastructure::JsonFileNoteRepository;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn file_state(dir: &std::path::Path) -> AppState {
        let repo = JsonFileNoteRepository::open(dir.join("notes.json"))
            .await
            .unwrap();
        AppState {
            note_service: Arc::new(NoteService::new(Arc::new(repo))),
        }
    }

    /// Repository whose every call fails with a backend-specific message.
    struct BrokenRepository;

    #[async_trait]
    impl NoteRepository for BrokenRepository {
        async fn create(&self, _: &NoteDraft) -> Result<Note, ApplicationError> {
            Err(ApplicationError::Storage("disk /var/secret full".into()))
        }
        async fn get_all(&self, _: usize, _: usize) -> Result<NotePage, ApplicationError> {
            Err(ApplicationError::Storage("disk /var/secret full".into()))
        }
        async fn get_by_id(&self, _: NoteId) -> Result<Note, ApplicationError> {
            Err(ApplicationError::Storage("disk /var/secret full".into()))
        }
        async fn update(&self, _: NoteId, _: &NoteDraft) -> Result<Note, ApplicationError> {
            Err(ApplicationError::Storage("disk /var/secret full".into()))
        }
        async fn delete(&self, _: NoteId) -> Result<(), ApplicationError> {
            Err(ApplicationError::Storage("disk /var/secret full".into()))
        }
    }

    #[tokio::test]
    async fn error_mapping_statuses() {
        let cases = [
            (
                ApplicationError::Validation(DomainError::EmptyTitle),
                StatusCode::BAD_REQUEST,
                "title cannot be empty",
            ),
            (
                ApplicationError::InvalidInput("invalid note ID: 0".into()),
                StatusCode::BAD_REQUEST,
                "invalid note ID: 0",
            ),
            (
                ApplicationError::NotFound(NoteId::new(3)),
                StatusCode::NOT_FOUND,
                "note not found",
            ),
            (
                ApplicationError::Storage("sqlite: database is locked".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
            ),
        ];
        for (err, status, message) in cases {
            let response = map_application_error_to_response(err);
            assert_eq!(response.status(), status);
            assert_eq!(body_json(response).await["error"], message);
        }
    }

    #[tokio::test]
    async fn storage_failures_do_not_leak_details() {
        let state = AppState {
            note_service: Arc::new(NoteService::new(Arc::new(BrokenRepository))),
        };
        let response =
            list_notes_handler(State(state), Ok(Query(ListNotesQuery::default()))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal server error");
        assert!(!body.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn crud_through_handlers() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = file_state(dir.path()).await;

        let response = create_note_handler(
            State(state.clone()),
            Ok(Json(CreateNoteRequest {
                title: "A".into(),
                content: "1".into(),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["id"], 1);
        assert_eq!(created["title"], "A");

        let response = create_note_handler(
            State(state.clone()),
            Ok(Json(CreateNoteRequest {
                title: " ".into(),
                content: "1".into(),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "title cannot be empty");

        let response = update_note_handler(
            State(state.clone()),
            Ok(Path(1)),
            Ok(Json(UpdateNoteRequest {
                title: "A2".into(),
                content: "1b".into(),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["title"], "A2");

        let response = list_notes_handler(
            State(state.clone()),
            Ok(Query(ListNotesQuery {
                limit: Some(5),
                offset: 0,
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let list = body_json(response).await;
        assert_eq!(list["total"], 1);
        assert_eq!(list["limit"], 5);
        assert_eq!(list["notes"][0]["title"], "A2");

        let response = delete_note_handler(State(state.clone()), Ok(Path(1))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = get_note_handler(State(state.clone()), Ok(Path(1))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get_note_handler(State(state), Ok(Path(0))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
