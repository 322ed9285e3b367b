// ./client/src/api.rs
use anyhow::{Result, anyhow};
use application::{CreateNoteRequest, ListNotesResponse, UpdateNoteRequest};
use domain::Note;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

pub const DEFAULT_SERVER: &str = "http://localhost:8080";

#[derive(Deserialize, Debug)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the `/api/notes` endpoints.
#[derive(Debug, Clone)]
pub struct NotesClient {
    http: Client,
    notes_url: String,
}

impl NotesClient {
    pub fn new(server: &str) -> Self {
        Self {
            http: Client::new(),
            notes_url: format!("{}/api/notes", server.trim_end_matches('/')),
        }
    }

    pub async fn create(&self, title: String, content: String) -> Result<Note> {
        let response = self
            .http
            .post(&self.notes_url)
            .json(&CreateNoteRequest { title, content })
            .send()
            .await?;
        read_json(response, StatusCode::CREATED).await
    }

    /// Fetches one page; without `limit` the server's default page size applies.
    pub async fn list(&self, limit: Option<usize>, offset: usize) -> Result<ListNotesResponse> {
        let mut request = self.http.get(&self.notes_url).query(&[("offset", offset)]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        read_json(request.send().await?, StatusCode::OK).await
    }

    pub async fn get(&self, id: i64) -> Result<Note> {
        let response = self.http.get(self.note_url(id)).send().await?;
        read_json(response, StatusCode::OK).await
    }

    pub async fn update(&self, id: i64, title: String, content: String) -> Result<Note> {
        let response = self
            .http
            .put(self.note_url(id))
            .json(&UpdateNoteRequest { title, content })
            .send()
            .await?;
        read_json(response, StatusCode::OK).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let response = self.http.delete(self.note_url(id)).send().await?;
        expect_status(response, StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    fn note_url(&self, id: i64) -> String {
        format!("{}/{}", self.notes_url, id)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, expected: StatusCode) -> Result<T> {
    let response = expect_status(response, expected).await?;
    response
        .json()
        .await
        .map_err(|e| anyhow!("failed to parse response: {}", e))
}

/// Passes the response through on `expected`; anything else becomes an error
/// carrying the server's `{"error": ...}` message when there is one.
async fn expect_status(response: Response, expected: StatusCode) -> Result<Response> {
    let status = response.status();
    debug!(%status, url = %response.url(), "Response received");
    if status == expected {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => Err(anyhow!("{}", err.error)),
        Err(_) => Err(anyhow!("HTTP {} - {}", status.as_u16(), body)),
    }
}
