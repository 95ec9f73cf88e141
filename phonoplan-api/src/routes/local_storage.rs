/// Development object storage
///
/// - `PUT /storage?key=&expires=&signature=` - Store the request body under `key`
/// - `GET /storage?key=&expires=&signature=` - Read it back
///
/// Only mounted when the local storage driver is active. Access is granted by
/// the HMAC signature of the URL alone; there is no session check.

use crate::app::AppState;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use phonoplan_shared::{
    media::infer_content_type,
    storage::local::{LocalUrlSigner, StoredObject},
};
use serde::Deserialize;

const INVALID_SIGNATURE: &str = "Assinatura inválida ou expirada";

/// Signed URL query; every field is required but checked by hand
#[derive(Debug, Default, Deserialize)]
pub struct SignedQuery {
    pub key: Option<String>,
    pub expires: Option<String>,
    pub signature: Option<String>,
}

impl SignedQuery {
    /// Returns the key if the signature is valid and unexpired at `now`
    pub fn verified_key(&self, signer: &LocalUrlSigner, now: i64) -> Option<&str> {
        let key = self.key.as_deref().filter(|k| !k.is_empty())?;
        let expires: i64 = self.expires.as_deref()?.trim().parse().ok()?;
        let signature = self.signature.as_deref().filter(|s| !s.is_empty())?;

        signer.verify(key, expires, signature, now).then_some(key)
    }
}

fn authorize<'q>(state: &AppState, query: &'q SignedQuery) -> Result<&'q str, Response> {
    let key = state
        .local_signer
        .as_ref()
        .and_then(|signer| query.verified_key(signer, Utc::now().timestamp()));

    key.ok_or_else(|| {
        tracing::debug!(key = ?query.key, "Rejected local storage signature");
        (StatusCode::FORBIDDEN, INVALID_SIGNATURE).into_response()
    })
}

/// Store an object
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<SignedQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let key = match authorize(&state, &query) {
        Ok(key) => key,
        Err(response) => return response,
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| infer_content_type(key))
        .to_string();

    tracing::debug!(key = %key, bytes = body.len(), content_type = %content_type, "Stored local object");

    state.local_store.put(
        key,
        StoredObject {
            bytes: body,
            content_type,
        },
    );

    StatusCode::OK.into_response()
}

/// Read an object back
pub async fn download(State(state): State<AppState>, Query(query): Query<SignedQuery>) -> Response {
    let key = match authorize(&state, &query) {
        Ok(key) => key,
        Err(response) => return response,
    };

    match state.local_store.get(key) {
        Some(object) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, object.content_type),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            object.bytes,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Arquivo não encontrado").into_response(),
    }
}
