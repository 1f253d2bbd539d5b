//! Chat webhook handler

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{is_authorized, AppError, AppState};
use firefeed_core::chat::{Message, Update};
use firefeed_core::pipeline::{records_from_message, Command};
use firefeed_core::Result;

/// Reaction set on a message once its records are stored
pub const STORED_REACTION: &str = "👍";

/// Query parameters for the webhook
#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub api_key: Option<String>,
}

/// POST /api/telegram - Receive one chat update
///
/// 200 with an empty body on success, 401 on a bad `api_key`, 500 with the
/// error text otherwise.
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> std::result::Result<StatusCode, AppError> {
    if !is_authorized(&state.config, query.api_key.as_deref()) {
        warn!("Unauthorized webhook call");
        return Err(AppError::unauthorized());
    }

    let update: Update = serde_json::from_slice(&body).map_err(|e| AppError::internal(&e.to_string()))?;
    debug!(update_id = update.update_id, "Received update");

    let Some(message) = update.message else {
        debug!(update_id = update.update_id, "Update without message, ignoring");
        return Ok(StatusCode::OK);
    };

    match tokio::time::timeout(state.config.timeout, handle_message(&state, message)).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(update_id = update.update_id, "Request deadline exceeded");
            return Err(AppError::internal("request deadline exceeded"));
        }
    }

    Ok(StatusCode::OK)
}

async fn handle_message(state: &AppState, message: Message) -> Result<()> {
    let chat_id = message.chat.id;

    if let Some(document) = &message.document {
        let source = state.chat_sources.source_for(chat_id)?;
        let bytes = state.chat.download_file(&document.file_id).await?;
        let records = records_from_message(source, &message, Some(bytes))?;
        let stored = state.pipeline.ingest(&records)?;
        info!(
            chat_id,
            source = %source,
            file = document.file_name.as_deref().unwrap_or("-"),
            records = stored,
            "Stored document"
        );

        if let Err(e) = state
            .chat
            .set_reaction(chat_id, message.message_id, STORED_REACTION)
            .await
        {
            warn!(chat_id, error = %e, "Failed to react to message");
        }
        return Ok(());
    }

    let text = message.text.as_deref().unwrap_or_default();

    if let Some(command) = Command::parse(text) {
        let source = state.chat_sources.source_for(chat_id)?;
        info!(chat_id, source = %source, command = %command, "Running command");
        let reply = state.pipeline.execute(chat_id, source, command).await?;
        state.chat.send_long_message(chat_id, &reply).await?;
        return Ok(());
    }

    let source = state.chat_sources.source_for(chat_id)?;
    let records = records_from_message(source, &message, None)?;
    state.pipeline.ingest(&records)?;
    debug!(chat_id, records = records.len(), "Stored message");
    Ok(())
}
