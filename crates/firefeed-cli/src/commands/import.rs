//! Import command implementation

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use firefeed_core::chat::{Chat, Document, Message};
use firefeed_core::parsers::parser_for;
use firefeed_core::pipeline::records_from_message;
use firefeed_core::store::{open_stores, MessageStore};
use firefeed_core::Config;

/// Store a file's contents as records of `chat_id`
///
/// Statement exports are split into one record per row. Sources that
/// expect single messages take the whole file as one text record.
pub fn import_file(
    messages: &dyn MessageStore,
    config: &Config,
    chat_id: i64,
    file: &Path,
    message_id: i64,
) -> Result<usize> {
    let source = config.chat_sources.source_for(chat_id)?;
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let mut message = Message {
        message_id,
        date: Utc::now().timestamp(),
        chat: Chat { id: chat_id },
        text: None,
        forward_origin: None,
        document: None,
    };

    let document = if parser_for(source).supports_split() || std::str::from_utf8(&bytes).is_err() {
        message.document = Some(Document {
            file_id: file.display().to_string(),
            file_name: file.file_name().map(|n| n.to_string_lossy().into_owned()),
            mime_type: None,
        });
        Some(bytes)
    } else {
        message.text = Some(String::from_utf8_lossy(&bytes).into_owned());
        None
    };

    let records = records_from_message(source, &message, document)?;
    for record in &records {
        messages.add_message(record)?;
    }
    Ok(records.len())
}

pub fn cmd_import(config: &Config, chat_id: i64, file: &Path, message_id: Option<i64>) -> Result<()> {
    let source = config.chat_sources.source_for(chat_id)?;
    println!("📥 Importing {} for chat {} ({})...", file.display(), chat_id, source);

    let (messages, _) = open_stores(config).context("Failed to open record stores")?;
    let message_id = message_id.unwrap_or_else(|| Utc::now().timestamp());
    let stored = import_file(messages.as_ref(), config, chat_id, file, message_id)?;

    if stored == 0 {
        println!("   ⚠️  Nothing to store (empty file)");
    } else {
        println!("✅ Stored {} records (message {})", stored, message_id);
        println!("   Preview with: firefeed run dry --chat {}", chat_id);
    }

    Ok(())
}
