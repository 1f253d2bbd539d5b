//! Raw chat record store

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Record, RecordKey, RecordPayload, TransactionSource};
use crate::store::MessageStore;

impl MessageStore for Database {
    fn add_message(&self, record: &Record) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO messages
                (chat_id, message_id, part, source, encoding, data, date, forwarded_from, is_processed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.key.chat_id,
                record.key.message_id,
                record.key.part,
                record.source.as_str(),
                record.payload.encoding(),
                record.payload.encode(),
                record.date.to_rfc3339(),
                record.forwarded_from,
                record.is_processed,
            ],
        )?;
        Ok(())
    }

    fn latest_messages(&self, chat_id: i64) -> Result<Vec<Record>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT chat_id, message_id, part, source, encoding, data, date, forwarded_from, is_processed
            FROM messages
            WHERE chat_id = ? AND is_processed = 0
            ORDER BY date DESC, message_id DESC, part DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![chat_id], |row| {
                Ok((
                    RecordKey::new(row.get(0)?, row.get(1)?, row.get(2)?),
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, bool>(8)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(key, source, encoding, data, date, forwarded_from, is_processed)| {
                    let date = DateTime::parse_from_rfc3339(&date)
                        .map_err(|e| Error::InvalidData(format!("bad record date {}: {}", date, e)))?
                        .with_timezone(&Utc);
                    Ok(Record {
                        key,
                        payload: RecordPayload::decode(&encoding, &data)?,
                        source: source.parse::<TransactionSource>()?,
                        date,
                        forwarded_from,
                        is_processed,
                    })
                },
            )
            .collect()
    }

    fn mark_processed(&self, keys: &[RecordKey]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE messages SET is_processed = 1 WHERE chat_id = ? AND message_id = ? AND part = ?",
            )?;
            for key in keys {
                stmt.execute(params![key.chat_id, key.message_id, key.part])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&self, chat_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM messages WHERE chat_id = ?", params![chat_id])?;
        Ok(())
    }
}

impl Database {
    /// Pending record counts per source across all chats
    pub fn pending_counts(&self) -> Result<Vec<(TransactionSource, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source, COUNT(*) FROM messages WHERE is_processed = 0 GROUP BY source ORDER BY source",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(source, count)| Ok((source.parse()?, count)))
            .collect()
    }
}
