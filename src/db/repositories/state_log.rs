use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, from_millis, to_millis},
};
use crate::models::{BehaviorState, ClassificationSource, StateLogEntry};

fn parse_optional_state(value: Option<String>) -> Result<Option<BehaviorState>> {
    value.map(|raw| BehaviorState::parse(&raw)).transpose()
}

fn row_to_entry(row: &Row) -> Result<StateLogEntry, rusqlite::Error> {
    let timestamp_ms: i64 = row.get("timestamp_ms")?;
    let integrated_state: String = row.get("integrated_state")?;
    let camera_state: Option<String> = row.get("camera_state")?;
    let pc_state: Option<String> = row.get("pc_state")?;
    let source: Option<String> = row.get("source")?;

    Ok(StateLogEntry {
        id: row.get("id")?,
        timestamp: from_millis(timestamp_ms, "timestamp_ms").map_err(conversion_error)?,
        integrated_state: BehaviorState::parse(&integrated_state).map_err(conversion_error)?,
        camera_state: parse_optional_state(camera_state).map_err(conversion_error)?,
        pc_state: parse_optional_state(pc_state).map_err(conversion_error)?,
        confidence: row.get("confidence")?,
        source: source
            .map(|raw| ClassificationSource::parse(&raw))
            .transpose()
            .map_err(conversion_error)?,
    })
}

impl Database {
    /// Append one integration result. Returns the new row id.
    pub async fn append_state_log(&self, entry: &StateLogEntry) -> Result<i64> {
        let record = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO state_log (
                    timestamp_ms,
                    integrated_state,
                    camera_state,
                    pc_state,
                    confidence,
                    source
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    to_millis(record.timestamp),
                    record.integrated_state.as_str(),
                    record.camera_state.map(|s| s.as_str()),
                    record.pc_state.map(|s| s.as_str()),
                    record.confidence,
                    record.source.map(|s| s.as_str()),
                ],
            )
            .with_context(|| "failed to append state log entry")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Entries with `start <= timestamp < end`, oldest first.
    pub async fn get_state_log(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StateLogEntry>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    id,
                    timestamp_ms,
                    integrated_state,
                    camera_state,
                    pc_state,
                    confidence,
                    source
                FROM state_log
                WHERE timestamp_ms >= ?1 AND timestamp_ms < ?2
                ORDER BY timestamp_ms ASC, id ASC",
            )?;

            let rows = stmt.query_map(params![to_millis(start), to_millis(end)], row_to_entry)?;

            let mut entries = Vec::new();
            for entry in rows {
                entries.push(entry?);
            }

            Ok(entries)
        })
        .await
    }
}
