use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use crate::db::{connection::Database, helpers::to_u32};
use crate::models::{BehaviorState, DailySummary, FocusBlock};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn minutes_column(state: BehaviorState) -> &'static str {
    match state {
        BehaviorState::Focused => "focused_minutes",
        BehaviorState::Drowsy => "drowsy_minutes",
        BehaviorState::Distracted => "distracted_minutes",
        BehaviorState::Away => "away_minutes",
        BehaviorState::Idle => "idle_minutes",
        BehaviorState::Unknown => "unknown_minutes",
    }
}

impl Database {
    /// Insert or replace the stored summary for `summary.date`.
    pub async fn save_daily_summary(&self, summary: &DailySummary) -> Result<()> {
        let date = summary.date.format(DATE_FORMAT).to_string();
        let minutes: Vec<f64> = BehaviorState::ALL
            .iter()
            .map(|state| summary.minutes(*state))
            .collect();
        let focus_blocks_json = serde_json::to_string(&summary.focus_blocks)
            .context("failed to serialize focus blocks")?;
        let notification_count = summary.notification_count;
        let notification_accepted = summary.notification_accepted;

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO daily_summary (
                    date,
                    focused_minutes,
                    drowsy_minutes,
                    distracted_minutes,
                    away_minutes,
                    idle_minutes,
                    unknown_minutes,
                    notification_count,
                    notification_accepted,
                    focus_blocks_json,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, CURRENT_TIMESTAMP)
                ON CONFLICT(date) DO UPDATE SET
                    focused_minutes = excluded.focused_minutes,
                    drowsy_minutes = excluded.drowsy_minutes,
                    distracted_minutes = excluded.distracted_minutes,
                    away_minutes = excluded.away_minutes,
                    idle_minutes = excluded.idle_minutes,
                    unknown_minutes = excluded.unknown_minutes,
                    notification_count = excluded.notification_count,
                    notification_accepted = excluded.notification_accepted,
                    focus_blocks_json = excluded.focus_blocks_json,
                    updated_at = excluded.updated_at",
                params![
                    date,
                    minutes[0],
                    minutes[1],
                    minutes[2],
                    minutes[3],
                    minutes[4],
                    minutes[5],
                    i64::from(notification_count),
                    i64::from(notification_accepted),
                    focus_blocks_json,
                ],
            )
            .with_context(|| format!("failed to save daily summary for {date}"))?;
            Ok(())
        })
        .await
    }

    pub async fn get_daily_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>> {
        let key = date.format(DATE_FORMAT).to_string();
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT
                        focused_minutes,
                        drowsy_minutes,
                        distracted_minutes,
                        away_minutes,
                        idle_minutes,
                        unknown_minutes,
                        notification_count,
                        notification_accepted,
                        focus_blocks_json
                    FROM daily_summary
                    WHERE date = ?1",
                    params![key],
                    |row| {
                        let mut state_minutes = BTreeMap::new();
                        for state in BehaviorState::ALL {
                            let value: f64 = row.get(minutes_column(state))?;
                            state_minutes.insert(state, value);
                        }
                        let count: i64 = row.get("notification_count")?;
                        let accepted: i64 = row.get("notification_accepted")?;
                        let blocks: String = row.get("focus_blocks_json")?;
                        Ok((state_minutes, count, accepted, blocks))
                    },
                )
                .optional()
                .with_context(|| format!("failed to load daily summary for {key}"))?;

            let Some((state_minutes, count, accepted, blocks)) = row else {
                return Ok(None);
            };

            let focus_blocks: Vec<FocusBlock> = serde_json::from_str(&blocks)
                .map_err(|err| anyhow!("corrupt focus_blocks_json for {key}: {err}"))?;

            Ok(Some(DailySummary {
                date,
                state_minutes,
                notification_count: to_u32(count, "notification_count")?,
                notification_accepted: to_u32(accepted, "notification_accepted")?,
                focus_blocks,
            }))
        })
        .await
    }
}
