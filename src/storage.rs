//! Persisted filter store: one row of the user's last filter
//! selection, restored at startup and rewritten after every successful
//! filter application.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{FilterState, ProcessMode};

pub struct FilterStore {
    conn: Connection,
}

impl FilterStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS filters (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                process_mode TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                selected_workers TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<FilterState>> {
        let row = self
            .conn
            .query_row(
                "SELECT process_mode, start_date, end_date, selected_workers
                 FROM filters WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(mode, start_date, end_date, workers)| FilterState {
            process_mode: ProcessMode::from_label(&mode).unwrap_or_default(),
            start_date,
            end_date,
            selected_workers: serde_json::from_str(&workers).unwrap_or_default(),
            shipping_start_date: None,
            shipping_end_date: None,
        }))
    }

    pub fn save(&mut self, filters: &FilterState) -> Result<()> {
        let workers = serde_json::to_string(&filters.selected_workers)?;
        self.conn.execute(
            "INSERT INTO filters (id, process_mode, start_date, end_date, selected_workers)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                process_mode = excluded.process_mode,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                selected_workers = excluded.selected_workers",
            params![
                filters.process_mode.label(),
                filters.start_date,
                filters.end_date,
                workers
            ],
        )?;
        Ok(())
    }
}
