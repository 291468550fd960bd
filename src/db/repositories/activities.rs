use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::db::Database;
use crate::models::ActivityKind;

/// Lookup table behind the activity and transit guess columns.
pub struct ActivityRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ActivityRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Id for the label, inserting it on first use.
    pub fn ensure_activity(&self, kind: &ActivityKind) -> Result<i64> {
        let label = kind.as_str();
        self.conn
            .execute(
                "INSERT OR IGNORE INTO activities (label) VALUES (?1)",
                params![label],
            )
            .with_context(|| format!("failed to insert activity {label}"))?;
        let id = self.conn.query_row(
            "SELECT id FROM activities WHERE label = ?1",
            params![label],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_labels(&self) -> Result<Vec<ActivityKind>> {
        let mut stmt = self
            .conn
            .prepare("SELECT label FROM activities ORDER BY id ASC")?;
        let mut rows = stmt.query([])?;
        let mut kinds = Vec::new();
        while let Some(row) = rows.next()? {
            let label: String = row.get(0)?;
            kinds.push(ActivityKind::from_label(&label));
        }
        Ok(kinds)
    }
}

impl Database {
    /// Every activity label seen so far, in first-seen order.
    pub async fn list_activities(&self) -> Result<Vec<ActivityKind>> {
        self.execute(|conn| ActivityRepository::new(conn).list_labels())
            .await
    }
}
