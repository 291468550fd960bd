use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use log::warn;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::db::{
    helpers::{format_datetime, parse_datetime},
    Database,
};

/// Exclusive claim on the store for one ingesting process.
///
/// The row carries a heartbeat; a claim whose heartbeat is older than the
/// stale limit belongs to a process that was killed and may be taken over.
pub struct RunLock {
    db: Database,
    owner: String,
}

impl Database {
    pub async fn acquire_run_lock(&self, stale_after: Duration) -> Result<RunLock> {
        let owner = Uuid::new_v4().to_string();
        let owner_for_task = owner.clone();
        self.execute(move |conn| {
            let now = Utc::now();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT owner, heartbeat_at FROM run_lock WHERE id = 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            if let Some((holder, heartbeat)) = existing {
                let heartbeat_at = parse_datetime(&heartbeat, "heartbeat_at")?;
                if now - heartbeat_at < stale_after {
                    bail!(
                        "journey store is in use by another run ({holder}, last heartbeat {heartbeat})"
                    );
                }
                warn!("Taking over abandoned run lock held by {holder} (last heartbeat {heartbeat})");
            }

            tx.execute(
                "INSERT OR REPLACE INTO run_lock (id, owner, acquired_at, heartbeat_at)
                 VALUES (1, ?1, ?2, ?2)",
                params![owner_for_task, format_datetime(&now)],
            )
            .context("failed to write run lock")?;
            tx.commit()?;
            Ok(())
        })
        .await?;

        Ok(RunLock {
            db: self.clone(),
            owner,
        })
    }
}

impl RunLock {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub async fn heartbeat(&self) -> Result<()> {
        let owner = self.owner.clone();
        let updated = self
            .db
            .execute(move |conn| {
                Ok(conn.execute(
                    "UPDATE run_lock SET heartbeat_at = ?1 WHERE id = 1 AND owner = ?2",
                    params![format_datetime(&Utc::now()), owner],
                )?)
            })
            .await?;
        if updated == 0 {
            bail!("run lock {} was taken over by another run", self.owner);
        }
        Ok(())
    }

    pub async fn release(self) -> Result<()> {
        let owner = self.owner.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "DELETE FROM run_lock WHERE id = 1 AND owner = ?1",
                    params![owner],
                )?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::OpenMode;

    #[tokio::test]
    async fn second_run_is_rejected_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("lock.sqlite"), OpenMode::CreateIfMissing).unwrap();

        let lock = db.acquire_run_lock(Duration::minutes(10)).await.unwrap();
        lock.heartbeat().await.unwrap();
        assert!(db.acquire_run_lock(Duration::minutes(10)).await.is_err());

        lock.release().await.unwrap();
        let again = db.acquire_run_lock(Duration::minutes(10)).await.unwrap();
        again.release().await.unwrap();
    }

    #[tokio::test]
    async fn stale_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("lock.sqlite"), OpenMode::CreateIfMissing).unwrap();

        let abandoned = db.acquire_run_lock(Duration::minutes(10)).await.unwrap();
        let fresh = db.acquire_run_lock(Duration::zero()).await.unwrap();
        assert_ne!(abandoned.owner(), fresh.owner());
        assert!(abandoned.heartbeat().await.is_err());
        fresh.release().await.unwrap();
    }
}
