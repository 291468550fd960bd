use std::{
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use tokio::sync::oneshot;

pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

use migrations::run_migrations;

pub use models::{City, Journey, JourneyResolution, JourneyState};
pub use repositories::journeys::{JourneyCounts, NewJourney};
pub use repositories::run_lock::RunLock;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

/// How `Database::open` treats a path with no store behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create an empty store when the file does not exist yet.
    CreateIfMissing,
    /// Fail when the file does not exist.
    MustExist,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the journey store.
///
/// The SQLite connection lives on a dedicated thread; every operation is a
/// closure shipped to that thread, so each one runs to completion before the
/// next starts.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn open(db_path: PathBuf, mode: OpenMode) -> Result<Self> {
        let exists = db_path.exists();
        if !exists && mode == OpenMode::MustExist {
            bail!(
                "journey store {} does not exist (use --init to create a new one)",
                db_path.display()
            );
        }
        if exists && db_path.is_dir() {
            bail!("journey store path {} is a directory", db_path.display());
        }

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if mode == OpenMode::CreateIfMissing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("journey-store".into())
            .spawn(move || {
                let mut conn = match Connection::open_with_flags(&path_for_thread, flags) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                let init_result = prepare_connection(&mut conn);
                let failed = init_result.is_err();
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }
                if failed {
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")?
            .with_context(|| format!("cannot use journey store {}", db_path.display()))?;

        info!("Journey store opened at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

fn prepare_connection(conn: &mut Connection) -> Result<()> {
    // Rejects files that are not SQLite databases before anything is written.
    let check: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .context("store is not a readable SQLite database")?;
    if check != "ok" {
        bail!("store failed integrity check: {check}");
    }

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;

    run_migrations(conn).context("failed to run database migrations")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn must_exist_refuses_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sqlite");
        let err = Database::open(path.clone(), OpenMode::MustExist)
            .err()
            .expect("opening a missing store must fail");
        assert!(err.to_string().contains("does not exist"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.sqlite");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();
        assert!(Database::open(path, OpenMode::MustExist).is_err());
    }

    #[tokio::test]
    async fn reopening_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        {
            let db = Database::open(path.clone(), OpenMode::CreateIfMissing).unwrap();
            let version: i32 = db
                .execute(|conn| {
                    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
                })
                .await
                .unwrap();
            assert!(version > 0);
        }
        let db = Database::open(path, OpenMode::MustExist).unwrap();
        let tables: i64 = db
            .execute(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('journeys', 'cities', 'activities', 'run_lock')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(tables, 4);
    }
}
