use std::path::Path;
use std::time::Duration;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::{debug, error};

use crate::{Error, Result, record::CommandRecord};

/// The persisted command list.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `path` and bring the schema
    /// up to date.
    pub async fn new(path: impl AsRef<Path>, timeout: f64) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening sqlite database at {:?}", path);

        let timeout = Duration::try_from_secs_f64(timeout)
            .map_err(|e| Error::StoreOpen(sqlx::Error::Configuration(e.into())))?;

        if !path.exists()
            && let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs_err::create_dir_all(dir).map_err(|e| Error::file_io(dir, e))?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .optimize_on_close(true, None)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(timeout)
            .connect_with(opts)
            .await
            .map_err(Error::StoreOpen)?;

        Self::setup_db(&pool).await?;

        Ok(Self { pool })
    }

    async fn setup_db(pool: &SqlitePool) -> Result<()> {
        debug!("running sqlite database setup");

        sqlx::migrate!("./migrations").run(pool).await?;

        Ok(())
    }

    /// Every record, oldest first.
    pub async fn list_all(&self) -> Result<Vec<CommandRecord>> {
        sqlx::query_as::<_, CommandRecord>("select id, command from history order by id asc")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to list history: {e}");
                Error::StoreQuery(e)
            })
    }

    /// Records whose command starts with `keyword`. Case sensitive, no
    /// wildcards.
    pub async fn filter_by_prefix(&self, keyword: &str) -> Result<Vec<CommandRecord>> {
        let records = self.list_all().await?;

        Ok(records
            .into_iter()
            .filter(|record| record.command.starts_with(keyword))
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("select count(1) from history")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to count history: {e}");
                Error::StoreQuery(e)
            })
    }

    /// Drop every record and insert `commands` in their place.
    ///
    /// The delete, the id sequence reset and all inserts share one
    /// transaction: either the new list is stored in full, or the old one is
    /// left untouched.
    pub async fn replace_all<S: AsRef<str>>(&self, commands: &[S]) -> Result<usize> {
        self.replace_all_inner(commands).await.map_err(|e| {
            error!("failed to replace history: {e}");
            Error::StoreTransaction(e)
        })
    }

    async fn replace_all_inner<S: AsRef<str>>(&self, commands: &[S]) -> sqlx::Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("delete from history")
            .execute(&mut *tx)
            .await?;

        sqlx::query("delete from sqlite_sequence where name = 'history'")
            .execute(&mut *tx)
            .await?;

        for command in commands {
            sqlx::query("insert into history(command) values(?1)")
                .bind(command.as_ref())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(count = commands.len(), "replaced history");

        Ok(commands.len())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    async fn new_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("history.db"), 5.0)
            .await
            .unwrap()
    }

    fn commands(records: &[CommandRecord]) -> Vec<&str> {
        records.iter().map(|r| r.command.as_str()).collect()
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");

        let db = Database::new(&path, 5.0).await.unwrap();

        assert!(path.exists());
        assert!(db.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_all_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let db = new_db(&dir).await;

        db.replace_all(&["a", "b"]).await.unwrap();
        db.replace_all(&["c"]).await.unwrap();

        let records = db.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].command, "c");
    }

    #[tokio::test]
    async fn ids_restart_after_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let db = new_db(&dir).await;

        db.replace_all(&["a", "b", "c"]).await.unwrap();
        db.replace_all(&["d", "e"]).await.unwrap();

        let ids: Vec<i64> = db.list_all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn duplicates_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let db = new_db(&dir).await;

        db.replace_all(&["ls", "ls", "ls"]).await.unwrap();

        assert_eq!(db.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn filter_by_prefix_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = new_db(&dir).await;

        db.replace_all(&["git status", "git log", "ls -la"])
            .await
            .unwrap();

        let records = db.filter_by_prefix("git").await.unwrap();
        assert_eq!(commands(&records), vec!["git status", "git log"]);
    }

    #[tokio::test]
    async fn filter_by_prefix_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let db = new_db(&dir).await;

        db.replace_all(&["Git status", "git log", "cat .gitignore"])
            .await
            .unwrap();

        let records = db.filter_by_prefix("git").await.unwrap();
        assert_eq!(commands(&records), vec!["git log"]);
    }

    #[tokio::test]
    async fn empty_prefix_matches_everything() {
        let dir = tempfile::tempdir().unwrap();
        let db = new_db(&dir).await;

        db.replace_all(&["a", "b"]).await.unwrap();

        assert_eq!(db.filter_by_prefix("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let db = new_db(&dir).await;
            db.replace_all(&["echo hi"]).await.unwrap();
            db.close().await;
        }

        let db = new_db(&dir).await;
        assert_eq!(commands(&db.list_all().await.unwrap()), vec!["echo hi"]);
    }

    #[tokio::test]
    async fn invalid_timeout_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        let res = Database::new(dir.path().join("history.db"), -1.0).await;

        assert!(matches!(res, Err(Error::StoreOpen(_))));
    }

    #[tokio::test]
    async fn closed_pool_reports_query_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = new_db(&dir).await;
        db.close().await;

        assert!(matches!(db.list_all().await, Err(Error::StoreQuery(_))));
        assert!(matches!(
            db.replace_all(&["a"]).await,
            Err(Error::StoreTransaction(_))
        ));
    }
}
