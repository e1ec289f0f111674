use relaydesk::infrastructure::persistence::Database;
use std::time::Duration;
use tempfile::TempDir;

/// A migrated SQLite database living in its own temporary directory.
pub struct TestDb {
    pub db: Database,
    // Removed on drop, so it must outlive the pool.
    _dir: TempDir,
}

pub async fn setup_test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("relaydesk_test.db");
    let db_url = format!("sqlite://{}?mode=rwc", path.display());

    let db = Database::connect(&db_url, Duration::from_secs(5))
        .await
        .expect("Failed to connect to test database");
    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    TestDb { db, _dir: dir }
}
