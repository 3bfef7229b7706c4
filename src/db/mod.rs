use anyhow::Result;
use sqlx::SqlitePool;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// Run all `*.sql` files from the given directory in filename order.
pub async fn run_migrations(pool: &SqlitePool, dir: &str) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.path());
    for e in entries {
        let p = e.path();
        if p.extension().and_then(|s| s.to_str()) == Some("sql") {
            let sql = fs::read_to_string(&p)?;
            sqlx::raw_sql(&sql).execute(pool).await?;
        }
    }
    Ok(())
}

pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Accept forms: sqlite:foo.db (fix), sqlite://foo.db (ok), file:foo.db (convert), bare path (prepend).
pub fn normalize_sqlite_url(input: &str) -> String {
    if input.starts_with("sqlite://") || input.starts_with("sqlite::memory:") {
        return input.to_string();
    }
    if input.starts_with("sqlite:") {
        let rest = input.trim_start_matches("sqlite:");
        return format!("sqlite://{}", rest.trim_start_matches('/'));
    }
    if input.starts_with("file:") {
        return format!("sqlite://{}", input.trim_start_matches("file:"));
    }
    format!("sqlite://{}", input)
}

pub fn db_file_path(url: &str) -> Option<std::path::PathBuf> {
    if let Some(rest) = url.strip_prefix("sqlite://") {
        if rest == ":memory:" {
            return None;
        }
        return Some(std::path::PathBuf::from(rest));
    }
    None
}
