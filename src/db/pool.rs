//! Database connection pool and schema migrations

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}

/// Split SQL into statements, properly handling $$ delimited blocks (PL/pgSQL)
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_dollar_block = false;
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        current.push(c);

        // Check for $$ delimiter
        if c == '$' && i + 1 < chars.len() && chars[i + 1] == '$' {
            current.push(chars[i + 1]);
            i += 1;
            in_dollar_block = !in_dollar_block;
        }
        // Check for statement end (semicolon outside of $$ block)
        else if c == ';' && !in_dollar_block {
            let trimmed = current.trim();
            if !trimmed.is_empty() && has_sql_content(trimmed) {
                statements.push(current.clone());
            }
            current.clear();
        }

        i += 1;
    }

    // Handle any remaining content
    let trimmed = current.trim();
    if !trimmed.is_empty() && has_sql_content(trimmed) {
        statements.push(current);
    }

    statements
}

/// Check if a string has actual SQL content (not just comments)
fn has_sql_content(s: &str) -> bool {
    s.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with("--")
    })
}

/// Run database migrations
///
/// The schema is written to be idempotent (guarded types, IF NOT EXISTS
/// tables), so individual statement failures on re-runs are logged and
/// skipped rather than aborting startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    let migration_sql = include_str!("migrations/001_initial.sql");

    let statements = split_sql_statements(migration_sql);

    for statement in statements {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| {
                tracing::warn!(
                    "Migration statement may have failed (possibly already exists): {}",
                    e
                );
                e
            })
            .ok();
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_statements() {
        let sql = "CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("TABLE a"));
        assert!(statements[1].contains("TABLE b"));
    }

    #[test]
    fn test_split_keeps_dollar_blocks_together() {
        let sql = r#"
            DO $$ BEGIN
                CREATE TYPE user_role AS ENUM ('student', 'faculty');
            EXCEPTION
                WHEN duplicate_object THEN NULL;
            END $$;
            CREATE TABLE users (id INT);
        "#;
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("duplicate_object"));
        assert!(statements[1].contains("TABLE users"));
    }

    #[test]
    fn test_split_skips_comment_only_chunks() {
        let sql = "-- header comment;\nCREATE TABLE a (id INT);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("TABLE a"));
    }

    #[test]
    fn test_trailing_statement_without_semicolon() {
        let sql = "CREATE TABLE a (id INT);\nCREATE INDEX idx_a ON a (id)";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
    }
}
