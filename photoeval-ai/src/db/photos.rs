//! Photo evaluation persistence
//!
//! One `photos` row per unique file path (insert-or-update), plus an
//! append-only `photo_evaluations` history. Score and comment are stored as
//! JSON text so any value shape the model produced survives.

use chrono::SecondsFormat;
use photoeval_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;

use crate::models::{EvalValue, EvaluationHistoryEntry, EvaluationRecord, StoredPhoto};

/// Timestamps are fixed-width UTC so text order equals time order
fn format_timestamp(record: &EvaluationRecord) -> String {
    record
        .evaluated_at
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_column(row: &SqliteRow, column: &str) -> EvalValue {
    row.get::<Option<String>, _>(column)
        .map(|stored| EvalValue::decode(&stored))
        .unwrap_or(EvalValue::Null)
}

fn photo_from_row(row: &SqliteRow) -> StoredPhoto {
    StoredPhoto {
        id: row.get("id"),
        file_path: row.get("file_path"),
        file_name: row.get("file_name"),
        evaluation_score: decode_column(row, "evaluation_score"),
        evaluation_comment: decode_column(row, "evaluation_comment"),
        evaluated_at: row.get("evaluated_at"),
    }
}

/// All file paths that already have a record
pub async fn known_paths(pool: &SqlitePool) -> Result<HashSet<String>> {
    let paths: Vec<String> = sqlx::query_scalar("SELECT file_path FROM photos")
        .fetch_all(pool)
        .await?;
    Ok(paths.into_iter().collect())
}

/// Insert or update the record for `record.file_path`, returning its row id
pub async fn upsert_evaluation(conn: &mut SqliteConnection, record: &EvaluationRecord) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO photos (file_path, file_name, evaluation_score, evaluation_comment, evaluated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(file_path) DO UPDATE SET
            file_name = excluded.file_name,
            evaluation_score = excluded.evaluation_score,
            evaluation_comment = excluded.evaluation_comment,
            evaluated_at = excluded.evaluated_at
        RETURNING id
        "#,
    )
    .bind(&record.file_path)
    .bind(&record.file_name)
    .bind(record.score.encode())
    .bind(record.comment.encode())
    .bind(format_timestamp(record))
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Append one history row for `photo_id`
pub async fn append_history(
    conn: &mut SqliteConnection,
    photo_id: i64,
    record: &EvaluationRecord,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO photo_evaluations (photo_id, score, comment, evaluated_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(photo_id)
    .bind(record.score.encode())
    .bind(record.comment.encode())
    .bind(format_timestamp(record))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Persist a whole batch as one transaction
///
/// Either every record (and its history row) is committed or none is.
pub async fn save_batch(pool: &SqlitePool, records: &[EvaluationRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for record in records {
        let photo_id = upsert_evaluation(&mut tx, record).await?;
        append_history(&mut tx, photo_id, record).await?;
    }

    tx.commit().await?;

    tracing::debug!(records = records.len(), "Batch committed");
    Ok(())
}

/// Stored photos, newest first
pub async fn list_photos(pool: &SqlitePool, skip: i64, limit: i64) -> Result<Vec<StoredPhoto>> {
    let rows = sqlx::query(
        r#"
        SELECT id, file_path, file_name, evaluation_score, evaluation_comment, evaluated_at
        FROM photos
        ORDER BY evaluated_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(photo_from_row).collect())
}

/// Count total photos in database
pub async fn count_photos(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Load one photo by id
pub async fn load_photo(pool: &SqlitePool, id: i64) -> Result<Option<StoredPhoto>> {
    let row = sqlx::query(
        r#"
        SELECT id, file_path, file_name, evaluation_score, evaluation_comment, evaluated_at
        FROM photos
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(photo_from_row))
}

/// Evaluation history of one photo, newest first
pub async fn list_history(pool: &SqlitePool, photo_id: i64) -> Result<Vec<EvaluationHistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, photo_id, score, comment, evaluated_at
        FROM photo_evaluations
        WHERE photo_id = ?
        ORDER BY evaluated_at DESC, id DESC
        "#,
    )
    .bind(photo_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| EvaluationHistoryEntry {
            id: row.get("id"),
            photo_id: row.get("photo_id"),
            score: decode_column(row, "score"),
            comment: decode_column(row, "comment"),
            evaluated_at: row.get("evaluated_at"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::models::Evaluation;
    use serde_json::json;

    fn record(path: &str, score: i64, comment: &str) -> EvaluationRecord {
        EvaluationRecord::new(path, Evaluation::new(json!(score), comment))
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_single_row() {
        let pool = init_memory_pool().await.unwrap();

        save_batch(&pool, &[record("/p/a.jpg", 5, "ok")]).await.unwrap();
        let first = list_photos(&pool, 0, 20).await.unwrap();
        assert_eq!(first.len(), 1);

        save_batch(&pool, &[record("/p/a.jpg", 9, "better")]).await.unwrap();
        let second = list_photos(&pool, 0, 20).await.unwrap();

        assert_eq!(count_photos(&pool).await.unwrap(), 1);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].evaluation_score, EvalValue::from(json!(9)));
        assert_eq!(second[0].evaluation_comment, EvalValue::Text("better".into()));
        assert!(second[0].evaluated_at >= first[0].evaluated_at);

        let history = list_history(&pool, first[0].id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].score, EvalValue::from(json!(9)));
    }

    #[tokio::test]
    async fn test_known_paths() {
        let pool = init_memory_pool().await.unwrap();
        save_batch(&pool, &[record("/p/a.jpg", 1, "x"), record("/p/b.png", 2, "y")])
            .await
            .unwrap();

        let known = known_paths(&pool).await.unwrap();
        assert_eq!(known.len(), 2);
        assert!(known.contains("/p/a.jpg"));
        assert!(known.contains("/p/b.png"));
    }

    #[tokio::test]
    async fn test_heterogeneous_values_round_trip() {
        let pool = init_memory_pool().await.unwrap();
        let records = vec![
            EvaluationRecord::new("/p/str.jpg", Evaluation::new("seven", "fine")),
            EvaluationRecord::new("/p/null.jpg", Evaluation::new(EvalValue::Null, EvalValue::Null)),
        ];
        save_batch(&pool, &records).await.unwrap();

        let photos = list_photos(&pool, 0, 20).await.unwrap();
        let by_path = |p: &str| photos.iter().find(|s| s.file_path == p).unwrap().clone();

        assert_eq!(by_path("/p/str.jpg").evaluation_score, EvalValue::Text("seven".into()));
        assert_eq!(by_path("/p/null.jpg").evaluation_score, EvalValue::Null);
        assert_eq!(by_path("/p/null.jpg").evaluation_comment, EvalValue::Null);
    }

    #[tokio::test]
    async fn test_pagination_newest_first() {
        let pool = init_memory_pool().await.unwrap();
        let records: Vec<EvaluationRecord> = (0..25)
            .map(|i| record(&format!("/p/{:02}.jpg", i), i, "c"))
            .collect();
        save_batch(&pool, &records).await.unwrap();

        let page1 = list_photos(&pool, 0, 20).await.unwrap();
        let page2 = list_photos(&pool, 20, 20).await.unwrap();

        assert_eq!(page1.len(), 20);
        assert_eq!(page2.len(), 5);
        assert_eq!(page1[0].file_path, "/p/24.jpg");
        assert_eq!(page2[4].file_path, "/p/00.jpg");
    }

    #[tokio::test]
    async fn test_failed_batch_commits_nothing() {
        let pool = init_memory_pool().await.unwrap();
        // Drop history table so the second statement of the batch fails
        sqlx::query("DROP TABLE photo_evaluations")
            .execute(&pool)
            .await
            .unwrap();

        let result = save_batch(&pool, &[record("/p/a.jpg", 1, "x")]).await;

        assert!(result.is_err());
        assert_eq!(count_photos(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_missing_photo() {
        let pool = init_memory_pool().await.unwrap();
        assert!(load_photo(&pool, 42).await.unwrap().is_none());
    }
}
