//! End-to-end tests for archive conversion
//!
//! Archives are built in memory with the zip writer and converted into a
//! temporary SQLite file, then read back with a plain SQLite pool.

mod common;

use common::*;
use surveyload::archive::MetadataSource;
use surveyload::pipeline::{convert, default_store_url, ConvertOptions};
use surveyload::progress::NoProgress;
use surveyload::LoadError;
use tempfile::TempDir;

fn options_for(db: &std::path::Path) -> ConvertOptions {
    ConvertOptions::default().with_store_url(Some(sqlite_url(db)))
}

#[tokio::test]
async fn test_convert_embedded_layout() {
    let dir = TempDir::new().unwrap();
    let archive = embedded_archive(dir.path());
    let db = dir.path().join("out.db");

    let summary = convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.metadata_source, MetadataSource::Embedded);
    let tables: Vec<_> = summary.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tables, vec!["households", "interview__errors", "members"]);
    assert_eq!(summary.total_rows(), 6);

    let pool = open_sqlite(&db).await;
    assert_eq!(
        table_names(&pool).await,
        vec!["households", "interview__errors", "members"]
    );

    let columns = table_columns(&pool, "households").await;
    let expected = [
        ("interview__key", "TEXT"),
        ("interview__id", "TEXT"),
        ("q1", "INTEGER"),
        ("hh_size", "INTEGER"),
        ("income", "REAL"),
        ("location__Latitude", "REAL"),
        ("location__Timestamp", "TEXT"),
        ("village", "TEXT"),
        ("sssys_irnd", "REAL"),
        ("has__errors", "INTEGER"),
        ("interview__status", "INTEGER"),
    ];
    let expected: Vec<(String, String)> = expected
        .iter()
        .map(|(n, t)| (n.to_string(), t.to_string()))
        .collect();
    assert_eq!(columns, expected);

    let members = table_columns(&pool, "members").await;
    assert_eq!(members[2], ("members__id".to_string(), "INTEGER".to_string()));
    assert_eq!(members[4], ("assets__1".to_string(), "INTEGER".to_string()));
}

#[tokio::test]
async fn test_sentinels_load_as_null() {
    let dir = TempDir::new().unwrap();
    let archive = embedded_archive(dir.path());
    let db = dir.path().join("out.db");
    convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap();

    let pool = open_sqlite(&db).await;
    let rows: Vec<(String, Option<i64>, Option<i64>, Option<f64>, Option<f64>, Option<String>)> =
        sqlx::query_as(
            r#"SELECT "interview__id", "q1", "hh_size", "income", "location__Latitude", "location__Timestamp"
               FROM "households" ORDER BY rowid"#,
        )
        .fetch_all(&pool)
        .await
        .unwrap();

    assert_eq!(
        rows[0],
        (
            "aaaa".to_string(),
            Some(1),
            Some(4),
            Some(1520.5),
            Some(-1.2921),
            Some("2021-06-01T12:30:45".to_string())
        )
    );
    assert_eq!(rows[1], ("bbbb".to_string(), None, None, None, None, None));
    assert_eq!(rows[2], ("cccc".to_string(), Some(2), None, None, None, None));

    let village: Option<String> =
        sqlx::query_scalar(r#"SELECT "village" FROM "households" WHERE "interview__id" = 'bbbb'"#)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(village.is_none());
}

#[tokio::test]
async fn test_header_only_table_exists_empty() {
    let dir = TempDir::new().unwrap();
    let archive = embedded_archive(dir.path());
    let db = dir.path().join("out.db");
    convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap();

    let pool = open_sqlite(&db).await;
    assert_eq!(row_count(&pool, "interview__errors").await, 0);
    let columns = table_columns(&pool, "interview__errors").await;
    assert_eq!(columns.len(), 8);
    assert_eq!(columns[6], ("message__number".to_string(), "INTEGER".to_string()));
}

#[tokio::test]
async fn test_convert_nested_layout() {
    let dir = TempDir::new().unwrap();
    let archive = nested_archive(dir.path());
    let db = dir.path().join("nested.db");

    let summary = convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.metadata_source, MetadataSource::Nested);
    let pool = open_sqlite(&db).await;
    assert_eq!(row_count(&pool, "members").await, 3);
    assert_eq!(
        table_columns(&pool, "households").await[2],
        ("q1".to_string(), "INTEGER".to_string())
    );
}

#[tokio::test]
async fn test_fallback_document() {
    let dir = TempDir::new().unwrap();
    let archive = bare_archive(dir.path());
    let document = dir.path().join("questionnaire.json");
    std::fs::write(&document, DOCUMENT).unwrap();
    let db = dir.path().join("fallback.db");

    let options = options_for(&db).with_document(Some(document));
    let summary = convert(&archive, &options, &NoProgress).await.unwrap();

    assert_eq!(summary.metadata_source, MetadataSource::Fallback);
    assert_eq!(summary.tables.len(), 2);
}

#[tokio::test]
async fn test_missing_metadata_fails_before_store_is_created() {
    let dir = TempDir::new().unwrap();
    let archive = bare_archive(dir.path());
    let db = dir.path().join("never.db");

    let err = convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::MissingMetadata { .. }), "{err}");
    assert!(!db.exists());
}

#[tokio::test]
async fn test_conversion_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let archive = embedded_archive(dir.path());
    let db = dir.path().join("twice.db");

    let snapshot = |pool: sqlx::SqlitePool| async move {
        let mut tables = Vec::new();
        for table in table_names(&pool).await {
            let columns = table_columns(&pool, &table).await;
            let rows = table_dump(&pool, &table).await;
            tables.push((table, columns, rows));
        }
        pool.close().await;
        tables
    };

    convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap();
    let first = snapshot(open_sqlite(&db).await).await;

    convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap();
    let second = snapshot(open_sqlite(&db).await).await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);

    let (_, columns, households) = &first[0];
    assert_eq!(columns.len(), 11);
    assert_eq!(households.len(), 3);
    assert!(households.iter().all(|row| row.len() == 11));
    // Every typed column carries a value through both runs, not only the keys
    let aaaa = &households[0];
    assert!(aaaa.contains(&"'2021-06-01T12:30:45'".to_string()), "{aaaa:?}");
    assert!(aaaa.contains(&"1520.5".to_string()), "{aaaa:?}");
    assert!(aaaa.contains(&"-1.2921".to_string()), "{aaaa:?}");

    let (_, columns, members) = &first[2];
    assert_eq!(columns.len(), 6);
    assert_eq!(members.len(), 3);
    assert!(members.iter().all(|row| row.len() == 6));
}

#[tokio::test]
async fn test_bad_date_aborts_with_position_and_keeps_earlier_tables() {
    let dir = TempDir::new().unwrap();
    let actions = format!(
        "{}11-22-33-44\taaaa\t2020-13-40\t10:00:00\t1\tsupervisor\t2\tjdoe\t1\n",
        INTERVIEW_ACTIONS_HEADER
    );
    let archive = write_archive(
        dir.path(),
        "bad_dates.zip",
        &[
            ("households.tab", HOUSEHOLDS.as_bytes()),
            ("interview__actions.tab", actions.as_bytes()),
            ("document.json", DOCUMENT.as_bytes()),
        ],
    );
    let db = dir.path().join("bad.db");

    let err = convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap_err();

    match err {
        LoadError::TypeCoercion {
            table,
            column,
            row,
            value,
            ..
        } => {
            assert_eq!(table, "interview__actions");
            assert_eq!(column, "date");
            assert_eq!(row, 1);
            assert_eq!(value, "2020-13-40");
        }
        other => panic!("unexpected error: {other}"),
    }

    // households sorts first and was committed before the failure
    let pool = open_sqlite(&db).await;
    assert_eq!(table_names(&pool).await, vec!["households"]);
    assert_eq!(row_count(&pool, "households").await, 3);
}

#[tokio::test]
async fn test_system_header_mismatch_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let archive = write_archive(
        dir.path(),
        "mismatch.zip",
        &[
            ("households.tab", HOUSEHOLDS.as_bytes()),
            ("interview__errors.tab", b"interview__key\tmessage\n"),
            ("document.json", DOCUMENT.as_bytes()),
        ],
    );
    let db = dir.path().join("mismatch.db");

    let err = convert(&archive, &options_for(&db), &NoProgress)
        .await
        .unwrap_err();

    assert!(
        matches!(err, LoadError::SchemaMismatch { ref table, .. } if table == "interview__errors"),
        "{err}"
    );
    assert!(!db.exists());
}

#[tokio::test]
async fn test_default_store_sits_next_to_archive() {
    let dir = TempDir::new().unwrap();
    let archive = embedded_archive(dir.path());

    let summary = convert(&archive, &ConvertOptions::default(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.store_url, default_store_url(&archive));
    assert!(dir.path().join("survey_1_Tabular_All.db").exists());
}

#[tokio::test]
async fn test_unsupported_store_scheme() {
    let dir = TempDir::new().unwrap();
    let archive = embedded_archive(dir.path());
    let options = ConvertOptions::default().with_store_url(Some("mysql://localhost/db".to_string()));

    let err = convert(&archive, &options, &NoProgress).await.unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedStore(_)), "{err}");
}
