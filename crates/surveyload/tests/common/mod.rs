//! Shared fixtures for integration tests: in-memory zip archives and SQLite readers

#![allow(dead_code)]

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

pub const QUESTIONNAIRE_ID: &str = "0b5a3e7b-2c0f-4f4e-9d3a-6a8f1d2e3c4b";

/// Designer-style questionnaire tree
pub const DOCUMENT: &str = r#"{
    "$type": "QuestionnaireDocument",
    "Title": "Household survey",
    "Children": [
        {
            "$type": "Group",
            "Children": [
                { "$type": "SingleQuestion", "VariableName": "q1" },
                { "$type": "NumericQuestion", "VariableName": "hh_size", "IsInteger": true },
                { "$type": "NumericQuestion", "VariableName": "income", "IsInteger": false },
                { "$type": "GpsCoordinateQuestion", "VariableName": "location" },
                { "$type": "TextQuestion", "VariableName": "village" },
                {
                    "$type": "Group",
                    "IsRoster": true,
                    "VariableName": "members",
                    "Children": [
                        { "$type": "TextQuestion", "VariableName": "member_name" },
                        { "$type": "MultyOptionsQuestion", "VariableName": "assets" }
                    ]
                }
            ]
        }
    ]
}"#;

pub const HOUSEHOLDS: &str = "\u{feff}interview__key\tinterview__id\tq1\thh_size\tincome\tlocation__Latitude\tlocation__Timestamp\tvillage\tsssys_irnd\thas__errors\tinterview__status\n\
11-22-33-44\taaaa\t1\t4\t1520.5\t-1.2921\t2021-06-01T12:30:45\tKibera\t0.4151\t0\t100\n\
22-33-44-55\tbbbb\t-999999999\t-999999999\t-999999999\t##N/A##\t##N/A##\t##N/A##\t0.9023\t1\t120\n\
33-44-55-66\tcccc\t2\t\t\t\t\t\t0.1234\t0\t100\n";

pub const MEMBERS: &str = "interview__key\tinterview__id\tmembers__id\tmember_name\tassets__1\tassets__2\n\
11-22-33-44\taaaa\t1\tAmina\t1\t0\n\
11-22-33-44\taaaa\t2\tJuma\t0\t1\n\
33-44-55-66\tcccc\t1\tNeema\t-999999999\t-999999999\n";

pub const INTERVIEW_ERRORS: &str =
    "interview__key\tinterview__id\troster\tid1\tvariable\ttype\tmessage__number\tmessage\n";

pub const INTERVIEW_ACTIONS_HEADER: &str = "interview__key\tinterview__id\tdate\ttime\taction\toriginator\trole\tresponsible__name\tresponsible__role\n";

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer.write_all(content).expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip").into_inner()
}

pub fn write_archive(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, zip_bytes(entries)).expect("Failed to write archive");
    path
}

/// Archive with the document at the root next to the tables
pub fn embedded_archive(dir: &Path) -> PathBuf {
    write_archive(
        dir,
        "survey_1_Tabular_All.zip",
        &[
            ("households.tab", HOUSEHOLDS.as_bytes()),
            ("members.tab", MEMBERS.as_bytes()),
            ("interview__errors.tab", INTERVIEW_ERRORS.as_bytes()),
            ("document.json", DOCUMENT.as_bytes()),
            ("export__readme.txt", b"Exported by Headquarters"),
        ],
    )
}

/// Archive with the document only inside Questionnaire/content.zip
pub fn nested_archive(dir: &Path) -> PathBuf {
    let content = zip_bytes(&[("document.json", DOCUMENT.as_bytes())]);
    write_archive(
        dir,
        "survey_1_Tabular_Nested.zip",
        &[
            ("households.tab", HOUSEHOLDS.as_bytes()),
            ("members.tab", MEMBERS.as_bytes()),
            ("interview__errors.tab", INTERVIEW_ERRORS.as_bytes()),
            ("Questionnaire/content.zip", &content),
        ],
    )
}

/// Archive without any questionnaire document
pub fn bare_archive(dir: &Path) -> PathBuf {
    write_archive(
        dir,
        "survey_1_Tabular_Bare.zip",
        &[
            ("households.tab", HOUSEHOLDS.as_bytes()),
            ("members.tab", MEMBERS.as_bytes()),
        ],
    )
}

pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}

pub async fn open_sqlite(path: &Path) -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}", path.display()))
        .await
        .expect("Failed to open SQLite store")
}

/// `(name, declared type)` of every column, in table order
pub async fn table_columns(pool: &SqlitePool, table: &str) -> Vec<(String, String)> {
    sqlx::query_as("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(pool)
        .await
        .expect("Failed to read table info")
}

pub async fn table_names(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .expect("Failed to list tables")
}

pub async fn row_count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table))
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

/// Every row of `table` in insertion order, each cell rendered by SQLite's
/// `quote()` so NULLs, integers, reals and text compare exactly
pub async fn table_dump(pool: &SqlitePool, table: &str) -> Vec<Vec<String>> {
    let cells: Vec<String> = table_columns(pool, table)
        .await
        .into_iter()
        .map(|(name, _)| format!("quote(\"{}\")", name))
        .collect();
    let sql = format!("SELECT {} FROM \"{}\" ORDER BY rowid", cells.join(", "), table);

    sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .expect("Failed to dump table")
        .iter()
        .map(|row| (0..cells.len()).map(|i| row.get::<String, _>(i)).collect())
        .collect()
}
