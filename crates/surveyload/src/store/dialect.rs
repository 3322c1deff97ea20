//! SQL dialect differences between the supported stores

use crate::error::{LoadError, Result};
use crate::schema::{ColumnType, TableDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Pick the dialect from the store address scheme
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();

        match scheme.as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            _ => Err(LoadError::UnsupportedStore(redact(url))),
        }
    }

    pub fn column_type(&self, column_type: ColumnType) -> &'static str {
        match (self, column_type) {
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Float) => "REAL",
            // Temporal values are stored as canonical ISO text
            (Dialect::Sqlite, _) => "TEXT",
            (Dialect::Postgres, ColumnType::Integer) => "BIGINT",
            (Dialect::Postgres, ColumnType::Float) => "DOUBLE PRECISION",
            (Dialect::Postgres, ColumnType::Date) => "DATE",
            (Dialect::Postgres, ColumnType::Time) => "TIME",
            (Dialect::Postgres, ColumnType::DateTime) => "TIMESTAMP",
            (Dialect::Postgres, ColumnType::Text) => "TEXT",
        }
    }

    /// Placeholder for the `position`-th (1-based) bound parameter
    pub fn placeholder(&self, position: usize, column_type: ColumnType) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => {
                let param = format!("${}", position);
                match column_type {
                    ColumnType::Date | ColumnType::Time | ColumnType::DateTime => {
                        format!("CAST({} AS {})", param, self.column_type(column_type))
                    }
                    _ => param,
                }
            }
        }
    }

    /// Upper bound on bound parameters in one statement
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::Sqlite => 32_766,
            Dialect::Postgres => 65_535,
        }
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(table))
    }

    pub fn create_table(&self, table: &TableDescriptor) -> String {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                format!(
                    "{} {}",
                    quote_ident(&column.name),
                    self.column_type(column.column_type)
                )
            })
            .collect();

        if !table.primary_key.is_empty() {
            let keys: Vec<String> = table.primary_key.iter().map(|k| quote_ident(k)).collect();
            definitions.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                quote_ident(&format!("{}_pk", table.name)),
                keys.join(", ")
            ));
        }

        format!(
            "CREATE TABLE {} ({})",
            quote_ident(&table.name),
            definitions.join(", ")
        )
    }

    /// Multi-row insert for `rows` rows of `table`
    pub fn insert(&self, table: &TableDescriptor, rows: usize) -> String {
        let columns: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ",
            quote_ident(&table.name),
            columns.join(", ")
        );

        let mut position = 0;
        for row in 0..rows {
            if row > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (i, column) in table.columns.iter().enumerate() {
                position += 1;
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&self.placeholder(position, column.column_type));
            }
            sql.push(')');
        }
        sql
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Strip credentials before an address ends up in an error or log line
pub fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
