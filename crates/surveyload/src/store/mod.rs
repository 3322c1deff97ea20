//! Relational materializer
//!
//! Writes inferred tables into SQLite or PostgreSQL through `sqlx`'s `Any`
//! driver. Every table is dropped and recreated on each run; the unit of work
//! is one table (drop, create and load inside a single transaction), so a
//! failing table rolls back on its own and earlier tables stay intact.

pub mod coerce;
pub mod dialect;

use csv::StringRecord;
use sqlx::any::{AnyArguments, AnyPoolOptions};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Transaction};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::config::DEFAULT_BATCH_ROWS;
use crate::error::{LoadError, Result};
use crate::progress::ProgressSink;
use crate::schema::{ColumnType, TableDescriptor};
use crate::tabular::TabularFile;

pub use coerce::{coerce, is_missing, CellValue, MISSING_SENTINELS};
pub use dialect::{quote_ident, redact, Dialect};

pub struct RelationalMaterializer {
    pool: AnyPool,
    dialect: Dialect,
    batch_rows: usize,
}

impl RelationalMaterializer {
    /// Open the store addressed by `url`
    pub async fn connect(url: &str) -> Result<Self> {
        let dialect = Dialect::from_url(url)?;
        sqlx::any::install_default_drivers();

        // Sequential writes; one connection keeps SQLite free of lock contention
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        info!(store = %redact(url), dialect = ?dialect, "Connected to store");

        Ok(Self {
            pool,
            dialect,
            batch_rows: DEFAULT_BATCH_ROWS,
        })
    }

    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows.max(1);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Drop (if present) and create every table, without foreign keys
    pub async fn recreate(&self, tables: &[TableDescriptor]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in tables {
            self.recreate_in(&mut tx, table).await?;
        }
        tx.commit().await?;
        info!(tables = tables.len(), "Recreated tables");
        Ok(())
    }

    /// Append the rows of `file` to the existing `table`
    pub async fn load(
        &self,
        table: &TableDescriptor,
        file: &TabularFile,
        sink: &dyn ProgressSink,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let rows = self.load_in(&mut tx, table, file, sink).await?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Drop, create and load `table` as one transaction
    #[instrument(skip_all, fields(table = %table.name))]
    pub async fn materialize(
        &self,
        table: &TableDescriptor,
        file: &TabularFile,
        sink: &dyn ProgressSink,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        self.recreate_in(&mut tx, table).await?;
        let rows = self.load_in(&mut tx, table, file, sink).await?;
        tx.commit().await?;

        info!(table = %table.name, rows, "Materialized table");
        Ok(rows)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn recreate_in(&self, tx: &mut Transaction<'_, Any>, table: &TableDescriptor) -> Result<()> {
        sqlx::query(&self.dialect.drop_table(&table.name))
            .execute(&mut **tx)
            .await?;
        sqlx::query(&self.dialect.create_table(table))
            .execute(&mut **tx)
            .await?;
        debug!(table = %table.name, columns = table.columns.len(), "Created table");
        Ok(())
    }

    async fn load_in(
        &self,
        tx: &mut Transaction<'_, Any>,
        table: &TableDescriptor,
        file: &TabularFile,
        sink: &dyn ProgressSink,
    ) -> Result<u64> {
        if !file.has_data_rows()? {
            info!(table = %table.name, "Header-only file, table left empty");
            sink.table_finished(&table.name, 0);
            return Ok(0);
        }

        sink.table_started(&table.name);

        let types = table.column_types();
        let mut keys = KeyTracker::new(table);
        let rows_per_batch = self.rows_per_batch(table.columns.len());

        let mut reader = file.reader()?;
        let mut batch: Vec<CellValue> = Vec::with_capacity(rows_per_batch * types.len());
        let mut batch_len = 0usize;
        let mut batch_first_row = 1u64;
        let mut row = 0u64;

        for record in reader.records() {
            let record = record?;
            row += 1;

            let cells = coerce_record(table, &types, &record, row)?;
            keys.check(&cells, row)?;
            batch.extend(cells);
            batch_len += 1;

            if batch_len == rows_per_batch {
                self.insert_batch(tx, table, &mut batch, batch_len, batch_first_row)
                    .await?;
                sink.rows_loaded(&table.name, batch_len as u64);
                batch_len = 0;
                batch_first_row = row + 1;
            }
        }

        if batch_len > 0 {
            self.insert_batch(tx, table, &mut batch, batch_len, batch_first_row)
                .await?;
            sink.rows_loaded(&table.name, batch_len as u64);
        }

        sink.table_finished(&table.name, row);
        Ok(row)
    }

    async fn insert_batch(
        &self,
        tx: &mut Transaction<'_, Any>,
        table: &TableDescriptor,
        batch: &mut Vec<CellValue>,
        rows: usize,
        first_row: u64,
    ) -> Result<()> {
        let sql = self.dialect.insert(table, rows);
        let mut query = sqlx::query(&sql);
        for cell in batch.drain(..) {
            query = bind_cell(query, cell);
        }

        query
            .execute(&mut **tx)
            .await
            .map_err(|err| map_insert_error(err, &table.name, first_row))?;
        debug!(table = %table.name, rows, first_row, "Inserted batch");
        Ok(())
    }

    fn rows_per_batch(&self, columns: usize) -> usize {
        let by_params = self.dialect.max_bind_params() / columns.max(1);
        self.batch_rows.min(by_params).max(1)
    }
}

fn bind_cell<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    cell: CellValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match cell {
        CellValue::Null(ColumnType::Integer) => query.bind(None::<i64>),
        CellValue::Null(ColumnType::Float) => query.bind(None::<f64>),
        CellValue::Null(_) => query.bind(None::<String>),
        CellValue::Integer(value) => query.bind(value),
        CellValue::Float(value) => query.bind(value),
        CellValue::Text(value) => query.bind(value),
    }
}

fn coerce_record(
    table: &TableDescriptor,
    types: &[ColumnType],
    record: &StringRecord,
    row: u64,
) -> Result<Vec<CellValue>> {
    record
        .iter()
        .zip(types)
        .zip(&table.columns)
        .map(|((raw, column_type), column)| {
            coerce(raw, *column_type).ok_or_else(|| LoadError::TypeCoercion {
                table: table.name.clone(),
                column: column.name.clone(),
                row,
                value: raw.to_string(),
                expected: column_type.expected(),
            })
        })
        .collect()
}

/// A unique violation the in-process check could not see still names the table
fn map_insert_error(err: sqlx::Error, table: &str, first_row: u64) -> LoadError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => LoadError::key_violation(
            table,
            first_row,
            format!("store rejected duplicate key in batch: {}", db.message()),
        ),
        _ => LoadError::Database(err),
    }
}

/// Rejects null and repeated primary keys, remembering where each key was seen
struct KeyTracker<'a> {
    table: &'a TableDescriptor,
    positions: Vec<usize>,
    seen: HashMap<Vec<String>, u64>,
}

impl<'a> KeyTracker<'a> {
    fn new(table: &'a TableDescriptor) -> Self {
        Self {
            table,
            positions: table.key_positions(),
            seen: HashMap::new(),
        }
    }

    fn check(&mut self, cells: &[CellValue], row: u64) -> Result<()> {
        if self.positions.is_empty() {
            return Ok(());
        }

        let mut key = Vec::with_capacity(self.positions.len());
        for &position in &self.positions {
            let cell = &cells[position];
            if cell.is_null() {
                return Err(LoadError::key_violation(
                    &self.table.name,
                    row,
                    format!("null value in key column '{}'", self.table.columns[position].name),
                ));
            }
            key.push(cell.to_string());
        }

        if let Some(first) = self.seen.get(&key) {
            return Err(LoadError::key_violation(
                &self.table.name,
                row,
                format!("duplicate key ({}) first seen at row {}", key.join(", "), first),
            ));
        }
        self.seen.insert(key, row);
        Ok(())
    }
}
