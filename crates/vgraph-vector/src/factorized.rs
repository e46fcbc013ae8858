//! Factorized tables: an append-only-then-immutable row store used to
//! materialize pipeline intermediates (hash-join build sides, aggregate
//! group state, BFS path buffers) once a data chunk's lifetime would
//! otherwise end with its producing pipeline.

use tracing::trace;
use vgraph_error::{ExecError, Result};
use vgraph_types::{LogicalType, Value};

/// One column's name, logical type, and flat/unflat storage mode.
///
/// A flat column holds exactly one value per row. An unflat column holds
/// a group of values per row (e.g. the repeated multiplicities produced
/// when a many-to-many join result is factorized) stored out-of-line in
/// the table's overflow arena and addressed by an [`OverflowValue`].
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub logical_type: LogicalType,
    pub unflat: bool,
}

impl ColumnDescriptor {
    #[must_use]
    pub const fn flat(name: String, logical_type: LogicalType) -> Self {
        Self {
            name,
            logical_type,
            unflat: false,
        }
    }

    #[must_use]
    pub const fn unflat(name: String, logical_type: LogicalType) -> Self {
        Self {
            name,
            logical_type,
            unflat: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    #[must_use]
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

/// A pointer into a [`FactorizedTable`]'s overflow arena, used for unflat
/// columns whose per-row payload is a variable-length group of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowValue {
    arena_idx: u32,
}

/// Row-store table: one `Vec<Value>` per flat column, one
/// `Vec<OverflowValue>` per unflat column, and a shared overflow arena.
///
/// Rows are appended during the build phase of a pipeline breaker and
/// read back (scanned) only afterward; nothing in this type supports
/// mutating a row once written, matching how the execution core uses it
/// (build-then-probe, never build-then-update).
pub struct FactorizedTable {
    schema: TableSchema,
    flat_columns: Vec<Vec<Value>>,
    unflat_columns: Vec<Vec<OverflowValue>>,
    overflow_arena: Vec<Vec<Value>>,
    num_rows: usize,
}

impl FactorizedTable {
    #[must_use]
    pub fn new(schema: TableSchema) -> Self {
        trace!(num_columns = schema.num_columns(), "factorized table allocated");
        let flat_columns = schema
            .columns
            .iter()
            .map(|c| if c.unflat { Vec::new() } else { Vec::new() })
            .collect();
        let unflat_columns = schema.columns.iter().map(|_| Vec::new()).collect();
        Self {
            schema,
            flat_columns,
            unflat_columns,
            overflow_arena: Vec::new(),
            num_rows: 0,
        }
    }

    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    #[must_use]
    pub const fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Append one row. `values[i]` must match column `i`'s declared
    /// logical type; for an unflat column the value must be
    /// `Value::List(group)`.
    ///
    /// # Errors
    /// Returns a runtime error if `values.len()` doesn't match the schema
    /// or an unflat column receives a non-list value.
    pub fn append_row(&mut self, values: Vec<Value>) -> Result<usize> {
        if values.len() != self.schema.num_columns() {
            return Err(ExecError::runtime(format!(
                "row has {} values, table schema has {} columns",
                values.len(),
                self.schema.num_columns()
            )));
        }
        let row_idx = self.num_rows;
        for (col_idx, (descriptor, value)) in self.schema.columns.iter().zip(values).enumerate() {
            if descriptor.unflat {
                let Value::List(group) = value else {
                    return Err(ExecError::runtime(format!(
                        "column {} is unflat but row supplied a non-list value",
                        descriptor.name
                    )));
                };
                let arena_idx = self.overflow_arena.len() as u32;
                self.overflow_arena.push(group);
                self.unflat_columns[col_idx].push(OverflowValue { arena_idx });
            } else {
                self.flat_columns[col_idx].push(value);
            }
        }
        self.num_rows += 1;
        Ok(row_idx)
    }

    /// Read column `col_idx` of row `row_idx`. For an unflat column this
    /// returns `Value::List(group)`.
    #[must_use]
    pub fn get(&self, row_idx: usize, col_idx: usize) -> Value {
        if self.schema.columns[col_idx].unflat {
            let ov = self.unflat_columns[col_idx][row_idx];
            Value::List(self.overflow_arena[ov.arena_idx as usize].clone())
        } else {
            self.flat_columns[col_idx][row_idx].clone()
        }
    }

    /// Materialize `count` rows starting at `start`, projecting only
    /// `col_indices`. Used by the probe side of a hash join and by
    /// result-collector operators draining a pipeline breaker.
    #[must_use]
    pub fn scan(&self, start: usize, count: usize, col_indices: &[usize]) -> Vec<Vec<Value>> {
        let end = (start + count).min(self.num_rows);
        (start..end)
            .map(|row_idx| {
                col_indices
                    .iter()
                    .map(|&col_idx| self.get(row_idx, col_idx))
                    .collect()
            })
            .collect()
    }

    /// Row indices `0..num_rows`, used by the hash-table build phase to
    /// walk every row exactly once.
    pub fn row_indices(&self) -> impl Iterator<Item = usize> {
        0..self.num_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDescriptor::flat("id".into(), LogicalType::Int64),
            ColumnDescriptor::flat("name".into(), LogicalType::String),
        ])
    }

    #[test]
    fn append_and_scan_roundtrips() {
        let mut table = FactorizedTable::new(schema());
        table
            .append_row(vec![Value::Int64(1), Value::String("a".into())])
            .unwrap();
        table
            .append_row(vec![Value::Int64(2), Value::String("b".into())])
            .unwrap();
        assert_eq!(table.num_rows(), 2);
        let rows = table.scan(0, 2, &[0, 1]);
        assert_eq!(rows[0], vec![Value::Int64(1), Value::String("a".into())]);
        assert_eq!(rows[1], vec![Value::Int64(2), Value::String("b".into())]);
    }

    #[test]
    fn unflat_column_stores_a_group_per_row() {
        let schema = TableSchema::new(vec![
            ColumnDescriptor::flat("key".into(), LogicalType::Int64),
            ColumnDescriptor::unflat("matches".into(), LogicalType::Int64),
        ]);
        let mut table = FactorizedTable::new(schema);
        table
            .append_row(vec![
                Value::Int64(1),
                Value::List(vec![Value::Int64(10), Value::Int64(11)]),
            ])
            .unwrap();
        assert_eq!(
            table.get(0, 1),
            Value::List(vec![Value::Int64(10), Value::Int64(11)])
        );
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let mut table = FactorizedTable::new(schema());
        assert!(table.append_row(vec![Value::Int64(1)]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn appended_rows_scan_back_in_insertion_order(ids in proptest::collection::vec(0i64..10_000, 0..50)) {
            let mut table = FactorizedTable::new(schema());
            for &id in &ids {
                table.append_row(vec![Value::Int64(id), Value::String(String::new())]).unwrap();
            }
            let rows = table.scan(0, ids.len(), &[0]);
            let scanned: Vec<i64> = rows.into_iter().map(|row| row[0].to_integer()).collect();
            proptest::prop_assert_eq!(scanned, ids);
        }
    }
}
