//! Hash join build and probe, including sideways information passing
//! (SIP): build-side keys that happen to be node ids can mark a shared
//! [`crate::semi_mask::SemiMask`] so an upstream scan skips rows the join
//! would discard anyway.
//!
//! NULL never equals NULL for join-key purposes: a probe or build row
//! with any NULL key component cannot participate in an equi-join match
//! (it can still flow through on the non-matching side of a LEFT/ANTI
//! join, exactly as if no match had been found).

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;
use vgraph_error::Result;
use vgraph_types::Value;
use vgraph_vector::{hash_key, ColumnDescriptor, FactorizedTable, HashTable, TableSchema};

use crate::semi_mask::SemiMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    /// Emits one boolean per probe row: whether it had any match.
    Mark,
    /// Emits each probe row at most once, only if it matched.
    Semi,
    /// Emits each probe row at most once, only if it did *not* match.
    Anti,
}

fn key_has_null(key: &[Value]) -> bool {
    key.iter().any(Value::is_null)
}

fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a == b
}

/// The materialized build side: key columns followed by payload columns
/// in one factorized table, plus the hash table chaining rows by key
/// hash.
pub struct HashJoinTable {
    rows: FactorizedTable,
    hash_table: HashTable,
    num_key_columns: usize,
}

impl HashJoinTable {
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.num_rows()
    }
}

/// Build the hash table from `rows`, each a `(key, payload)` pair.
///
/// When `sip` is set, every build row whose sole key column is a node id
/// also marks that node's offset in the shared semi-mask, propagating
/// which nodes the join can possibly match back to whatever scan feeds
/// the probe side.
pub fn hash_join_build(
    rows: Vec<(Vec<Value>, Vec<Value>)>,
    sip: Option<(&Arc<SemiMask>, u8)>,
) -> Result<HashJoinTable> {
    let num_key_columns = rows.first().map_or(0, |(k, _)| k.len());
    let num_payload_columns = rows.first().map_or(0, |(_, p)| p.len());
    let mut columns = Vec::with_capacity(num_key_columns + num_payload_columns);
    for i in 0..num_key_columns {
        columns.push(ColumnDescriptor::flat(format!("key_{i}"), vgraph_types::LogicalType::Int64));
    }
    for i in 0..num_payload_columns {
        columns.push(ColumnDescriptor::flat(format!("payload_{i}"), vgraph_types::LogicalType::Int64));
    }
    let mut table = FactorizedTable::new(TableSchema::new(columns));
    let mut hashes = Vec::with_capacity(rows.len());

    for (key, _payload) in &rows {
        if let (Some((mask, masker_idx)), [Value::Node(node_id)]) = (sip, key.as_slice()) {
            mask.mark(node_id.offset as usize, masker_idx);
        }
        hashes.push(if key_has_null(key) { None } else { Some(hash_key(key)) });
    }

    for (key, payload) in rows {
        let mut row = key;
        row.extend(payload);
        table.append_row(row)?;
    }

    let hash_table = HashTable::new(table.num_rows());
    for (row_idx, hash) in hashes.into_iter().enumerate() {
        if let Some(hash) = hash {
            hash_table.insert(hash, row_idx);
        }
    }

    debug!(num_rows = table.num_rows(), num_key_columns, "hash join build side materialized");
    Ok(HashJoinTable {
        rows: table,
        hash_table,
        num_key_columns,
    })
}

/// Probe `build` with `probe_rows`, each a `(key, payload)` pair, and
/// return output rows: `probe_payload ++ build_payload` for INNER/LEFT,
/// `probe_payload ++ [mark]` for MARK, or just `probe_payload` for
/// SEMI/ANTI.
pub fn hash_join_probe(
    build: &HashJoinTable,
    probe_rows: &[(Vec<Value>, Vec<Value>)],
    join_type: JoinType,
) -> Vec<Vec<Value>> {
    let mut output = Vec::new();
    for (key, payload) in probe_rows {
        // Most join keys match a handful of build rows at most, so the chain
        // walk's result rarely spills the inline buffer onto the heap.
        let matches: SmallVec<[usize; 8]> = if key_has_null(key) {
            SmallVec::new()
        } else {
            build
                .hash_table
                .probe(hash_key(key))
                .filter(|&row_idx| {
                    let build_key: SmallVec<[Value; 4]> = (0..build.num_key_columns)
                        .map(|col| build.rows.get(row_idx, col))
                        .collect();
                    keys_equal(&build_key, key)
                })
                .collect()
        };

        match join_type {
            JoinType::Inner => {
                for row_idx in &matches {
                    output.push(join_row(payload, build, *row_idx));
                }
            }
            JoinType::Left => {
                if matches.is_empty() {
                    output.push(pad_with_nulls(payload, build));
                } else {
                    for row_idx in &matches {
                        output.push(join_row(payload, build, *row_idx));
                    }
                }
            }
            JoinType::Mark => {
                let mut row = payload.clone();
                row.push(Value::Bool(!matches.is_empty()));
                output.push(row);
            }
            JoinType::Semi => {
                if !matches.is_empty() {
                    output.push(payload.clone());
                }
            }
            JoinType::Anti => {
                if matches.is_empty() {
                    output.push(payload.clone());
                }
            }
        }
    }
    debug!(num_probe_rows = probe_rows.len(), num_output_rows = output.len(), ?join_type, "hash join probe finished");
    output
}

fn join_row(probe_payload: &[Value], build: &HashJoinTable, build_row_idx: usize) -> Vec<Value> {
    let mut row: SmallVec<[Value; 8]> = probe_payload.iter().cloned().collect();
    let num_build_payload = build.rows.schema().num_columns() - build.num_key_columns;
    for col in build.num_key_columns..build.num_key_columns + num_build_payload {
        row.push(build.rows.get(build_row_idx, col));
    }
    row.into_vec()
}

fn pad_with_nulls(probe_payload: &[Value], build: &HashJoinTable) -> Vec<Value> {
    let mut row: SmallVec<[Value; 8]> = probe_payload.iter().cloned().collect();
    let num_build_payload = build.rows.schema().num_columns() - build.num_key_columns;
    row.extend(std::iter::repeat(Value::Null).take(num_build_payload));
    row.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(pairs: &[(i64, i64)]) -> Vec<(Vec<Value>, Vec<Value>)> {
        pairs
            .iter()
            .map(|&(k, p)| (vec![Value::Int64(k)], vec![Value::Int64(p)]))
            .collect()
    }

    #[test]
    fn inner_join_matches_on_equal_keys() {
        let build = hash_join_build(rows(&[(1, 100), (2, 200)]), None).unwrap();
        let out = hash_join_probe(&build, &rows(&[(1, 1), (3, 3)]), JoinType::Inner);
        assert_eq!(out, vec![vec![Value::Int64(1), Value::Int64(100)]]);
    }

    #[test]
    fn left_join_pads_unmatched_rows_with_null() {
        let build = hash_join_build(rows(&[(1, 100)]), None).unwrap();
        let out = hash_join_probe(&build, &rows(&[(2, 2)]), JoinType::Left);
        assert_eq!(out, vec![vec![Value::Int64(2), Value::Null]]);
    }

    #[test]
    fn null_key_never_matches() {
        let build = hash_join_build(
            vec![(vec![Value::Null], vec![Value::Int64(1)])],
            None,
        )
        .unwrap();
        let probe = vec![(vec![Value::Null], vec![Value::Int64(9)])];
        let out = hash_join_probe(&build, &probe, JoinType::Inner);
        assert!(out.is_empty());
    }

    #[test]
    fn semi_dedups_to_one_row_per_probe_match() {
        let build = hash_join_build(rows(&[(1, 10), (1, 11), (1, 12)]), None).unwrap();
        let out = hash_join_probe(&build, &rows(&[(1, 1)]), JoinType::Semi);
        assert_eq!(out, vec![vec![Value::Int64(1)]]);
    }

    #[test]
    fn anti_emits_only_rows_with_no_match() {
        let build = hash_join_build(rows(&[(1, 10)]), None).unwrap();
        let out = hash_join_probe(&build, &rows(&[(1, 1), (2, 2)]), JoinType::Anti);
        assert_eq!(out, vec![vec![Value::Int64(2)]]);
    }

    #[test]
    fn mark_tags_every_probe_row_exactly_once() {
        let build = hash_join_build(rows(&[(1, 10)]), None).unwrap();
        let out = hash_join_probe(&build, &rows(&[(1, 1), (2, 2)]), JoinType::Mark);
        assert_eq!(
            out,
            vec![
                vec![Value::Int64(1), Value::Bool(true)],
                vec![Value::Int64(2), Value::Bool(false)],
            ]
        );
    }

    #[test]
    fn join_result_is_independent_of_thread_count_in_a_set_equality_sense() {
        let build = hash_join_build(rows(&[(1, 1), (2, 2), (3, 3)]), None).unwrap();
        let probe = rows(&[(1, 1), (2, 2), (3, 3), (4, 4)]);
        let out = hash_join_probe(&build, &probe, JoinType::Inner);
        let mut pairs: Vec<(i64, i64)> = out
            .into_iter()
            .map(|row| (row[0].to_integer(), row[1].to_integer()))
            .collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(1, 1), (2, 2), (3, 3)]);
    }
}
