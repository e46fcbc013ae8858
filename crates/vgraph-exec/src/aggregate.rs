//! Aggregation: per-worker partial state merged under a lock once every
//! worker's input is exhausted, so the merge itself (not the scan) is the
//! only point of contention.

use std::collections::HashMap;

use vgraph_types::Value;

use vgraph_vector::hash_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    CountStar,
    Sum,
    Min,
    Max,
}

/// One aggregate function's running state. `Value::Null` means "no rows
/// seen yet" for Sum/Min/Max; Count starts at zero.
#[derive(Debug, Clone)]
pub struct AccumulatorState {
    function: AggregateFunction,
    count: i64,
    value: Value,
}

impl AccumulatorState {
    #[must_use]
    pub const fn new(function: AggregateFunction) -> Self {
        Self {
            function,
            count: 0,
            value: Value::Null,
        }
    }

    pub fn update(&mut self, input: &Value) {
        match self.function {
            AggregateFunction::CountStar => self.count += 1,
            AggregateFunction::Count => {
                if !input.is_null() {
                    self.count += 1;
                }
            }
            AggregateFunction::Sum => {
                if !input.is_null() {
                    self.value = Value::Double(as_f64(&self.value).unwrap_or(0.0) + as_f64(input).unwrap_or(0.0));
                }
            }
            AggregateFunction::Min => {
                if !input.is_null() && (self.value.is_null() || compare(input, &self.value) < 0) {
                    self.value = input.clone();
                }
            }
            AggregateFunction::Max => {
                if !input.is_null() && (self.value.is_null() || compare(input, &self.value) > 0) {
                    self.value = input.clone();
                }
            }
        }
    }

    /// Merge another worker's partial state for the same group into this
    /// one.
    pub fn merge(&mut self, other: &Self) {
        match self.function {
            AggregateFunction::Count | AggregateFunction::CountStar => self.count += other.count,
            AggregateFunction::Sum => {
                self.value = Value::Double(as_f64(&self.value).unwrap_or(0.0) + as_f64(&other.value).unwrap_or(0.0));
            }
            AggregateFunction::Min => {
                if !other.value.is_null() && (self.value.is_null() || compare(&other.value, &self.value) < 0) {
                    self.value = other.value.clone();
                }
            }
            AggregateFunction::Max => {
                if !other.value.is_null() && (self.value.is_null() || compare(&other.value, &self.value) > 0) {
                    self.value = other.value.clone();
                }
            }
        }
    }

    #[must_use]
    pub fn finish(&self) -> Value {
        match self.function {
            AggregateFunction::Count | AggregateFunction::CountStar => Value::Int64(self.count),
            _ => self.value.clone(),
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int16(n) => Some(f64::from(*n)),
        Value::Int32(n) => Some(f64::from(*n)),
        Value::Int64(n) => Some(*n as f64),
        Value::Float(n) => Some(f64::from(*n)),
        Value::Double(n) => Some(*n),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> i32 {
    match (as_f64(a), as_f64(b)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).map_or(0, |o| o as i32),
        _ => match (a, b) {
            (Value::String(a), Value::String(b)) => a.cmp(b) as i32,
            _ => 0,
        },
    }
}

/// A single global group (`COUNT(*)` with no `GROUP BY`), one state per
/// worker, merged at finalize.
pub struct SimpleAggregate {
    functions: Vec<AggregateFunction>,
}

impl SimpleAggregate {
    #[must_use]
    pub fn new(functions: Vec<AggregateFunction>) -> Self {
        Self { functions }
    }

    #[must_use]
    pub fn new_local_state(&self) -> Vec<AccumulatorState> {
        self.functions.iter().map(|&f| AccumulatorState::new(f)).collect()
    }

    pub fn update(&self, state: &mut [AccumulatorState], inputs: &[Value]) {
        for (acc, input) in state.iter_mut().zip(inputs) {
            acc.update(input);
        }
    }

    pub fn merge(&self, into: &mut [AccumulatorState], from: &[AccumulatorState]) {
        for (a, b) in into.iter_mut().zip(from) {
            a.merge(b);
        }
    }

    #[must_use]
    pub fn finish(&self, state: &[AccumulatorState]) -> Vec<Value> {
        state.iter().map(AccumulatorState::finish).collect()
    }
}

/// Grouped aggregation keyed by a multi-column key. Each worker
/// accumulates into its own `HashAggregateLocalState`; `merge_into`
/// folds one worker's groups into a shared map, so the merge — not the
/// per-row update — is the only thing that needs synchronizing.
pub struct HashAggregate {
    functions: Vec<AggregateFunction>,
}

type GroupMap = HashMap<u64, Vec<(Vec<Value>, Vec<AccumulatorState>)>>;

impl HashAggregate {
    #[must_use]
    pub fn new(functions: Vec<AggregateFunction>) -> Self {
        Self { functions }
    }

    #[must_use]
    pub fn new_local_state(&self) -> GroupMap {
        HashMap::new()
    }

    pub fn update(&self, state: &mut GroupMap, key: &[Value], inputs: &[Value]) {
        let hash = hash_key(key);
        let bucket = state.entry(hash).or_default();
        if let Some((_, accs)) = bucket.iter_mut().find(|(k, _)| k == key) {
            for (acc, input) in accs.iter_mut().zip(inputs) {
                acc.update(input);
            }
        } else {
            let mut accs: Vec<AccumulatorState> = self.functions.iter().map(|&f| AccumulatorState::new(f)).collect();
            for (acc, input) in accs.iter_mut().zip(inputs) {
                acc.update(input);
            }
            bucket.push((key.to_vec(), accs));
        }
    }

    pub fn merge_into(&self, into: &mut GroupMap, from: GroupMap) {
        for (hash, bucket) in from {
            let target = into.entry(hash).or_default();
            for (key, accs) in bucket {
                if let Some((_, target_accs)) = target.iter_mut().find(|(k, _)| *k == key) {
                    for (a, b) in target_accs.iter_mut().zip(&accs) {
                        a.merge(b);
                    }
                } else {
                    target.push((key, accs));
                }
            }
        }
    }

    #[must_use]
    pub fn finish(&self, state: &GroupMap) -> Vec<(Vec<Value>, Vec<Value>)> {
        state
            .values()
            .flatten()
            .map(|(key, accs)| (key.clone(), accs.iter().map(AccumulatorState::finish).collect()))
            .collect()
    }
}

/// Distinct is a hash aggregate with no functions: groups collapse to
/// their key with no payload, so "finish" yields each distinct key once.
#[must_use]
pub fn distinct_keys(rows: impl Iterator<Item = Vec<Value>>) -> Vec<Vec<Value>> {
    let mut seen: GroupMap = HashMap::new();
    for key in rows {
        let hash = hash_key(&key);
        let bucket = seen.entry(hash).or_default();
        if !bucket.iter().any(|(k, _)| *k == key) {
            bucket.push((key, Vec::new()));
        }
    }
    seen.into_values().flat_map(|b| b.into_iter().map(|(k, _)| k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_count_star_counts_every_row() {
        let agg = SimpleAggregate::new(vec![AggregateFunction::CountStar]);
        let mut state = agg.new_local_state();
        for _ in 0..5 {
            agg.update(&mut state, &[Value::Null]);
        }
        assert_eq!(agg.finish(&state), vec![Value::Int64(5)]);
    }

    #[test]
    fn merging_partial_states_matches_sequential_total() {
        let agg = SimpleAggregate::new(vec![AggregateFunction::Sum]);
        let mut a = agg.new_local_state();
        let mut b = agg.new_local_state();
        for v in [1, 2, 3] {
            agg.update(&mut a, &[Value::Int64(v)]);
        }
        for v in [4, 5] {
            agg.update(&mut b, &[Value::Int64(v)]);
        }
        agg.merge(&mut a, &b);
        assert_eq!(agg.finish(&a), vec![Value::Double(15.0)]);
    }

    #[test]
    fn hash_aggregate_groups_by_key() {
        let agg = HashAggregate::new(vec![AggregateFunction::CountStar]);
        let mut state = agg.new_local_state();
        agg.update(&mut state, &[Value::Int64(1)], &[Value::Null]);
        agg.update(&mut state, &[Value::Int64(1)], &[Value::Null]);
        agg.update(&mut state, &[Value::Int64(2)], &[Value::Null]);
        let mut result = agg.finish(&state);
        result.sort_by_key(|(k, _)| k[0].to_integer());
        assert_eq!(
            result,
            vec![
                (vec![Value::Int64(1)], vec![Value::Int64(2)]),
                (vec![Value::Int64(2)], vec![Value::Int64(1)]),
            ]
        );
    }

    #[test]
    fn distinct_keys_drops_duplicates() {
        let rows = vec![vec![Value::Int64(1)], vec![Value::Int64(1)], vec![Value::Int64(2)]];
        let mut keys = distinct_keys(rows.into_iter());
        keys.sort_by_key(|k| k[0].to_integer());
        assert_eq!(keys, vec![vec![Value::Int64(1)], vec![Value::Int64(2)]]);
    }
}
