//! Value vectors: columnar storage for one logical type, with a shared
//! null bitmap and type-specific backing buffers.

use vgraph_error::{ExecError, Result};
use vgraph_types::{LogicalType, NodeId, RelId, Value};

use crate::null_bitmap::NullBitmap;

/// `list_entry_t { offset, size }` — points into the child data vector
/// owned by a `LIST` parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    pub offset: u32,
    pub size: u32,
}

/// The backing columnar buffer for one [`ValueVector`], one variant per
/// fixed-width primitive plus the variable-length and nested kinds.
#[derive(Debug, Clone)]
pub enum VectorData {
    Bool(Vec<bool>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Date(Vec<i32>),
    Timestamp(Vec<i64>),
    /// Offsets (`len+1`) + concatenated UTF-8 bytes. All strings are
    /// stored here directly rather than split prefix/overflow-pointer —
    /// see DESIGN.md for the rationale.
    String { offsets: Vec<u32>, data: Vec<u8> },
    Blob { offsets: Vec<u32>, data: Vec<u8> },
    Node(Vec<NodeId>),
    Rel(Vec<RelId>),
    /// `LIST`: entries index into an owned, independent child vector.
    List {
        entries: Vec<ListEntry>,
        child: Box<ValueVector>,
    },
    /// `STRUCT`: named fields, each a full-length parallel vector.
    Struct { fields: Vec<(String, ValueVector)> },
}

/// A column of up to `V` values of one logical type, plus a null bitmap.
///
/// Mismatched-type access (`get` dispatching on the wrong variant) and
/// out-of-range indices are programming errors: detected via
/// `debug_assert!` in debug builds, unchecked in release.
#[derive(Debug, Clone)]
pub struct ValueVector {
    pub logical_type: LogicalType,
    pub data: VectorData,
    pub validity: NullBitmap,
    /// Marks a vector whose values are a contiguous range, letting scans
    /// skip materialization.
    pub sequential: bool,
}

impl ValueVector {
    #[must_use]
    pub fn with_capacity(logical_type: LogicalType, capacity: usize) -> Self {
        let data = match logical_type {
            LogicalType::Bool => VectorData::Bool(Vec::with_capacity(capacity)),
            LogicalType::Int16 => VectorData::Int16(Vec::with_capacity(capacity)),
            LogicalType::Int32 => VectorData::Int32(Vec::with_capacity(capacity)),
            LogicalType::Int64 => VectorData::Int64(Vec::with_capacity(capacity)),
            LogicalType::Float => VectorData::Float(Vec::with_capacity(capacity)),
            LogicalType::Double => VectorData::Double(Vec::with_capacity(capacity)),
            LogicalType::Date => VectorData::Date(Vec::with_capacity(capacity)),
            LogicalType::Timestamp | LogicalType::Interval => {
                VectorData::Timestamp(Vec::with_capacity(capacity))
            }
            LogicalType::String => VectorData::String {
                offsets: vec![0],
                data: Vec::new(),
            },
            LogicalType::Blob => VectorData::Blob {
                offsets: vec![0],
                data: Vec::new(),
            },
            LogicalType::Node | LogicalType::InternalId => VectorData::Node(Vec::with_capacity(capacity)),
            LogicalType::Rel => VectorData::Rel(Vec::with_capacity(capacity)),
            LogicalType::List | LogicalType::FixedList => VectorData::List {
                entries: Vec::with_capacity(capacity),
                child: Box::new(Self::with_capacity(LogicalType::Int64, 0)),
            },
            LogicalType::Struct => VectorData::Struct { fields: Vec::new() },
        };
        Self {
            logical_type,
            data,
            validity: NullBitmap::all_valid(0),
            sequential: false,
        }
    }

    /// Build a vector from row-oriented values (used by test fixtures and
    /// the scan-materialization path).
    ///
    /// # Errors
    /// Returns a runtime error on a type mismatch between `logical_type`
    /// and one of `values`.
    pub fn from_values(logical_type: LogicalType, values: &[Value]) -> Result<Self> {
        let mut vector = Self::with_capacity(logical_type, values.len());
        let mut validity = NullBitmap::all_valid(values.len());
        for (idx, value) in values.iter().enumerate() {
            if value.is_null() {
                validity.set_valid(idx, false);
            }
            vector.push_raw(value)?;
        }
        vector.validity = validity;
        Ok(vector)
    }

    fn push_raw(&mut self, value: &Value) -> Result<()> {
        match (&mut self.data, value) {
            (VectorData::Bool(v), Value::Bool(b)) => v.push(*b),
            (VectorData::Bool(v), Value::Null) => v.push(false),
            (VectorData::Int16(v), Value::Int16(n)) => v.push(*n),
            (VectorData::Int16(v), Value::Null) => v.push(0),
            (VectorData::Int32(v), Value::Int32(n)) => v.push(*n),
            (VectorData::Int32(v), Value::Date(n)) => v.push(*n),
            (VectorData::Int32(v), Value::Null) => v.push(0),
            (VectorData::Int64(v), Value::Int64(n)) => v.push(*n),
            (VectorData::Int64(v), Value::Null) => v.push(0),
            (VectorData::Float(v), Value::Float(n)) => v.push(*n),
            (VectorData::Float(v), Value::Null) => v.push(0.0),
            (VectorData::Double(v), Value::Double(n)) => v.push(*n),
            (VectorData::Double(v), Value::Null) => v.push(0.0),
            (VectorData::Date(v), Value::Date(n)) => v.push(*n),
            (VectorData::Date(v), Value::Null) => v.push(0),
            (VectorData::Timestamp(v), Value::Timestamp(n)) => v.push(*n),
            (VectorData::Timestamp(v), Value::Null) => v.push(0),
            (VectorData::String { offsets, data }, Value::String(s)) => {
                data.extend_from_slice(s.as_bytes());
                offsets.push(data.len() as u32);
            }
            (VectorData::String { offsets, data: _ }, Value::Null) => {
                let last = *offsets.last().unwrap_or(&0);
                offsets.push(last);
            }
            (VectorData::Blob { offsets, data }, Value::Blob(b)) => {
                data.extend_from_slice(b);
                offsets.push(data.len() as u32);
            }
            (VectorData::Blob { offsets, data: _ }, Value::Null) => {
                let last = *offsets.last().unwrap_or(&0);
                offsets.push(last);
            }
            (VectorData::Node(v), Value::Node(id)) => v.push(*id),
            (VectorData::Node(v), Value::Null) => v.push(NodeId::invalid()),
            (VectorData::Rel(v), Value::Rel(id)) => v.push(*id),
            (VectorData::List { entries, child }, Value::List(items)) => {
                let offset = child.len() as u32;
                for item in items {
                    child.push_raw(item)?;
                }
                entries.push(ListEntry {
                    offset,
                    size: items.len() as u32,
                });
            }
            (VectorData::List { entries, .. }, Value::Null) => {
                entries.push(ListEntry { offset: 0, size: 0 });
            }
            _ => {
                return Err(ExecError::runtime(format!(
                    "value {value:?} does not match vector logical type {:?}",
                    self.logical_type
                )))
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.data {
            VectorData::Bool(v) => v.len(),
            VectorData::Int16(v) => v.len(),
            VectorData::Int32(v) => v.len(),
            VectorData::Int64(v) => v.len(),
            VectorData::Float(v) => v.len(),
            VectorData::Double(v) => v.len(),
            VectorData::Date(v) => v.len(),
            VectorData::Timestamp(v) => v.len(),
            VectorData::String { offsets, .. } | VectorData::Blob { offsets, .. } => {
                offsets.len().saturating_sub(1)
            }
            VectorData::Node(v) => v.len(),
            VectorData::Rel(v) => v.len(),
            VectorData::List { entries, .. } => entries.len(),
            VectorData::Struct { fields } => fields.first().map_or(0, |(_, v)| v.len()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_null(&self, idx: usize) -> bool {
        !self.validity.is_valid(idx)
    }

    /// Read the value at `idx`, or `Value::Null` if the slot's validity bit
    /// is clear. Mismatched access is a programming error.
    #[must_use]
    pub fn get(&self, idx: usize) -> Value {
        if self.is_null(idx) {
            return Value::Null;
        }
        match &self.data {
            VectorData::Bool(v) => Value::Bool(v[idx]),
            VectorData::Int16(v) => Value::Int16(v[idx]),
            VectorData::Int32(v) => {
                if self.logical_type == LogicalType::Date {
                    Value::Date(v[idx])
                } else {
                    Value::Int32(v[idx])
                }
            }
            VectorData::Int64(v) => Value::Int64(v[idx]),
            VectorData::Float(v) => Value::Float(v[idx]),
            VectorData::Double(v) => Value::Double(v[idx]),
            VectorData::Date(v) => Value::Date(v[idx]),
            VectorData::Timestamp(v) => Value::Timestamp(v[idx]),
            VectorData::String { offsets, data } => {
                let (start, end) = (offsets[idx] as usize, offsets[idx + 1] as usize);
                Value::String(String::from_utf8_lossy(&data[start..end]).into_owned())
            }
            VectorData::Blob { offsets, data } => {
                let (start, end) = (offsets[idx] as usize, offsets[idx + 1] as usize);
                Value::Blob(data[start..end].to_vec())
            }
            VectorData::Node(v) => Value::Node(v[idx]),
            VectorData::Rel(v) => Value::Rel(v[idx]),
            VectorData::List { entries, child } => {
                let entry = entries[idx];
                let items = (entry.offset..entry.offset + entry.size)
                    .map(|i| child.get(i as usize))
                    .collect();
                Value::List(items)
            }
            VectorData::Struct { fields } => Value::List(
                fields
                    .iter()
                    .map(|(_, field_vec)| field_vec.get(idx))
                    .collect(),
            ),
        }
    }

    /// Copy row `src_idx` from `other` into `self` at the next position
    /// (append). Used by gather/flatten operations.
    pub fn copy_value_from(&mut self, other: &Self, src_idx: usize) -> Result<()> {
        let value = other.get(src_idx);
        let was_null = value.is_null();
        self.push_raw(&value)?;
        let new_idx = self.len() - 1;
        if self.validity.len() <= new_idx {
            let mut grown = NullBitmap::all_valid(new_idx + 1);
            for i in 0..new_idx {
                grown.set_valid(i, self.validity.is_valid(i));
            }
            self.validity = grown;
        }
        self.validity.set_valid(new_idx, !was_null);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_int64_with_nulls() {
        let values = vec![Value::Int64(1), Value::Null, Value::Int64(3)];
        let vector = ValueVector::from_values(LogicalType::Int64, &values).unwrap();
        assert_eq!(vector.len(), 3);
        assert_eq!(vector.get(0), Value::Int64(1));
        assert_eq!(vector.get(1), Value::Null);
        assert_eq!(vector.get(2), Value::Int64(3));
    }

    #[test]
    fn roundtrip_strings() {
        let values = vec![
            Value::String("hello".into()),
            Value::Null,
            Value::String("a longer string value".into()),
        ];
        let vector = ValueVector::from_values(LogicalType::String, &values).unwrap();
        assert_eq!(vector.get(0), Value::String("hello".into()));
        assert!(vector.is_null(1));
        assert_eq!(
            vector.get(2),
            Value::String("a longer string value".into())
        );
    }

    #[test]
    fn list_vector_roundtrip() {
        let values = vec![Value::List(vec![Value::Int64(1), Value::Int64(2)]), Value::List(vec![])];
        let vector = ValueVector::from_values(LogicalType::List, &values).unwrap();
        assert_eq!(
            vector.get(0),
            Value::List(vec![Value::Int64(1), Value::Int64(2)])
        );
        assert_eq!(vector.get(1), Value::List(vec![]));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let values = vec![Value::String("oops".into())];
        assert!(ValueVector::from_values(LogicalType::Int64, &values).is_err());
    }
}
