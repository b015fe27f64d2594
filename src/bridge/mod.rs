//! Table Bridge
//!
//! Bulk conversion between host tables of managed objects and packed arrays
//! of fixed-size native structs.
//!
//! ```text
//! import_vector:  { [1] = obj, [2] = obj, ..., n = N }  ──►  [T; N] packed
//! export_vector:  [T; N] packed  ──►  { [1] = new obj, ..., [N] = new obj }
//! ```
//!
//! Cardinality is the table's declared length (its `n` field, else its
//! border) and every key `1..=N` must be present.

mod vector;

pub use vector::{VectorParams, VectorTable};

use crate::config::BridgeConfig;
use crate::host::{HostTable, DECLARED_LEN_FIELD};
use crate::registry::{ObjectRegistry, Payload};
use crate::status::{CoreError, CoreResult};

/// Import/export entry points, bounded by a maximum cardinality
#[derive(Debug, Clone)]
pub struct TableBridge {
    max_cardinality: usize,
}

impl TableBridge {
    pub fn new(max_cardinality: usize) -> Self {
        Self { max_cardinality }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.max_cardinality)
    }

    pub fn max_cardinality(&self) -> usize {
        self.max_cardinality
    }

    /// Pack the elements of `table` into a fresh vector of `element_type`
    ///
    /// Every value at keys `1..=cardinality` must be a live object of
    /// `element_type`. A missing key is `RangeError`, a value of another
    /// kind or type `InvalidArgument`. On failure the partly built storage
    /// is released and nothing is returned.
    pub fn import_vector(
        &self,
        registry: &ObjectRegistry,
        table: &HostTable,
        element_type: &str,
    ) -> CoreResult<VectorTable> {
        let descriptor = registry.descriptor(element_type)?;
        let stride = descriptor.payload_size().ok_or_else(|| {
            CoreError::invalid(format!("type '{}' has no fixed stride", element_type))
        })?;
        let cardinality = table.declared_len()?;
        if cardinality > self.max_cardinality {
            return Err(CoreError::range(format!(
                "cardinality {} exceeds limit of {}",
                cardinality, self.max_cardinality
            )));
        }

        let mut vector = VectorTable::new(descriptor.name(), stride, cardinality)?;
        match fill(registry, table, &mut vector) {
            Ok(()) => {
                tracing::debug!(element_type, cardinality, stride, "imported vector");
                Ok(vector)
            }
            Err(e) => {
                tracing::debug!(element_type, cardinality, error = %e, "vector import failed");
                Err(e)
            }
        }
    }

    /// Write one new object per element of `vector` into `table`
    ///
    /// With `make_new` the table is emptied first. With `release_after`
    /// the vector's storage is released once every element is written.
    /// Returns the number of elements written.
    pub fn export_vector(
        &self,
        registry: &mut ObjectRegistry,
        vector: &mut VectorTable,
        table: &mut HostTable,
        make_new: bool,
        release_after: bool,
    ) -> CoreResult<usize> {
        if vector.is_released() {
            return Err(CoreError::invalid("vector storage already released"));
        }
        if make_new {
            table.clear();
        }

        let cardinality = vector.cardinality();
        for index in 0..cardinality {
            let payload = Payload::Struct(vector.element(index)?.to_vec());
            let handle = registry.adopt(vector.element_type(), payload)?;
            table.set_index(index as i64 + 1, handle);
        }
        if table.get_field(DECLARED_LEN_FIELD).is_some() {
            table.set_field(DECLARED_LEN_FIELD, cardinality);
        }

        if release_after {
            vector.release()?;
        }
        tracing::debug!(
            element_type = vector.element_type(),
            cardinality,
            release_after,
            "exported vector"
        );
        Ok(cardinality)
    }
}

impl Default for TableBridge {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

fn fill(registry: &ObjectRegistry, table: &HostTable, vector: &mut VectorTable) -> CoreResult<()> {
    let cardinality = vector.cardinality();
    let element_type = vector.element_type();
    for index in 0..cardinality {
        let key = index as i64 + 1;
        let value = table.get_index(key).ok_or_else(|| {
            CoreError::range(format!("element {} of {} is missing", key, cardinality))
        })?;
        let handle = value.as_handle().ok_or_else(|| {
            CoreError::invalid(format!(
                "element {}: expected {}, got {}",
                key,
                element_type,
                value.type_name()
            ))
        })?;
        let object = registry.get_typed(handle, element_type)?;
        let bytes = match object.payload() {
            Payload::Struct(bytes) if bytes.len() == vector.stride() => bytes,
            payload => {
                return Err(CoreError::invalid(format!(
                    "element {}: {} payload of {} bytes, expected {}",
                    key,
                    element_type,
                    payload.len(),
                    vector.stride()
                )))
            }
        };
        vector.element_mut(index)?.copy_from_slice(bytes);
    }
    Ok(())
}
