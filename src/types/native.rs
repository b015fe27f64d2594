//! Generic descriptor for fixed-size `repr(C)` structs.
//!
//! A wrapped struct implements [`NativeStruct`]; [`StructType`] turns that
//! into an [`ObjectType`] whose payload is the struct's packed bytes.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

use crate::host::{HostTable, HostValue};
use crate::registry::{Method, ObjectType, Payload};
use crate::status::{CoreError, CoreResult};

/// A fixed-size native struct exposed to the host
pub trait NativeStruct: Pod + Send + Sync + 'static {
    /// Host type name
    const NAME: &'static str;

    /// Field names, in table-encoding order
    const FIELDS: &'static [&'static str];

    fn field(&self, name: &str) -> CoreResult<HostValue>;

    fn set_field(&mut self, name: &str, value: &HostValue) -> CoreResult<()>;

    /// Populate a zeroed value from the init argument
    fn init(&mut self, init: &HostValue) -> CoreResult<()> {
        init_fields(self, init)
    }

    fn methods() -> &'static [Method] {
        &[]
    }
}

/// Default init: nil leaves the value zeroed, a table sets the fields it
/// names
pub fn init_fields<T: NativeStruct>(value: &mut T, init: &HostValue) -> CoreResult<()> {
    match init {
        HostValue::Nil => Ok(()),
        HostValue::Table(table) => {
            for name in T::FIELDS {
                if let Some(v) = table.get_field(name) {
                    value.set_field(name, v)?;
                }
            }
            Ok(())
        }
        other => Err(CoreError::invalid(format!(
            "{} cannot be initialised from {}",
            T::NAME,
            other.type_name()
        ))),
    }
}

/// Error for a field name the struct does not have
pub fn unknown_field(type_name: &str, field: &str) -> CoreError {
    CoreError::not_found(format!("{} has no field '{}'", type_name, field))
}

/// Descriptor over a [`NativeStruct`]
pub struct StructType<T>(PhantomData<fn() -> T>);

impl<T: NativeStruct> StructType<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: NativeStruct> Default for StructType<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NativeStruct> ObjectType for StructType<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn payload_size(&self) -> Option<usize> {
        Some(std::mem::size_of::<T>())
    }

    fn init(&self, payload: &mut Payload, init: &HostValue) -> CoreResult<()> {
        payload.update::<T, _>(|value| value.init(init))
    }

    fn get(&self, payload: &Payload, field: &str) -> CoreResult<HostValue> {
        payload.read::<T>()?.field(field)
    }

    fn set(&self, payload: &mut Payload, field: &str, value: &HostValue) -> CoreResult<()> {
        payload.update::<T, _>(|v| v.set_field(field, value))
    }

    fn encode(&self, payload: &Payload) -> CoreResult<HostTable> {
        let value: T = payload.read()?;
        let mut table = HostTable::new();
        for name in T::FIELDS {
            table.set_field(name, value.field(name)?);
        }
        Ok(table)
    }

    /// Every field must be present
    fn decode(&self, table: &HostTable) -> CoreResult<Payload> {
        let mut value = T::zeroed();
        for name in T::FIELDS {
            let raw = table.get_field(name).ok_or_else(|| {
                CoreError::not_found(format!("{} table is missing field '{}'", T::NAME, name))
            })?;
            value.set_field(name, raw)?;
        }
        Ok(Payload::from_struct(&value))
    }

    fn methods(&self) -> &'static [Method] {
        T::methods()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl NativeStruct for Point {
        const NAME: &'static str = "point";
        const FIELDS: &'static [&'static str] = &["x", "y"];

        fn field(&self, name: &str) -> CoreResult<HostValue> {
            match name {
                "x" => Ok(self.x.into()),
                "y" => Ok(self.y.into()),
                _ => Err(unknown_field(Self::NAME, name)),
            }
        }

        fn set_field(&mut self, name: &str, value: &HostValue) -> CoreResult<()> {
            match name {
                "x" => self.x = value.to_int(name)?,
                "y" => self.y = value.to_int(name)?,
                _ => return Err(unknown_field(Self::NAME, name)),
            }
            Ok(())
        }
    }

    #[test]
    fn test_create_from_partial_table() {
        let ty = StructType::<Point>::new();
        let mut init = HostTable::new();
        init.set_field("y", 4i64);

        let payload = ty.create(&HostValue::Table(init)).unwrap();
        assert_eq!(payload.read::<Point>().unwrap(), Point { x: 0, y: 4 });
        assert_eq!(ty.payload_size(), Some(8));
    }

    #[test]
    fn test_decode_requires_every_field() {
        let ty = StructType::<Point>::new();
        let mut table = HostTable::new();
        table.set_field("x", 1i64);
        assert!(matches!(ty.decode(&table), Err(CoreError::NotFound(_))));

        table.set_field("y", "two");
        assert!(matches!(
            ty.decode(&table),
            Err(CoreError::InvalidArgument(_))
        ));

        table.set_field("y", 2i64);
        let payload = ty.decode(&table).unwrap();
        assert_eq!(ty.encode(&payload).unwrap(), table);
    }

    #[test]
    fn test_field_access() {
        let ty = StructType::<Point>::new();
        let mut payload = ty.create(&HostValue::Nil).unwrap();
        ty.set(&mut payload, "x", &HostValue::Integer(-3)).unwrap();
        assert_eq!(ty.get(&payload, "x").unwrap(), HostValue::Integer(-3));

        assert!(matches!(
            ty.get(&payload, "z"),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            ty.set(&mut payload, "x", &HostValue::Integer(i64::MAX)),
            Err(CoreError::RangeError(_))
        ));
        assert!(matches!(
            ty.create(&HostValue::Boolean(true)),
            Err(CoreError::InvalidArgument(_))
        ));
    }
}
