//! Per-type descriptors.
//!
//! Every wrapped native type implements [`ObjectType`]. The registry keeps
//! one `Arc<dyn ObjectType>` per type name and dispatches creation,
//! field access, table encoding and host methods through it.

use std::fmt;

use bytemuck::Pod;

use super::{Handle, ManagedObject, ObjectRegistry};
use crate::buffer::Buffer;
use crate::host::{HostTable, HostValue};
use crate::status::{CoreError, CoreResult};

/// Host-callable method: `(registry, self handle, arguments) -> result`
pub type MethodFn = fn(&mut ObjectRegistry, Handle, &[HostValue]) -> CoreResult<HostValue>;

/// One entry of a type's `{name, function}` table
#[derive(Clone, Copy)]
pub struct Method {
    pub name: &'static str,
    pub func: MethodFn,
}

impl Method {
    pub const fn new(name: &'static str, func: MethodFn) -> Self {
        Self { name, func }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish()
    }
}

// =============================================================================
// Payload
// =============================================================================

/// The native value wrapped by a managed object
#[derive(Debug)]
pub enum Payload {
    /// Packed bytes of a fixed-size struct
    Struct(Vec<u8>),
    /// Buffer-bearing object
    Buffer(Buffer),
}

impl Payload {
    /// Zero-filled struct payload of `size` bytes
    pub fn zeroed(size: usize) -> Self {
        Payload::Struct(vec![0u8; size])
    }

    /// Struct payload holding a copy of `value`
    pub fn from_struct<T: Pod>(value: &T) -> Self {
        Payload::Struct(bytemuck::bytes_of(value).to_vec())
    }

    /// Packed struct bytes, or the valid bytes of a buffer
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Struct(bytes) => bytes,
            Payload::Buffer(buf) => buf.as_slice(),
        }
    }

    /// Host-visible length (`#obj`)
    pub fn len(&self) -> usize {
        match self {
            Payload::Struct(bytes) => bytes.len(),
            Payload::Buffer(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the payload as `T`
    pub fn read<T: Pod>(&self) -> CoreResult<T> {
        match self {
            Payload::Struct(bytes) if bytes.len() == std::mem::size_of::<T>() => {
                Ok(bytemuck::pod_read_unaligned(bytes))
            }
            Payload::Struct(bytes) => Err(CoreError::invalid(format!(
                "payload of {} bytes read as {}-byte struct",
                bytes.len(),
                std::mem::size_of::<T>()
            ))),
            Payload::Buffer(_) => Err(CoreError::invalid("buffer payload read as struct")),
        }
    }

    /// Overwrite the payload with `value`
    pub fn write<T: Pod>(&mut self, value: &T) -> CoreResult<()> {
        match self {
            Payload::Struct(bytes) if bytes.len() == std::mem::size_of::<T>() => {
                bytes.copy_from_slice(bytemuck::bytes_of(value));
                Ok(())
            }
            Payload::Struct(bytes) => Err(CoreError::invalid(format!(
                "payload of {} bytes written as {}-byte struct",
                bytes.len(),
                std::mem::size_of::<T>()
            ))),
            Payload::Buffer(_) => Err(CoreError::invalid("buffer payload written as struct")),
        }
    }

    /// Read-modify-write helper for struct payloads
    pub fn update<T: Pod, R>(&mut self, f: impl FnOnce(&mut T) -> CoreResult<R>) -> CoreResult<R> {
        let mut value: T = self.read()?;
        let r = f(&mut value)?;
        self.write(&value)?;
        Ok(r)
    }

    pub fn buffer(&self) -> CoreResult<&Buffer> {
        match self {
            Payload::Buffer(buf) => Ok(buf),
            Payload::Struct(_) => Err(CoreError::invalid("object does not carry a buffer")),
        }
    }

    pub fn buffer_mut(&mut self) -> CoreResult<&mut Buffer> {
        match self {
            Payload::Buffer(buf) => Ok(buf),
            Payload::Struct(_) => Err(CoreError::invalid("object does not carry a buffer")),
        }
    }
}

// =============================================================================
// Descriptor Trait
// =============================================================================

/// Descriptor of one wrapped native type
pub trait ObjectType: Send + Sync {
    /// Type name, unique within a registry
    fn name(&self) -> &'static str;

    /// Fixed payload stride, `None` for buffer-bearing types
    fn payload_size(&self) -> Option<usize>;

    /// Populate a zero-filled payload from the init argument
    fn init(&self, payload: &mut Payload, init: &HostValue) -> CoreResult<()>;

    /// Build a payload from the init argument
    ///
    /// Fixed-size types get a zero-filled payload passed through `init`;
    /// buffer-bearing types override this.
    fn create(&self, init: &HostValue) -> CoreResult<Payload> {
        let size = self.payload_size().ok_or_else(|| {
            CoreError::invalid(format!("type '{}' must implement create", self.name()))
        })?;
        let mut payload = Payload::zeroed(size);
        self.init(&mut payload, init)?;
        Ok(payload)
    }

    /// Read a named field
    fn get(&self, payload: &Payload, field: &str) -> CoreResult<HostValue>;

    /// Write a named field
    fn set(&self, payload: &mut Payload, field: &str, value: &HostValue) -> CoreResult<()>;

    /// Flatten a payload into a host table
    fn encode(&self, payload: &Payload) -> CoreResult<HostTable>;

    /// Rebuild a payload from a host table
    fn decode(&self, table: &HostTable) -> CoreResult<Payload> {
        self.create(&HostValue::Table(table.clone()))
    }

    /// Host-callable methods
    fn methods(&self) -> &'static [Method] {
        &[]
    }

    /// `tostring` rendering
    fn describe(&self, object: &ManagedObject) -> String {
        format!("{}: {}", self.name(), object.handle())
    }
}
