//! The `buffer` object type: a handle whose payload is a [`Buffer`].

use crate::buffer::{Buffer, BufferFlags};
use crate::config::BufferConfig;
use crate::host::{HostTable, HostValue};
use crate::registry::{Handle, ManagedObject, Method, ObjectRegistry, ObjectType, Payload};
use crate::status::{CoreError, CoreResult};

pub const TYPE_NAME: &str = "buffer";

/// Descriptor for buffer-bearing handles
#[derive(Debug, Clone)]
pub struct BufferType {
    max_allocation: usize,
    dumpable: bool,
}

impl BufferType {
    pub fn new(max_allocation: usize, dumpable: bool) -> Self {
        Self {
            max_allocation,
            dumpable,
        }
    }

    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.max_allocation, config.dumpable_by_default)
    }

    fn check_size(&self, size: usize) -> CoreResult<usize> {
        if size > self.max_allocation {
            tracing::warn!(size, limit = self.max_allocation, "buffer allocation refused");
            return Err(CoreError::out_of_memory(format!(
                "{} bytes exceeds allocation limit of {}",
                size, self.max_allocation
            )));
        }
        Ok(size)
    }

    fn flags(dumpable: bool) -> BufferFlags {
        if dumpable {
            BufferFlags::dumpable()
        } else {
            BufferFlags::none()
        }
    }
}

/// Initial bytes named by an init argument
fn init_data(init: &HostValue) -> CoreResult<Option<&[u8]>> {
    match init {
        HostValue::String(_) | HostValue::Bytes(_) => Ok(init.as_bytes()),
        HostValue::Table(t) => match t.get_field("data") {
            None => Ok(None),
            Some(v) => v.as_bytes().map(Some).ok_or_else(|| {
                CoreError::invalid(format!("buffer data must be a string, got {}", v.type_name()))
            }),
        },
        _ => Ok(None),
    }
}

impl ObjectType for BufferType {
    fn name(&self) -> &'static str {
        TYPE_NAME
    }

    fn payload_size(&self) -> Option<usize> {
        None
    }

    /// Allocate the region named by the init argument, then seed it
    ///
    /// Accepted forms: nil, a capacity, a string of initial contents, or a
    /// `{size, data, dumpable}` table.
    fn create(&self, init: &HostValue) -> CoreResult<Payload> {
        let (size, dumpable) = match init {
            HostValue::Nil => (0, self.dumpable),
            HostValue::Integer(_) | HostValue::Number(_) => {
                (init.to_size("buffer size")?, self.dumpable)
            }
            HostValue::String(_) | HostValue::Bytes(_) => {
                (init.as_bytes().map_or(0, <[u8]>::len), self.dumpable)
            }
            HostValue::Table(t) => {
                let size = match t.get_field("size").or_else(|| t.get_field("capacity")) {
                    Some(v) => v.to_size("buffer size")?,
                    None => init_data(init)?.map_or(0, <[u8]>::len),
                };
                let dumpable = match t.get_field("dumpable") {
                    None => self.dumpable,
                    Some(v) => v.as_bool().ok_or_else(|| {
                        CoreError::invalid(format!(
                            "dumpable must be a boolean, got {}",
                            v.type_name()
                        ))
                    })?,
                };
                (size, dumpable)
            }
            other => {
                return Err(CoreError::invalid(format!(
                    "buffer cannot be created from {}",
                    other.type_name()
                )))
            }
        };

        let buf = Buffer::allocate_with(self.check_size(size)?, Self::flags(dumpable))?;
        let mut payload = Payload::Buffer(buf);
        self.init(&mut payload, init)?;
        Ok(payload)
    }

    fn init(&self, payload: &mut Payload, init: &HostValue) -> CoreResult<()> {
        match init_data(init)? {
            Some(data) => payload.buffer_mut()?.load(data),
            None => Ok(()),
        }
    }

    fn get(&self, payload: &Payload, field: &str) -> CoreResult<HostValue> {
        let buf = payload.buffer()?;
        match field {
            "length" => Ok(buf.len().into()),
            "capacity" => Ok(buf.capacity().into()),
            "owned" => Ok(buf.is_owned().into()),
            "locked" => Ok(buf.is_locked().into()),
            "dumpable" => Ok(buf.is_dumpable().into()),
            _ => Err(CoreError::not_found(format!("buffer has no field '{}'", field))),
        }
    }

    /// `length` goes through `set_length`, `capacity` through `reallocate`
    fn set(&self, payload: &mut Payload, field: &str, value: &HostValue) -> CoreResult<()> {
        let buf = payload.buffer_mut()?;
        match field {
            "length" => buf.set_length(value.to_size(field)?),
            "capacity" => buf.reallocate(self.check_size(value.to_size(field)?)?),
            "owned" | "locked" | "dumpable" => {
                Err(CoreError::invalid(format!("buffer field '{}' is read-only", field)))
            }
            _ => Err(CoreError::not_found(format!("buffer has no field '{}'", field))),
        }
    }

    fn encode(&self, payload: &Payload) -> CoreResult<HostTable> {
        let buf = payload.buffer()?;
        let mut table = HostTable::new();
        table.set_field("length", buf.len());
        table.set_field("capacity", buf.capacity());
        table.set_field("owned", buf.is_owned());
        table.set_field("dumpable", buf.is_dumpable());
        if buf.is_dumpable() {
            table.set_field("data", HostValue::Bytes(buf.as_slice().to_vec()));
        }
        Ok(table)
    }

    fn methods(&self) -> &'static [Method] {
        BUFFER_METHODS
    }

    fn describe(&self, object: &ManagedObject) -> String {
        match object.payload().buffer() {
            Ok(buf) => format!("{}: {} ({})", TYPE_NAME, object.handle(), buf),
            Err(_) => format!("{}: {}", TYPE_NAME, object.handle()),
        }
    }
}

// =============================================================================
// Methods
// =============================================================================

static BUFFER_METHODS: &[Method] = &[
    Method::new("lock", lock),
    Method::new("unlock", unlock),
    Method::new("clear", clear),
    Method::new("set_length", set_length),
    Method::new("reallocate", reallocate),
    Method::new("write", write),
    Method::new("read", read),
    Method::new("free", free),
    Method::new("dump", dump),
];

fn arg<'a>(args: &'a [HostValue], method: &str) -> CoreResult<&'a HostValue> {
    args.first()
        .ok_or_else(|| CoreError::invalid(format!("{}: argument required", method)))
}

fn lock(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    reg.buffer(h)?.lock()?;
    Ok(true.into())
}

fn unlock(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    reg.buffer(h)?.unlock()?;
    Ok(true.into())
}

fn clear(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    reg.buffer_mut(h)?.clear()?;
    Ok(true.into())
}

fn set_length(reg: &mut ObjectRegistry, h: Handle, args: &[HostValue]) -> CoreResult<HostValue> {
    reg.set_field(h, "length", arg(args, "set_length")?)?;
    Ok(true.into())
}

fn reallocate(reg: &mut ObjectRegistry, h: Handle, args: &[HostValue]) -> CoreResult<HostValue> {
    reg.set_field(h, "capacity", arg(args, "reallocate")?)?;
    Ok(true.into())
}

fn write(reg: &mut ObjectRegistry, h: Handle, args: &[HostValue]) -> CoreResult<HostValue> {
    let value = arg(args, "write")?;
    let bytes = value.as_bytes().ok_or_else(|| {
        CoreError::invalid(format!("write: expected string, got {}", value.type_name()))
    })?;
    reg.buffer_mut(h)?.copy_in(bytes)?;
    Ok(true.into())
}

fn read(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    let buf = reg.buffer(h)?;
    let mut out = vec![0u8; buf.len()];
    buf.copy_out(&mut out)?;
    Ok(HostValue::Bytes(out))
}

fn free(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    reg.buffer_mut(h)?.free()?;
    Ok(true.into())
}

fn dump(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    Ok(reg.buffer(h)?.hex_dump()?.into())
}
