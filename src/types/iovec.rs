//! `struct iovec`
//!
//! An iovec describes a buffer it does not own: `attach` records the
//! buffer's address and length and keeps a weak link to its handle in slot
//! `iov_base`.

use bytemuck::{Pod, Zeroable};

use super::native::{unknown_field, NativeStruct};
use crate::host::HostValue;
use crate::registry::{Handle, Method, ObjectRegistry};
use crate::status::{CoreError, CoreResult};

/// Link slot holding the described buffer
pub const BASE_SLOT: &str = "iov_base";

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct IoVec {
    pub iov_base: usize,
    pub iov_len: usize,
}

impl NativeStruct for IoVec {
    const NAME: &'static str = "iovec";
    const FIELDS: &'static [&'static str] = &["iov_base", "iov_len"];

    fn field(&self, name: &str) -> CoreResult<HostValue> {
        match name {
            "iov_base" => Ok(self.iov_base.into()),
            "iov_len" => Ok(self.iov_len.into()),
            _ => Err(unknown_field(Self::NAME, name)),
        }
    }

    fn set_field(&mut self, name: &str, value: &HostValue) -> CoreResult<()> {
        match name {
            "iov_base" => self.iov_base = value.to_size(name)?,
            "iov_len" => self.iov_len = value.to_size(name)?,
            _ => return Err(unknown_field(Self::NAME, name)),
        }
        Ok(())
    }

    fn methods() -> &'static [Method] {
        IOVEC_METHODS
    }
}

static IOVEC_METHODS: &[Method] = &[Method::new("attach", attach), Method::new("buffer", buffer)];

fn attach(reg: &mut ObjectRegistry, h: Handle, args: &[HostValue]) -> CoreResult<HostValue> {
    let target = args
        .first()
        .ok_or_else(|| CoreError::invalid("attach: buffer argument required"))?
        .to_handle("attach")?;

    let (base, len) = {
        let buf = reg.get_typed(target, "buffer")?.payload().buffer()?;
        (buf.base() as usize, buf.len())
    };
    reg.link(h, BASE_SLOT, target)?;
    reg.payload_mut(h)?.update::<IoVec, _>(|iov| {
        iov.iov_base = base;
        iov.iov_len = len;
        Ok(())
    })?;
    Ok(h.into())
}

fn buffer(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    Ok(reg.find_typed(h, BASE_SLOT, "buffer")?.into())
}
