//! `struct pollfd`

use bytemuck::{Pod, Zeroable};

use super::native::{unknown_field, NativeStruct};
use crate::host::HostValue;
use crate::registry::{Handle, Method, ObjectRegistry};
use crate::status::CoreResult;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct PollFd {
    pub fd: i32,
    pub events: i16,
    pub revents: i16,
}

impl PollFd {
    pub fn new(fd: i32, events: i16) -> Self {
        Self {
            fd,
            events,
            revents: 0,
        }
    }

    /// Whether any requested event fired
    pub fn is_ready(&self) -> bool {
        self.revents & self.events != 0
    }
}

impl NativeStruct for PollFd {
    const NAME: &'static str = "pollfd";
    const FIELDS: &'static [&'static str] = &["fd", "events", "revents"];

    fn field(&self, name: &str) -> CoreResult<HostValue> {
        match name {
            "fd" => Ok(self.fd.into()),
            "events" => Ok(self.events.into()),
            "revents" => Ok(self.revents.into()),
            _ => Err(unknown_field(Self::NAME, name)),
        }
    }

    fn set_field(&mut self, name: &str, value: &HostValue) -> CoreResult<()> {
        match name {
            "fd" => self.fd = value.to_int(name)?,
            "events" => self.events = value.to_int(name)?,
            "revents" => self.revents = value.to_int(name)?,
            _ => return Err(unknown_field(Self::NAME, name)),
        }
        Ok(())
    }

    fn methods() -> &'static [Method] {
        POLLFD_METHODS
    }
}

static POLLFD_METHODS: &[Method] = &[Method::new("ready", ready)];

fn ready(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    let pfd: PollFd = reg.payload(h)?.read()?;
    Ok(pfd.is_ready().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_libc() {
        assert_eq!(
            std::mem::size_of::<PollFd>(),
            std::mem::size_of::<libc::pollfd>()
        );
    }

    #[test]
    fn test_ready() {
        let mut pfd = PollFd::new(3, libc::POLLIN);
        assert!(!pfd.is_ready());
        pfd.revents = libc::POLLOUT;
        assert!(!pfd.is_ready());
        pfd.revents = libc::POLLIN | libc::POLLHUP;
        assert!(pfd.is_ready());
    }
}
