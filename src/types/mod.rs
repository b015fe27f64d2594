//! Built-in object types.
//!
//! | Type       | Payload                 | Methods                            |
//! |------------|-------------------------|------------------------------------|
//! | `buffer`   | [`Buffer`]              | lock, unlock, clear, set_length,   |
//! |            |                         | reallocate, write, read, free, dump|
//! | `timespec` | `{tv_sec, tv_nsec}`     | seconds, normalize                 |
//! | `pollfd`   | `{fd, events, revents}` | ready                              |
//! | `iovec`    | `{iov_base, iov_len}`   | attach, buffer                     |
//!
//! [`Buffer`]: crate::buffer::Buffer

pub mod buffer_type;
pub mod iovec;
pub mod native;
pub mod pollfd;
pub mod timespec;

pub use buffer_type::BufferType;
pub use iovec::IoVec;
pub use native::{NativeStruct, StructType};
pub use pollfd::PollFd;
pub use timespec::Timespec;

use std::sync::Arc;

use crate::config::BufferConfig;
use crate::registry::ObjectRegistry;
use crate::status::CoreResult;

/// Register every built-in type with `registry`
pub fn register_builtin_types(
    registry: &mut ObjectRegistry,
    config: &BufferConfig,
) -> CoreResult<()> {
    registry.register_type(Arc::new(BufferType::from_config(config)))?;
    registry.register_type(Arc::new(StructType::<Timespec>::new()))?;
    registry.register_type(Arc::new(StructType::<PollFd>::new()))?;
    registry.register_type(Arc::new(StructType::<IoVec>::new()))?;
    Ok(())
}
