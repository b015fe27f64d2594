//! Sysbind - Native Structure Binding Core
//!
//! The shared core of a binding that exposes native OS structures to an
//! embedded scripting host. Per-syscall wrappers are built on top of it and
//! talk to it only through buffers, handles and vector import/export.
//!
//! # Components
//!
//! - **Buffer cell**: owned or caller-aliased byte regions with exact-length
//!   copies, zero-before-release and a non-blocking lock bit
//! - **Object registry**: typed handles over native payloads, per-type
//!   descriptors, method dispatch and weak cross-references
//! - **Table bridge**: packs host tables of objects into native struct arrays
//!   and back
//! - **Status convention**: failures reach the host as `nil, code, message`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── Session ────────────────────────────┐
//! │                                                                 │
//! │   HostTable ──import_vector──► VectorTable ──export_vector──►   │
//! │                    │               │                            │
//! │                    ▼               ▼                            │
//! │              ObjectRegistry ───► Buffer (Owned | External)      │
//! │              types / objects / weak links                       │
//! │                                                                 │
//! │   helper threads ──push──► Handoff ──drain──► host thread       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use sysbind::{HostTable, HostValue, Session, SysbindConfig};
//!
//! let mut session = Session::open(SysbindConfig::default()).unwrap();
//! let a = session.new_object("pollfd", &HostValue::Nil).unwrap();
//! let b = session.new_object("pollfd", &HostValue::Nil).unwrap();
//!
//! let table = HostTable::from_sequence([a, b]);
//! let mut vector = session.import_vector(&table, "pollfd").unwrap();
//! assert_eq!(vector.cardinality(), 2);
//!
//! let mut copies = HostTable::new();
//! session.export_vector(&mut vector, &mut copies, true, true).unwrap();
//! assert_eq!(copies.len(), 2);
//! ```

#![warn(clippy::all)]

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod host;
pub mod logging;
pub mod registry;
pub mod session;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use bridge::{TableBridge, VectorParams, VectorTable};
pub use buffer::{Buffer, BufferFlags, BufferParams};
pub use config::{ConfigError, ConfigResult, SysbindConfig};
pub use host::{HostTable, HostValue, TableKey};
pub use registry::{Handle, ManagedObject, Method, ObjectRegistry, ObjectType, Payload, WeakLink};
pub use session::{Handoff, HostEvent, Session};
pub use status::{signal, CoreError, CoreResult, HostReturn};
pub use types::{register_builtin_types, IoVec, NativeStruct, PollFd, StructType, Timespec};

/// Version of the sysbind crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
