//! Session
//!
//! One binding instance: configuration, the object registry with the
//! built-in types, the table bridge and the helper-thread hand-off.
//!
//! # Example
//!
//! ```rust
//! use sysbind::config::SysbindConfig;
//! use sysbind::host::HostValue;
//! use sysbind::session::Session;
//!
//! let mut session = Session::open(SysbindConfig::default()).unwrap();
//! let ts = session.new_object("timespec", &HostValue::Number(1.5)).unwrap();
//! let secs = session.call(ts, "seconds", &[]);
//! assert_eq!(secs.into_values(), vec![HostValue::Number(1.5)]);
//! session.close();
//! ```

mod handoff;

pub use handoff::{Handoff, HostEvent};

use chrono::{DateTime, Utc};

use crate::bridge::{TableBridge, VectorTable};
use crate::config::SysbindConfig;
use crate::host::{HostTable, HostValue};
use crate::registry::{Handle, ObjectRegistry, Payload};
use crate::status::{signal, CoreError, CoreResult, HostReturn};
use crate::types::{buffer_type, register_builtin_types};

/// A binding instance with explicit open/close lifecycle
#[derive(Debug)]
pub struct Session {
    config: SysbindConfig,
    registry: ObjectRegistry,
    bridge: TableBridge,
    handoff: Handoff<HostEvent>,
    opened_at: DateTime<Utc>,
    closed: bool,
}

impl Session {
    /// Build the registry, register the built-in types and open the hand-off
    pub fn open(config: SysbindConfig) -> CoreResult<Self> {
        let mut registry = ObjectRegistry::with_limit(config.registry.max_objects);
        register_builtin_types(&mut registry, &config.buffer)?;
        let bridge = TableBridge::from_config(&config.bridge);
        let handoff = Handoff::new(config.session.handoff_capacity);

        tracing::info!(
            types = registry.type_names().len(),
            max_objects = config.registry.max_objects,
            "session opened"
        );
        Ok(Self {
            config,
            registry,
            bridge,
            handoff,
            opened_at: Utc::now(),
            closed: false,
        })
    }

    pub fn config(&self) -> &SysbindConfig {
        &self.config
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    pub fn bridge(&self) -> &TableBridge {
        &self.bridge
    }

    /// Sender side for helper threads; clone it into each helper
    pub fn handoff(&self) -> &Handoff<HostEvent> {
        &self.handoff
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::invalid("session is closed"));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Objects
    // -------------------------------------------------------------------------

    pub fn new_object(&mut self, type_name: &str, init: &HostValue) -> CoreResult<Handle> {
        self.ensure_open()?;
        self.registry.new_handle(type_name, init)
    }

    /// Call a method under the host return convention
    pub fn call(&mut self, handle: Handle, method: &str, args: &[HostValue]) -> HostReturn {
        match self.ensure_open() {
            Ok(()) => self.registry.call(handle, method, args),
            Err(e) => signal::<HostValue>(Err(e)),
        }
    }

    // -------------------------------------------------------------------------
    // Vectors
    // -------------------------------------------------------------------------

    pub fn import_vector(&self, table: &HostTable, element_type: &str) -> CoreResult<VectorTable> {
        self.ensure_open()?;
        self.bridge.import_vector(&self.registry, table, element_type)
    }

    pub fn export_vector(
        &mut self,
        vector: &mut VectorTable,
        table: &mut HostTable,
        make_new: bool,
        release_after: bool,
    ) -> CoreResult<usize> {
        self.ensure_open()?;
        self.bridge
            .export_vector(&mut self.registry, vector, table, make_new, release_after)
    }

    /// Keep a vector's packed storage alive as a `buffer` handle
    pub fn retain_vector(&mut self, vector: VectorTable) -> CoreResult<Handle> {
        self.ensure_open()?;
        if vector.is_released() {
            return Err(CoreError::invalid("vector storage already released"));
        }
        self.registry
            .adopt(buffer_type::TYPE_NAME, Payload::Buffer(vector.into_buffer()))
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Take the events helper threads have posted since the last drain
    pub fn drain_events(&self) -> Vec<HostEvent> {
        self.handoff.drain()
    }

    /// Destroy every live object and close the hand-off
    ///
    /// Returns how many objects were destroyed; later calls return 0.
    pub fn close(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.closed = true;
        self.handoff.close();
        let destroyed = self.registry.clear();
        tracing::info!(destroyed, "session closed");
        destroyed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
