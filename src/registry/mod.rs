//! Object Registry
//!
//! Uniform handle lifecycle for every wrapped native type.
//!
//! # Architecture
//!
//! ```text
//! wrapper ──new_handle("timespec", init)──► ObjectRegistry
//!                                              │
//!                       ┌──────────────────────┼──────────────────────┐
//!                       ▼                      ▼                      ▼
//!               types: name → Arc<dyn ObjectType>        objects: Handle → ManagedObject
//!                                                              │
//!                                                   payload + created_at + LinkList
//! ```
//!
//! The registry is an explicit instance (normally owned by a
//! [`Session`](crate::session::Session)); there is no process-wide object
//! list. Handles are never reused within one registry.

mod descriptor;
mod links;

pub use descriptor::{Method, MethodFn, ObjectType, Payload};
pub use links::{LinkList, WeakLink};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::buffer::Buffer;
use crate::host::{HostTable, HostValue};
use crate::status::{signal, CoreError, CoreResult, HostReturn};

// =============================================================================
// Handles
// =============================================================================

/// Host-visible reference to a managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroU64);

impl Handle {
    pub fn from_raw(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(Handle)
    }

    pub fn id(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0.get())
    }
}

fn unknown_handle(handle: Handle) -> CoreError {
    CoreError::not_found(format!("no live object for handle {}", handle))
}

/// Require `payload` to have the shape `descriptor` declares
fn check_layout(descriptor: &dyn ObjectType, payload: &Payload) -> CoreResult<()> {
    match (descriptor.payload_size(), payload) {
        (Some(size), Payload::Struct(bytes)) if bytes.len() == size => Ok(()),
        (None, Payload::Buffer(_)) => Ok(()),
        _ => Err(CoreError::invalid(format!(
            "payload does not match layout of type '{}'",
            descriptor.name()
        ))),
    }
}

// =============================================================================
// Managed Object
// =============================================================================

/// A handle's native payload plus its bookkeeping
pub struct ManagedObject {
    handle: Handle,
    descriptor: Arc<dyn ObjectType>,
    created_at: DateTime<Utc>,
    payload: Payload,
    links: LinkList,
}

impl ManagedObject {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn type_name(&self) -> &'static str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &Arc<dyn ObjectType> {
        &self.descriptor
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn links(&self) -> &LinkList {
        &self.links
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject")
            .field("handle", &self.handle)
            .field("type", &self.type_name())
            .field("created_at", &self.created_at)
            .field("payload", &self.payload)
            .field("links", &self.links)
            .finish()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Live objects and the descriptors of their types
pub struct ObjectRegistry {
    types: HashMap<&'static str, Arc<dyn ObjectType>>,
    objects: BTreeMap<Handle, ManagedObject>,
    next_id: u64,
    max_objects: usize,
}

impl ObjectRegistry {
    /// Create an empty registry with no object limit
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Create an empty registry holding at most `max_objects` live objects
    pub fn with_limit(max_objects: usize) -> Self {
        Self {
            types: HashMap::new(),
            objects: BTreeMap::new(),
            next_id: 1,
            max_objects,
        }
    }

    // -------------------------------------------------------------------------
    // Types
    // -------------------------------------------------------------------------

    /// Register a type descriptor
    pub fn register_type(&mut self, descriptor: Arc<dyn ObjectType>) -> CoreResult<()> {
        let name = descriptor.name();
        if self.types.contains_key(name) {
            return Err(CoreError::invalid(format!(
                "type '{}' is already registered",
                name
            )));
        }
        tracing::debug!(type_name = name, "registered object type");
        self.types.insert(name, descriptor);
        Ok(())
    }

    pub fn descriptor(&self, type_name: &str) -> CoreResult<Arc<dyn ObjectType>> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("unknown object type '{}'", type_name)))
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.types.keys().copied().collect();
        names.sort_unstable();
        names
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Create a zero-filled payload, run the type's init, return the handle
    pub fn new_handle(&mut self, type_name: &str, init: &HostValue) -> CoreResult<Handle> {
        let descriptor = self.descriptor(type_name)?;
        let payload = descriptor.create(init)?;
        self.insert(descriptor, payload)
    }

    /// Wrap an already-built payload (a native result) in a new handle
    pub fn adopt(&mut self, type_name: &str, payload: Payload) -> CoreResult<Handle> {
        let descriptor = self.descriptor(type_name)?;
        self.insert(descriptor, payload)
    }

    fn insert(&mut self, descriptor: Arc<dyn ObjectType>, payload: Payload) -> CoreResult<Handle> {
        check_layout(descriptor.as_ref(), &payload)?;
        if self.objects.len() >= self.max_objects {
            tracing::warn!(limit = self.max_objects, "object limit reached");
            return Err(CoreError::out_of_memory(format!(
                "object limit of {} reached",
                self.max_objects
            )));
        }
        let handle = Handle::from_raw(self.next_id)
            .ok_or_else(|| CoreError::out_of_memory("handle space exhausted"))?;
        self.next_id += 1;

        tracing::trace!(%handle, type_name = descriptor.name(), "created object");
        self.objects.insert(
            handle,
            ManagedObject {
                handle,
                descriptor,
                created_at: Utc::now(),
                payload,
                links: LinkList::new(),
            },
        );
        Ok(handle)
    }

    /// Finalize an object
    ///
    /// Buffer payloads are released first, then every link targeting the
    /// handle is severed. Returns `false` when the handle was already gone.
    /// A locked buffer refuses with `Busy` and the object stays live.
    pub fn destroy(&mut self, handle: Handle) -> CoreResult<bool> {
        let Some(object) = self.objects.get_mut(&handle) else {
            tracing::trace!(%handle, "destroy of released handle ignored");
            return Ok(false);
        };
        if let Payload::Buffer(buf) = &mut object.payload {
            buf.free()?;
        }

        let type_name = object.type_name();
        self.objects.remove(&handle);

        let severed: usize = self
            .objects
            .values_mut()
            .map(|other| other.links.sever_target(handle))
            .sum();
        tracing::debug!(%handle, type_name, severed, "destroyed object");
        Ok(true)
    }

    /// Destroy every live object, oldest first; returns how many went
    pub fn clear(&mut self) -> usize {
        let handles = self.handles();
        let count = handles.len();
        for handle in handles {
            if let Err(e) = self.destroy(handle) {
                // Forced release: dropping the payload still zero-fills owned memory
                tracing::warn!(%handle, error = %e, "forcing release during teardown");
                self.objects.remove(&handle);
            }
        }
        count
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    pub fn contains(&self, handle: Handle) -> bool {
        self.objects.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Live handles in creation order
    pub fn handles(&self) -> Vec<Handle> {
        self.objects.keys().copied().collect()
    }

    pub fn get(&self, handle: Handle) -> CoreResult<&ManagedObject> {
        self.objects.get(&handle).ok_or_else(|| unknown_handle(handle))
    }

    /// Look up `handle`, requiring it to be of `type_name`
    pub fn get_typed(&self, handle: Handle, type_name: &str) -> CoreResult<&ManagedObject> {
        let object = self.get(handle)?;
        if object.type_name() != type_name {
            return Err(CoreError::invalid(format!(
                "{} expected, got {}",
                type_name,
                object.type_name()
            )));
        }
        Ok(object)
    }

    pub fn type_of(&self, handle: Handle) -> CoreResult<&'static str> {
        Ok(self.get(handle)?.type_name())
    }

    pub fn payload(&self, handle: Handle) -> CoreResult<&Payload> {
        Ok(&self.get(handle)?.payload)
    }

    /// Mutable payload; a locked buffer payload is `Busy`
    pub fn payload_mut(&mut self, handle: Handle) -> CoreResult<&mut Payload> {
        let payload = self
            .objects
            .get_mut(&handle)
            .map(|o| &mut o.payload)
            .ok_or_else(|| unknown_handle(handle))?;
        if let Payload::Buffer(buf) = &*payload {
            if buf.is_locked() {
                return Err(CoreError::busy(format!("buffer {} is locked", handle)));
            }
        }
        Ok(payload)
    }

    pub fn buffer(&self, handle: Handle) -> CoreResult<&Buffer> {
        self.payload(handle)?.buffer()
    }

    pub fn buffer_mut(&mut self, handle: Handle) -> CoreResult<&mut Buffer> {
        self.payload_mut(handle)?.buffer_mut()
    }

    // -------------------------------------------------------------------------
    // Weak Links
    // -------------------------------------------------------------------------

    /// Link `owner.slot` to `candidate`
    ///
    /// Any link already in the slot is detached (its target is left alone)
    /// and its target returned.
    pub fn link(
        &mut self,
        owner: Handle,
        slot: &str,
        candidate: Handle,
    ) -> CoreResult<Option<Handle>> {
        if !self.contains(owner) {
            return Err(unknown_handle(owner));
        }
        let target_type = self.type_of(candidate)?;
        let object = self
            .objects
            .get_mut(&owner)
            .ok_or_else(|| unknown_handle(owner))?;

        let previous = object
            .links
            .replace(WeakLink::new(slot, candidate, target_type))
            .map(|l| l.target());
        if let Some(old) = previous {
            tracing::trace!(%owner, slot, %old, new = %candidate, "replaced link");
        }
        Ok(previous)
    }

    /// Remove the link at `owner.slot`, returning its target
    pub fn unlink(&mut self, owner: Handle, slot: &str) -> CoreResult<Option<Handle>> {
        let object = self
            .objects
            .get_mut(&owner)
            .ok_or_else(|| unknown_handle(owner))?;
        Ok(object.links.remove_slot(slot).map(|l| l.target()))
    }

    /// Target of the link at `owner.slot`
    pub fn find(&self, owner: Handle, slot: &str) -> CoreResult<Handle> {
        self.get(owner)?
            .links
            .find(slot)
            .map(|l| l.target())
            .ok_or_else(|| CoreError::not_found(format!("no link at {}.{}", owner, slot)))
    }

    /// Like `find`, requiring the target to be of `type_name`
    pub fn find_typed(&self, owner: Handle, slot: &str, type_name: &str) -> CoreResult<Handle> {
        let link = self
            .get(owner)?
            .links
            .find(slot)
            .ok_or_else(|| CoreError::not_found(format!("no link at {}.{}", owner, slot)))?;
        if link.target_type() != type_name {
            return Err(CoreError::invalid(format!(
                "link {}.{} holds {}, expected {}",
                owner,
                slot,
                link.target_type(),
                type_name
            )));
        }
        Ok(link.target())
    }

    // -------------------------------------------------------------------------
    // Fields and Tables
    // -------------------------------------------------------------------------

    pub fn get_field(&self, handle: Handle, field: &str) -> CoreResult<HostValue> {
        let object = self.get(handle)?;
        object.descriptor.get(&object.payload, field)
    }

    pub fn set_field(&mut self, handle: Handle, field: &str, value: &HostValue) -> CoreResult<()> {
        let object = self
            .objects
            .get_mut(&handle)
            .ok_or_else(|| unknown_handle(handle))?;
        object.descriptor.set(&mut object.payload, field, value)
    }

    /// Encode an object's payload as a host table
    pub fn to_table(&self, handle: Handle) -> CoreResult<HostTable> {
        let object = self.get(handle)?;
        object.descriptor.encode(&object.payload)
    }

    /// Decode a host table into a new object of `type_name`
    pub fn from_table(&mut self, type_name: &str, table: &HostTable) -> CoreResult<Handle> {
        let descriptor = self.descriptor(type_name)?;
        let payload = descriptor.decode(table)?;
        self.insert(descriptor, payload)
    }

    // -------------------------------------------------------------------------
    // Method Dispatch
    // -------------------------------------------------------------------------

    /// Call `method` on `handle`
    ///
    /// The metamethods `__len`, `__gc` and `__tostring` are answered for
    /// every type; anything else goes through the type's method table.
    pub fn invoke(
        &mut self,
        handle: Handle,
        method: &str,
        args: &[HostValue],
    ) -> CoreResult<HostValue> {
        if method == "__gc" {
            return self.destroy(handle).map(|_| HostValue::Nil);
        }

        let object = self.get(handle)?;
        match method {
            "__len" => return Ok(object.payload.len().into()),
            "__tostring" => return Ok(object.descriptor.describe(object).into()),
            _ => {}
        }

        let func = object
            .descriptor
            .methods()
            .iter()
            .find(|m| m.name == method)
            .map(|m| m.func)
            .ok_or_else(|| {
                CoreError::not_found(format!(
                    "{} has no method '{}'",
                    object.type_name(),
                    method
                ))
            })?;
        func(self, handle, args)
    }

    /// `invoke` under the host return convention
    pub fn call(&mut self, handle: Handle, method: &str, args: &[HostValue]) -> HostReturn {
        signal(self.invoke(handle, method, args))
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("types", &self.type_names())
            .field("objects", &self.objects.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
