//! Buffer Cell
//!
//! Bounds-checked access to a byte region shared between the host and
//! native code.
//!
//! A buffer either owns its memory (`Region::Owned`, allocated and released
//! by this layer) or aliases memory supplied by the caller
//! (`Region::External`, never freed, reallocated or cleared here). The tag
//! is chosen at construction and cannot change.
//!
//! # Example
//!
//! ```rust
//! use sysbind::buffer::Buffer;
//!
//! let mut buf = Buffer::allocate(16).unwrap();
//! assert_eq!(buf.capacity(), 16);
//! assert_eq!(buf.len(), 0);
//!
//! buf.set_length(5).unwrap();
//! buf.copy_in(b"hello").unwrap();
//! assert_eq!(buf.as_slice(), b"hello");
//!
//! buf.free().unwrap();
//! assert!(buf.base().is_null());
//! ```

mod lock;

pub use lock::{LockBit, LockGuard};

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{compiler_fence, Ordering};

use crate::status::{CoreError, CoreResult};

// =============================================================================
// Flags and Parameters
// =============================================================================

/// Buffer flags that are not part of the ownership tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferFlags(pub u8);

impl BufferFlags {
    /// Contents may appear in dumps and diagnostics
    pub const DUMPABLE: u8 = 0b0001;

    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn none() -> Self {
        Self(0)
    }

    pub const fn dumpable() -> Self {
        Self(Self::DUMPABLE)
    }

    pub const fn is_dumpable(&self) -> bool {
        self.0 & Self::DUMPABLE != 0
    }
}

/// Construction parameters for buffer-bearing handles
///
/// With a null `external_region` a fresh region of `region` bytes is
/// allocated; otherwise the buffer aliases `region` bytes at
/// `external_region`.
#[derive(Debug, Clone, Copy)]
pub struct BufferParams {
    pub region: usize,
    pub external_region: *mut u8,
    pub flags: BufferFlags,
}

impl BufferParams {
    pub fn allocate(region: usize, flags: BufferFlags) -> Self {
        Self {
            region,
            external_region: std::ptr::null_mut(),
            flags,
        }
    }

    pub fn external(external_region: *mut u8, region: usize, flags: BufferFlags) -> Self {
        Self {
            region,
            external_region,
            flags,
        }
    }
}

// =============================================================================
// Region
// =============================================================================

/// Caller-supplied memory
#[derive(Debug)]
pub struct ExternalRegion {
    base: Option<NonNull<u8>>,
    capacity: usize,
}

// Safety: the creator of an external region guarantees the memory outlives
// the buffer; all mutation goes through `&mut Buffer`.
unsafe impl Send for ExternalRegion {}
unsafe impl Sync for ExternalRegion {}

/// Ownership tag and storage of a buffer
#[derive(Debug)]
pub enum Region {
    Owned(Vec<u8>),
    External(ExternalRegion),
}

impl Region {
    fn capacity(&self) -> usize {
        match self {
            Region::Owned(data) => data.len(),
            Region::External(ext) => ext.base.map_or(0, |_| ext.capacity),
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Region::Owned(data) => data,
            Region::External(ExternalRegion {
                base: Some(base),
                capacity,
            }) => unsafe { std::slice::from_raw_parts(base.as_ptr(), *capacity) },
            Region::External(_) => &[],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Region::Owned(data) => data,
            Region::External(ExternalRegion {
                base: Some(base),
                capacity,
            }) => unsafe { std::slice::from_raw_parts_mut(base.as_ptr(), *capacity) },
            Region::External(_) => &mut [],
        }
    }

    /// Zero-fill and release owned memory; detach external memory
    fn release(&mut self) {
        let data = self.take_scrubbed();
        if !data.is_empty() {
            tracing::trace!(capacity = data.len(), "released owned region");
        }
    }

    /// Detach the region, returning owned storage already zero-filled
    fn take_scrubbed(&mut self) -> Vec<u8> {
        match self {
            Region::Owned(data) => {
                scrub(data);
                std::mem::take(data)
            }
            Region::External(ext) => {
                ext.base = None;
                ext.capacity = 0;
                Vec::new()
            }
        }
    }
}

/// Zero bytes in a way the optimizer may not drop
fn scrub(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        unsafe { std::ptr::write_volatile(b, 0) };
    }
    compiler_fence(Ordering::SeqCst);
}

fn zeroed_vec(length: usize) -> CoreResult<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(length).map_err(|e| {
        tracing::warn!(length, "buffer allocation failed");
        CoreError::out_of_memory(format!("cannot allocate {} bytes: {}", length, e))
    })?;
    data.resize(length, 0);
    Ok(data)
}

// =============================================================================
// Buffer
// =============================================================================

/// A byte region with capacity, valid length, ownership tag and lock bit
pub struct Buffer {
    region: Region,
    length: usize,
    flags: BufferFlags,
    lock: LockBit,
}

impl Buffer {
    /// Allocate an owned, zeroed region of `length` bytes with valid length 0
    pub fn allocate(length: usize) -> CoreResult<Self> {
        Self::allocate_with(length, BufferFlags::dumpable())
    }

    pub fn allocate_with(length: usize, flags: BufferFlags) -> CoreResult<Self> {
        let data = zeroed_vec(length)?;
        tracing::trace!(capacity = length, "allocated buffer");
        Ok(Self {
            region: Region::Owned(data),
            length: 0,
            flags,
            lock: LockBit::new(),
        })
    }

    /// Owned, zeroed region whose valid length equals its capacity
    pub fn zeroed(length: usize) -> CoreResult<Self> {
        let mut buf = Self::allocate(length)?;
        buf.length = length;
        Ok(buf)
    }

    /// Owned copy of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        Self::from_bytes_with(bytes, BufferFlags::dumpable())
    }

    pub fn from_bytes_with(bytes: &[u8], flags: BufferFlags) -> CoreResult<Self> {
        let mut buf = Self::allocate_with(bytes.len(), flags)?;
        buf.region.bytes_mut().copy_from_slice(bytes);
        buf.length = bytes.len();
        Ok(buf)
    }

    /// Alias `capacity` bytes of caller memory at `base`
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `capacity` bytes for as
    /// long as the buffer (or any handle wrapping it) is alive, and must not
    /// be accessed through other pointers while the buffer is mutated.
    pub unsafe fn alias(
        base: *mut u8,
        capacity: usize,
        length: usize,
        flags: BufferFlags,
    ) -> CoreResult<Self> {
        let base = NonNull::new(base).ok_or_else(|| CoreError::invalid("null external region"))?;
        if length > capacity {
            return Err(CoreError::range(format!(
                "length {} exceeds external capacity {}",
                length, capacity
            )));
        }
        Ok(Self {
            region: Region::External(ExternalRegion {
                base: Some(base),
                capacity,
            }),
            length,
            flags,
            lock: LockBit::new(),
        })
    }

    /// Build from the parameter struct used by buffer-bearing handles
    ///
    /// # Safety
    ///
    /// When `params.external_region` is non-null the contract of
    /// [`Buffer::alias`] applies.
    pub unsafe fn from_params(params: &BufferParams) -> CoreResult<Self> {
        if params.external_region.is_null() {
            Self::allocate_with(params.region, params.flags)
        } else {
            Self::alias(
                params.external_region,
                params.region,
                params.region,
                params.flags,
            )
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Valid bytes
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Start of the region, null once released
    pub fn base(&self) -> *const u8 {
        if self.capacity() == 0 {
            std::ptr::null()
        } else {
            self.region.bytes().as_ptr()
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.region, Region::Owned(_))
    }

    pub fn is_external(&self) -> bool {
        matches!(self.region, Region::External(_))
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_set()
    }

    pub fn is_dumpable(&self) -> bool {
        self.flags.is_dumpable()
    }

    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// The valid bytes `[0, len)`
    pub fn as_slice(&self) -> &[u8] {
        &self.region.bytes()[..self.length]
    }

    /// Mutable view of the valid bytes; `Busy` while the lock bit is held
    pub fn as_mut_slice(&mut self) -> CoreResult<&mut [u8]> {
        if self.lock.is_set() {
            return Err(CoreError::busy("buffer is locked"));
        }
        let length = self.length;
        Ok(&mut self.region.bytes_mut()[..length])
    }

    /// Hex rendering of the valid bytes, refused for non-dumpable buffers
    pub fn hex_dump(&self) -> CoreResult<String> {
        if !self.is_dumpable() {
            return Err(CoreError::invalid("buffer is not dumpable"));
        }
        Ok(hex::encode(self.as_slice()))
    }

    // -------------------------------------------------------------------------
    // Mutation (each takes the lock bit)
    // -------------------------------------------------------------------------

    /// Set the valid length; succeeds iff `1 < n <= capacity`
    pub fn set_length(&mut self, n: usize) -> CoreResult<()> {
        let _guard = self.lock.try_acquire()?;
        let capacity = self.region.capacity();
        if n <= 1 || n > capacity {
            return Err(CoreError::range(format!(
                "length {} outside (1, {}]",
                n, capacity
            )));
        }
        self.length = n;
        Ok(())
    }

    /// Resize an owned region to `new_length` bytes of capacity
    ///
    /// The valid length is clamped when the region shrinks below it. The
    /// previous region is zeroed before it is released.
    pub fn reallocate(&mut self, new_length: usize) -> CoreResult<()> {
        let _guard = self.lock.try_acquire()?;
        let data = match &mut self.region {
            Region::Owned(data) => data,
            Region::External(_) => {
                return Err(CoreError::invalid("cannot reallocate an external buffer"))
            }
        };

        let mut resized = zeroed_vec(new_length)?;
        let keep = data.len().min(new_length);
        resized[..keep].copy_from_slice(&data[..keep]);
        scrub(data);
        *data = resized;

        if self.length > new_length {
            self.length = new_length;
        }
        tracing::trace!(capacity = new_length, length = self.length, "reallocated buffer");
        Ok(())
    }

    /// Copy exactly `len()` bytes from `source` into the buffer
    pub fn copy_in(&mut self, source: &[u8]) -> CoreResult<()> {
        let _guard = self.lock.try_acquire()?;
        if source.len() != self.length {
            return Err(CoreError::range(format!(
                "copy of {} bytes into buffer of length {}",
                source.len(),
                self.length
            )));
        }
        self.region.bytes_mut()[..self.length].copy_from_slice(source);
        Ok(())
    }

    /// Copy `source` to the start of the region and make it the valid length
    ///
    /// Used to seed a freshly built buffer; `RangeError` when `source` does
    /// not fit.
    pub fn load(&mut self, source: &[u8]) -> CoreResult<()> {
        let _guard = self.lock.try_acquire()?;
        let capacity = self.region.capacity();
        if source.len() > capacity {
            return Err(CoreError::range(format!(
                "{} bytes do not fit capacity {}",
                source.len(),
                capacity
            )));
        }
        self.region.bytes_mut()[..source.len()].copy_from_slice(source);
        self.length = source.len();
        Ok(())
    }

    /// Copy exactly `len()` bytes out of the buffer into `dest`
    pub fn copy_out(&self, dest: &mut [u8]) -> CoreResult<()> {
        if dest.len() != self.length {
            return Err(CoreError::range(format!(
                "copy of {} bytes out of buffer of length {}",
                dest.len(),
                self.length
            )));
        }
        dest.copy_from_slice(self.as_slice());
        Ok(())
    }

    /// Zero-fill the valid bytes; refused for external memory
    pub fn clear(&mut self) -> CoreResult<()> {
        let _guard = self.lock.try_acquire()?;
        if self.is_external() {
            return Err(CoreError::range("cannot clear an external buffer"));
        }
        let length = self.length;
        scrub(&mut self.region.bytes_mut()[..length]);
        Ok(())
    }

    /// Zero-fill and release owned memory, detach external memory
    ///
    /// Repeated calls are no-ops.
    pub fn free(&mut self) -> CoreResult<()> {
        let _guard = self.lock.try_acquire()?;
        self.region.release();
        self.length = 0;
        Ok(())
    }

    /// Run `f` over the valid bytes with the lock bit held
    pub fn with_locked<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> CoreResult<R> {
        let _guard = self.lock.try_acquire()?;
        let length = self.length;
        Ok(f(&mut self.region.bytes_mut()[..length]))
    }

    /// Hold the lock bit until `unlock`
    pub fn lock(&self) -> CoreResult<()> {
        self.lock.set()
    }

    pub fn unlock(&self) -> CoreResult<()> {
        self.lock.clear()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.region.release();
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Buffer");
        s.field("owned", &self.is_owned())
            .field("length", &self.length)
            .field("capacity", &self.capacity())
            .field("locked", &self.is_locked());
        if self.is_dumpable() {
            s.field("data", &hex::encode(self.as_slice()));
        }
        s.finish()
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buffer {}/{}",
            if self.is_owned() { "owned" } else { "external" },
            self.length,
            self.capacity()
        )?;
        if self.is_locked() {
            write!(f, " (locked)")?;
        }
        Ok(())
    }
}
