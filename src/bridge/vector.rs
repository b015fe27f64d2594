//! Packed arrays of fixed-stride native structs.

use bytemuck::Pod;

use crate::buffer::{Buffer, BufferFlags};
use crate::status::{CoreError, CoreResult};

/// Caller-supplied packed array: `cardinality` elements of `stride` bytes
#[derive(Debug, Clone, Copy)]
pub struct VectorParams {
    pub pointer: *mut u8,
    pub stride: usize,
    pub cardinality: usize,
}

/// `cardinality` contiguous elements of `stride` bytes, backed by a buffer
#[derive(Debug)]
pub struct VectorTable {
    element_type: &'static str,
    stride: usize,
    cardinality: usize,
    storage: Buffer,
    released: bool,
}

fn byte_len(stride: usize, cardinality: usize) -> CoreResult<usize> {
    if stride == 0 {
        return Err(CoreError::invalid("vector stride must be non-zero"));
    }
    stride.checked_mul(cardinality).ok_or_else(|| {
        CoreError::range(format!(
            "{} elements of {} bytes overflow the address space",
            cardinality, stride
        ))
    })
}

impl VectorTable {
    /// Owned, zeroed storage for `cardinality` elements
    pub fn new(element_type: &'static str, stride: usize, cardinality: usize) -> CoreResult<Self> {
        let storage = Buffer::zeroed(byte_len(stride, cardinality)?)?;
        Ok(Self {
            element_type,
            stride,
            cardinality,
            storage,
            released: false,
        })
    }

    /// View a caller-supplied packed array
    ///
    /// # Safety
    ///
    /// `params.pointer` must be valid for reads and writes of
    /// `stride * cardinality` bytes for the lifetime of the vector.
    pub unsafe fn alias(element_type: &'static str, params: &VectorParams) -> CoreResult<Self> {
        let len = byte_len(params.stride, params.cardinality)?;
        let storage = Buffer::alias(params.pointer, len, len, BufferFlags::dumpable())?;
        Ok(Self {
            element_type,
            stride: params.stride,
            cardinality: params.cardinality,
            storage,
            released: false,
        })
    }

    pub fn element_type(&self) -> &'static str {
        self.element_type
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn is_external(&self) -> bool {
        self.storage.is_external()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn span(&self, index: usize) -> CoreResult<std::ops::Range<usize>> {
        if self.released {
            return Err(CoreError::range("vector storage released"));
        }
        if index >= self.cardinality {
            return Err(CoreError::range(format!(
                "element {} outside vector of {}",
                index, self.cardinality
            )));
        }
        let start = index * self.stride;
        Ok(start..start + self.stride)
    }

    /// Bytes of element `index` (zero-based)
    pub fn element(&self, index: usize) -> CoreResult<&[u8]> {
        let span = self.span(index)?;
        Ok(&self.storage.as_slice()[span])
    }

    pub fn element_mut(&mut self, index: usize) -> CoreResult<&mut [u8]> {
        let span = self.span(index)?;
        Ok(&mut self.storage.as_mut_slice()?[span])
    }

    fn check_stride<T: Pod>(&self) -> CoreResult<()> {
        if std::mem::size_of::<T>() != self.stride {
            return Err(CoreError::invalid(format!(
                "{}-byte struct used with stride {}",
                std::mem::size_of::<T>(),
                self.stride
            )));
        }
        Ok(())
    }

    pub fn read<T: Pod>(&self, index: usize) -> CoreResult<T> {
        self.check_stride::<T>()?;
        Ok(bytemuck::pod_read_unaligned(self.element(index)?))
    }

    pub fn write<T: Pod>(&mut self, index: usize, value: &T) -> CoreResult<()> {
        self.check_stride::<T>()?;
        self.element_mut(index)?
            .copy_from_slice(bytemuck::bytes_of(value));
        Ok(())
    }

    /// The whole packed array
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Release the storage; aliased memory is only detached
    pub fn release(&mut self) -> CoreResult<()> {
        self.storage.free()?;
        self.released = true;
        Ok(())
    }

    /// Keep the packed array beyond the vector, e.g. to wrap it in a handle
    pub fn into_buffer(self) -> Buffer {
        self.storage
    }
}
