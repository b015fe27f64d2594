//! Status Convention
//!
//! Every core operation returns `CoreResult<T>`. Errors are captured where
//! they are detected and never unwind past the entry point: at the host
//! boundary a failure becomes three values, `nil`, a numeric OS-style error
//! code and its description.
//!
//! ```text
//! ok     -> value
//! failed -> nil, code, description
//! ```

use thiserror::Error;

use crate::host::HostValue;

/// Error type shared by the buffer cell, object registry and table bridge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Length, capacity or cardinality mismatch
    #[error("Range error: {0}")]
    RangeError(String),

    /// Reentrant lock contention
    #[error("Resource busy: {0}")]
    Busy(String),

    /// Allocation failure
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Type mismatch or unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing cross-reference, handle or table key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Native error surfaced by a wrapped OS call
    #[error("{}", std::io::Error::from_raw_os_error(*.0))]
    Os(i32),
}

impl CoreError {
    pub fn range(msg: impl Into<String>) -> Self {
        CoreError::RangeError(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        CoreError::Busy(msg.into())
    }

    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        CoreError::OutOfMemory(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    /// Capture the calling thread's current `errno`
    pub fn last_os_error() -> Self {
        std::io::Error::last_os_error().into()
    }

    /// OS-style error code reported to the host
    pub fn code(&self) -> i32 {
        match self {
            CoreError::RangeError(_) => libc::ERANGE,
            CoreError::Busy(_) => libc::EBUSY,
            CoreError::OutOfMemory(_) => libc::ENOMEM,
            CoreError::InvalidArgument(_) => libc::EINVAL,
            CoreError::NotFound(_) => libc::ENOENT,
            CoreError::Os(code) => *code,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        match e.raw_os_error() {
            Some(code) => CoreError::Os(code),
            None if e.kind() == std::io::ErrorKind::OutOfMemory => {
                CoreError::OutOfMemory(e.to_string())
            }
            None => CoreError::InvalidArgument(e.to_string()),
        }
    }
}

impl From<std::collections::TryReserveError> for CoreError {
    fn from(e: std::collections::TryReserveError) -> Self {
        CoreError::OutOfMemory(e.to_string())
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Host Return Convention
// =============================================================================

/// What an entry point hands back to the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostReturn {
    /// Primary result
    Ok(HostValue),
    /// Failure side channel
    Failed { code: i32, description: String },
}

impl HostReturn {
    pub fn is_ok(&self) -> bool {
        matches!(self, HostReturn::Ok(_))
    }

    /// Error code, if the call failed
    pub fn code(&self) -> Option<i32> {
        match self {
            HostReturn::Ok(_) => None,
            HostReturn::Failed { code, .. } => Some(*code),
        }
    }

    /// Flatten into the values pushed onto the host stack
    pub fn into_values(self) -> Vec<HostValue> {
        match self {
            HostReturn::Ok(value) => vec![value],
            HostReturn::Failed { code, description } => vec![
                HostValue::Nil,
                HostValue::Integer(i64::from(code)),
                HostValue::String(description),
            ],
        }
    }
}

impl<T: Into<HostValue>> From<CoreResult<T>> for HostReturn {
    fn from(result: CoreResult<T>) -> Self {
        signal(result)
    }
}

/// Translate a core result into the host's failure convention
pub fn signal<T: Into<HostValue>>(result: CoreResult<T>) -> HostReturn {
    match result {
        Ok(value) => HostReturn::Ok(value.into()),
        Err(e) => {
            tracing::debug!(code = e.code(), error = %e, "call failed");
            HostReturn::Failed {
                code: e.code(),
                description: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::range("x").code(), libc::ERANGE);
        assert_eq!(CoreError::busy("x").code(), libc::EBUSY);
        assert_eq!(CoreError::out_of_memory("x").code(), libc::ENOMEM);
        assert_eq!(CoreError::invalid("x").code(), libc::EINVAL);
        assert_eq!(CoreError::not_found("x").code(), libc::ENOENT);
        assert_eq!(CoreError::Os(libc::EBADF).code(), libc::EBADF);
    }

    #[test]
    fn test_io_error_conversion() {
        let e: CoreError = std::io::Error::from_raw_os_error(libc::EACCES).into();
        assert_eq!(e, CoreError::Os(libc::EACCES));

        let e: CoreError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(e.code(), libc::EINVAL);
    }

    #[test]
    fn test_signal_success() {
        let ret = signal(Ok::<_, CoreError>(7i64));
        assert!(ret.is_ok());
        assert_eq!(ret.into_values(), vec![HostValue::Integer(7)]);
    }

    #[test]
    fn test_signal_failure_yields_three_values() {
        let ret: HostReturn = Err::<i64, _>(CoreError::busy("buffer locked")).into();
        assert_eq!(ret.code(), Some(libc::EBUSY));

        let values = ret.into_values();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], HostValue::Nil);
        assert_eq!(values[1], HostValue::Integer(i64::from(libc::EBUSY)));
        assert_eq!(
            values[2],
            HostValue::String("Resource busy: buffer locked".to_string())
        );
    }
}
