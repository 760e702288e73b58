//! Error types for regions, allocators, views and arenas.
//!
//! Every variant of [`MemoryError`] is either a contract violation by the
//! caller or resource exhaustion. None of them is corrected internally; the
//! only retry anywhere in the crate is the single growth step of a
//! [`Growth::Growable`](crate::config::Growth) allocator.

use std::error::Error;
use std::fmt;

use crate::id::AllocatorId;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors raised by memory operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryError {
    /// A zero-sized request, or a region larger than the platform allows.
    InvalidSize {
        /// The requested size in bytes.
        requested: usize,
    },
    /// Alignment is zero or not a power of two.
    InvalidAlignment {
        /// The rejected alignment.
        align: usize,
    },
    /// No strategy could place the request and growth was disabled or failed.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Total backing capacity at the time of failure.
        capacity: usize,
    },
    /// An access reached past the end of a view or region.
    OutOfBounds {
        /// Start of the rejected access.
        offset: usize,
        /// Length of the rejected access.
        len: usize,
        /// Length of the view or region that was accessed.
        bound: usize,
    },
    /// The span was freed, its region released, or its arena closed.
    UseAfterFree,
    /// The span is not currently outstanding.
    DoubleFree,
    /// The region was already released.
    DoubleRelease,
    /// The span was handed out by a different allocator.
    ForeignSpan {
        /// The allocator asked to free the span.
        expected: AllocatorId,
        /// The allocator recorded in the span.
        found: AllocatorId,
    },
    /// Construction-time configuration was rejected.
    Config(ConfigError),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize { requested } => write!(f, "invalid size: {requested} bytes"),
            Self::InvalidAlignment { align } => {
                write!(f, "invalid alignment {align}: must be a non-zero power of two")
            }
            Self::OutOfMemory {
                requested,
                capacity,
            } => write!(
                f,
                "out of memory: requested {requested} bytes, backing capacity {capacity} bytes"
            ),
            Self::OutOfBounds { offset, len, bound } => write!(
                f,
                "out of bounds: access of {len} bytes at offset {offset} exceeds length {bound}"
            ),
            Self::UseAfterFree => write!(f, "use after free"),
            Self::DoubleFree => write!(f, "span freed twice or never allocated"),
            Self::DoubleRelease => write!(f, "region released twice"),
            Self::ForeignSpan { expected, found } => write!(
                f,
                "span belongs to allocator {found}, not allocator {expected}"
            ),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl Error for MemoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors detected by [`AllocatorConfig::validate()`](crate::config::AllocatorConfig::validate)
/// or while parsing configuration options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `region_size` is zero or exceeds the platform maximum.
    RegionSize {
        /// The configured size.
        configured: usize,
    },
    /// A pool size class is not a power of two.
    ClassNotPowerOfTwo {
        /// The offending class size.
        class: usize,
    },
    /// Pool class bounds are inverted or do not fit a region.
    ClassRange {
        /// Smallest class.
        min: usize,
        /// Largest class.
        max: usize,
        /// Configured region size.
        region_size: usize,
    },
    /// An option key was not recognised.
    UnknownOption {
        /// The key as written.
        key: String,
    },
    /// An option value could not be parsed.
    InvalidValue {
        /// The option key.
        key: String,
        /// The value as written.
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionSize { configured } => {
                write!(f, "region_size {configured} is zero or exceeds the platform maximum")
            }
            Self::ClassNotPowerOfTwo { class } => {
                write!(f, "pool class {class} is not a power of two")
            }
            Self::ClassRange {
                min,
                max,
                region_size,
            } => write!(
                f,
                "pool classes {min}..={max} must be ordered and fit region_size {region_size}"
            ),
            Self::UnknownOption { key } => write!(f, "unknown option '{key}'"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value '{value}' for option '{key}'")
            }
        }
    }
}

impl Error for ConfigError {}

impl From<ConfigError> for MemoryError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<MemoryError> for std::io::Error {
    fn from(e: MemoryError) -> Self {
        let kind = match e {
            MemoryError::OutOfBounds { .. } => std::io::ErrorKind::UnexpectedEof,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_offsets() {
        let e = MemoryError::OutOfBounds {
            offset: 12,
            len: 8,
            bound: 16,
        };
        assert_eq!(
            e.to_string(),
            "out of bounds: access of 8 bytes at offset 12 exceeds length 16"
        );
    }

    #[test]
    fn config_error_is_source() {
        let e: MemoryError = ConfigError::RegionSize { configured: 0 }.into();
        assert!(e.source().is_some());
        assert!(e.to_string().starts_with("config: region_size 0"));
    }

    #[test]
    fn io_conversion_keeps_message() {
        let e: std::io::Error = MemoryError::UseAfterFree.into();
        assert_eq!(e.kind(), std::io::ErrorKind::Other);
        assert_eq!(e.to_string(), "use after free");
    }
}
