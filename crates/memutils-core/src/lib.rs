//! Manual off-heap memory management.
//!
//! Regions of raw memory are acquired from the global allocator and
//! sub-allocated by an [`Allocator`] with a strategy chosen at construction.
//! Callers read and write allocations through bounds-checked [`View`]s and
//! release them explicitly, one at a time or in bulk through an [`Arena`].
//! There is no garbage collection: nothing is freed unless a caller asks.
//!
//! # Architecture
//!
//! ```text
//! Arena (bulk close, nesting)
//! └── Allocator (strategy + growth + misuse policy)
//!     ├── Strategy: Bump | FreeList | Pooled   (where spans go)
//!     └── Arc<Ledger>                          (what is live)
//!         ├── Region[]   (raw blocks, released exactly once)
//!         └── slot table (generation per slot, epoch per reset)
//!
//! View ── Weak<Ledger> + Span ──> typed, bounds-checked access
//! ```
//!
//! # Lifetime checks
//!
//! Each [`Span`] records the generation of its ledger slot and the ledger
//! epoch. Freeing bumps the slot generation; `reset`, `close` and dropping
//! the allocator advance the epoch. A view whose span no longer matches
//! fails with [`MemoryError::UseAfterFree`] on every access, which is checked
//! before bounds.
//!
//! # Safety
//!
//! All `unsafe` code lives in the private `raw` module and the byte-access
//! methods of [`Region`]. Views take the ledger read lock for each access
//! and release paths take the write lock, so memory is never released under
//! an in-flight access.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod arena;
pub mod config;
pub mod cursor;
pub mod error;
pub mod id;
mod ledger;
mod raw;
pub mod region;
pub mod shared;
pub mod span;
mod strategy;
pub mod view;

// Public re-exports for the primary API surface.
pub use allocator::{Allocator, AllocatorStats};
pub use arena::Arena;
pub use config::{AllocatorConfig, Fit, Growth, MisusePolicy, StrategyKind};
pub use cursor::{RingCursor, ViewCursor};
pub use error::{ConfigError, MemoryError, Result};
pub use id::AllocatorId;
pub use region::Region;
pub use shared::{SharedAllocator, SharedArena};
pub use span::Span;
pub use view::{Scalar, View};
