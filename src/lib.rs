//! # Grapnel
//!
//! Composable asynchronous processing chains for Rust.
//!
//! A [`Hook`] runs a three-phase lifecycle (pre-process, execute, post-process)
//! over a shared, mutable payload (the "thing") and can be linked to a successor
//! to form a chain. An [`Anchor`] is a hook that additionally fans out to an
//! ordered collection of child hooks.
//!
//! ## Features
//!
//! - **Well-defined ordering**: own pre-process and execute, then the successor
//!   chain, then the children in order, then own post-process
//! - **Gating**: a pre-process gate plus per-hook flags decide which phases run
//! - **Tail-appending links**: `set_hook` always attaches at the end of the chain
//! - **Attach by name**: an injected [`HookRegistry`] turns identifiers into hooks
//! - **Tracing**: record every phase decision with a [`Tracer`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grapnel::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct Stamp;
//!
//! #[async_trait]
//! impl HookLogic for Stamp {
//!     async fn execute(&self, _settings: &Settings, thing: &mut Thing) -> Result<()> {
//!         thing.insert("stamped".to_string(), true.into());
//!         Ok(())
//!     }
//! }
//!
//! # async fn demo() -> Result<()> {
//! let anchor = Anchor::empty();
//! anchor.push_hook(Arc::new(Hook::new(Stamp)))?;
//!
//! let mut thing = Thing::new();
//! anchor.process(&mut thing).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`Hook`], [`HookLogic`]: a single unit and its lifecycle
//! - [`Anchor`], [`FanOutPolicy`]: the fan-out extension
//! - [`Chainable`]: the capability every successor and child has
//! - [`prelude`]: Commonly used types and traits (import with `use grapnel::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;
pub mod error;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Core types
pub use crate::core::{AsAny, Chainable, HookRef, HookTarget, HookValue, Phase, Settings, Thing};

// Units
pub use crate::core::anchor::{Anchor, FanOutPolicy, DEFAULT_ANCHOR_NAME, FAN_OUT_KEY};
pub use crate::core::hook::{Hook, HookLogic, Passthrough, DEFAULT_HOOK_NAME};

// Configuration
pub use crate::core::flags::Flags;
pub use crate::core::options::{HookOptions, NAME_KEY};
pub use crate::core::registry::{HookConstructor, HookRegistry};

// Tracing
pub use crate::core::telemetry::{MemoryTracer, PhaseOutcome, TraceEntry, Tracer};

pub use error::{HookError, Result};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: imports everything you need to build and run chains.
///
/// # Example
/// ```rust
/// use grapnel::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        Anchor, Chainable, FanOutPolicy, Flags, Hook, HookError, HookLogic, HookOptions,
        HookRef, HookRegistry, HookTarget, HookValue, MemoryTracer, Passthrough, Phase,
        PhaseOutcome, Result, Settings, Thing, TraceEntry, Tracer,
    };
    pub use async_trait::async_trait;
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
