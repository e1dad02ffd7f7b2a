//! # tenon-engine
//!
//! Asset disassembly engine for tenon.
//!
//! This crate provides:
//! - The action executor (promote, delete and orphan a component subtree)
//! - The aggregate finalizer (asset-level dependents, preventive templates,
//!   disposal of the original asset)
//! - The [`Disassembler`] orchestrator tying them to the idempotency ledger
//!   and the per-asset lock
//!
//! ## Example
//!
//! ```ignore
//! use tenon_db::Database;
//! use tenon_engine::{Disassembler, EngineConfig};
//!
//! let db = Database::connect("postgres://...").await?;
//! let engine = Disassembler::new(db, EngineConfig::from_env());
//!
//! let result = engine.disassemble(ctx, request).await?;
//! println!("promoted {} assets", result.promoted_assets.len());
//! ```

pub mod config;
pub mod disassembler;
pub mod executor;
pub mod finalizer;
pub mod template;

// Re-export core types
pub use tenon_core::*;

pub use config::EngineConfig;
pub use disassembler::{Disassembler, Stage};
pub use executor::{ActionExecutor, ActionScope, MutationResult};
pub use finalizer::Finalizer;
