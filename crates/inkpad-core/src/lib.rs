//! inkpad-core - Core library for inkpad
//!
//! This crate contains the shared models, session handling, backend gateway
//! and the client state store used by every inkpad interface.

pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod gateway;
pub mod models;
pub mod store;
pub mod util;
pub mod views;

pub use error::{Error, Result};
pub use models::{Group, GroupId, Note, NoteId, NoteType, TodoId, TodoItem};
pub use store::{
    Action, ActionOutcome, MutationStrategy, NoteStore, ReconcileMode, StoreOptions, StoreState,
    SyncHandle,
};
