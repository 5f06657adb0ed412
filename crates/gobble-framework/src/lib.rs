//! # Gobble Framework
//!
//! Components for deciding what the bot answers and how.
//!
//! This layer provides:
//! - [`Handler`] trait, implemented for async functions taking a
//!   [`Message`](gobble_core::Message) and its [`Captures`]
//! - [`HandlerRegistry`], an ordered pattern registry where every matching
//!   handler fires
//! - [`MessageFilter`], which drops hidden, self-authored and unaddressed
//!   events
//! - Greeting handlers (with `builtin-handlers` feature)

pub mod filter;
pub mod handler;
pub mod registry;

#[cfg(feature = "builtin-handlers")]
pub mod builtin;

pub use filter::{MessageFilter, Verdict, is_explicit_at, is_respondable};
pub use handler::{
    BoxFuture, BoxedHandler, Captures, ErasedHandler, Handler, HandlerFn, HandlerResult,
    into_handler,
};
pub use registry::{
    DispatchReport, HandlerRegistry, Pattern, PatternOptions, RegistryBuilder, Route,
};
