//! Handler system for the Gobble framework.
//!
//! A handler is any async function taking the matched [`Message`] and the
//! [`Captures`] produced by its pattern:
//!
//! ```rust,ignore
//! use gobble_framework::{Captures, HandlerResult};
//! use gobble_core::Message;
//!
//! async fn greet(mut message: Message, captures: Captures) -> HandlerResult {
//!     let who = captures.get(0).unwrap_or("stranger");
//!     message.reply(format!("hello {who}")).await?;
//!     Ok(())
//! }
//! ```
//!
//! Handlers are stored type-erased as [`BoxedHandler`] so a registry can hold
//! any mix of functions and closures.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use gobble_core::Message;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler returns. Errors are logged by the registry and never stop
/// dispatch.
pub type HandlerResult = anyhow::Result<()>;

// ============================================================================
// Captures
// ============================================================================

/// Capturing groups of a matched pattern, in order, excluding the whole match.
///
/// Groups that did not participate in the match are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    groups: Vec<Option<String>>,
    names: Vec<Option<String>>,
}

impl Captures {
    /// Creates captures from positional groups.
    pub fn new(groups: Vec<Option<String>>) -> Self {
        let names = vec![None; groups.len()];
        Self { groups, names }
    }

    /// Creates captures from positional groups with their optional names.
    pub(crate) fn with_names(groups: Vec<Option<String>>, names: Vec<Option<String>>) -> Self {
        Self { groups, names }
    }

    /// Returns the `index`-th group (0 is the first capturing group).
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    /// Returns a named group.
    pub fn name(&self, name: &str) -> Option<&str> {
        let index = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.get(index)
    }

    /// Number of capturing groups in the pattern.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterates over all groups in order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.groups.iter().map(Option::as_deref)
    }

    /// Consumes the captures, returning the positional groups.
    pub fn into_groups(self) -> Vec<Option<String>> {
        self.groups
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for message handlers.
///
/// Automatically implemented for every `Fn(Message, Captures) -> Future`
/// whose future resolves to a [`HandlerResult`]. Each invocation receives its
/// own copy of the message so handlers can reply independently.
pub trait Handler: Clone + Send + Sync + 'static {
    /// The type of future calling this handler returns.
    type Future: Future<Output = HandlerResult> + Send + 'static;

    /// Call the handler with a matched message.
    fn call(self, message: Message, captures: Captures) -> Self::Future;
}

impl<F, Fut> Handler for F
where
    F: FnOnce(Message, Captures) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    type Future = Fut;

    fn call(self, message: Message, captures: Captures) -> Self::Future {
        self(message, captures)
    }
}

// ============================================================================
// Type erasure
// ============================================================================

/// Wraps a [`Handler`] so it can be stored as a [`BoxedHandler`].
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new handler function wrapper.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F: Clone> Clone for HandlerFn<F> {
    fn clone(&self) -> Self {
        Self::new(self.f.clone())
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync>;

/// Type-erased handler trait for dynamic dispatch.
pub trait ErasedHandler: Send + Sync {
    /// Execute the handler.
    fn call(&self, message: Message, captures: Captures) -> BoxFuture<'static, HandlerResult>;
}

impl<F> ErasedHandler for HandlerFn<F>
where
    F: Handler,
{
    fn call(&self, message: Message, captures: Captures) -> BoxFuture<'static, HandlerResult> {
        let f = self.f.clone();
        // The handler body runs inside the boxed future, so a panic while
        // building its future still surfaces when the future is polled.
        Box::pin(async move { f.call(message, captures).await })
    }
}

/// Convert a handler function into a boxed handler.
pub fn into_handler<F>(f: F) -> BoxedHandler
where
    F: Handler,
{
    Arc::new(HandlerFn::new(f))
}

#[cfg(test)]
mod tests {
    use super::{Captures, ErasedHandler, HandlerResult, into_handler};
    use gobble_core::Message;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_captures_access() {
        let captures = Captures::with_names(
            vec![Some("morning".into()), None],
            vec![Some("when".into()), None],
        );
        assert_eq!(captures.len(), 2);
        assert_eq!(captures.get(0), Some("morning"));
        assert_eq!(captures.get(1), None);
        assert_eq!(captures.get(7), None);
        assert_eq!(captures.name("when"), Some("morning"));
        assert_eq!(captures.name("missing"), None);
        assert_eq!(
            captures.iter().collect::<Vec<_>>(),
            vec![Some("morning"), None]
        );
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = into_handler(move |message: Message, captures: Captures| {
            let counter = counter.clone();
            async move {
                assert_eq!(message.text(), "ping");
                assert!(captures.is_empty());
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            }
        });

        let message = Message::outbound("C1", "ping");
        handler.call(message.clone(), Captures::default()).await.unwrap();
        handler.call(message, Captures::default()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    async fn failing(_message: Message, _captures: Captures) -> HandlerResult {
        anyhow::bail!("boom")
    }

    #[tokio::test]
    async fn test_fn_handler_error() {
        let handler = into_handler(failing);
        let err = handler
            .call(Message::outbound("C1", "x"), Captures::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
