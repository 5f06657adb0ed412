//! Pattern registry and dispatch.
//!
//! A [`HandlerRegistry`] is an ordered list of routes, each pairing a
//! compiled [`Pattern`] with a handler. Registries are assembled with a
//! [`RegistryBuilder`] and frozen by [`RegistryBuilder::build`]; once frozen
//! they are immutable and cheap to clone, so the read loop can share one
//! without locking.
//!
//! # Dispatch
//!
//! When a message is dispatched:
//!
//! 1. Routes are tested in registration order against the message text
//! 2. Every matching route fires; there is no first-match-wins
//! 3. A handler that fails or panics is logged and dispatch moves on
//!
//! Patterns are anchored at the start of the text but not at the end, so
//! `"ping"` matches `"ping me"` but not `"say ping"`.
//!
//! ```rust,ignore
//! use gobble_framework::{HandlerRegistry, PatternOptions};
//!
//! let registry = HandlerRegistry::builder()
//!     .listen("hello|hi", greet)
//!     .listen_with("(?P<word>\\w+)", PatternOptions::case_sensitive(), echo)
//!     .build()?;
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use regex::{Regex, RegexBuilder};
use tracing::{Instrument, Level, debug, error, span, trace};

use gobble_core::{GobbleError, GobbleResult, Message};

use crate::handler::{BoxedHandler, Captures, ErasedHandler, Handler, into_handler};

// ============================================================================
// Patterns
// ============================================================================

/// Flags used when compiling a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternOptions {
    /// Match letters regardless of case. On by default.
    pub case_insensitive: bool,
    /// `^` and `$` match at line boundaries.
    pub multi_line: bool,
    /// `.` also matches `\n`.
    pub dot_matches_new_line: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            multi_line: false,
            dot_matches_new_line: false,
        }
    }
}

impl PatternOptions {
    /// Default options with case-sensitive matching.
    pub fn case_sensitive() -> Self {
        Self {
            case_insensitive: false,
            ..Self::default()
        }
    }

    /// Enables or disables multi-line mode.
    pub fn multi_line(mut self, yes: bool) -> Self {
        self.multi_line = yes;
        self
    }

    /// Enables or disables `.` matching newlines.
    pub fn dot_matches_new_line(mut self, yes: bool) -> Self {
        self.dot_matches_new_line = yes;
        self
    }
}

/// A compiled, start-anchored text pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    options: PatternOptions,
    regex: Regex,
}

impl Pattern {
    /// Compiles `source` with the default (case-insensitive) options.
    pub fn new(source: impl Into<String>) -> GobbleResult<Self> {
        Self::with_options(source, PatternOptions::default())
    }

    /// Compiles `source` with explicit options.
    pub fn with_options(source: impl Into<String>, options: PatternOptions) -> GobbleResult<Self> {
        let source = source.into();
        let regex = RegexBuilder::new(&format!("^(?:{source})"))
            .case_insensitive(options.case_insensitive)
            .multi_line(options.multi_line)
            .dot_matches_new_line(options.dot_matches_new_line)
            .build()
            .map_err(|e| GobbleError::InvalidPattern {
                pattern: source.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            source,
            options,
            regex,
        })
    }

    /// The pattern as registered, without the anchor.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> PatternOptions {
        self.options
    }

    /// Whether the pattern matches at the start of `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Matches `text` and collects the capturing groups.
    pub fn captures(&self, text: &str) -> Option<Captures> {
        let caps = self.regex.captures(text)?;
        let groups = caps
            .iter()
            .skip(1)
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();
        let names = self
            .regex
            .capture_names()
            .skip(1)
            .map(|name| name.map(str::to_string))
            .collect();
        Some(Captures::with_names(groups, names))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ============================================================================
// Routes
// ============================================================================

/// A registered (pattern, handler) pair.
#[derive(Clone)]
pub struct Route {
    pattern: Pattern,
    handler: BoxedHandler,
    name: Option<String>,
}

impl Route {
    /// Creates a route from a compiled pattern and any handler.
    pub fn new<H: Handler>(pattern: Pattern, handler: H) -> Self {
        Self {
            pattern,
            handler: into_handler(handler),
            name: None,
        }
    }

    /// Names the route for logging.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The route name, or its pattern source when unnamed.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.pattern.source())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.source())
            .field("name", &self.name)
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects routes before the registry is frozen.
///
/// The chaining methods defer pattern errors to [`build`](Self::build); the
/// first invalid pattern is reported there.
#[derive(Default)]
pub struct RegistryBuilder {
    routes: Vec<Route>,
    error: Option<GobbleError>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for a case-insensitive `pattern`.
    pub fn listen<H: Handler>(self, pattern: &str, handler: H) -> Self {
        self.listen_with(pattern, PatternOptions::default(), handler)
    }

    /// Registers `handler` for `pattern` compiled with `options`.
    pub fn listen_with<H: Handler>(
        mut self,
        pattern: &str,
        options: PatternOptions,
        handler: H,
    ) -> Self {
        if let Err(e) = self.register_with(pattern, options, handler).map(|_| ()) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Registers a handler, reporting an invalid pattern immediately.
    pub fn register<H: Handler>(&mut self, pattern: &str, handler: H) -> GobbleResult<&mut Self> {
        self.register_with(pattern, PatternOptions::default(), handler)
    }

    /// Like [`register`](Self::register) with explicit options.
    pub fn register_with<H: Handler>(
        &mut self,
        pattern: &str,
        options: PatternOptions,
        handler: H,
    ) -> GobbleResult<&mut Self> {
        let pattern = Pattern::with_options(pattern, options)?;
        Ok(self.route(Route::new(pattern, handler)))
    }

    /// Appends a prepared route.
    pub fn route(&mut self, route: Route) -> &mut Self {
        debug!(pattern = %route.pattern, "Registered handler");
        self.routes.push(route);
        self
    }

    /// Appends every route of another builder, keeping their order.
    pub fn merge(mut self, other: RegistryBuilder) -> Self {
        if let Some(e) = other.error {
            self.error.get_or_insert(e);
        }
        self.routes.extend(other.routes);
        self
    }

    /// Number of routes registered so far.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freezes the registry.
    pub fn build(self) -> GobbleResult<HandlerRegistry> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(HandlerRegistry {
            routes: self.routes.into(),
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Outcome of dispatching one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Routes whose pattern matched.
    pub matched: usize,
    /// Matched routes whose handler returned an error or panicked.
    pub failed: usize,
}

impl DispatchReport {
    /// Whether any route matched.
    pub fn any_matched(&self) -> bool {
        self.matched > 0
    }
}

/// A frozen, ordered set of routes.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    routes: Arc<[Route]>,
}

impl HandlerRegistry {
    /// Starts building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// An empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes in dispatch order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Runs every route matching the message text, in registration order.
    pub async fn dispatch(&self, message: &Message) -> DispatchReport {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            channel = %message.channel(),
            sender = message.sender().unwrap_or_default(),
        );

        async {
            let mut report = DispatchReport::default();

            for route in self.routes.iter() {
                let Some(captures) = route.pattern.captures(message.text()) else {
                    continue;
                };
                report.matched += 1;
                trace!(handler = route.label(), text = %message.text(), "Route matched");

                let call = ErasedHandler::call(route.handler.as_ref(), message.clone(), captures);
                let failure = match AssertUnwindSafe(call).catch_unwind().await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(GobbleError::dispatch(route.label(), format!("{e:#}"))),
                    Err(panic) => Some(GobbleError::dispatch(
                        route.label(),
                        format!("panicked: {}", panic_message(panic.as_ref())),
                    )),
                };

                if let Some(e) = failure {
                    report.failed += 1;
                    error!(
                        error = %e,
                        channel = %message.channel(),
                        sender = message.sender().unwrap_or_default(),
                        text = %message.raw_text(),
                        "Handler failed"
                    );
                }
            }

            if report.matched == 0 {
                debug!(text = %message.text(), "No handler matched");
            }
            report
        }
        .instrument(span)
        .await
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("route_count", &self.routes.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
