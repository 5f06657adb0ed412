//! # Gobble Core
//!
//! Fundamental types shared by every layer of the Gobble bot runtime.
//!
//! - **Transport capability**: [`RealtimeSession`] with [`SessionIdentity`]
//!   and [`SendAck`]
//! - **Events**: untyped [`RawEvent`] records as delivered by the backend
//! - **Messages**: the normalized [`Message`] model and the [`MessageSender`]
//!   seam used to answer them
//! - **Errors**: [`GobbleError`] and [`TransportError`]
//!
//! ```text
//! ┌──────────────────┐   RawEvent   ┌────────────┐   Message   ┌──────────┐
//! │ RealtimeSession  │─────────────▶│ Controller │────────────▶│ Handlers │
//! │   (transport)    │◀─────────────│ (runtime)  │◀────────────│          │
//! └──────────────────┘  send(text)  └────────────┘ reply/respond└──────────┘
//! ```

pub mod error;
pub mod event;
pub mod message;
pub mod session;
pub mod text;

pub use error::{GobbleError, GobbleResult, TransportError, TransportResult};
pub use event::{MESSAGE_EVENT_TYPE, RawEvent};
pub use message::{BoxedSender, Message, MessageSender};
pub use session::{BoxedSession, RealtimeSession, SendAck, SessionIdentity};
