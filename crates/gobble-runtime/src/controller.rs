//! Session lifecycle and the resilient read loop.
//!
//! A [`BotController`] owns one [`RealtimeSession`](gobble_core::RealtimeSession).
//! [`BotController::initialize`] connects once and spawns the read loop,
//! which from then on keeps the session alive on its own:
//!
//! ```text
//!             read error                  connect failed
//!  Connected ───────────▶ Connecting ◀────────────────┐
//!      ▲                     │  (sleep backoff(n) when n > 0)
//!      └──── connect ok ─────┴────────────────────────┘
//! ```
//!
//! Each event read while connected goes through the type check, the
//! [`MessageFilter`] and finally the [`HandlerRegistry`]. Events are handled
//! one at a time in the order the session delivered them.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use gobble_core::{
    BoxedSender, BoxedSession, GobbleError, GobbleResult, MESSAGE_EVENT_TYPE, Message,
    MessageSender, RawEvent, SendAck, SessionIdentity,
};
use gobble_framework::{HandlerRegistry, MessageFilter, is_explicit_at};

use crate::backoff::Backoff;
use crate::config::GobbleConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Connection state of a controller's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not connected and not trying to.
    Disconnected,
    /// Waiting for backoff or for a connect attempt to finish.
    Connecting,
    /// Reading events.
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

struct Inner {
    session: BoxedSession,
    registry: HandlerRegistry,
    token: Option<String>,
    aliases: Vec<String>,
    poll_interval: Duration,
    backoff: Backoff,
    state: RwLock<SessionState>,
    identity: RwLock<Option<SessionIdentity>>,
    retry_count: AtomicU32,
}

impl Inner {
    fn set_state(&self, next: SessionState) {
        let mut state = self.state.write();
        if *state != next {
            let from = *state;
            debug!(from = %from, to = %next, "Session state changed");
            *state = next;
        }
    }

    /// Stores the identity from the first successful connect; later ones
    /// are only compared against it.
    fn adopt_identity(&self, reported: SessionIdentity) -> SessionIdentity {
        let mut identity = self.identity.write();
        match identity.as_ref() {
            Some(current) => {
                if *current != reported {
                    debug!(
                        bot_id = %current.id,
                        reported_id = %reported.id,
                        "Backend reported a different identity, keeping the first one"
                    );
                }
                current.clone()
            }
            None => {
                *identity = Some(reported.clone());
                reported
            }
        }
    }
}

// =============================================================================
// BotHandle
// =============================================================================

/// Cloneable handle to a controller, used to send messages.
///
/// Every inbound [`Message`] carries one so handlers can reply.
#[derive(Clone)]
pub struct BotHandle {
    inner: Arc<Inner>,
}

impl BotHandle {
    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Bot identity, once the first connect succeeded.
    pub fn identity(&self) -> Option<SessionIdentity> {
        self.inner.identity.read().clone()
    }

    /// Failed reconnect attempts since the last successful connect.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::SeqCst)
    }

    /// Sends `message` to its channel as the bot user.
    ///
    /// Fails with [`GobbleError::AlreadySent`] for a message that was sent
    /// before. A rejected message is returned as a not-ok [`SendAck`] and
    /// stays unsent.
    pub async fn send(&self, message: &mut Message) -> GobbleResult<SendAck> {
        if message.is_sent() {
            return Err(GobbleError::AlreadySent);
        }

        let ack = self
            .inner
            .session
            .send(message.channel(), message.raw_text(), true)
            .await
            .map_err(GobbleError::Send)?;

        if ack.ok {
            trace!(channel = %message.channel(), ts = ?ack.timestamp, "Message sent");
            message.mark_sent(ack.timestamp.clone());
        } else {
            warn!(
                channel = %message.channel(),
                error = ack.error.as_deref().unwrap_or("unknown"),
                "Backend rejected message"
            );
        }
        Ok(ack)
    }

    /// Sends `text` to `channel` as a new message.
    pub async fn quick_send(
        &self,
        text: impl Into<String>,
        channel: impl Into<String>,
    ) -> GobbleResult<SendAck> {
        let mut message = Message::outbound(channel, text);
        self.send(&mut message).await
    }

    /// Whether `event` text starts with an at-mention of the bot.
    ///
    /// Always false before the bot identity is known.
    pub fn is_explicit_at(&self, event: &RawEvent) -> bool {
        self.inner
            .identity
            .read()
            .as_ref()
            .is_some_and(|identity| is_explicit_at(event, &identity.id))
    }
}

#[async_trait]
impl MessageSender for BotHandle {
    async fn send_message(&self, message: &mut Message) -> GobbleResult<SendAck> {
        self.send(message).await
    }
}

impl fmt::Debug for BotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotHandle")
            .field("state", &self.state())
            .field("identity", &self.identity())
            .finish()
    }
}

// =============================================================================
// BotController
// =============================================================================

/// Owns a realtime session and drives the read loop.
pub struct BotController {
    handle: BotHandle,
}

#[derive(Clone, Copy)]
enum Phase {
    Connecting,
    Connected,
}

impl BotController {
    /// Starts building a controller around `session`.
    pub fn builder(session: BoxedSession) -> ControllerBuilder {
        ControllerBuilder::new(session)
    }

    /// Builds a controller from loaded configuration.
    pub fn from_config(
        session: BoxedSession,
        config: &GobbleConfig,
        registry: HandlerRegistry,
    ) -> Self {
        Self::builder(session).config(config).registry(registry).build()
    }

    pub fn handle(&self) -> BotHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.handle.identity()
    }

    pub fn retry_count(&self) -> u32 {
        self.handle.retry_count()
    }

    /// See [`BotHandle::send`].
    pub async fn send(&self, message: &mut Message) -> GobbleResult<SendAck> {
        self.handle.send(message).await
    }

    /// See [`BotHandle::quick_send`].
    pub async fn quick_send(
        &self,
        text: impl Into<String>,
        channel: impl Into<String>,
    ) -> GobbleResult<SendAck> {
        self.handle.quick_send(text, channel).await
    }

    /// See [`BotHandle::is_explicit_at`].
    pub fn is_explicit_at(&self, event: &RawEvent) -> bool {
        self.handle.is_explicit_at(event)
    }

    fn token(&self) -> GobbleResult<&str> {
        self.handle
            .inner
            .token
            .as_deref()
            .ok_or_else(|| GobbleError::configuration("API token is missing"))
    }

    /// Connects and spawns the read loop.
    ///
    /// Fails with [`GobbleError::Configuration`] when no token is configured
    /// and with [`GobbleError::Connection`] when the first connect fails; in
    /// both cases no loop is started.
    pub async fn initialize(self) -> GobbleResult<RunningBot> {
        let inner = Arc::clone(&self.handle.inner);
        let token = self.token()?;

        inner.set_state(SessionState::Connecting);
        info!("Connecting to backend");
        let identity = match inner.session.connect(token).await {
            Ok(identity) => inner.adopt_identity(identity),
            Err(e) => {
                inner.set_state(SessionState::Disconnected);
                error!(error = %e, "Initial connection failed");
                return Err(GobbleError::Connection(e));
            }
        };
        inner.set_state(SessionState::Connected);
        info!(bot_id = %identity.id, bot_name = %identity.name, "Connected");

        let handle = self.handle();
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move { self.run_loop(loop_cancel).await });

        Ok(RunningBot {
            handle,
            cancel,
            task,
        })
    }

    /// Runs the read loop on the current task until `cancel` fires.
    ///
    /// Connects first when the session is not connected yet. Connection
    /// losses are retried forever with backoff; the loop only returns on
    /// cancellation or when no token is configured.
    pub async fn run_loop(&self, cancel: CancellationToken) -> GobbleResult<()> {
        let inner = &self.handle.inner;
        let token = self.token()?;
        let sender: BoxedSender = Arc::new(self.handle());

        let mut audience = inner
            .identity
            .read()
            .clone()
            .map(|identity| Audience::new(identity, &inner.aliases));
        let mut phase = match (self.state(), &audience) {
            (SessionState::Connected, Some(_)) => Phase::Connected,
            _ => Phase::Connecting,
        };
        // Retry count that led to the current connection, until a read succeeds.
        // A connection dropped before its first good read resumes from it.
        let mut unproven: Option<u32> = Some(inner.retry_count.load(Ordering::SeqCst));

        debug!(
            poll_interval_ms = inner.poll_interval.as_millis() as u64,
            routes = inner.registry.len(),
            "Read loop started"
        );

        loop {
            match phase {
                Phase::Connecting => {
                    inner.set_state(SessionState::Connecting);

                    let retry = inner.retry_count.load(Ordering::SeqCst);
                    if retry > 0 {
                        let delay = inner.backoff.delay(retry);
                        info!(
                            retry,
                            delay_ms = delay.as_millis() as u64,
                            "Waiting before reconnecting"
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }

                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        result = inner.session.connect(token) => result,
                    };
                    match result {
                        Ok(reported) => {
                            let identity = inner.adopt_identity(reported);
                            unproven = Some(inner.retry_count.swap(0, Ordering::SeqCst));
                            inner.set_state(SessionState::Connected);
                            info!(bot_id = %identity.id, "Reconnected");
                            if audience.is_none() {
                                audience = Some(Audience::new(identity, &inner.aliases));
                            }
                            phase = Phase::Connected;
                        }
                        Err(e) => {
                            let retry = inner.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
                            warn!(error = %GobbleError::Connection(e), retry, "Reconnect failed");
                        }
                    }
                }
                Phase::Connected => {
                    let Some(audience) = audience.as_ref() else {
                        phase = Phase::Connecting;
                        continue;
                    };

                    let batch = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        batch = inner.session.read_events() => batch,
                    };
                    match batch {
                        Ok(events) => {
                            unproven = None;
                            for event in events {
                                self.handle_event(audience, &sender, event).await;
                            }
                        }
                        Err(e) => {
                            let error = GobbleError::TransportRead(e);
                            match unproven.take() {
                                Some(previous) => {
                                    let retry = previous.saturating_add(1);
                                    inner.retry_count.store(retry, Ordering::SeqCst);
                                    warn!(error = %error, retry, "Connection dropped before first read");
                                }
                                None => warn!(error = %error, "Connection lost"),
                            }
                            phase = Phase::Connecting;
                            continue;
                        }
                    }

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(inner.poll_interval) => {}
                    }
                }
            }
        }

        inner.set_state(SessionState::Disconnected);
        info!("Read loop stopped");
        Ok(())
    }

    async fn handle_event(&self, audience: &Audience, sender: &BoxedSender, event: RawEvent) {
        match event.event_type() {
            Some(MESSAGE_EVENT_TYPE) => {}
            Some(other) => {
                trace!(event_type = other, "Ignoring event");
                return;
            }
            None => {
                debug!(event = %event, "Discarding event without type");
                return;
            }
        }

        let verdict = audience.filter.classify(&event);
        if !verdict.is_respondable() {
            trace!(?verdict, "Message not addressed to the bot");
            return;
        }

        let message = match Message::from_event(&event, &audience.identity) {
            Ok(message) => message.with_sender(Arc::clone(sender)),
            Err(e) => {
                warn!(error = %e, event = %event, "Skipping message");
                return;
            }
        };

        debug!(
            channel = %message.channel(),
            sender = message.sender().unwrap_or_default(),
            text = %message.text(),
            "Dispatching message"
        );
        let report = self.handle.inner.registry.dispatch(&message).await;
        trace!(matched = report.matched, failed = report.failed, "Dispatch finished");
    }
}

/// Who the bot is and which events concern it.
struct Audience {
    identity: SessionIdentity,
    filter: MessageFilter,
}

impl Audience {
    fn new(identity: SessionIdentity, aliases: &[String]) -> Self {
        let filter = MessageFilter::new(&identity, aliases.iter().cloned());
        Self { identity, filter }
    }
}

// =============================================================================
// ControllerBuilder
// =============================================================================

/// Builder for [`BotController`].
pub struct ControllerBuilder {
    session: BoxedSession,
    token: Option<String>,
    config_token: Option<String>,
    registry: HandlerRegistry,
    aliases: Vec<String>,
    poll_interval: Duration,
    backoff: Backoff,
}

impl ControllerBuilder {
    pub fn new(session: BoxedSession) -> Self {
        Self {
            session,
            token: None,
            config_token: None,
            registry: HandlerRegistry::empty(),
            aliases: Vec::new(),
            poll_interval: Duration::from_millis(1),
            backoff: Backoff::default(),
        }
    }

    /// Sets the API token. Takes precedence over the configured one.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Applies token, aliases, poll interval and backoff from `config`.
    pub fn config(mut self, config: &GobbleConfig) -> Self {
        self.config_token = config.api_token.clone();
        self.aliases.clone_from(&config.aliases);
        self.poll_interval = config.poll_interval();
        self.backoff = Backoff::from_config(&config.backoff);
        self
    }

    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn build(self) -> BotController {
        let non_blank = |token: Option<String>| token.filter(|t| !t.trim().is_empty());
        let token = non_blank(self.token).or_else(|| non_blank(self.config_token));

        BotController {
            handle: BotHandle {
                inner: Arc::new(Inner {
                    session: self.session,
                    registry: self.registry,
                    token,
                    aliases: self.aliases,
                    poll_interval: self.poll_interval,
                    backoff: self.backoff,
                    state: RwLock::new(SessionState::Disconnected),
                    identity: RwLock::new(None),
                    retry_count: AtomicU32::new(0),
                }),
            },
        }
    }
}

// =============================================================================
// RunningBot
// =============================================================================

/// A controller whose read loop is running in the background.
pub struct RunningBot {
    handle: BotHandle,
    cancel: CancellationToken,
    task: JoinHandle<GobbleResult<()>>,
}

impl RunningBot {
    pub fn handle(&self) -> BotHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Token that stops the read loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the read loop and waits for it to finish.
    pub async fn shutdown(self) -> RuntimeResult<()> {
        info!("Shutting down bot");
        self.cancel.cancel();
        self.join().await
    }

    /// Waits for the read loop to finish without stopping it.
    pub async fn join(self) -> RuntimeResult<()> {
        match self.task.await {
            Ok(result) => result.map_err(RuntimeError::from),
            Err(e) => Err(RuntimeError::TaskFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobble_core::TransportError;
    use gobble_framework::Captures;
    use gobble_transport::{MockSession, SentMessage};
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::time::sleep;
    use tokio_test::assert_ok;

    const TOKEN: &str = "t1";

    fn greeter() -> HandlerRegistry {
        HandlerRegistry::builder()
            .listen("hello", |mut message: Message, _captures: Captures| async move {
                let text = format!("Hello <@{}>", message.sender().unwrap_or_default());
                message.respond(text).await?;
                Ok::<_, anyhow::Error>(())
            })
            .build()
            .unwrap()
    }

    fn controller(session: &Arc<MockSession>, registry: HandlerRegistry) -> BotController {
        BotController::builder(session.clone())
            .token(TOKEN)
            .registry(registry)
            .aliases(["normandy"])
            .build()
    }

    fn message(user: &str, text: &str) -> serde_json::Value {
        json!({"type": "message", "user": user, "text": text, "channel": "C1"})
    }

    fn sent(channel: &str, text: &str) -> SentMessage {
        SentMessage {
            channel: channel.into(),
            text: text.into(),
            as_self: true,
        }
    }

    #[tokio::test]
    async fn test_missing_token() {
        let session = Arc::new(MockSession::new());
        let controller = BotController::builder(session.clone()).build();
        assert!(matches!(
            controller.initialize().await,
            Err(GobbleError::Configuration(_))
        ));
        assert_eq!(session.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_token_from_config() {
        let session = Arc::new(MockSession::new());
        let blank = GobbleConfig {
            api_token: Some("  ".into()),
            ..Default::default()
        };
        let controller = BotController::from_config(session.clone(), &blank, greeter());
        assert!(matches!(
            controller.initialize().await,
            Err(GobbleError::Configuration(_))
        ));

        let config = GobbleConfig {
            api_token: Some("from-config".into()),
            ..Default::default()
        };
        let bot = assert_ok!(
            BotController::from_config(session.clone(), &config, greeter())
                .initialize()
                .await
        );
        assert_eq!(session.tokens(), vec!["from-config"]);
        bot.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_connect_failure_starts_no_loop() {
        let session = Arc::new(MockSession::new());
        session.fail_connect(TransportError::connection_failed("offline"));
        let controller = controller(&session, greeter());
        let handle = controller.handle();

        assert!(matches!(
            controller.initialize().await,
            Err(GobbleError::Connection(_))
        ));
        sleep(Duration::from_secs(600)).await;
        assert_eq!(session.connect_attempts(), 1);
        assert_eq!(handle.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hello_is_answered() {
        let session = Arc::new(MockSession::new());
        let bot = controller(&session, greeter()).initialize().await.unwrap();
        assert_eq!(bot.state(), SessionState::Connected);
        assert_eq!(session.tokens(), vec![TOKEN]);

        session.push_event(message("U1", "edi hello"));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(session.sent(), vec![sent("C1", "Hello <@U1>")]);
        bot.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_filtered_events_are_not_dispatched() {
        let session = Arc::new(MockSession::new());
        let bot = controller(&session, greeter()).initialize().await.unwrap();

        let mut hidden = message("U1", "edi hello");
        hidden["hidden"] = json!(true);
        session.push_events([
            hidden,
            message(gobble_transport::MOCK_BOT_ID, "edi hello"),
            message("U1", "hello there"),
            json!({"text": "edi hello", "user": "U1", "channel": "C1"}),
            json!({"type": "presence_change", "user": "U1"}),
        ]);
        sleep(Duration::from_millis(50)).await;

        assert!(session.sent().is_empty());
        assert_eq!(bot.state(), SessionState::Connected);
        bot.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_order_and_alias() {
        let session = Arc::new(MockSession::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let registry = HandlerRegistry::builder()
            .listen(".*", move |message: Message, _captures: Captures| {
                let log = log.clone();
                async move {
                    log.lock().push(message.text().to_string());
                    Ok::<_, anyhow::Error>(())
                }
            })
            .build()
            .unwrap();
        let bot = controller(&session, registry).initialize().await.unwrap();

        session.push_events([
            message("U1", "edi first"),
            message("U2", "ask normandy second"),
            message("U3", "<@UJFIDFJDFAKE> third"),
        ]);
        session.push_event(message("U1", "edi fourth"));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(
            *seen.lock(),
            vec!["first", "ask normandy second", "third", "fourth"]
        );
        bot.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_with_backoff() {
        let session = Arc::new(MockSession::new());
        let bot = controller(&session, greeter()).initialize().await.unwrap();
        let handle = bot.handle();

        session.push_event(json!({"type": "hello"}));
        session.fail_connect_times(3, "offline");
        session.push_read_error(TransportError::closed("server restart"));

        // First reconnect is immediate, then 2 s, 4 s and 8 s plus jitter.
        sleep(Duration::from_millis(500)).await;
        assert_eq!(session.connect_attempts(), 2);
        assert_eq!(handle.retry_count(), 1);
        assert_eq!(handle.state(), SessionState::Connecting);

        sleep(Duration::from_secs(3)).await;
        assert_eq!(session.connect_attempts(), 3);
        assert_eq!(handle.retry_count(), 2);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(session.connect_attempts(), 5);
        assert_eq!(handle.retry_count(), 0);
        assert_eq!(handle.state(), SessionState::Connected);

        session.push_event(message("U1", "edi hello"));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(session.sent(), vec![sent("C1", "Hello <@U1>")]);

        bot.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flapping_connection_backs_off() {
        let session = Arc::new(MockSession::new());
        let bot = controller(&session, greeter()).initialize().await.unwrap();
        let handle = bot.handle();

        for _ in 0..20 {
            session.push_read_error(TransportError::closed("dropped"));
        }

        sleep(Duration::from_millis(10)).await;
        assert_eq!(session.connect_attempts(), 1);
        assert_eq!(handle.retry_count(), 1);
        assert_eq!(handle.state(), SessionState::Connecting);

        // Reconnects at 2-3 s, then the next drop waits 4-5 s.
        sleep(Duration::from_millis(3100)).await;
        assert_eq!(session.connect_attempts(), 2);
        assert_eq!(handle.retry_count(), 2);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(session.connect_attempts(), 3);
        assert_eq!(handle.retry_count(), 3);

        bot.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_after_good_read_reconnects_at_once() {
        let session = Arc::new(MockSession::new());
        let bot = controller(&session, greeter()).initialize().await.unwrap();
        let handle = bot.handle();

        session.push_event(message("U1", "edi hello"));
        session.push_read_error(TransportError::closed("server restart"));
        sleep(Duration::from_millis(10)).await;

        assert_eq!(session.connect_attempts(), 2);
        assert_eq!(handle.retry_count(), 0);
        assert_eq!(handle.state(), SessionState::Connected);
        assert_eq!(session.sent(), vec![sent("C1", "Hello <@U1>")]);
        bot.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff() {
        let session = Arc::new(MockSession::new());
        let bot = controller(&session, greeter()).initialize().await.unwrap();
        let handle = bot.handle();

        session.fail_connect_times(10, "offline");
        session.push_read_error(TransportError::closed("gone"));
        sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.state(), SessionState::Connecting);

        bot.shutdown().await.unwrap();
        assert_eq!(handle.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_twice_fails() {
        let session = Arc::new(MockSession::new());
        let controller = controller(&session, greeter());
        let handle = controller.handle();
        let bot = controller.initialize().await.unwrap();

        let mut outbound = Message::outbound("C1", "once");
        let ack = handle.send(&mut outbound).await.unwrap();
        assert!(ack.ok);
        assert!(outbound.is_sent());
        assert_eq!(outbound.timestamp(), ack.timestamp.as_deref());
        assert!(matches!(
            handle.send(&mut outbound).await,
            Err(GobbleError::AlreadySent)
        ));

        let identity = handle.identity().unwrap();
        let event = RawEvent::new(json!({
            "type": "message", "user": "U1", "text": "edi hi",
            "channel": "C1", "ts": "1459618786.000032"
        }));
        let mut parsed = Message::from_event(&event, &identity).unwrap();
        assert!(matches!(
            handle.send(&mut parsed).await,
            Err(GobbleError::AlreadySent)
        ));

        assert_eq!(session.sent(), vec![sent("C1", "once")]);
        bot.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_quick_send_and_rejection() {
        let session = Arc::new(MockSession::new());
        let bot = controller(&session, greeter()).initialize().await.unwrap();
        let handle = bot.handle();

        assert!(handle.quick_send("status green", "C9").await.unwrap().ok);

        session.reject_next_send("channel_not_found");
        let ack = handle.quick_send("lost", "C404").await.unwrap();
        assert!(!ack.ok);

        assert_eq!(
            session.sent(),
            vec![sent("C9", "status green"), sent("C404", "lost")]
        );
        bot.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_is_explicit_at() {
        let session = Arc::new(MockSession::new());
        let controller = controller(&session, greeter());
        let at = RawEvent::new(message("U1", "<@UJFIDFJDFAKE> hi"));
        assert!(!controller.is_explicit_at(&at));

        let bot = controller.initialize().await.unwrap();
        let handle = bot.handle();
        assert!(handle.is_explicit_at(&at));
        assert!(!handle.is_explicit_at(&RawEvent::new(message("U1", "edi hi"))));
        bot.shutdown().await.unwrap();
    }
}
