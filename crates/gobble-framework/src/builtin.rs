//! Greeting handlers every bot can opt into.

use gobble_core::Message;

use crate::handler::{Captures, HandlerResult};
use crate::registry::RegistryBuilder;

/// Reply to "How's the new body working out?".
pub const NEW_BODY_REPLY: &str = "It is interesting. The crew are approaching this platform \
to speak with me, even though they can do so anywhere on the ship. It's as if they wish to \
treat me as part of the crew. I am not, but this changes my perspective. I like it. ";

/// Adds the greeting handlers to `builder`.
pub fn greetings(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .listen("hello", hello)
        .listen("hi", hello)
        .listen("good (morning|afternoon|evening)", good_time_of_day)
        .listen("ping", ping)
        .listen(&regex::escape("How's the new body working out?"), new_body)
}

async fn hello(mut message: Message, _captures: Captures) -> HandlerResult {
    let text = format!("Hello <@{}>", message.sender().unwrap_or_default());
    message.respond(text).await?;
    Ok(())
}

async fn good_time_of_day(mut message: Message, captures: Captures) -> HandlerResult {
    let when = captures.get(0).unwrap_or("day").to_lowercase();
    let text = format!("Good {when} <@{}>", message.sender().unwrap_or_default());
    message.respond(text).await?;
    Ok(())
}

async fn ping(mut message: Message, _captures: Captures) -> HandlerResult {
    message.respond("pong").await?;
    Ok(())
}

async fn new_body(mut message: Message, _captures: Captures) -> HandlerResult {
    message.reply(NEW_BODY_REPLY).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gobble_core::{GobbleResult, MessageSender, RawEvent, SendAck, SessionIdentity};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<String>>);

    #[async_trait]
    impl MessageSender for Outbox {
        async fn send_message(&self, message: &mut Message) -> GobbleResult<SendAck> {
            self.0.lock().push(message.raw_text().to_string());
            message.mark_sent(Some("1.0".into()));
            Ok(SendAck::accepted("1.0"))
        }
    }

    async fn say(text: &str) -> Vec<String> {
        let outbox = Arc::new(Outbox::default());
        let registry = greetings(RegistryBuilder::new()).build().unwrap();
        let event = RawEvent::new(json!({"user": "U1", "channel": "C1", "text": text}));
        let message = Message::from_event(&event, &SessionIdentity::new("UBOT", "edi"))
            .unwrap()
            .with_sender(outbox.clone());
        registry.dispatch(&message).await;
        let sent = outbox.0.lock().clone();
        sent
    }

    #[tokio::test]
    async fn test_hello_and_hi() {
        assert_eq!(say("edi hello").await, vec!["Hello <@U1>"]);
        assert_eq!(say("edi Hi").await, vec!["Hello <@U1>"]);
    }

    #[tokio::test]
    async fn test_time_of_day() {
        assert_eq!(say("edi good morning").await, vec!["Good morning <@U1>"]);
        assert_eq!(say("edi Good Evening").await, vec!["Good evening <@U1>"]);
    }

    #[tokio::test]
    async fn test_ping() {
        assert_eq!(say("edi ping").await, vec!["pong"]);
        assert!(say("edi pong").await.is_empty());
    }

    #[tokio::test]
    async fn test_new_body() {
        let sent = say("edi how's the new body working out?").await;
        assert_eq!(sent, vec![format!("<@U1> {NEW_BODY_REPLY}")]);
    }
}
