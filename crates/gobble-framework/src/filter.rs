//! Deciding which events the bot answers.
//!
//! Rules are checked in order and the first applicable one decides:
//!
//! 1. hidden events are ignored
//! 2. events authored by the bot itself are ignored
//! 3. text starting with `"<name> "` or `<@id>` is addressed to the bot
//! 4. text mentioning an alias anywhere but the very start is addressed to
//!    the bot
//!
//! Everything else is ignored. Comparisons ignore case.

use gobble_core::text::{find_ignore_case, starts_with_ignore_case};
use gobble_core::{RawEvent, SessionIdentity};

/// Why an event was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The backend marked the event hidden.
    Hidden,
    /// The bot sent this event.
    SelfAuthored,
    /// The text starts with the bot name or an at-mention of the bot.
    Addressed,
    /// The text mentions one of the configured aliases.
    AliasMentioned,
    /// Nothing in the event concerns the bot.
    NotAddressed,
}

impl Verdict {
    /// Whether the bot should act on the event.
    pub fn is_respondable(self) -> bool {
        matches!(self, Self::Addressed | Self::AliasMentioned)
    }
}

/// Event filter bound to a bot identity and its aliases.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    bot_name: String,
    bot_id: String,
    aliases: Vec<String>,
}

impl MessageFilter {
    /// Creates a filter for `identity`.
    pub fn new(identity: &SessionIdentity, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            bot_name: identity.name.clone(),
            bot_id: identity.id.clone(),
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Classifies an event.
    pub fn classify(&self, event: &RawEvent) -> Verdict {
        classify(event, &self.bot_name, &self.bot_id, &self.aliases)
    }

    /// Whether the bot should act on `event`.
    pub fn is_respondable(&self, event: &RawEvent) -> bool {
        self.classify(event).is_respondable()
    }

    /// Whether `event` text starts with an at-mention of the bot.
    pub fn is_explicit_at(&self, event: &RawEvent) -> bool {
        is_explicit_at(event, &self.bot_id)
    }
}

/// Classifies `event` against a bot name, id and alias list.
pub fn classify(event: &RawEvent, bot_name: &str, bot_id: &str, aliases: &[String]) -> Verdict {
    if event.is_hidden() {
        return Verdict::Hidden;
    }
    if event.user() == Some(bot_id) {
        return Verdict::SelfAuthored;
    }

    let text = event.text().unwrap_or_default();
    if starts_with_ignore_case(text, &format!("{bot_name} "))
        || starts_with_ignore_case(text, &format!("<@{bot_id}>"))
    {
        return Verdict::Addressed;
    }

    // An alias at the very start does not count.
    let mentioned = aliases
        .iter()
        .filter(|alias| !alias.is_empty())
        .any(|alias| matches!(find_ignore_case(text, alias), Some(pos) if pos > 0));
    if mentioned {
        Verdict::AliasMentioned
    } else {
        Verdict::NotAddressed
    }
}

/// Whether the bot should act on `event`.
pub fn is_respondable(event: &RawEvent, bot_name: &str, bot_id: &str, aliases: &[String]) -> bool {
    classify(event, bot_name, bot_id, aliases).is_respondable()
}

/// Whether `event` text starts with `<@bot_id>`, ignoring case.
pub fn is_explicit_at(event: &RawEvent, bot_id: &str) -> bool {
    starts_with_ignore_case(event.text().unwrap_or_default(), &format!("<@{bot_id}>"))
}
