use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use serde_json::Value;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// The identity a command runs as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    /// Resolved address of the sender.
    pub address: String,
    /// Global bot administrator.
    pub is_admin: bool,
}

/// Membership role on a single list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Member,
    Owner,
    Moderator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Owner => "owner",
            Role::Moderator => "moderator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Role::Member),
            "owner" => Some(Role::Owner),
            "moderator" => Some(Role::Moderator),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mailing list as returned by the list service.
#[derive(Clone, Debug, PartialEq)]
pub struct MailingList {
    /// Stable id, typically `localpart.domain`.
    pub list_id: String,
    /// Posting address, `localpart@domain`.
    pub fqdn_listname: String,
    pub display_name: String,
    pub member_count: u64,
}

/// One subscription of an address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub list_id: String,
    pub address: String,
    pub role: Role,
}

/// Directory account; `addresses[0]` is the primary address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub user_id: String,
    pub addresses: Vec<String>,
}

/// Options passed to the remote subscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub pre_verified: bool,
    pub pre_confirmed: bool,
    pub send_welcome_message: bool,
}

impl SubscribeOptions {
    /// Subscribe without any confirmation round trip and greet the new member.
    pub fn immediate() -> Self {
        Self {
            pre_verified: true,
            pre_confirmed: true,
            send_welcome_message: true,
        }
    }
}

/// Where a ban applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BanScope<'a> {
    /// Every list on the site.
    Global,
    /// One list, by list id.
    List(&'a str),
}

/// Creation style understood by the remote service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListStyle {
    /// `channel`: only designated posters may send.
    Announce,
    /// `group`: members may post.
    Discussion,
    /// Any other style name, passed through verbatim.
    Named(String),
}

impl ListStyle {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "channel" => ListStyle::Announce,
            "group" => ListStyle::Discussion,
            other => ListStyle::Named(other.to_string()),
        }
    }

    pub fn style_name(&self) -> &str {
        match self {
            ListStyle::Announce => "legacy-announce",
            ListStyle::Discussion => "legacy-default",
            ListStyle::Named(name) => name,
        }
    }
}

/// Well-known setting keys this bot reads or writes.
pub mod keys {
    pub const INFO: &str = "info";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const DESCRIPTION: &str = "description";
    pub const ALLOW_LIST_POSTS: &str = "allow_list_posts";
    pub const ADVERTISED: &str = "advertised";
    pub const ACCEPT_THESE_NONMEMBERS: &str = "accept_these_nonmembers";
    pub const ACCEPTABLE_ALIASES: &str = "acceptable_aliases";
    pub const PREFERRED_LANGUAGE: &str = "preferred_language";
    pub const LAST_POST_AT: &str = "last_post_at";
    pub const PROCESS_BOUNCES: &str = "process_bounces";
    pub const ANONYMOUS_LIST: &str = "anonymous_list";
}

/// Opaque key/value bag of list settings.
///
/// Only the keys in [`keys`] get typed accessors; everything else round-trips
/// untouched. `dirty` tracks which keys were written since the last load so the
/// adapter only sends what changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListSettings {
    values: BTreeMap<String, Value>,
    dirty: Vec<String>,
}

impl ListSettings {
    pub fn from_map(values: BTreeMap<String, Value>) -> Self {
        Self {
            values,
            dirty: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
        if !self.dirty.iter().any(|k| k == key) {
            self.dirty.push(key.to_string());
        }
    }

    /// Keys written since load, in write order.
    pub fn changed(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.dirty
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.as_str(), v)))
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn info(&self) -> &str {
        self.str_value(keys::INFO).unwrap_or("")
    }

    pub fn display_name(&self) -> Option<&str> {
        self.str_value(keys::DISPLAY_NAME)
    }

    pub fn allow_list_posts(&self) -> bool {
        self.values
            .get(keys::ALLOW_LIST_POSTS)
            .map(value_as_bool)
            .unwrap_or(false)
    }

    /// Date part of `last_post_at`, if the list has ever seen a post.
    pub fn last_post_date(&self) -> Option<NaiveDate> {
        let raw = self.str_value(keys::LAST_POST_AT)?;
        let date = raw.split('T').next()?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn accept_these_nonmembers(&self) -> Vec<String> {
        self.string_list(keys::ACCEPT_THESE_NONMEMBERS)
    }

    pub fn acceptable_aliases(&self) -> Vec<String> {
        self.string_list(keys::ACCEPTABLE_ALIASES)
    }

    /// Language code such as `en` or `pt_BR`.
    pub fn preferred_language(&self) -> Option<&str> {
        self.str_value(keys::PREFERRED_LANGUAGE)
    }
}

/// Interpret the loose booleans the remote service hands back (`true`, `"True"`, `"yes"`, 1).
pub fn value_as_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|i| i != 0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        _ => false,
    }
}

/// Row shown in the list view.
#[derive(Clone, Debug, PartialEq)]
pub struct ListSummary {
    pub list_id: String,
    pub name: String,
    pub topic: String,
    /// Human-readable preferred language; empty when unset.
    pub language: String,
    pub last_post: Option<NaiveDate>,
    pub member_count: u64,
}
