/// One reply produced by a command handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Rich rendering; messengers without HTML fall back to `text`.
    pub html: Option<String>,
    /// Quote (reply to) the triggering message.
    pub quote: bool,
}

impl Reply {
    /// Plain text, quoting the triggering message.
    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: None,
            quote: true,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: None,
            quote: false,
        }
    }

    pub fn html(text: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: Some(html.into()),
            quote: false,
        }
    }
}

/// Outgoing "chat action" (typing indicator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_html: bool,
    pub supports_quotes: bool,
    pub supports_chat_actions: bool,
    pub max_message_len: usize,
}
