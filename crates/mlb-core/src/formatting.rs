//! Formatting utilities (Telegram HTML, list views, setting values).

use serde_json::Value;

use crate::{commands::encode_shortcut, domain::ListSummary};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Which half of the list view a section renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Groups,
    Channels,
}

impl ListKind {
    fn title(self) -> &'static str {
        match self {
            ListKind::Groups => "Super Groups",
            ListKind::Channels => "Channels",
        }
    }
}

/// Render one section of the public list view as `(text, html)`.
///
/// The text is a short header; the HTML carries one block per list with a join shortcut.
pub fn render_list_view(
    kind: ListKind,
    bot_addr: &str,
    prefix: &str,
    chats: &[ListSummary],
) -> (String, String) {
    let text = format!("⬇️ {} ({}) ⬇️", kind.title(), chats.len());

    let mut blocks = Vec::with_capacity(chats.len() + 1);
    for chat in chats {
        let mut block = format!("<b>{}</b>", escape_html(&chat.name));
        if !chat.topic.trim().is_empty() {
            block.push_str(&format!("\n<i>{}</i>", escape_html(chat.topic.trim())));
        }
        let last_post = chat
            .last_post
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        block.push_str(&format!(
            "\n👤 {} · 📅 {}",
            chat.member_count,
            escape_html(&last_post)
        ));
        if !chat.language.is_empty() {
            block.push_str(&format!(" · 🌐 {}", escape_html(&chat.language)));
        }
        block.push_str(&format!(
            "\n/{}join_{}",
            escape_html(prefix),
            encode_shortcut(&chat.list_id)
        ));
        blocks.push(block);
    }
    blocks.push(format!("<i>via {}</i>", escape_html(bot_addr)));

    (text, blocks.join("\n\n"))
}

/// English name of a list language code (`en`, `pt_BR`); unknown codes are returned as-is.
pub fn language_name(code: &str) -> String {
    let name = match code {
        "ar" => "Arabic",
        "ca" => "Catalan",
        "cs" => "Czech",
        "da" => "Danish",
        "de" => "German",
        "el" => "Greek",
        "en" => "English",
        "es" => "Spanish",
        "fi" => "Finnish",
        "fr" => "French",
        "hu" => "Hungarian",
        "it" => "Italian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "nl" => "Dutch",
        "no" => "Norwegian",
        "pl" => "Polish",
        "pt" => "Portuguese",
        "pt_BR" => "Portuguese (Brazil)",
        "ro" => "Romanian",
        "ru" => "Russian",
        "sv" => "Swedish",
        "tr" => "Turkish",
        "uk" => "Ukrainian",
        "zh_CN" => "Chinese (China)",
        "zh_TW" => "Chinese (Taiwan)",
        other => other,
    };
    name.to_string()
}

/// Render a setting value the way it is echoed back in `key=value` replies.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(display_value).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("'{k}': {}", display_value(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn list_view_has_header_and_join_shortcuts() {
        let chats = vec![ListSummary {
            list_id: "news.example.com".to_string(),
            name: "News <daily>".to_string(),
            topic: "world".to_string(),
            language: "English".to_string(),
            last_post: NaiveDate::from_ymd_opt(2024, 1, 2),
            member_count: 7,
        }];
        let (text, html) = render_list_view(ListKind::Channels, "bot@example.com", "ml", &chats);
        assert_eq!(text, "⬇️ Channels (1) ⬇️");
        assert!(html.contains("<b>News &lt;daily&gt;</b>"));
        assert!(html.contains("2024-01-02"));
        assert!(html.contains("🌐 English"));
        assert!(html.contains("/mljoin_news__example__com"));
        assert!(html.contains("bot@example.com"));
    }

    #[test]
    fn language_codes_map_to_names() {
        assert_eq!(language_name("en"), "English");
        assert_eq!(language_name("pt_BR"), "Portuguese (Brazil)");
        assert_eq!(language_name("xx"), "xx");
    }

    #[test]
    fn display_value_mirrors_repr() {
        assert_eq!(display_value(&json!("x")), "'x'");
        assert_eq!(display_value(&json!(false)), "False");
        assert_eq!(display_value(&json!(null)), "None");
        assert_eq!(display_value(&json!(["a", 1])), "['a', 1]");
    }
}
