//! Command table: every chat command, its name and privilege, built once at startup.

use std::collections::HashSet;

use crate::{errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Help,
    List,
    Join,
    Leave,
    AddMember,
    RemoveMember,
    Roles,
    Delete,
    Create,
    Settings,
    AddOwner,
    RemoveOwner,
    AddModerator,
    RemoveModerator,
    Name,
    Topic,
    BanUser,
    UnbanUser,
    GlobalBan,
    GlobalUnban,
    Link,
    Unlink,
}

impl CommandKind {
    pub const ALL: [CommandKind; 22] = [
        CommandKind::Help,
        CommandKind::List,
        CommandKind::Join,
        CommandKind::Leave,
        CommandKind::AddMember,
        CommandKind::RemoveMember,
        CommandKind::Roles,
        CommandKind::Delete,
        CommandKind::Create,
        CommandKind::Settings,
        CommandKind::AddOwner,
        CommandKind::RemoveOwner,
        CommandKind::AddModerator,
        CommandKind::RemoveModerator,
        CommandKind::Name,
        CommandKind::Topic,
        CommandKind::BanUser,
        CommandKind::UnbanUser,
        CommandKind::GlobalBan,
        CommandKind::GlobalUnban,
        CommandKind::Link,
        CommandKind::Unlink,
    ];

    /// Unprefixed names; the first one is canonical.
    pub fn names(self) -> &'static [&'static str] {
        match self {
            CommandKind::Help => &["help", "start"],
            CommandKind::List => &["list"],
            CommandKind::Join => &["join"],
            CommandKind::Leave => &["leave"],
            CommandKind::AddMember => &["add_member"],
            CommandKind::RemoveMember => &["remove_member"],
            CommandKind::Roles => &["roles"],
            CommandKind::Delete => &["delete"],
            CommandKind::Create => &["create"],
            CommandKind::Settings => &["settings"],
            CommandKind::AddOwner => &["add_owner"],
            CommandKind::RemoveOwner => &["remove_owner"],
            CommandKind::AddModerator => &["add_moderator"],
            CommandKind::RemoveModerator => &["remove_moderator"],
            CommandKind::Name => &["name"],
            CommandKind::Topic => &["topic"],
            CommandKind::BanUser => &["banUser"],
            CommandKind::UnbanUser => &["unbanUser"],
            CommandKind::GlobalBan => &["globalBan"],
            CommandKind::GlobalUnban => &["globalUnban"],
            CommandKind::Link => &["link"],
            CommandKind::Unlink => &["unlink"],
        }
    }

    /// Admin-only commands are refused before the handler runs.
    ///
    /// `name`, `topic` and the list-scoped ban commands are open here and gated
    /// per list by [`crate::permission::may_moderate`] instead.
    pub fn admin(self) -> bool {
        !matches!(
            self,
            CommandKind::Help
                | CommandKind::List
                | CommandKind::Join
                | CommandKind::Leave
                | CommandKind::Name
                | CommandKind::Topic
                | CommandKind::BanUser
                | CommandKind::UnbanUser
        )
    }

    pub fn usage(self) -> &'static str {
        match self {
            CommandKind::Help | CommandKind::List => "",
            CommandKind::Join | CommandKind::Roles | CommandKind::Delete => "<list-id>",
            CommandKind::Leave => "[list-id]",
            CommandKind::Create => "<channel|group> <address> <name>",
            CommandKind::Settings => "<list-id> <key> [value]",
            CommandKind::Name => "<list-id> <name>",
            CommandKind::Topic => "<list-id> <topic>",
            CommandKind::GlobalBan | CommandKind::GlobalUnban => "<address>",
            CommandKind::Link | CommandKind::Unlink => "<channel-id> <group-id>",
            CommandKind::AddMember
            | CommandKind::RemoveMember
            | CommandKind::AddOwner
            | CommandKind::RemoveOwner
            | CommandKind::AddModerator
            | CommandKind::RemoveModerator
            | CommandKind::BanUser
            | CommandKind::UnbanUser => "<list-id> <address>",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            CommandKind::Help => "show this help",
            CommandKind::List => "show the public super groups and channels",
            CommandKind::Join => "join the given super group or channel",
            CommandKind::Leave => "leave a super group or channel, or list the ones you joined",
            CommandKind::AddMember => "add an address to a super group or channel",
            CommandKind::RemoveMember => "remove an address from a super group or channel",
            CommandKind::Roles => "show owners and moderators",
            CommandKind::Delete => "delete a mailing list",
            CommandKind::Create => "create a new mailing list",
            CommandKind::Settings => "read or change a mailing list setting",
            CommandKind::AddOwner => "add an owner",
            CommandKind::RemoveOwner => "remove an owner",
            CommandKind::AddModerator => "add a moderator",
            CommandKind::RemoveModerator => "remove a moderator",
            CommandKind::Name => "set the name of a super group or channel",
            CommandKind::Topic => "set the topic of a super group or channel",
            CommandKind::BanUser => "ban an address from a super group or channel",
            CommandKind::UnbanUser => "unban an address from a super group or channel",
            CommandKind::GlobalBan => "ban an address from every mailing list",
            CommandKind::GlobalUnban => "lift a site-wide ban",
            CommandKind::Link => "let a channel post into a group",
            CommandKind::Unlink => "undo a channel/group link",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub kind: CommandKind,
    /// Full, prefix-qualified name.
    pub name: String,
    pub admin: bool,
}

/// A resolved invocation: which command, and what payload it got.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub spec: &'a CommandSpec,
    pub payload: String,
}

#[derive(Clone, Debug, Default)]
pub struct CommandTable {
    prefix: String,
    specs: Vec<CommandSpec>,
    seen: HashSet<String>,
}

impl CommandTable {
    /// Register every [`CommandKind`] under `prefix`.
    pub fn new(prefix: &str) -> Result<Self> {
        let mut table = Self::empty(prefix);
        for kind in CommandKind::ALL {
            for name in kind.names() {
                table.register(name, kind, kind.admin())?;
            }
        }
        Ok(table)
    }

    pub fn empty(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            ..Default::default()
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register `name` (unprefixed). Duplicate names are a configuration error.
    pub fn register(&mut self, name: &str, kind: CommandKind, admin: bool) -> Result<()> {
        let full = format!("{}{name}", self.prefix);
        if !self.seen.insert(full.to_lowercase()) {
            return Err(Error::Config(format!("duplicate command name: /{full}")));
        }
        self.specs.push(CommandSpec {
            kind,
            name: full,
            admin,
        });
        Ok(())
    }

    /// Canonical (first-registered) spec for a kind.
    pub fn spec(&self, kind: CommandKind) -> Option<&CommandSpec> {
        self.specs.iter().find(|s| s.kind == kind)
    }

    /// Match `cmd` (without the leading `/`) case-insensitively.
    ///
    /// Also accepts the underscore form `join_<payload>`: the longest registered
    /// name followed by `_` wins and the rest becomes the payload, ahead of any
    /// whitespace-separated `args`.
    pub fn lookup(&self, cmd: &str, args: &str) -> Option<Invocation<'_>> {
        let cmd_lower = cmd.to_lowercase();
        if let Some(spec) = self.specs.iter().find(|s| s.name.to_lowercase() == cmd_lower) {
            return Some(Invocation {
                spec,
                payload: args.trim().to_string(),
            });
        }

        let spec = self
            .specs
            .iter()
            .filter(|s| {
                let name = s.name.to_lowercase();
                cmd_lower.len() > name.len() + 1
                    && cmd_lower.starts_with(&name)
                    && cmd_lower.as_bytes()[name.len()] == b'_'
            })
            .max_by_key(|s| s.name.len())?;

        let raw = cmd.get(spec.name.len() + 1..)?;
        let inline = decode_shortcut(raw).unwrap_or_else(|| raw.to_string());
        let payload = if args.trim().is_empty() {
            inline
        } else {
            format!("{inline} {}", args.trim())
        };
        Some(Invocation { spec, payload })
    }

    /// Help listing; admin-only commands are shown only to admins.
    pub fn help_text(&self, is_admin: bool) -> String {
        let mut lines = vec!["Available commands:".to_string()];
        for kind in CommandKind::ALL {
            if kind.admin() && !is_admin {
                continue;
            }
            let Some(spec) = self.spec(kind) else {
                continue;
            };
            let usage = kind.usage();
            let head = if usage.is_empty() {
                format!("/{}", spec.name)
            } else {
                format!("/{} {usage}", spec.name)
            };
            let marker = if kind.admin() { " (admin)" } else { "" };
            lines.push(format!("{head} - {}{marker}", kind.help()));
        }
        lines.join("\n")
    }
}

/// Encode a list id so a tappable `/cmd_<id>` shortcut survives Telegram's
/// command parsing, which stops at the first character outside `[A-Za-z0-9_]`.
///
/// ASCII alphanumerics pass through, `.` becomes `__` and every other byte
/// becomes `_` plus two hex digits.
pub fn encode_shortcut(id: &str) -> String {
    let mut out = String::with_capacity(id.len() * 2);
    for b in id.bytes() {
        match b {
            b if b.is_ascii_alphanumeric() => out.push(b as char),
            b'.' => out.push_str("__"),
            b => out.push_str(&format!("_{b:02x}")),
        }
    }
    out
}

/// Inverse of [`encode_shortcut`]. `None` when `s` is not a well-formed encoding,
/// e.g. an id typed out by hand.
pub fn decode_shortcut(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' if bytes.get(i + 1) == Some(&b'_') => {
                out.push(b'.');
                i += 2;
            }
            b'_' => {
                let hex = s.get(i + 1..i + 3)?;
                if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}
