//! Command dispatch: resolve the caller, look up the command, enforce the
//! admin flag, run the handler and turn any failure into a reply.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    address,
    commands::{CommandKind, CommandSpec, CommandTable},
    config::Config,
    domain::{Caller, MailingList},
    errors::Error,
    messaging::types::Reply,
    ports::ListService,
    Result,
};

pub const INVALID_ID: &str = "❌ Invalid ID";
pub const NOT_A_MEMBER: &str = "❌ You are not a member of that group/channel";
pub const NO_SUBSCRIPTIONS: &str = "❌ You are not member of any group or channel";
pub const PERMISSION_DENIED: &str = "❌ You don't have enough permissions to perform that action";
pub const ADMIN_ONLY: &str = "❌ This command is restricted to administrators";
pub const EMPTY_LIST: &str = "❌ Empty List";

/// The bot's command core, shared by every transport.
pub struct Bot {
    pub(crate) cfg: Arc<Config>,
    pub(crate) service: Arc<dyn ListService>,
    table: CommandTable,
}

impl Bot {
    pub fn new(cfg: Arc<Config>, service: Arc<dyn ListService>) -> Result<Self> {
        let table = CommandTable::new(&cfg.command_prefix)?;
        Ok(Self {
            cfg,
            service,
            table,
        })
    }

    /// Identify a sender from a chat handle (bare local part or full address).
    pub async fn caller(&self, handle: &str) -> Caller {
        let resolved = address::resolve(self.service.as_ref(), handle, &self.cfg.domain).await;
        let is_admin = self.cfg.is_admin(&resolved.address);
        Caller {
            address: resolved.address,
            is_admin,
        }
    }

    /// Run the command `cmd` (no leading `/`). `None` when no such command is registered.
    pub async fn handle(&self, caller: &Caller, cmd: &str, args: &str) -> Option<Vec<Reply>> {
        let inv = self.table.lookup(cmd, args)?;
        let spec = inv.spec;

        if spec.admin && !caller.is_admin {
            info!(command = %spec.name, caller = %caller.address, "refused admin-only command");
            return Some(vec![Reply::quoted(ADMIN_ONLY)]);
        }

        debug!(command = %spec.name, caller = %caller.address, payload = %inv.payload, "dispatching");
        let res = self.run(spec, caller, &inv.payload).await;
        Some(match res {
            Ok(replies) => replies,
            Err(e) => {
                warn!(command = %spec.name, caller = %caller.address, error = %e, "command failed");
                vec![Reply::quoted(failure_text(spec.kind, &e))]
            }
        })
    }

    async fn run(&self, spec: &CommandSpec, caller: &Caller, payload: &str) -> Result<Vec<Reply>> {
        match spec.kind {
            CommandKind::Help => Ok(vec![Reply::quoted(self.table.help_text(caller.is_admin))]),
            CommandKind::List => self.list_cmd().await,
            CommandKind::Join => self.join(caller, payload).await,
            CommandKind::Leave => self.leave(caller, payload).await,
            CommandKind::AddMember => self.add_member(spec, payload).await,
            CommandKind::RemoveMember => self.remove_member(spec, payload).await,
            CommandKind::Roles => self.roles(payload).await,
            CommandKind::Delete => self.delete(payload).await,
            CommandKind::Create => self.create(spec, payload).await,
            CommandKind::Settings => self.settings_cmd(spec, payload).await,
            CommandKind::AddOwner
            | CommandKind::RemoveOwner
            | CommandKind::AddModerator
            | CommandKind::RemoveModerator => self.change_role(spec, payload).await,
            CommandKind::Name | CommandKind::Topic => {
                self.set_metadata(spec, caller, payload).await
            }
            CommandKind::BanUser | CommandKind::UnbanUser => {
                self.list_ban(spec, caller, payload).await
            }
            CommandKind::GlobalBan | CommandKind::GlobalUnban => {
                self.global_ban(spec, payload).await
            }
            CommandKind::Link | CommandKind::Unlink => self.link(spec, payload).await,
        }
    }

    /// Look up a list, mapping "unknown to the service" to `Ok(None)`.
    pub(crate) async fn find_list(&self, list_id: &str) -> Result<Option<MailingList>> {
        let list_id = list_id.trim();
        if list_id.is_empty() {
            return Ok(None);
        }
        match self.service.get_list(list_id).await {
            Ok(list) => Ok(Some(list)),
            Err(e) if e.is_invalid_id() => {
                debug!(list_id, error = %e, "list lookup failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`Bot::find_list`] but unknown lists are an error.
    pub(crate) async fn require_list(&self, list_id: &str) -> Result<MailingList> {
        self.service.get_list(list_id.trim()).await
    }

    pub(crate) async fn resolve(&self, raw: &str) -> String {
        address::resolve(self.service.as_ref(), raw, &self.cfg.domain)
            .await
            .address
    }

    pub(crate) fn prefix(&self) -> &str {
        self.table.prefix()
    }
}

fn failure_text(kind: CommandKind, e: &Error) -> String {
    match kind {
        CommandKind::Create => format!("❌ Failed to create mailing list: {e}"),
        _ => format!("❌ Error: {e}"),
    }
}

/// Split on whitespace into at most `max_parts`; the last part keeps its inner spacing.
pub(crate) fn split_max(payload: &str, max_parts: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = payload.trim();
    while !rest.is_empty() && max_parts > 0 {
        if out.len() + 1 == max_parts {
            out.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(i) => {
                out.push(&rest[..i]);
                rest = rest[i..].trim_start();
            }
            None => {
                out.push(rest);
                break;
            }
        }
    }
    out
}

/// `<a> <b...>` payloads.
pub(crate) fn two_args<'p>(spec: &CommandSpec, payload: &'p str) -> Result<(&'p str, &'p str)> {
    match split_max(payload, 2).as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(usage_error(spec)),
    }
}

pub(crate) fn usage_error(spec: &CommandSpec) -> Error {
    Error::InvalidArgs(format!("usage: /{} {}", spec.name, spec.kind.usage()))
}
