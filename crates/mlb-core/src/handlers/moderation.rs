use tracing::info;

use crate::{
    bot::{two_args, usage_error, Bot, PERMISSION_DENIED},
    commands::{CommandKind, CommandSpec},
    domain::{BanScope, Caller, Role},
    messaging::types::Reply,
    permission::may_moderate,
    Result,
};

impl Bot {
    /// Owner/moderator grants and revocations (admin-only at the router).
    pub(crate) async fn change_role(&self, spec: &CommandSpec, payload: &str) -> Result<Vec<Reply>> {
        let (list_id, addr) = two_args(spec, payload)?;
        let list = self.require_list(list_id).await?;

        let (role, adding, done) = match spec.kind {
            CommandKind::AddOwner => (Role::Owner, true, format!("{addr} added as owner")),
            CommandKind::RemoveOwner => (Role::Owner, false, format!("{addr} removed from owners")),
            CommandKind::AddModerator => {
                (Role::Moderator, true, format!("{addr} added as moderator"))
            }
            _ => (
                Role::Moderator,
                false,
                format!("{addr} removed from moderators"),
            ),
        };

        if adding {
            self.service.add_role(&list.list_id, addr, role).await?;
        } else {
            self.service.remove_role(&list.list_id, addr, role).await?;
        }
        info!(list_id = %list.list_id, address = addr, %role, adding, "role changed");
        Ok(vec![Reply::quoted(done)])
    }

    /// `banUser` / `unbanUser` on one list, gated by owner/moderator rights.
    pub(crate) async fn list_ban(
        &self,
        spec: &CommandSpec,
        caller: &Caller,
        payload: &str,
    ) -> Result<Vec<Reply>> {
        let (list_id, addr) = two_args(spec, payload)?;
        let list = self.require_list(list_id).await?;
        if !may_moderate(self.service.as_ref(), caller, &list.list_id).await? {
            return Ok(vec![Reply::quoted(PERMISSION_DENIED)]);
        }

        let resolved = self.resolve(addr).await;
        let scope = BanScope::List(&list.list_id);
        let done = if spec.kind == CommandKind::BanUser {
            self.service.ban(scope, &resolved).await?;
            format!("{addr} banned")
        } else {
            self.service.unban(scope, &resolved).await?;
            format!("{addr} unbanned")
        };
        info!(list_id = %list.list_id, caller = %caller.address, address = %resolved, "{done}");
        Ok(vec![Reply::quoted(done)])
    }

    /// `globalBan` / `globalUnban` (admin-only at the router).
    pub(crate) async fn global_ban(&self, spec: &CommandSpec, payload: &str) -> Result<Vec<Reply>> {
        let addr = payload.trim();
        if addr.is_empty() {
            return Err(usage_error(spec));
        }
        let resolved = self.resolve(addr).await;
        let done = if spec.kind == CommandKind::GlobalBan {
            self.service.ban(BanScope::Global, &resolved).await?;
            format!("{addr} banned")
        } else {
            self.service.unban(BanScope::Global, &resolved).await?;
            format!("{addr} unbanned")
        };
        info!(address = %resolved, "site-wide {done}");
        Ok(vec![Reply::quoted(done)])
    }
}
