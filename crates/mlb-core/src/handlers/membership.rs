use std::collections::BTreeSet;

use tracing::info;

use crate::{
    bot::{two_args, Bot, INVALID_ID, NOT_A_MEMBER, NO_SUBSCRIPTIONS},
    commands::{encode_shortcut, CommandSpec},
    domain::{Caller, Role, SubscribeOptions},
    errors::Error,
    messaging::types::Reply,
    Result,
};

impl Bot {
    pub(crate) async fn join(&self, caller: &Caller, payload: &str) -> Result<Vec<Reply>> {
        let prefix = self.prefix().to_string();
        self.subscribe(payload, &caller.address, |list_id| {
            format!(
                "Added, to leave send:\n/{prefix}leave_{}",
                encode_shortcut(list_id)
            )
        })
        .await
    }

    pub(crate) async fn add_member(&self, spec: &CommandSpec, payload: &str) -> Result<Vec<Reply>> {
        let (list_id, addr) = two_args(spec, payload)?;
        self.subscribe(list_id, addr, |_| format!("{addr} added as member"))
            .await
    }

    pub(crate) async fn leave(&self, caller: &Caller, payload: &str) -> Result<Vec<Reply>> {
        if payload.trim().is_empty() {
            return self.joined_lists(caller).await;
        }
        self.unsubscribe(payload, &caller.address, |list_id| {
            format!("You left {list_id}")
        })
        .await
    }

    pub(crate) async fn remove_member(
        &self,
        spec: &CommandSpec,
        payload: &str,
    ) -> Result<Vec<Reply>> {
        let (list_id, addr) = two_args(spec, payload)?;
        self.unsubscribe(list_id, addr, |_| format!("{addr} removed from members"))
            .await
    }

    async fn subscribe(
        &self,
        list_id: &str,
        address: &str,
        success: impl FnOnce(&str) -> String,
    ) -> Result<Vec<Reply>> {
        let Some(list) = self.find_list(list_id).await? else {
            return Ok(vec![Reply::quoted(INVALID_ID)]);
        };
        self.service
            .subscribe(&list.list_id, address, SubscribeOptions::immediate())
            .await?;
        info!(list_id = %list.list_id, address, "subscribed");
        Ok(vec![Reply::quoted(success(&list.list_id))])
    }

    async fn unsubscribe(
        &self,
        list_id: &str,
        address: &str,
        success: impl FnOnce(&str) -> String,
    ) -> Result<Vec<Reply>> {
        let Some(list) = self.find_list(list_id).await? else {
            return Ok(vec![Reply::quoted(INVALID_ID)]);
        };
        match self.service.unsubscribe(&list.list_id, address).await {
            Ok(()) => {
                info!(list_id = %list.list_id, address, "unsubscribed");
                Ok(vec![Reply::quoted(success(&list.list_id))])
            }
            Err(Error::NotMember { .. }) => Ok(vec![Reply::quoted(NOT_A_MEMBER)]),
            Err(e) => Err(e),
        }
    }

    /// `leave` without an id: one `/leave_<id>` shortcut per list the caller is a member of.
    async fn joined_lists(&self, caller: &Caller) -> Result<Vec<Reply>> {
        let ids: BTreeSet<String> = self
            .service
            .subscriptions(&caller.address)
            .await?
            .into_iter()
            .filter(|s| s.role == Role::Member)
            .map(|s| s.list_id)
            .collect();

        if ids.is_empty() {
            return Ok(vec![Reply::quoted(NO_SUBSCRIPTIONS)]);
        }
        let prefix = self.prefix();
        let text = ids
            .iter()
            .map(|id| format!("/{prefix}leave_{}\n\n", encode_shortcut(id)))
            .collect::<String>();
        Ok(vec![Reply::quoted(text)])
    }
}
