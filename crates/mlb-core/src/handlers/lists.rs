use tracing::info;

use crate::{
    address::split_address,
    bot::{split_max, two_args, usage_error, Bot, EMPTY_LIST, PERMISSION_DENIED},
    commands::{CommandKind, CommandSpec},
    domain::{keys, ListStyle, ListSummary, Role, SubscribeOptions},
    errors::Error,
    formatting::{display_value, language_name, render_list_view, ListKind},
    messaging::types::Reply,
    permission::may_moderate,
    ports::ListService,
    Result,
};

/// Enumerate lists and split them into (groups, channels) by `allow_list_posts`,
/// each sorted by last post date, newest first; lists that never saw a post sort last.
pub async fn partition_lists(
    service: &dyn ListService,
    advertised_only: bool,
) -> Result<(Vec<ListSummary>, Vec<ListSummary>)> {
    let mut groups = Vec::new();
    let mut channels = Vec::new();

    for list in service.lists(advertised_only).await? {
        let settings = service.settings(&list.list_id).await?;
        let summary = ListSummary {
            name: settings
                .display_name()
                .map(str::to_string)
                .unwrap_or_else(|| list.display_name.clone()),
            topic: settings.info().to_string(),
            language: settings
                .preferred_language()
                .map(language_name)
                .unwrap_or_default(),
            last_post: settings.last_post_date(),
            member_count: list.member_count,
            list_id: list.list_id,
        };
        if settings.allow_list_posts() {
            groups.push(summary);
        } else {
            channels.push(summary);
        }
    }

    // `None < Some(_)`, so comparing b to a puts undated lists at the end.
    groups.sort_by(|a, b| b.last_post.cmp(&a.last_post));
    channels.sort_by(|a, b| b.last_post.cmp(&a.last_post));
    Ok((groups, channels))
}

impl Bot {
    pub(crate) async fn list_cmd(&self) -> Result<Vec<Reply>> {
        let (groups, channels) = partition_lists(self.service.as_ref(), true).await?;
        let prefix = self.prefix();
        let bot_addr = &self.cfg.bot_address;

        let mut out = Vec::new();
        for (kind, chats) in [(ListKind::Groups, &groups), (ListKind::Channels, &channels)] {
            if chats.is_empty() {
                continue;
            }
            let (text, html) = render_list_view(kind, bot_addr, prefix, chats);
            out.push(Reply::html(text, html));
        }
        if out.is_empty() {
            out.push(Reply::plain(EMPTY_LIST));
        }
        Ok(out)
    }

    pub(crate) async fn create(&self, spec: &CommandSpec, payload: &str) -> Result<Vec<Reply>> {
        let parts = split_max(payload, 3);
        let [kind, addr, name] = parts[..] else {
            return Err(usage_error(spec));
        };
        let domain = &self.cfg.domain;
        self.service.check_domain(domain).await?;

        let (local, _) = split_address(addr, domain);
        if local.is_empty() {
            return Err(usage_error(spec));
        }
        let fqdn = format!("{local}@{domain}");
        let style = ListStyle::from_kind(kind);
        let list = self.service.create_list(&fqdn, &style).await?;

        let mut settings = self.service.settings(&list.list_id).await?;
        settings.set(keys::DISPLAY_NAME, name);
        settings.set(keys::DESCRIPTION, name);
        settings.set(keys::PROCESS_BOUNCES, false);
        settings.set(keys::ANONYMOUS_LIST, true);
        self.service.save_settings(&list.list_id, &settings).await?;

        info!(list_id = %list.list_id, style = style.style_name(), "mailing list created");
        Ok(vec![Reply::quoted("Mailing list created successfully")])
    }

    pub(crate) async fn delete(&self, payload: &str) -> Result<Vec<Reply>> {
        let list = self.require_list(payload).await?;
        self.service.delete_list(&list.list_id).await?;
        info!(list_id = %list.list_id, "mailing list deleted");
        Ok(vec![Reply::quoted("Deleted")])
    }

    pub(crate) async fn settings_cmd(
        &self,
        spec: &CommandSpec,
        payload: &str,
    ) -> Result<Vec<Reply>> {
        let parts = split_max(payload, 3);
        let (list_id, key, value) = match parts[..] {
            [list_id, key] => (list_id, key, None),
            [list_id, key, value] => (list_id, key, Some(value)),
            _ => return Err(usage_error(spec)),
        };
        let list = self.require_list(list_id).await?;
        let mut settings = self.service.settings(&list.list_id).await?;

        let shown = match value {
            None => settings
                .get(key)
                .cloned()
                .ok_or_else(|| Error::InvalidArgs(format!("unknown setting: {key}")))?,
            Some(value) => {
                settings.set(key, value);
                self.service.save_settings(&list.list_id, &settings).await?;
                info!(list_id = %list.list_id, key, value, "setting changed");
                serde_json::Value::String(value.to_string())
            }
        };
        Ok(vec![Reply::quoted(format!("{key}={}", display_value(&shown)))])
    }

    /// `name` / `topic`: owners, moderators and admins only.
    pub(crate) async fn set_metadata(
        &self,
        spec: &CommandSpec,
        caller: &crate::domain::Caller,
        payload: &str,
    ) -> Result<Vec<Reply>> {
        let (list_id, text) = two_args(spec, payload)?;
        let list = self.require_list(list_id).await?;
        if !may_moderate(self.service.as_ref(), caller, &list.list_id).await? {
            return Ok(vec![Reply::quoted(PERMISSION_DENIED)]);
        }

        let mut settings = self.service.settings(&list.list_id).await?;
        let done = if spec.kind == CommandKind::Name {
            settings.set(keys::DESCRIPTION, text);
            settings.set(keys::DISPLAY_NAME, text);
            "Name updated"
        } else {
            settings.set(keys::INFO, text);
            "Topic updated"
        };
        self.service.save_settings(&list.list_id, &settings).await?;
        info!(list_id = %list.list_id, caller = %caller.address, "{done}");
        Ok(vec![Reply::quoted(done)])
    }

    pub(crate) async fn roles(&self, payload: &str) -> Result<Vec<Reply>> {
        let list = self.require_list(payload).await?;
        let owners = self.service.roster(&list.list_id, Role::Owner).await?;
        let moderators = self.service.roster(&list.list_id, Role::Moderator).await?;

        let mut text = String::new();
        if !owners.is_empty() {
            text.push_str("Owners:\n");
            for owner in &owners {
                text.push_str(&format!("* {owner}\n"));
            }
        }
        if !moderators.is_empty() {
            text.push_str("\nModerators:\n");
            for moderator in &moderators {
                text.push_str(&format!("* {moderator}\n"));
            }
        }
        if text.is_empty() {
            text = EMPTY_LIST.to_string();
        }
        Ok(vec![Reply::quoted(text)])
    }

    /// `link` / `unlink`: let a channel's posting address deliver into a group.
    pub(crate) async fn link(&self, spec: &CommandSpec, payload: &str) -> Result<Vec<Reply>> {
        let (channel_id, group_id) = two_args(spec, payload)?;
        let channel = self.require_list(channel_id).await?;
        let group = self.require_list(group_id).await?;
        let channel_addr = channel.fqdn_listname.as_str();
        let linking = spec.kind == CommandKind::Link;

        let mut settings = self.service.settings(&group.list_id).await?;
        let current = [
            (keys::ACCEPT_THESE_NONMEMBERS, settings.accept_these_nonmembers()),
            (keys::ACCEPTABLE_ALIASES, settings.acceptable_aliases()),
        ];
        for (key, mut values) in current {
            let present = values.iter().any(|v| v.eq_ignore_ascii_case(channel_addr));
            if linking && !present {
                values.push(channel_addr.to_string());
            } else if !linking && present {
                values.retain(|v| !v.eq_ignore_ascii_case(channel_addr));
            } else {
                continue;
            }
            settings.set(key, values);
        }
        if settings.is_dirty() {
            self.service.save_settings(&group.list_id, &settings).await?;
        }

        if linking {
            let already = self
                .service
                .roster(&group.list_id, Role::Member)
                .await?
                .iter()
                .any(|a| a.eq_ignore_ascii_case(channel_addr));
            if !already {
                self.service
                    .subscribe(&group.list_id, channel_addr, SubscribeOptions::immediate())
                    .await?;
            }
            info!(channel = %channel.list_id, group = %group.list_id, "linked");
            Ok(vec![Reply::quoted(format!(
                "{} linked to {}",
                channel.list_id, group.list_id
            ))])
        } else {
            match self.service.unsubscribe(&group.list_id, channel_addr).await {
                Ok(()) | Err(Error::NotMember { .. }) => {}
                Err(e) => return Err(e),
            }
            info!(channel = %channel.list_id, group = %group.list_id, "unlinked");
            Ok(vec![Reply::quoted(format!(
                "{} unlinked from {}",
                channel.list_id, group.list_id
            ))])
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bot::test_support::*;
    use crate::testing::FakeListService;

    #[tokio::test]
    async fn partition_splits_by_allow_list_posts_and_sorts_newest_first() {
        let svc = FakeListService::new();
        svc.add_list("g-old", "Old", true, Some("2020-01-01T00:00:00"));
        svc.add_list("g-never", "Never", true, None);
        svc.add_list("g-new", "New", true, Some("2024-06-01T12:00:00"));
        svc.add_list("c-one", "One", false, Some("2022-03-03T00:00:00"));

        let (groups, channels) = partition_lists(&svc, false).await.unwrap();
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Old", "Never"]);
        assert_eq!(groups[0].language, "English");
        assert_eq!(channels.len(), 1);
        assert_eq!(groups.len() + channels.len(), 4);
    }

    #[tokio::test]
    async fn list_command_hides_unadvertised_and_reports_empty() {
        let (bot, svc) = bot();
        assert_eq!(run(&bot, &user("u@example.com"), "list").await, vec![EMPTY_LIST]);

        let id = svc.add_list("secret", "Secret", true, None);
        svc.set_setting(&id, "advertised", json!(false));
        assert_eq!(run(&bot, &user("u@example.com"), "list").await, vec![EMPTY_LIST]);

        svc.add_list("pub", "Public", true, None);
        svc.add_list("news", "News", false, None);
        let replies = bot.handle(&user("u@example.com"), "list", "").await.unwrap();
        let texts: Vec<_> = replies.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["⬇️ Super Groups (1) ⬇️", "⬇️ Channels (1) ⬇️"]);
        assert!(replies[0].html.as_deref().unwrap().contains("/join_pub__example__com"));
        assert!(!replies[0].quote);
    }

    #[tokio::test]
    async fn create_channel_and_group_apply_style_and_names() {
        let (bot, svc) = bot();
        let out = run(&bot, &admin(), "create channel c@example.com My Channel").await;
        assert_eq!(out, vec!["Mailing list created successfully"]);
        let id = "c.example.com";
        assert_eq!(svc.setting(id, "display_name"), Some(json!("My Channel")));
        assert_eq!(svc.setting(id, "description"), Some(json!("My Channel")));
        assert_eq!(svc.setting(id, "allow_list_posts"), Some(json!(false)));
        assert_eq!(svc.setting(id, "process_bounces"), Some(json!(false)));
        assert_eq!(svc.setting(id, "anonymous_list"), Some(json!(true)));

        run(&bot, &admin(), "create group g My Group").await;
        assert_eq!(svc.setting("g.example.com", "allow_list_posts"), Some(json!(true)));
        assert_eq!(
            svc.setting("g.example.com", "style_name"),
            Some(json!("legacy-default"))
        );
    }

    #[tokio::test]
    async fn create_failures_use_create_prefix() {
        let (bot, svc) = bot();
        svc.add_list("dup", "Dup", true, None);
        let out = run(&bot, &admin(), "create group dup Again").await;
        assert!(out[0].starts_with("❌ Failed to create mailing list: "));
        let out = run(&bot, &admin(), "create group").await;
        assert!(out[0].starts_with("❌ Failed to create mailing list: invalid arguments"));
    }

    #[tokio::test]
    async fn settings_read_and_write() {
        let (bot, svc) = bot();
        let id = svc.add_list("news", "News", false, None);
        let out = run(&bot, &admin(), &format!("settings {id} advertised")).await;
        assert_eq!(out, vec!["advertised=True"]);
        let out = run(&bot, &admin(), &format!("settings {id} advertised False")).await;
        assert_eq!(out, vec!["advertised='False'"]);
        assert_eq!(svc.setting(&id, "advertised"), Some(json!(false)));

        let out = run(&bot, &admin(), &format!("settings {id} no_such_key")).await;
        assert!(out[0].starts_with("❌ Error:"));
        let out = run(&bot, &admin(), "settings nope.example.com advertised").await;
        assert!(out[0].starts_with("❌ Error: HTTP Error 404"));
    }

    #[tokio::test]
    async fn delete_removes_list() {
        let (bot, svc) = bot();
        let id = svc.add_list("old", "Old", true, None);
        assert_eq!(run(&bot, &admin(), &format!("delete {id}")).await, vec!["Deleted"]);
        assert!(!svc.has_list(&id));
        let out = run(&bot, &admin(), &format!("delete {id}")).await;
        assert!(out[0].starts_with("❌ Error:"));
    }

    #[tokio::test]
    async fn name_and_topic_require_moderation_rights() {
        let (bot, svc) = bot();
        let id = svc.add_list("news", "News", false, None);
        svc.add_member(&id, "mod@example.com", Role::Moderator);

        let eve = user("eve@example.com");
        assert_eq!(
            run(&bot, &eve, &format!("name {id} Hacked")).await,
            vec![PERMISSION_DENIED]
        );
        assert_eq!(
            run(&bot, &eve, &format!("topic {id} Hacked")).await,
            vec![PERMISSION_DENIED]
        );
        assert_eq!(svc.setting(&id, "display_name"), Some(json!("News")));

        let m = user("mod@example.com");
        assert_eq!(
            run(&bot, &m, &format!("name {id} Daily News")).await,
            vec!["Name updated"]
        );
        assert_eq!(svc.setting(&id, "display_name"), Some(json!("Daily News")));
        assert_eq!(svc.setting(&id, "description"), Some(json!("Daily News")));
        assert_eq!(
            run(&bot, &admin(), &format!("topic {id} all the news")).await,
            vec!["Topic updated"]
        );
        assert_eq!(svc.setting(&id, "info"), Some(json!("all the news")));
    }

    #[tokio::test]
    async fn roles_lists_owners_then_moderators() {
        let (bot, svc) = bot();
        let id = svc.add_list("news", "News", false, None);
        assert_eq!(run(&bot, &admin(), &format!("roles {id}")).await, vec![EMPTY_LIST]);
        svc.add_member(&id, "o@example.com", Role::Owner);
        svc.add_member(&id, "m@example.com", Role::Moderator);
        let out = run(&bot, &admin(), &format!("roles {id}")).await;
        assert_eq!(
            out,
            vec!["Owners:\n* o@example.com\n\nModerators:\n* m@example.com\n"]
        );
    }

    #[tokio::test]
    async fn link_and_unlink_channel_into_group() {
        let (bot, svc) = bot();
        let channel = svc.add_list("news", "News", false, None);
        let group = svc.add_list("chat", "Chat", true, None);

        let out = run(&bot, &admin(), &format!("link {channel} {group}")).await;
        assert_eq!(out, vec![format!("{channel} linked to {group}")]);
        assert_eq!(
            svc.setting(&group, "accept_these_nonmembers"),
            Some(json!(["news@example.com"]))
        );
        assert_eq!(
            svc.setting(&group, "acceptable_aliases"),
            Some(json!(["news@example.com"]))
        );
        assert_eq!(svc.holders(&group, Role::Member), vec!["news@example.com"]);

        // Linking twice does not duplicate anything.
        run(&bot, &admin(), &format!("link {channel} {group}")).await;
        assert_eq!(svc.holders(&group, Role::Member).len(), 1);

        let out = run(&bot, &admin(), &format!("unlink {channel} {group}")).await;
        assert_eq!(out, vec![format!("{channel} unlinked from {group}")]);
        assert_eq!(svc.setting(&group, "accept_these_nonmembers"), Some(json!([])));
        assert_eq!(svc.setting(&group, "acceptable_aliases"), Some(json!([])));
        assert!(svc.holders(&group, Role::Member).is_empty());
    }
}
