//! In-memory `ListService` used by unit tests.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    domain::*,
    errors::Error,
    ports::ListService,
    Result,
};

#[derive(Clone, Debug)]
struct FakeList {
    fqdn_listname: String,
    display_name: String,
    settings: BTreeMap<String, Value>,
    members: Vec<(String, Role)>,
    bans: BTreeSet<String>,
}

#[derive(Default)]
struct State {
    lists: BTreeMap<String, FakeList>,
    global_bans: BTreeSet<String>,
    accounts: Vec<Account>,
    domains: BTreeSet<String>,
    directory_down: bool,
}

pub(crate) struct FakeListService {
    state: Mutex<State>,
    lookups: AtomicUsize,
}

fn not_found() -> Error {
    Error::Http {
        status: 404,
        message: "Not Found".to_string(),
    }
}

fn bad_request(msg: &str) -> Error {
    Error::Http {
        status: 400,
        message: msg.to_string(),
    }
}

fn list_id_of(fqdn: &str) -> String {
    fqdn.replace('@', ".")
}

impl FakeListService {
    pub fn new() -> Self {
        let mut state = State::default();
        state.domains.insert("example.com".to_string());
        Self {
            state: Mutex::new(state),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Add a list `local@example.com`; returns its list id.
    pub fn add_list(
        &self,
        local: &str,
        name: &str,
        allow_list_posts: bool,
        last_post_at: Option<&str>,
    ) -> String {
        let fqdn = format!("{local}@example.com");
        let id = list_id_of(&fqdn);
        let settings = [
            ("display_name", json!(name)),
            ("description", json!(name)),
            ("info", json!(format!("about {name}"))),
            ("allow_list_posts", json!(allow_list_posts)),
            ("advertised", json!(true)),
            ("last_post_at", json!(last_post_at)),
            ("accept_these_nonmembers", json!([])),
            ("acceptable_aliases", json!([])),
            ("default_nonmember_action", json!("hold")),
            ("preferred_language", json!("en")),
            ("process_bounces", json!(true)),
            ("anonymous_list", json!(false)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        self.state.lock().unwrap().lists.insert(
            id.clone(),
            FakeList {
                fqdn_listname: fqdn,
                display_name: name.to_string(),
                settings,
                members: Vec::new(),
                bans: BTreeSet::new(),
            },
        );
        id
    }

    pub fn add_account(&self, user_id: &str, addresses: &[&str]) {
        self.state.lock().unwrap().accounts.push(Account {
            user_id: user_id.to_string(),
            addresses: addresses.iter().map(|s| s.to_string()).collect(),
        });
    }

    pub fn set_directory_down(&self, down: bool) {
        self.state.lock().unwrap().directory_down = down;
    }

    pub fn set_setting(&self, list_id: &str, key: &str, value: Value) {
        if let Some(l) = self.state.lock().unwrap().lists.get_mut(list_id) {
            l.settings.insert(key.to_string(), value);
        }
    }

    pub fn add_member(&self, list_id: &str, address: &str, role: Role) {
        if let Some(l) = self.state.lock().unwrap().lists.get_mut(list_id) {
            l.members.push((address.to_string(), role));
        }
    }

    pub fn account_lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn has_list(&self, list_id: &str) -> bool {
        self.state.lock().unwrap().lists.contains_key(list_id)
    }

    pub fn holders(&self, list_id: &str, role: Role) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .lists
            .get(list_id)
            .map(|l| {
                l.members
                    .iter()
                    .filter(|(_, r)| *r == role)
                    .map(|(a, _)| a.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn setting(&self, list_id: &str, key: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .lists
            .get(list_id)
            .and_then(|l| l.settings.get(key).cloned())
    }

    pub fn list_bans(&self, list_id: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .lists
            .get(list_id)
            .map(|l| l.bans.clone())
            .unwrap_or_default()
    }

    pub fn global_bans(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().global_bans.clone()
    }

    fn to_list(id: &str, l: &FakeList) -> MailingList {
        MailingList {
            list_id: id.to_string(),
            fqdn_listname: l.fqdn_listname.clone(),
            display_name: l.display_name.clone(),
            member_count: l
                .members
                .iter()
                .filter(|(_, r)| *r == Role::Member)
                .count() as u64,
        }
    }

    fn with_list<T>(&self, list_id: &str, f: impl FnOnce(&mut FakeList) -> Result<T>) -> Result<T> {
        let mut st = self.state.lock().unwrap();
        let l = st.lists.get_mut(list_id).ok_or_else(not_found)?;
        f(l)
    }
}

/// Coerce a string written by a command into the type already stored for that key.
fn coerce(existing: Option<&Value>, new: &Value) -> Value {
    match (existing, new) {
        (Some(Value::Bool(_)), Value::String(s)) => json!(value_as_bool(&json!(s))),
        _ => new.clone(),
    }
}

#[async_trait]
impl ListService for FakeListService {
    async fn get_list(&self, list_id: &str) -> Result<MailingList> {
        let st = self.state.lock().unwrap();
        st.lists
            .get(list_id)
            .map(|l| Self::to_list(list_id, l))
            .ok_or_else(not_found)
    }

    async fn lists(&self, advertised_only: bool) -> Result<Vec<MailingList>> {
        let st = self.state.lock().unwrap();
        Ok(st
            .lists
            .iter()
            .filter(|(_, l)| {
                !advertised_only
                    || l.settings
                        .get(keys::ADVERTISED)
                        .map(value_as_bool)
                        .unwrap_or(false)
            })
            .map(|(id, l)| Self::to_list(id, l))
            .collect())
    }

    async fn settings(&self, list_id: &str) -> Result<ListSettings> {
        self.with_list(list_id, |l| Ok(ListSettings::from_map(l.settings.clone())))
    }

    async fn save_settings(&self, list_id: &str, settings: &ListSettings) -> Result<()> {
        self.with_list(list_id, |l| {
            for (k, _) in settings.changed() {
                if !l.settings.contains_key(k) {
                    return Err(bad_request(&format!("Unknown attribute: {k}")));
                }
            }
            for (k, v) in settings.changed() {
                let coerced = coerce(l.settings.get(k), v);
                if k == keys::DISPLAY_NAME {
                    l.display_name = coerced.as_str().unwrap_or_default().to_string();
                }
                l.settings.insert(k.to_string(), coerced);
            }
            Ok(())
        })
    }

    async fn subscribe(
        &self,
        list_id: &str,
        address: &str,
        _opts: SubscribeOptions,
    ) -> Result<()> {
        self.add_role(list_id, address, Role::Member).await
    }

    async fn unsubscribe(&self, list_id: &str, address: &str) -> Result<()> {
        self.with_list(list_id, |l| {
            let before = l.members.len();
            l.members
                .retain(|(a, r)| !(*r == Role::Member && a.eq_ignore_ascii_case(address)));
            if l.members.len() == before {
                return Err(Error::NotMember {
                    list_id: list_id.to_string(),
                    address: address.to_string(),
                });
            }
            Ok(())
        })
    }

    async fn subscriptions(&self, address: &str) -> Result<Vec<Subscription>> {
        let st = self.state.lock().unwrap();
        let mut out = Vec::new();
        for (id, l) in &st.lists {
            for (a, r) in &l.members {
                if a.eq_ignore_ascii_case(address) {
                    out.push(Subscription {
                        list_id: id.clone(),
                        address: a.clone(),
                        role: *r,
                    });
                }
            }
        }
        Ok(out)
    }

    async fn roster(&self, list_id: &str, role: Role) -> Result<Vec<String>> {
        self.get_list(list_id).await?;
        Ok(self.holders(list_id, role))
    }

    async fn add_role(&self, list_id: &str, address: &str, role: Role) -> Result<()> {
        self.with_list(list_id, |l| {
            if l.members
                .iter()
                .any(|(a, r)| *r == role && a.eq_ignore_ascii_case(address))
            {
                return Err(Error::Http {
                    status: 409,
                    message: format!("{address} is already {role}"),
                });
            }
            l.members.push((address.to_string(), role));
            Ok(())
        })
    }

    async fn remove_role(&self, list_id: &str, address: &str, role: Role) -> Result<()> {
        self.with_list(list_id, |l| {
            let before = l.members.len();
            l.members
                .retain(|(a, r)| !(*r == role && a.eq_ignore_ascii_case(address)));
            if l.members.len() == before {
                return Err(not_found());
            }
            Ok(())
        })
    }

    async fn ban(&self, scope: BanScope<'_>, address: &str) -> Result<()> {
        let insert = |set: &mut BTreeSet<String>| {
            if set.insert(address.to_string()) {
                Ok(())
            } else {
                Err(bad_request("Address is already banned"))
            }
        };
        match scope {
            BanScope::Global => insert(&mut self.state.lock().unwrap().global_bans),
            BanScope::List(id) => self.with_list(id, |l| insert(&mut l.bans)),
        }
    }

    async fn unban(&self, scope: BanScope<'_>, address: &str) -> Result<()> {
        let remove = |set: &mut BTreeSet<String>| {
            if set.remove(address) {
                Ok(())
            } else {
                Err(not_found())
            }
        };
        match scope {
            BanScope::Global => remove(&mut self.state.lock().unwrap().global_bans),
            BanScope::List(id) => self.with_list(id, |l| remove(&mut l.bans)),
        }
    }

    async fn check_domain(&self, domain: &str) -> Result<()> {
        if self.state.lock().unwrap().domains.contains(domain) {
            Ok(())
        } else {
            Err(not_found())
        }
    }

    async fn create_list(&self, fqdn_listname: &str, style: &ListStyle) -> Result<MailingList> {
        let (local, domain) = fqdn_listname
            .split_once('@')
            .ok_or_else(|| bad_request("Invalid list posting address"))?;
        if local.is_empty() {
            return Err(bad_request("Invalid list posting address"));
        }
        let mut st = self.state.lock().unwrap();
        if !st.domains.contains(domain) {
            return Err(bad_request(&format!("Domain does not exist: {domain}")));
        }
        let id = list_id_of(fqdn_listname);
        if st.lists.contains_key(&id) {
            return Err(bad_request(&format!("Mailing list exists: {fqdn_listname}")));
        }
        let (allow_posts, member_action) = match style {
            ListStyle::Announce => (false, "hold"),
            ListStyle::Discussion => (true, "defer"),
            ListStyle::Named(name) => {
                if name.is_empty() {
                    return Err(bad_request("Unknown list style"));
                }
                (true, "defer")
            }
        };
        let settings = [
            ("display_name", json!(local)),
            ("description", json!("")),
            ("info", json!("")),
            ("allow_list_posts", json!(allow_posts)),
            ("default_member_action", json!(member_action)),
            ("advertised", json!(true)),
            ("last_post_at", Value::Null),
            ("accept_these_nonmembers", json!([])),
            ("acceptable_aliases", json!([])),
            ("default_nonmember_action", json!("hold")),
            ("preferred_language", json!("en")),
            ("process_bounces", json!(true)),
            ("anonymous_list", json!(false)),
            ("style_name", json!(style.style_name())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let list = FakeList {
            fqdn_listname: fqdn_listname.to_string(),
            display_name: local.to_string(),
            settings,
            members: Vec::new(),
            bans: BTreeSet::new(),
        };
        let out = Self::to_list(&id, &list);
        st.lists.insert(id, list);
        Ok(out)
    }

    async fn delete_list(&self, list_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .lists
            .remove(list_id)
            .map(|_| ())
            .ok_or_else(not_found)
    }

    async fn find_account(&self, key: &str) -> Result<Option<Account>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let st = self.state.lock().unwrap();
        if st.directory_down {
            return Err(Error::External("connection refused".to_string()));
        }
        Ok(st
            .accounts
            .iter()
            .find(|a| a.user_id == key || a.addresses.iter().any(|x| x == key))
            .cloned())
    }
}
