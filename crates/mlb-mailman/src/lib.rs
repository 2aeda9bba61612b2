//! Mailman 3 REST adapter (API version 3.1).
//!
//! Implements the `mlb-core` [`ListService`] port over HTTP with basic auth.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::debug;

use mlb_core::{
    config::ApiConfig,
    domain::{
        Account, BanScope, ListSettings, ListStyle, MailingList, Role, SubscribeOptions,
        Subscription,
    },
    errors::Error,
    ports::ListService,
    Result,
};

/// Fields the config endpoint returns that are not list settings.
const RESOURCE_FIELDS: [&str; 2] = ["http_etag", "self_link"];

#[derive(Clone, Debug)]
pub struct MailmanClient {
    base: Url,
    username: String,
    password: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    entries: Vec<T>,
}

#[derive(Deserialize)]
struct ListEntry {
    list_id: String,
    fqdn_listname: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    member_count: u64,
}

impl From<ListEntry> for MailingList {
    fn from(e: ListEntry) -> Self {
        Self {
            list_id: e.list_id,
            fqdn_listname: e.fqdn_listname,
            display_name: e.display_name,
            member_count: e.member_count,
        }
    }
}

#[derive(Deserialize)]
struct EmailEntry {
    email: String,
}

#[derive(Deserialize)]
struct MemberEntry {
    list_id: String,
    email: String,
    role: String,
}

#[derive(Deserialize)]
struct UserEntry {
    user_id: Value,
}

impl MailmanClient {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let base = Url::parse(&api.url)
            .map_err(|e| Error::Config(format!("invalid api_url {:?}: {e}", api.url)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("invalid api_url {:?}", api.url)));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            base,
            username: api.username.clone(),
            password: api.password.clone(),
            http,
        })
    }

    /// Base URL plus `segments`, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> Url {
        endpoint(&self.base, segments)
    }

    async fn call(
        &self,
        method: Method,
        segments: &[&str],
        form: Option<&[(String, String)]>,
    ) -> Result<reqwest::Response> {
        self.call_url(method, self.url(segments), form).await
    }

    async fn call_url(
        &self,
        method: Method,
        url: Url,
        form: Option<&[(String, String)]>,
    ) -> Result<reqwest::Response> {
        debug!(%method, %url, "mailman request");

        let mut req = self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(form) = form {
            req = req.form(form);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::External(format!("mailman request error: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(http_error(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let resp = self.call(Method::GET, segments, None).await?;
        resp.json::<T>()
            .await
            .map_err(|e| Error::External(format!("mailman json error: {e}")))
    }

    async fn get_entries<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>> {
        Ok(self.get_json::<Page<T>>(segments).await?.entries)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        form: &[(String, String)],
    ) -> Result<()> {
        self.call(method, segments, Some(form)).await?;
        Ok(())
    }

    async fn delete(&self, segments: &[&str]) -> Result<()> {
        self.call(Method::DELETE, segments, None).await?;
        Ok(())
    }
}

#[async_trait]
impl ListService for MailmanClient {
    async fn get_list(&self, list_id: &str) -> Result<MailingList> {
        let entry: ListEntry = self.get_json(&["lists", list_id]).await?;
        Ok(entry.into())
    }

    async fn lists(&self, advertised_only: bool) -> Result<Vec<MailingList>> {
        let mut url = self.url(&["lists"]);
        if advertised_only {
            url.query_pairs_mut().append_pair("advertised", "true");
        }
        let resp = self.call_url(Method::GET, url, None).await?;
        let page: Page<ListEntry> = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("mailman json error: {e}")))?;
        Ok(page.entries.into_iter().map(MailingList::from).collect())
    }

    async fn settings(&self, list_id: &str) -> Result<ListSettings> {
        let mut raw: BTreeMap<String, Value> =
            self.get_json(&["lists", list_id, "config"]).await?;
        for field in RESOURCE_FIELDS {
            raw.remove(field);
        }
        Ok(ListSettings::from_map(raw))
    }

    async fn save_settings(&self, list_id: &str, settings: &ListSettings) -> Result<()> {
        let form = settings_form(settings);
        if form.is_empty() {
            return Ok(());
        }
        self.send(Method::PATCH, &["lists", list_id, "config"], &form)
            .await
    }

    async fn subscribe(
        &self,
        list_id: &str,
        address: &str,
        opts: SubscribeOptions,
    ) -> Result<()> {
        let form = vec![
            ("list_id".to_string(), list_id.to_string()),
            ("subscriber".to_string(), address.to_string()),
            ("pre_verified".to_string(), opts.pre_verified.to_string()),
            ("pre_confirmed".to_string(), opts.pre_confirmed.to_string()),
            (
                "send_welcome_message".to_string(),
                opts.send_welcome_message.to_string(),
            ),
        ];
        self.send(Method::POST, &["members"], &form).await
    }

    async fn unsubscribe(&self, list_id: &str, address: &str) -> Result<()> {
        match self.delete(&["lists", list_id, "member", address]).await {
            Err(Error::Http { status: 404, .. }) => Err(Error::NotMember {
                list_id: list_id.to_string(),
                address: address.to_string(),
            }),
            other => other,
        }
    }

    async fn subscriptions(&self, address: &str) -> Result<Vec<Subscription>> {
        let form = [("subscriber".to_string(), address.to_string())];
        let resp = self
            .call(Method::POST, &["members", "find"], Some(&form))
            .await?;
        let page: Page<MemberEntry> = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("mailman json error: {e}")))?;
        Ok(page
            .entries
            .into_iter()
            .filter_map(|m| {
                Some(Subscription {
                    role: Role::parse(&m.role)?,
                    list_id: m.list_id,
                    address: m.email,
                })
            })
            .collect())
    }

    async fn roster(&self, list_id: &str, role: Role) -> Result<Vec<String>> {
        let entries: Vec<EmailEntry> = self
            .get_entries(&["lists", list_id, "roster", role.as_str()])
            .await?;
        Ok(entries.into_iter().map(|e| e.email).collect())
    }

    async fn add_role(&self, list_id: &str, address: &str, role: Role) -> Result<()> {
        let form = vec![
            ("list_id".to_string(), list_id.to_string()),
            ("subscriber".to_string(), address.to_string()),
            ("role".to_string(), role.as_str().to_string()),
            ("pre_verified".to_string(), "true".to_string()),
            ("pre_confirmed".to_string(), "true".to_string()),
            ("pre_approved".to_string(), "true".to_string()),
        ];
        self.send(Method::POST, &["members"], &form).await
    }

    async fn remove_role(&self, list_id: &str, address: &str, role: Role) -> Result<()> {
        self.delete(&["lists", list_id, role.as_str(), address]).await
    }

    async fn ban(&self, scope: BanScope<'_>, address: &str) -> Result<()> {
        let form = [("email".to_string(), address.to_string())];
        match scope {
            BanScope::Global => self.send(Method::POST, &["bans"], &form).await,
            BanScope::List(id) => self.send(Method::POST, &["lists", id, "bans"], &form).await,
        }
    }

    async fn unban(&self, scope: BanScope<'_>, address: &str) -> Result<()> {
        match scope {
            BanScope::Global => self.delete(&["bans", address]).await,
            BanScope::List(id) => self.delete(&["lists", id, "bans", address]).await,
        }
    }

    async fn check_domain(&self, domain: &str) -> Result<()> {
        self.call(Method::GET, &["domains", domain], None).await?;
        Ok(())
    }

    async fn create_list(&self, fqdn_listname: &str, style: &ListStyle) -> Result<MailingList> {
        let form = vec![
            ("fqdn_listname".to_string(), fqdn_listname.to_string()),
            ("style_name".to_string(), style.style_name().to_string()),
        ];
        self.send(Method::POST, &["lists"], &form).await?;
        self.get_list(fqdn_listname).await
    }

    async fn delete_list(&self, list_id: &str) -> Result<()> {
        self.delete(&["lists", list_id]).await
    }

    async fn find_account(&self, key: &str) -> Result<Option<Account>> {
        let user: UserEntry = match self.get_json(&["users", key]).await {
            Ok(u) => u,
            Err(Error::Http { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let user_id = match user.user_id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let addresses: Vec<EmailEntry> = self
            .get_entries(&["users", user_id.as_str(), "addresses"])
            .await?;
        Ok(Some(Account {
            user_id,
            addresses: addresses.into_iter().map(|a| a.email).collect(),
        }))
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Map a non-success response to [`Error::Http`], preferring Mailman's `description`.
fn http_error(status: StatusCode, body: &str) -> Error {
    let description = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("description").and_then(Value::as_str).map(str::to_string))
        .or_else(|| {
            let t = body.trim();
            (!t.is_empty() && t.len() <= 200).then(|| t.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
    Error::Http {
        status: status.as_u16(),
        message: description,
    }
}

/// Form fields for a settings PATCH: only changed keys, lists as repeated fields.
fn settings_form(settings: &ListSettings) -> Vec<(String, String)> {
    let mut form = Vec::new();
    for (key, value) in settings.changed() {
        match value {
            Value::Array(items) if items.is_empty() => form.push((key.to_string(), String::new())),
            Value::Array(items) => {
                for item in items {
                    form.push((key.to_string(), form_scalar(item)));
                }
            }
            other => form.push((key.to_string(), form_scalar(other))),
        }
    }
    form
}

fn form_scalar(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
