use async_trait::async_trait;

use crate::{domain::*, Result};

/// Hexagonal port for the remote mailing-list service.
///
/// The Mailman REST adapter implements this; handlers only ever see the trait.
/// Implementations report a missing list as [`crate::Error::NotFound`] or
/// [`crate::Error::Http`], and unsubscribing a non-member as
/// [`crate::Error::NotMember`].
#[async_trait]
pub trait ListService: Send + Sync {
    async fn get_list(&self, list_id: &str) -> Result<MailingList>;

    async fn lists(&self, advertised_only: bool) -> Result<Vec<MailingList>>;

    async fn settings(&self, list_id: &str) -> Result<ListSettings>;

    /// Persist the keys changed on `settings` since it was loaded.
    async fn save_settings(&self, list_id: &str, settings: &ListSettings) -> Result<()>;

    async fn subscribe(&self, list_id: &str, address: &str, opts: SubscribeOptions)
        -> Result<()>;

    async fn unsubscribe(&self, list_id: &str, address: &str) -> Result<()>;

    /// Every subscription (any role) held by `address`.
    async fn subscriptions(&self, address: &str) -> Result<Vec<Subscription>>;

    /// Addresses holding `role` on the list, in the service's order.
    async fn roster(&self, list_id: &str, role: Role) -> Result<Vec<String>>;

    async fn add_role(&self, list_id: &str, address: &str, role: Role) -> Result<()>;

    async fn remove_role(&self, list_id: &str, address: &str, role: Role) -> Result<()>;

    async fn ban(&self, scope: BanScope<'_>, address: &str) -> Result<()>;

    async fn unban(&self, scope: BanScope<'_>, address: &str) -> Result<()>;

    /// Fails unless `domain` is known to the service.
    async fn check_domain(&self, domain: &str) -> Result<()>;

    async fn create_list(&self, fqdn_listname: &str, style: &ListStyle) -> Result<MailingList>;

    async fn delete_list(&self, list_id: &str) -> Result<()>;

    /// Look up a directory account by user id or address; `Ok(None)` when absent.
    async fn find_account(&self, key: &str) -> Result<Option<Account>>;
}
