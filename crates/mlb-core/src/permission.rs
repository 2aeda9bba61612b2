use crate::{
    domain::{Caller, Role, UserId},
    ports::ListService,
    Result,
};

// ============== Transport allow-list ==============

/// Whether a chat user may talk to the bot at all. An empty allow-list admits everyone.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if allowed_users.is_empty() {
        return true;
    }
    allowed_users.contains(&user_id.0)
}

// ============== Permission gate ==============

/// May `caller` change display metadata or bans on `list_id`?
///
/// Global admins always may. Anyone else must hold the owner or moderator role
/// on that specific list.
pub async fn may_moderate(service: &dyn ListService, caller: &Caller, list_id: &str) -> Result<bool> {
    if caller.is_admin {
        return Ok(true);
    }
    for role in [Role::Owner, Role::Moderator] {
        let holders = service.roster(list_id, role).await?;
        if holders
            .iter()
            .any(|a| a.eq_ignore_ascii_case(&caller.address))
        {
            return Ok(true);
        }
    }
    Ok(false)
}
