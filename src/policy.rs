use crate::{
    models::{Group, GroupDetailsResponse},
    repository::{Repository, StoreError},
};
use uuid::Uuid;

/// Fixed page size of the member list.
pub const USERS_PER_PAGE: i64 = 50;

/// GroupAccess
///
/// Outcome of an access decision. `NotFound` covers both "no such group" and
/// "hidden group the actor may not see": callers must not be able to tell the
/// two apart, otherwise the response itself discloses that a hidden group
/// exists. Store failures are *not* folded in here; they travel as
/// `Err(StoreError)` alongside this type so a broken store never masquerades
/// as a miss.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupAccess<T> {
    NotFound,
    Granted(T),
}

/// MemberPage
///
/// The 1-based page request for the member list, normalized into an inclusive
/// `[start, stop]` window. Pages at or below zero, and unparseable input,
/// collapse to page 1; a bad page number is a default, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberPage {
    pub page: i64,
    pub start: i64,
    pub stop: i64,
}

impl MemberPage {
    pub fn from_page(page: i64) -> Self {
        let page = page.max(1);
        let start = ((page - 1) * USERS_PER_PAGE).max(0);
        Self {
            page,
            start,
            stop: start + USERS_PER_PAGE - 1,
        }
    }

    /// Parses the raw `page` query value. `None`, empty, or non-numeric input
    /// all land on page 1.
    pub fn parse(raw: Option<&str>) -> Self {
        let page = raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(1);
        Self::from_page(page)
    }
}

/// Number of member-list pages for a group. Never zero, so an empty group
/// still renders page 1 of 1.
pub fn page_count(member_count: i64) -> i64 {
    ((member_count + USERS_PER_PAGE - 1) / USERS_PER_PAGE).max(1)
}

/// MembersGrant
///
/// What a granted member-list decision carries: the group metadata, the
/// normalized page window, and the total page count. Fetching the actual
/// member rows for the window is left to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct MembersGrant {
    pub group: Group,
    pub window: MemberPage,
    pub page_count: i64,
}

/// resolve_group_details_access
///
/// Decision procedure for the group details page.
///
/// The group name must already be slug-resolved. Independent lookups at each
/// gate are issued concurrently and joined before the decision is taken: both
/// membership and invitation must have answered before the hidden-group gate
/// fires. Any lookup failure short-circuits the join and propagates unchanged.
///
/// Grant rules for a hidden group: member OR invited OR administrator OR
/// global moderator. The granted payload carries the effective ownership flag
/// (raw ownership OR administrator OR global-moderator-on-non-system-group)
/// and the actor's role flags for downstream display.
pub async fn resolve_group_details_access(
    repo: &dyn Repository,
    actor: Option<Uuid>,
    name: &str,
) -> Result<GroupAccess<GroupDetailsResponse>, StoreError> {
    let (exists, hidden) =
        tokio::try_join!(repo.group_exists(name), repo.group_is_hidden(name))?;
    if !exists {
        return Ok(GroupAccess::NotFound);
    }

    if hidden {
        let (is_member, is_invited) =
            tokio::try_join!(repo.is_member(actor, name), repo.is_invited(actor, name))?;
        if !is_member && !is_invited {
            // Indistinguishable from a nonexistent group, so unauthorized
            // actors cannot probe for hidden groups by name.
            return Ok(GroupAccess::NotFound);
        }
    }

    let (payload, is_administrator, is_global_moderator) = tokio::try_join!(
        repo.group_get(name, actor),
        repo.is_administrator(actor),
        repo.is_global_moderator(actor),
    )?;

    // The group may have been deleted between the existence check and the
    // payload fetch; the race resolves to a plain miss.
    let Some(mut group) = payload else {
        return Ok(GroupAccess::NotFound);
    };

    group.is_owner = group.is_owner || is_administrator || (is_global_moderator && !group.system);

    Ok(GroupAccess::Granted(GroupDetailsResponse {
        group,
        is_administrator,
        is_global_moderator,
    }))
}

/// resolve_group_members_access
///
/// Decision procedure for the paginated member list.
///
/// All four facts are fetched concurrently; the gate waits for the full join.
/// The denial rule here is narrower than the details page on purpose: a
/// hidden group's member list is visible to members, administrators, and
/// global moderators only. An invitation opens the details page but NOT the
/// member list.
pub async fn resolve_group_members_access(
    repo: &dyn Repository,
    actor: Option<Uuid>,
    name: &str,
    page: MemberPage,
) -> Result<GroupAccess<MembersGrant>, StoreError> {
    let (payload, is_privileged, is_member, hidden) = tokio::try_join!(
        repo.group_get(name, actor),
        repo.is_admin_or_global_mod(actor),
        repo.is_member(actor, name),
        repo.group_is_hidden(name),
    )?;

    if hidden && !is_member && !is_privileged {
        return Ok(GroupAccess::NotFound);
    }

    // Same delete-race treatment as the details flow.
    let Some(group) = payload else {
        return Ok(GroupAccess::NotFound);
    };

    let page_count = page_count(group.member_count);
    Ok(GroupAccess::Granted(MembersGrant {
        group,
        window: page,
        page_count,
    }))
}
