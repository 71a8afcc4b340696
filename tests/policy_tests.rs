use async_trait::async_trait;
use chrono::Utc;
use forum_groups::{
    models::{Group, GroupSort, GroupSummary, MemberEntry, User},
    policy::{
        GroupAccess, MemberPage, USERS_PER_PAGE, page_count, resolve_group_details_access,
        resolve_group_members_access,
    },
    repository::{Repository, StoreError},
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// --- In-Memory Stub Repository ---

/// Configurable in-memory store. Each test builds exactly the world it needs;
/// `unavailable` simulates a store outage and `payload_vanishes` simulates the
/// group being deleted between the existence check and the payload fetch.
#[derive(Default)]
struct StubRepository {
    groups: HashMap<String, Group>,
    members: HashSet<(String, Uuid)>,
    invites: HashSet<(String, Uuid)>,
    owners: HashSet<(String, Uuid)>,
    admins: HashSet<Uuid>,
    global_mods: HashSet<Uuid>,
    unavailable: bool,
    payload_vanishes: bool,
}

impl StubRepository {
    fn with_group(mut self, group: Group) -> Self {
        self.groups.insert(group.name.clone(), group);
        self
    }

    fn with_member(mut self, name: &str, actor: Uuid) -> Self {
        self.members.insert((name.to_string(), actor));
        self
    }

    fn with_invite(mut self, name: &str, actor: Uuid) -> Self {
        self.invites.insert((name.to_string(), actor));
        self
    }

    fn with_owner(mut self, name: &str, actor: Uuid) -> Self {
        self.owners.insert((name.to_string(), actor));
        self
    }

    fn with_admin(mut self, actor: Uuid) -> Self {
        self.admins.insert(actor);
        self
    }

    fn with_global_mod(mut self, actor: Uuid) -> Self {
        self.global_mods.insert(actor);
        self
    }

    fn failing(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn vanishing_payload(mut self) -> Self {
        self.payload_vanishes = true;
        self
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Repository for StubRepository {
    async fn resolve_slug(&self, slug: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self
            .groups
            .values()
            .find(|g| g.slug == slug)
            .map(|g| g.name.clone()))
    }

    async fn group_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.groups.contains_key(name))
    }

    async fn group_is_hidden(&self, name: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.groups.get(name).map(|g| g.hidden).unwrap_or(false))
    }

    async fn group_get(&self, name: &str, actor: Option<Uuid>) -> Result<Option<Group>, StoreError> {
        self.check()?;
        if self.payload_vanishes {
            return Ok(None);
        }
        Ok(self.groups.get(name).map(|g| {
            let mut group = g.clone();
            group.is_owner = actor
                .map(|a| self.owners.contains(&(name.to_string(), a)))
                .unwrap_or(false);
            group
        }))
    }

    async fn group_summaries(
        &self,
        _sort: GroupSort,
        _start: i64,
        _stop: i64,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        self.check()?;
        Ok(vec![])
    }

    async fn group_members(
        &self,
        _name: &str,
        _start: i64,
        _stop: i64,
    ) -> Result<Vec<MemberEntry>, StoreError> {
        self.check()?;
        Ok(vec![])
    }

    async fn is_member(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(matches!(actor, Some(a) if self.members.contains(&(name.to_string(), a))))
    }

    async fn is_invited(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(matches!(actor, Some(a) if self.invites.contains(&(name.to_string(), a))))
    }

    async fn is_owner(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(matches!(actor, Some(a) if self.owners.contains(&(name.to_string(), a))))
    }

    async fn is_administrator(&self, actor: Option<Uuid>) -> Result<bool, StoreError> {
        self.check()?;
        Ok(matches!(actor, Some(a) if self.admins.contains(&a)))
    }

    async fn is_global_moderator(&self, actor: Option<Uuid>) -> Result<bool, StoreError> {
        self.check()?;
        Ok(matches!(actor, Some(a) if self.global_mods.contains(&a)))
    }

    async fn is_admin_or_global_mod(&self, actor: Option<Uuid>) -> Result<bool, StoreError> {
        self.check()?;
        Ok(matches!(
            actor,
            Some(a) if self.admins.contains(&a) || self.global_mods.contains(&a)
        ))
    }

    async fn can_create_group(&self, actor: Option<Uuid>) -> Result<bool, StoreError> {
        self.check()?;
        Ok(actor.is_some())
    }

    async fn set_group_cover(&self, name: &str, _object_key: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.groups.contains_key(name))
    }

    async fn get_user(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        self.check()?;
        Ok(None)
    }
}

fn group(name: &str, hidden: bool, system: bool, member_count: i64) -> Group {
    Group {
        name: name.to_string(),
        slug: name.to_lowercase().replace(' ', "-"),
        description: String::new(),
        hidden,
        system,
        member_count,
        cover_image: None,
        created_at: Utc::now(),
        is_owner: false,
    }
}

fn granted<T>(access: GroupAccess<T>) -> T {
    match access {
        GroupAccess::Granted(inner) => inner,
        GroupAccess::NotFound => panic!("expected Granted, got NotFound"),
    }
}

// --- Existence Gate ---

#[tokio::test]
async fn nonexistent_group_is_not_found_for_every_actor() {
    let admin = Uuid::new_v4();
    let repo = StubRepository::default().with_admin(admin);

    for actor in [None, Some(admin)] {
        let details = resolve_group_details_access(&repo, actor, "Ghosts")
            .await
            .unwrap();
        assert_eq!(details, GroupAccess::NotFound);

        let members =
            resolve_group_members_access(&repo, actor, "Ghosts", MemberPage::from_page(1))
                .await
                .unwrap();
        assert_eq!(members, GroupAccess::NotFound);
    }
}

#[tokio::test]
async fn visible_group_is_granted_to_anonymous() {
    let repo = StubRepository::default().with_group(group("Book Club", false, false, 125));

    let details = granted(
        resolve_group_details_access(&repo, None, "Book Club")
            .await
            .unwrap(),
    );
    assert_eq!(details.group.name, "Book Club");
    assert!(!details.group.is_owner);
    assert!(!details.is_administrator);
    assert!(!details.is_global_moderator);
}

// --- Hidden-Group Gate (Details) ---

#[tokio::test]
async fn hidden_details_denied_to_anonymous_and_uninvolved() {
    let rando = Uuid::new_v4();
    let repo = StubRepository::default().with_group(group("Admins", true, false, 3));

    for actor in [None, Some(rando)] {
        let access = resolve_group_details_access(&repo, actor, "Admins")
            .await
            .unwrap();
        assert_eq!(access, GroupAccess::NotFound);
    }
}

#[tokio::test]
async fn hidden_details_granted_to_member_invitee_admin_and_global_mod() {
    let member = Uuid::new_v4();
    let invitee = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let global_mod = Uuid::new_v4();
    let repo = StubRepository::default()
        .with_group(group("Secret Circle", true, false, 7))
        .with_member("Secret Circle", member)
        .with_invite("Secret Circle", invitee)
        .with_admin(admin)
        .with_global_mod(global_mod);

    for actor in [member, invitee, admin, global_mod] {
        let access = resolve_group_details_access(&repo, Some(actor), "Secret Circle")
            .await
            .unwrap();
        assert!(
            matches!(access, GroupAccess::Granted(_)),
            "actor {actor} should see the hidden group"
        );
    }
}

// --- Hidden-Group Gate (Members): the deliberate asymmetry ---

#[tokio::test]
async fn hidden_members_denied_to_invitee_but_granted_to_member_and_moderation() {
    let member = Uuid::new_v4();
    let invitee = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let global_mod = Uuid::new_v4();
    let repo = StubRepository::default()
        .with_group(group("Secret Circle", true, false, 7))
        .with_member("Secret Circle", member)
        .with_invite("Secret Circle", invitee)
        .with_admin(admin)
        .with_global_mod(global_mod);
    let page = MemberPage::from_page(1);

    // An invitation opens the details page...
    let details = resolve_group_details_access(&repo, Some(invitee), "Secret Circle")
        .await
        .unwrap();
    assert!(matches!(details, GroupAccess::Granted(_)));

    // ...but NOT the member list.
    let members = resolve_group_members_access(&repo, Some(invitee), "Secret Circle", page)
        .await
        .unwrap();
    assert_eq!(members, GroupAccess::NotFound);

    for actor in [member, admin, global_mod] {
        let access = resolve_group_members_access(&repo, Some(actor), "Secret Circle", page)
            .await
            .unwrap();
        assert!(
            matches!(access, GroupAccess::Granted(_)),
            "actor {actor} should see the member list"
        );
    }
}

#[tokio::test]
async fn hidden_members_denied_to_anonymous() {
    let repo = StubRepository::default().with_group(group("Admins", true, false, 3));

    let access =
        resolve_group_members_access(&repo, None, "Admins", MemberPage::from_page(1))
            .await
            .unwrap();
    assert_eq!(access, GroupAccess::NotFound);
}

// --- Effective Ownership ---

#[tokio::test]
async fn raw_owner_keeps_ownership() {
    let owner = Uuid::new_v4();
    let repo = StubRepository::default()
        .with_group(group("Book Club", false, false, 125))
        .with_owner("Book Club", owner);

    let details = granted(
        resolve_group_details_access(&repo, Some(owner), "Book Club")
            .await
            .unwrap(),
    );
    assert!(details.group.is_owner);
}

#[tokio::test]
async fn administrator_is_effective_owner_even_of_system_groups() {
    let admin = Uuid::new_v4();
    let repo = StubRepository::default()
        .with_group(group("administrators", true, true, 3))
        .with_admin(admin);

    let details = granted(
        resolve_group_details_access(&repo, Some(admin), "administrators")
            .await
            .unwrap(),
    );
    assert!(details.group.is_owner);
    assert!(details.is_administrator);
}

#[tokio::test]
async fn global_mod_is_effective_owner_of_non_system_groups_only() {
    let global_mod = Uuid::new_v4();
    let repo = StubRepository::default()
        .with_group(group("Book Club", false, false, 125))
        .with_group(group("Admins", true, true, 3))
        .with_global_mod(global_mod);

    let plain = granted(
        resolve_group_details_access(&repo, Some(global_mod), "Book Club")
            .await
            .unwrap(),
    );
    assert!(plain.group.is_owner);

    // Hidden system group: access is granted (moderation role) but the
    // ownership override must not apply.
    let system = granted(
        resolve_group_details_access(&repo, Some(global_mod), "Admins")
            .await
            .unwrap(),
    );
    assert!(!system.group.is_owner);
    assert!(system.is_global_moderator);
}

#[tokio::test]
async fn plain_member_is_not_effective_owner() {
    let member = Uuid::new_v4();
    let repo = StubRepository::default()
        .with_group(group("Book Club", false, false, 125))
        .with_member("Book Club", member);

    let details = granted(
        resolve_group_details_access(&repo, Some(member), "Book Club")
            .await
            .unwrap(),
    );
    assert!(!details.group.is_owner);
}

// --- Pagination ---

#[test]
fn page_windows_match_fixed_page_size() {
    assert_eq!(USERS_PER_PAGE, 50);

    let first = MemberPage::from_page(1);
    assert_eq!((first.start, first.stop), (0, 49));

    let third = MemberPage::from_page(3);
    assert_eq!((third.start, third.stop), (100, 149));
}

#[test]
fn bad_page_input_collapses_to_page_one() {
    let expected = MemberPage::from_page(1);
    assert_eq!(MemberPage::from_page(0), expected);
    assert_eq!(MemberPage::from_page(-5), expected);
    assert_eq!(MemberPage::parse(Some("abc")), expected);
    assert_eq!(MemberPage::parse(Some("")), expected);
    assert_eq!(MemberPage::parse(None), expected);
    assert_eq!(MemberPage::parse(Some("0")), expected);
}

#[test]
fn parse_accepts_plain_numbers() {
    assert_eq!(MemberPage::parse(Some("2")).page, 2);
    assert_eq!(MemberPage::parse(Some(" 4 ")).page, 4);
}

#[test]
fn page_count_is_never_zero() {
    assert_eq!(page_count(0), 1);
    assert_eq!(page_count(1), 1);
    assert_eq!(page_count(50), 1);
    assert_eq!(page_count(51), 2);
    assert_eq!(page_count(101), 3);
    assert_eq!(page_count(125), 3);
}

// --- Scenarios ---

#[tokio::test]
async fn scenario_hidden_admins_group_vs_anonymous() {
    let repo = StubRepository::default().with_group(group("Admins", true, false, 3));

    let access = resolve_group_details_access(&repo, None, "Admins")
        .await
        .unwrap();
    assert_eq!(access, GroupAccess::NotFound);
}

#[tokio::test]
async fn scenario_book_club_page_two() {
    let member = Uuid::new_v4();
    let repo = StubRepository::default()
        .with_group(group("Book Club", false, false, 125))
        .with_member("Book Club", member);

    let grant = granted(
        resolve_group_members_access(
            &repo,
            Some(member),
            "Book Club",
            MemberPage::from_page(2),
        )
        .await
        .unwrap(),
    );
    assert_eq!((grant.window.start, grant.window.stop), (50, 99));
    assert_eq!(grant.page_count, 3);
}

// --- Failure Propagation & Races ---

#[tokio::test]
async fn store_failure_is_never_reported_as_not_found() {
    let repo = StubRepository::default()
        .with_group(group("Book Club", false, false, 125))
        .failing();

    let details = resolve_group_details_access(&repo, None, "Book Club").await;
    assert!(matches!(details, Err(StoreError::Database(_))));

    let members =
        resolve_group_members_access(&repo, None, "Book Club", MemberPage::from_page(1)).await;
    assert!(matches!(members, Err(StoreError::Database(_))));
}

#[tokio::test]
async fn group_deleted_mid_request_resolves_to_not_found() {
    let member = Uuid::new_v4();
    let repo = StubRepository::default()
        .with_group(group("Book Club", false, false, 125))
        .with_member("Book Club", member)
        .vanishing_payload();

    let details = resolve_group_details_access(&repo, Some(member), "Book Club")
        .await
        .unwrap();
    assert_eq!(details, GroupAccess::NotFound);

    let members = resolve_group_members_access(
        &repo,
        Some(member),
        "Book Club",
        MemberPage::from_page(1),
    )
    .await
    .unwrap();
    assert_eq!(members, GroupAccess::NotFound);
}
