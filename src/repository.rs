use crate::models::{Group, GroupSort, GroupSummary, MemberEntry, User};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Built-in group holding site administrators. Membership in it is what makes
/// an actor an administrator.
pub const ADMINISTRATORS: &str = "administrators";
/// Built-in group holding global moderators.
pub const GLOBAL_MODERATORS: &str = "Global Moderators";

/// StoreError
///
/// A failed lookup against the backing store. This is deliberately a separate
/// outcome from "group not found": the access policy must be able to tell a
/// broken store apart from a denial, even though the HTTP edge renders a
/// denial and a genuine miss identically.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database query failed (store unreachable, malformed
    /// row, constraint trouble). Never retried at this layer.
    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations the group
/// pages need. The access policy and the handlers only ever see this trait,
/// never the concrete implementation (Postgres in production, an in-memory
/// stub in tests).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's task boundaries.
///
/// Actor identity is `Option<Uuid>`: `None` is the anonymous guest. Every
/// actor-scoped check must answer `false` for `None` without touching the
/// store. All reads are fresh per request; nothing here caches.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Group Identity & Visibility ---
    /// Resolves a URL slug to the canonical group name, or `None`.
    async fn resolve_slug(&self, slug: &str) -> Result<Option<String>, StoreError>;
    async fn group_exists(&self, name: &str) -> Result<bool, StoreError>;
    async fn group_is_hidden(&self, name: &str) -> Result<bool, StoreError>;

    // --- Group Retrieval ---
    /// Fetches the full group payload with `is_owner` resolved relative to
    /// `actor`. Returns `Ok(None)` if the group vanished since the existence
    /// check (the delete race the details flow tolerates).
    async fn group_get(&self, name: &str, actor: Option<Uuid>) -> Result<Option<Group>, StoreError>;
    /// Directory listing over visible (non-hidden) groups, window inclusive.
    async fn group_summaries(
        &self,
        sort: GroupSort,
        start: i64,
        stop: i64,
    ) -> Result<Vec<GroupSummary>, StoreError>;
    /// One window of the member list, inclusive of both bounds.
    async fn group_members(
        &self,
        name: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<MemberEntry>, StoreError>;

    // --- Actor Relations ---
    async fn is_member(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError>;
    async fn is_invited(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError>;
    /// Raw ownership only; the administrative overrides live in the access
    /// policy, not here.
    async fn is_owner(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError>;

    // --- Actor Roles ---
    async fn is_administrator(&self, actor: Option<Uuid>) -> Result<bool, StoreError>;
    async fn is_global_moderator(&self, actor: Option<Uuid>) -> Result<bool, StoreError>;
    /// Combined role probe used by the member-list gate.
    async fn is_admin_or_global_mod(&self, actor: Option<Uuid>) -> Result<bool, StoreError>;
    /// Group-creation privilege. Registered users may create groups; guests
    /// may not.
    async fn can_create_group(&self, actor: Option<Uuid>) -> Result<bool, StoreError>;

    // --- Mutations ---
    /// Records the cover object key for a group. Returns false if the group
    /// row no longer exists.
    async fn set_group_cover(&self, name: &str, object_key: &str) -> Result<bool, StoreError>;

    // --- Auth Support ---
    /// Identity lookup used by the authentication extractor.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Membership probe shared by `is_member` and the role checks (roles are
    /// membership in the built-in groups).
    async fn membership_exists(&self, actor: Uuid, name: &str) -> Result<bool, StoreError> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_membership WHERE group_name = $1 AND user_id = $2)",
        )
        .bind(name)
        .bind(actor)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn resolve_slug(&self, slug: &str) -> Result<Option<String>, StoreError> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM groups WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn group_exists(&self, name: &str) -> Result<bool, StoreError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM groups WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn group_is_hidden(&self, name: &str) -> Result<bool, StoreError> {
        // A missing row reads as "not hidden"; the existence gate upstream is
        // responsible for missing groups.
        let hidden = sqlx::query_scalar::<_, bool>("SELECT hidden FROM groups WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hidden.unwrap_or(false))
    }

    /// group_get
    ///
    /// Resolves the raw `is_owner` flag in the same round trip via an EXISTS
    /// subquery. Binding a NULL actor makes the subquery false, which is the
    /// correct answer for guests.
    async fn group_get(&self, name: &str, actor: Option<Uuid>) -> Result<Option<Group>, StoreError> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.name, g.slug, g.description, g.hidden, g.system,
                   g.member_count, g.cover_image, g.created_at,
                   EXISTS(
                       SELECT 1 FROM group_ownership o
                       WHERE o.group_name = g.name AND o.user_id = $2
                   ) AS is_owner
            FROM groups g
            WHERE g.name = $1
            "#,
        )
        .bind(name)
        .bind(actor)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    /// group_summaries
    ///
    /// Uses QueryBuilder so the three sort orders share one base query. Only
    /// the window bounds are bound parameters; the ORDER BY arm is chosen from
    /// a fixed set, never from user input directly.
    async fn group_summaries(
        &self,
        sort: GroupSort,
        start: i64,
        stop: i64,
    ) -> Result<Vec<GroupSummary>, StoreError> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT name, slug, description, member_count, cover_image, created_at
            FROM groups
            WHERE hidden = false
            "#,
        );

        builder.push(match sort {
            GroupSort::Alpha => " ORDER BY name ASC",
            GroupSort::MemberCount => " ORDER BY member_count DESC, name ASC",
            GroupSort::CreationDate => " ORDER BY created_at DESC, name ASC",
        });

        let limit = (stop - start + 1).max(0);
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(start.max(0));

        let groups = builder
            .build_query_as::<GroupSummary>()
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }

    async fn group_members(
        &self,
        name: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<MemberEntry>, StoreError> {
        let limit = (stop - start + 1).max(0);
        let users = sqlx::query_as::<_, MemberEntry>(
            r#"
            SELECT u.id, u.username, u.picture
            FROM group_membership m
            JOIN profiles u ON u.id = m.user_id
            WHERE m.group_name = $1
            ORDER BY m.joined_at ASC, u.username ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(name)
        .bind(limit)
        .bind(start.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn is_member(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError> {
        match actor {
            Some(actor) => self.membership_exists(actor, name).await,
            None => Ok(false),
        }
    }

    async fn is_invited(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError> {
        let Some(actor) = actor else {
            return Ok(false);
        };
        let invited = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_invites WHERE group_name = $1 AND user_id = $2)",
        )
        .bind(name)
        .bind(actor)
        .fetch_one(&self.pool)
        .await?;
        Ok(invited)
    }

    async fn is_owner(&self, actor: Option<Uuid>, name: &str) -> Result<bool, StoreError> {
        let Some(actor) = actor else {
            return Ok(false);
        };
        let owner = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_ownership WHERE group_name = $1 AND user_id = $2)",
        )
        .bind(name)
        .bind(actor)
        .fetch_one(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn is_administrator(&self, actor: Option<Uuid>) -> Result<bool, StoreError> {
        self.is_member(actor, ADMINISTRATORS).await
    }

    async fn is_global_moderator(&self, actor: Option<Uuid>) -> Result<bool, StoreError> {
        self.is_member(actor, GLOBAL_MODERATORS).await
    }

    /// is_admin_or_global_mod
    ///
    /// Single round trip over both built-in groups; the member-list gate only
    /// needs the disjunction.
    async fn is_admin_or_global_mod(&self, actor: Option<Uuid>) -> Result<bool, StoreError> {
        let Some(actor) = actor else {
            return Ok(false);
        };
        let privileged = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM group_membership
                WHERE user_id = $1 AND group_name IN ($2, $3)
            )
            "#,
        )
        .bind(actor)
        .bind(ADMINISTRATORS)
        .bind(GLOBAL_MODERATORS)
        .fetch_one(&self.pool)
        .await?;
        Ok(privileged)
    }

    async fn can_create_group(&self, actor: Option<Uuid>) -> Result<bool, StoreError> {
        let Some(actor) = actor else {
            return Ok(false);
        };
        let registered =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM profiles WHERE id = $1)")
                .bind(actor)
                .fetch_one(&self.pool)
                .await?;
        Ok(registered)
    }

    async fn set_group_cover(&self, name: &str, object_key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE groups SET cover_image = $2 WHERE name = $1")
            .bind(name)
            .bind(object_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, username, email FROM profiles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }
}
