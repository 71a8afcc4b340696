use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Represents the user's canonical identity record stored in the `public.profiles` table.
/// This structure includes the minimal required data resolved during authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    // Primary Key, shared with the external auth.users table.
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Group
///
/// The full group payload from the `public.groups` table, as returned for the
/// details page. The `name` column is the stable key; `slug` is the URL-safe
/// alias resolved to it before any access check runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Group {
    pub name: String,
    pub slug: String,
    pub description: String,

    // Visibility: a hidden group must never leak to actors without membership,
    // an invitation, or a moderation role.
    pub hidden: bool,
    // Built-in groups ("administrators", "Global Moderators", ...) cannot have
    // a conventional owner; the global-moderator ownership override does not
    // apply to them.
    pub system: bool,

    // Denormalized counter maintained by membership triggers.
    pub member_count: i64,

    // S3 object key of the cover image, if one was uploaded.
    pub cover_image: Option<String>,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,

    /// Ownership relative to the requesting actor. The repository resolves the
    /// raw flag; the access policy replaces it with the *effective* flag
    /// (raw OR administrator OR global-moderator-on-non-system-group) before
    /// the payload leaves the server.
    #[sqlx(default)]
    pub is_owner: bool,
}

/// GroupSummary
///
/// Listing subset of a group, used for the directory tiles on the groups index.
/// Hidden groups are filtered out at the repository layer and never reach this
/// structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct GroupSummary {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub member_count: i64,
    pub cover_image: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// MemberEntry
///
/// A single row of the paginated member list (joined from `group_membership`
/// and `public.profiles`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct MemberEntry {
    pub id: Uuid,
    pub username: String,
    pub picture: Option<String>,
}

/// GroupSort
///
/// Sort orders accepted by the groups directory. Unknown or absent values fall
/// back to alphabetical; a bad `sort` is a preference, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupSort {
    #[default]
    Alpha,
    MemberCount,
    CreationDate,
}

impl GroupSort {
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some("count") => GroupSort::MemberCount,
            Some("date") => GroupSort::CreationDate,
            _ => GroupSort::Alpha,
        }
    }
}

/// --- Request Payloads (Input Schemas) ---

/// CoverUploadRequest
///
/// Input payload for requesting a group cover upload (POST /groups/{slug}/cover).
/// The client completes the actual transfer directly against object storage via
/// the returned presigned URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CoverUploadRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "cover.jpg")]
    pub filename: String,
    /// The MIME type, used to constrain the S3 upload to the allowed type.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// --- Response Schemas (Output) ---

/// GroupListResponse
///
/// Output schema for the groups directory (GET /groups).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GroupListResponse {
    pub groups: Vec<GroupSummary>,
    /// Whether the requesting actor may create new groups.
    pub allow_group_creation: bool,
    /// Offset the client should request next for incremental loading.
    pub next_start: i64,
}

/// GroupDetailsResponse
///
/// Output schema for the group details page. `group.is_owner` carries the
/// effective ownership flag; the two role flags are attached for downstream
/// display (moderation controls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GroupDetailsResponse {
    pub group: Group,
    pub is_administrator: bool,
    pub is_global_moderator: bool,
}

/// GroupMembersResponse
///
/// Output schema for one page of a group's member list. Pages are 1-based and
/// fixed at 50 users per page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GroupMembersResponse {
    pub users: Vec<MemberEntry>,
    pub page: i64,
    pub page_count: i64,
}

/// CoverUploadResponse
///
/// Output schema containing the presigned upload URL and the persisted cover
/// object key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CoverUploadResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The S3 object key now recorded as the group's cover image.
    pub cover_key: String,
}
