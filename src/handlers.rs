use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    models::{
        CoverUploadRequest, CoverUploadResponse, GroupDetailsResponse, GroupListResponse,
        GroupMembersResponse, GroupSort,
    },
    policy::{self, GroupAccess, MemberPage},
    repository::StoreError,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// GroupListQuery
///
/// Accepted query parameters for the groups directory (GET /groups). The raw
/// sort string is parsed leniently; unknown values mean alphabetical.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct GroupListQuery {
    /// Sort order: "alpha" (default), "count", or "date".
    pub sort: Option<String>,
}

/// MembersQuery
///
/// Accepted query parameters for the member list. `page` is taken as a raw
/// string so that non-numeric input degrades to page 1 instead of a 400; a
/// garbled page number is a preference, not an error.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct MembersQuery {
    pub page: Option<String>,
}

/// Directory window served by the list endpoint (15 tiles, inclusive bounds).
const LIST_START: i64 = 0;
const LIST_STOP: i64 = 14;

/// Maps a store failure to the HTTP edge: log the cause, answer 500. This is
/// the one place `FetchFailed` becomes user-visible, and it must stay
/// distinct from the 404-shaped denials.
fn store_failure(operation: &str, err: StoreError) -> StatusCode {
    tracing::error!("{operation} failed: {err}");
    StatusCode::INTERNAL_SERVER_ERROR
}

// --- Handlers ---

/// list_groups
///
/// [Public Route] The groups directory: visible groups only, sortable by
/// name, member count, or creation date. The group-creation privilege for the
/// actor is checked concurrently with the listing fetch.
#[utoipa::path(
    get,
    path = "/groups",
    params(GroupListQuery),
    responses((status = 200, description = "Visible groups", body = GroupListResponse))
)]
pub async fn list_groups(
    actor: MaybeAuthUser,
    State(state): State<AppState>,
    Query(query): Query<GroupListQuery>,
) -> Result<Json<GroupListResponse>, StatusCode> {
    let sort = GroupSort::from_query(query.sort.as_deref());

    let (groups, allow_group_creation) = tokio::try_join!(
        state.repo.group_summaries(sort, LIST_START, LIST_STOP),
        state.repo.can_create_group(actor.actor_id()),
    )
    .map_err(|e| store_failure("list groups", e))?;

    Ok(Json(GroupListResponse {
        groups,
        allow_group_creation,
        next_start: LIST_STOP + 1,
    }))
}

/// get_group_details
///
/// [Public Route] The group details page. The slug is resolved to the
/// canonical name first; every denial the access policy produces renders as
/// the same 404 a nonexistent slug does, so the response never discloses that
/// a hidden group exists.
#[utoipa::path(
    get,
    path = "/groups/{slug}",
    params(("slug" = String, Path, description = "Group slug")),
    responses(
        (status = 200, description = "Group details", body = GroupDetailsResponse),
        (status = 404, description = "No such group (or not visible to you)")
    )
)]
pub async fn get_group_details(
    actor: MaybeAuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<GroupDetailsResponse>, StatusCode> {
    let name = state
        .repo
        .resolve_slug(&slug)
        .await
        .map_err(|e| store_failure("resolve group slug", e))?
        .ok_or(StatusCode::NOT_FOUND)?;

    let access = policy::resolve_group_details_access(state.repo.as_ref(), actor.actor_id(), &name)
        .await
        .map_err(|e| store_failure("group details access", e))?;

    match access {
        GroupAccess::Granted(details) => Ok(Json(details)),
        GroupAccess::NotFound => Err(StatusCode::NOT_FOUND),
    }
}

/// get_group_members
///
/// [Public Route] One page of a group's member list (50 users per page,
/// 1-based). Note the gate here is narrower than the details page: an
/// invitation alone does not expose the member list of a hidden group.
#[utoipa::path(
    get,
    path = "/groups/{slug}/members",
    params(("slug" = String, Path, description = "Group slug"), MembersQuery),
    responses(
        (status = 200, description = "Member page", body = GroupMembersResponse),
        (status = 404, description = "No such group (or not visible to you)")
    )
)]
pub async fn get_group_members(
    actor: MaybeAuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<MembersQuery>,
) -> Result<Json<GroupMembersResponse>, StatusCode> {
    let page = MemberPage::parse(query.page.as_deref());

    let name = state
        .repo
        .resolve_slug(&slug)
        .await
        .map_err(|e| store_failure("resolve group slug", e))?
        .ok_or(StatusCode::NOT_FOUND)?;

    let access =
        policy::resolve_group_members_access(state.repo.as_ref(), actor.actor_id(), &name, page)
            .await
            .map_err(|e| store_failure("group members access", e))?;

    let grant = match access {
        GroupAccess::Granted(grant) => grant,
        GroupAccess::NotFound => return Err(StatusCode::NOT_FOUND),
    };

    // The decision carries the window; fetching the rows is response shaping.
    let users = state
        .repo
        .group_members(&name, grant.window.start, grant.window.stop)
        .await
        .map_err(|e| store_failure("fetch member page", e))?;

    Ok(Json(GroupMembersResponse {
        users,
        page: grant.window.page,
        page_count: grant.page_count,
    }))
}

/// upload_group_cover
///
/// [Authenticated Route] Issues a presigned upload URL for a group cover
/// image and records the new cover key.
///
/// *Authorization*: raw ownership only; administrators and global moderators
/// get no override here. The privilege failure is a 403, deliberately
/// distinguishable from the policy's 404-shaped denials: an owner-only action
/// on a group you can already see leaks nothing by saying "forbidden".
#[utoipa::path(
    post,
    path = "/groups/{slug}/cover",
    params(("slug" = String, Path, description = "Group slug")),
    request_body = CoverUploadRequest,
    responses(
        (status = 200, description = "Presigned upload URL", body = CoverUploadResponse),
        (status = 400, description = "Not an image type"),
        (status = 403, description = "Not the group owner"),
        (status = 404, description = "No such group")
    )
)]
pub async fn upload_group_cover(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<CoverUploadRequest>,
) -> Result<Json<CoverUploadResponse>, StatusCode> {
    // Fail fast on non-image uploads; this is input validation, not access
    // control.
    if !payload.file_type.starts_with("image/") {
        return Err(StatusCode::BAD_REQUEST);
    }

    let name = state
        .repo
        .resolve_slug(&slug)
        .await
        .map_err(|e| store_failure("resolve group slug", e))?
        .ok_or(StatusCode::NOT_FOUND)?;

    let is_owner = state
        .repo
        .is_owner(Some(user_id), &name)
        .await
        .map_err(|e| store_failure("cover ownership check", e))?;
    if !is_owner {
        return Err(StatusCode::FORBIDDEN);
    }

    // Unique object key under the group's cover prefix.
    let extension = std::path::Path::new(&payload.filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("bin");
    let object_key = format!("covers/{}/{}.{}", slug, Uuid::new_v4(), extension);

    let upload_url = match state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
    {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("cover presign failed: {e}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    // Record the key; a false here means the group row vanished mid-request.
    let updated = state
        .repo
        .set_group_cover(&name, &object_key)
        .await
        .map_err(|e| store_failure("persist cover key", e))?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(CoverUploadResponse {
        upload_url,
        cover_key: object_key,
    }))
}
