/// Router Module Index
///
/// Organizes the routing logic into access-segregated modules so the access
/// level of every endpoint is explicit at the module level (via Axum layers)
/// rather than scattered through handler bodies.

/// Routes accessible to all users, including anonymous guests. Visibility of
/// hidden groups is enforced by the access policy behind these handlers, not
/// by the router.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware. Requires a
/// validated user session.
pub mod authenticated;
