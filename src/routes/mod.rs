/// Router Module Index
///
/// Groups the HTTP surface by access level. Access control is applied at the module level
/// (Axum layers) and again inside handlers via the `AuthUser` extractor.

/// Routes accessible to anyone.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
pub mod authenticated;

/// Role and user administration, restricted to the super role.
pub mod admin;
