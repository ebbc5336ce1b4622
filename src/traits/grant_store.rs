use crate::error::StoreError;
use crate::table::PermissionTableDto;
use crate::traits::permissions::{GrantLevel, Principal, ResourceName};
use std::future::Future;
use std::sync::Arc;

/// Data-access boundary for a principal's grants.
///
/// Implementations talk to whatever enforces the grants (an HTTP admin API,
/// an embedded catalog, the in-memory store used in tests). The engine never
/// persists anything itself; it only reads the full table and requests
/// scope-addressed writes and deletes through this trait.
///
/// Addresses are `(database, collection)` pairs as produced by
/// [`Scope::address`](crate::traits::permissions::Scope::address): a wildcard
/// database is the server default, a wildcard collection the collection-level
/// default of that database.
///
/// Writes must be idempotent: repeating a put or delete with the same
/// arguments leaves the store in the same state.
pub trait GrantStore: Send + Sync {
    /// Fetches the complete table of `principal`.
    fn fetch_permission_table(
        &self,
        principal: &Principal,
    ) -> impl Future<Output = Result<PermissionTableDto, StoreError>> + Send;

    /// Writes an explicit grant.
    fn put_grant(
        &self,
        principal: &Principal,
        database: &ResourceName,
        collection: Option<&ResourceName>,
        level: GrantLevel,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes an explicit grant so the address inherits again.
    fn delete_grant(
        &self,
        principal: &Principal,
        database: &ResourceName,
        collection: Option<&ResourceName>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: GrantStore> GrantStore for Arc<S> {
    fn fetch_permission_table(
        &self,
        principal: &Principal,
    ) -> impl Future<Output = Result<PermissionTableDto, StoreError>> + Send {
        (**self).fetch_permission_table(principal)
    }

    fn put_grant(
        &self,
        principal: &Principal,
        database: &ResourceName,
        collection: Option<&ResourceName>,
        level: GrantLevel,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).put_grant(principal, database, collection, level)
    }

    fn delete_grant(
        &self,
        principal: &Principal,
        database: &ResourceName,
        collection: Option<&ResourceName>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).delete_grant(principal, database, collection)
    }
}
