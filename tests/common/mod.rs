// Common test utilities and helpers
#![allow(dead_code)]

use permission_matrix::config::{EngineConfig, MalformedLevelPolicy};
use permission_matrix::databases::MemoryGrantStore;
use permission_matrix::session::PermissionEditor;
use permission_matrix::table::{DatabaseEntryDto, PermissionTableDto};
use permission_matrix::{PermissionLevel, PermissionTable, Principal};
use std::sync::Arc;

pub const PRINCIPAL: &str = "alice";

/// Route library logs to the test output; safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds a table with server default `s`, database `db` at `d` and its
/// collection default at `c`. `Undefined` levels are written as such, so the
/// rows exist but carry no grant.
pub fn scope_table(s: PermissionLevel, d: PermissionLevel, c: PermissionLevel) -> PermissionTable {
    let dto = PermissionTableDto::from_entries([
        ("*".to_string(), DatabaseEntryDto::with_permission(s.to_string())),
        (
            "db".to_string(),
            DatabaseEntryDto::with_permission(d.to_string())
                .collection("*", c.to_string())
                .collection("items", PermissionLevel::Undefined.to_string()),
        ),
    ]);
    PermissionTable::from_dto(Principal::from(PRINCIPAL), dto, MalformedLevelPolicy::Reject)
        .expect("well-formed levels")
}

/// A store holding `dto` for the test principal and an editor over it.
pub fn editor_with(
    dto: PermissionTableDto,
) -> (Arc<MemoryGrantStore>, PermissionEditor<MemoryGrantStore>) {
    let store = Arc::new(MemoryGrantStore::new().with_databases(["_system", "shop"]));
    store.seed(PRINCIPAL, dto);
    let editor = PermissionEditor::new(Arc::clone(&store), PRINCIPAL, EngineConfig::default())
        .expect("default config is valid");
    (store, editor)
}

pub fn editor() -> (Arc<MemoryGrantStore>, PermissionEditor<MemoryGrantStore>) {
    editor_with(PermissionTableDto::default())
}
