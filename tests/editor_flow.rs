mod common;

use assert_matches::assert_matches;
use common::{PRINCIPAL, editor, editor_with, init_logging};
use permission_matrix::config::{EngineConfig, MalformedLevelPolicy};
use permission_matrix::databases::{MemoryGrantStore, StoreCall};
use permission_matrix::error::{PermissionError, PermissionResult, StoreError};
use permission_matrix::resolution::effective_level;
use permission_matrix::session::{ChangeOutcome, PermissionEditor};
use permission_matrix::table::{DatabaseEntryDto, PermissionTableDto};
use permission_matrix::traits::GrantStore;
use permission_matrix::{
    GrantLevel, LevelChoice, PermissionLevel, PermissionTable, Principal, ResourceName, Scope,
};
use std::sync::Arc;
use tokio::sync::Notify;

fn alice() -> Principal {
    Principal::from(PRINCIPAL)
}

/// Unwraps an applied outcome, failing the test on anything else.
fn applied(outcome: ChangeOutcome) -> PermissionTable {
    match outcome {
        ChangeOutcome::Applied(table) => table,
        other => panic!("expected an applied change, got {other:?}"),
    }
}

#[tokio::test]
async fn test_protected_change_waits_and_cancel_touches_nothing() -> PermissionResult<()> {
    init_logging();
    let (store, editor) = editor();
    let before = editor.load().await?;
    store.clear_calls();

    let outcome = editor
        .request_change(Scope::database("_system"), LevelChoice::None)
        .await?;
    assert_eq!(outcome, ChangeOutcome::AwaitingConfirmation { replaced: None });
    assert_eq!(
        editor.pending_change().await.map(|request| request.choice),
        Some(LevelChoice::None)
    );

    let cancelled = editor.cancel_pending_change().await;
    assert_eq!(cancelled.map(|request| request.scope), Some(Scope::database("_system")));
    assert!(editor.pending_change().await.is_none());
    assert!(store.calls().is_empty());
    assert_eq!(editor.table().await, Some(before));
    Ok(())
}

#[tokio::test]
async fn test_confirm_writes_once_then_reloads_once() -> PermissionResult<()> {
    init_logging();
    let (store, editor) = editor();
    editor.load().await?;
    store.clear_calls();

    editor
        .request_change(Scope::database("_system"), LevelChoice::ReadOnly)
        .await?;
    // Last request wins.
    let outcome = editor
        .request_change(Scope::database("_system"), LevelChoice::ReadWrite)
        .await?;
    assert_matches!(outcome, ChangeOutcome::AwaitingConfirmation { replaced: Some(_) });

    let table = editor.confirm_pending_change().await?;

    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Put {
                principal: alice(),
                database: ResourceName::named("_system"),
                collection: None,
                level: GrantLevel::ReadWrite,
            },
            StoreCall::Fetch { principal: alice() },
        ]
    );
    assert_eq!(table.database_default("_system"), PermissionLevel::ReadWrite);
    assert_eq!(editor.table().await, Some(table));
    assert!(editor.pending_change().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_confirm_without_pending_change_fails() {
    let (store, editor) = editor();
    assert_matches!(
        editor.confirm_pending_change().await,
        Err(PermissionError::NoPendingChange)
    );
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_use_default_clears_the_grant() -> PermissionResult<()> {
    let dto = PermissionTableDto::from_entries([(
        "shop".to_string(),
        DatabaseEntryDto::with_permission("rw").collection("orders", "none"),
    )]);
    let (store, editor) = editor_with(dto);
    editor.load().await?;
    store.clear_calls();

    let orders = Scope::collection("shop", "orders");
    let table = applied(
        editor
            .request_change(orders.clone(), LevelChoice::UseDefault)
            .await?,
    );

    assert_eq!(
        store.calls()[0],
        StoreCall::Delete {
            principal: alice(),
            database: ResourceName::named("shop"),
            collection: Some(ResourceName::named("orders")),
        }
    );
    assert_eq!(table.stored(&orders), PermissionLevel::Undefined);

    let view = editor.view().await.expect("table was reloaded");
    assert!(view.cell("shop", None).is_some_and(|shop| shop.is_read_write));
    Ok(())
}

#[tokio::test]
async fn test_clear_then_set_back_restores_effective_level() -> PermissionResult<()> {
    let dto = PermissionTableDto::from_entries([
        ("*".to_string(), DatabaseEntryDto::with_permission("ro")),
        (
            "shop".to_string(),
            DatabaseEntryDto::default().collection("*", "rw").collection("orders", "none"),
        ),
    ]);
    let (_store, editor) = editor_with(dto);
    let orders = ResourceName::named("orders");
    let scope = Scope::collection("shop", orders.clone());

    assert!(editor.view().await.is_none());
    let original = editor.load().await?;
    assert_eq!(effective_level(&original, "shop", Some(&orders)), PermissionLevel::None);

    let cleared = applied(
        editor
            .request_change(scope.clone(), LevelChoice::UseDefault)
            .await?,
    );
    assert_eq!(effective_level(&cleared, "shop", Some(&orders)), PermissionLevel::ReadWrite);

    let restored = applied(editor.request_change(scope, LevelChoice::None).await?);
    assert_eq!(restored, original);
    Ok(())
}

#[tokio::test]
async fn test_write_failure_keeps_previous_table() -> PermissionResult<()> {
    init_logging();
    let (store, editor) = editor();
    let before = editor.load().await?;
    store.clear_calls();
    store.fail_next_write(StoreError::Unauthorized("not an admin".into()));

    let result = editor
        .request_change(Scope::Server, LevelChoice::ReadOnly)
        .await;

    assert_matches!(
        result,
        Err(PermissionError::WriteFailure { scope: Scope::Server, source: StoreError::Unauthorized(_) })
    );
    assert_eq!(store.fetch_count(), 0);
    assert_eq!(editor.table().await, Some(before));
    assert!(!editor.is_busy());

    // Not retried, but the next attempt goes through.
    let table = applied(
        editor
            .request_change(Scope::Server, LevelChoice::ReadOnly)
            .await?,
    );
    assert_eq!(table.server_default(), PermissionLevel::ReadOnly);
    Ok(())
}

#[tokio::test]
async fn test_load_failures_leave_no_table() {
    let (store, editor) = editor();
    store.deny(PRINCIPAL);

    assert_matches!(
        editor.load().await,
        Err(PermissionError::LoadFailure { source: StoreError::Unauthorized(_), .. })
    );
    assert!(editor.table().await.is_none());

    let other = editor.for_principal("nobody");
    assert_matches!(other.load().await, Err(err) => {
        assert_eq!(err.category(), "load");
    });
}

#[tokio::test]
async fn test_failed_reload_after_write_unsets_table() -> PermissionResult<()> {
    let (store, editor) = editor();
    editor.load().await?;
    store.fail_next_fetch(StoreError::Transport("timeout".into()));

    let result = editor
        .request_change(Scope::database("shop"), LevelChoice::ReadOnly)
        .await;

    assert_matches!(result, Err(PermissionError::LoadFailure { .. }));
    assert!(editor.table().await.is_none());
    // The write itself went through.
    let grants = store.grants(&alice()).expect("alice is seeded");
    assert_eq!(grants.databases["shop"].permission.as_deref(), Some("ro"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_levels_follow_policy() -> PermissionResult<()> {
    let dto = PermissionTableDto::from_entries([(
        "shop".to_string(),
        DatabaseEntryDto::with_permission("rwx"),
    )]);

    let (_store, strict) = editor_with(dto.clone());
    assert_matches!(strict.load().await, Err(PermissionError::MalformedLevel(_)));
    assert!(strict.table().await.is_none());

    let store = Arc::new(MemoryGrantStore::new());
    store.seed(PRINCIPAL, dto);
    let config = EngineConfig::builder()
        .malformed_levels(MalformedLevelPolicy::FailClosed)
        .build();
    let lenient = PermissionEditor::new(store, PRINCIPAL, config)?;

    let table = lenient.load().await?;
    assert_eq!(table.database_default("shop"), PermissionLevel::None);
    assert_eq!(table.anomalies().len(), 1);
    assert_eq!(table.anomalies()[0].value, "rwx");
    Ok(())
}

/// Holds every put until released.
#[derive(Default)]
struct HeldWrites {
    inner: MemoryGrantStore,
    release: Notify,
}

impl GrantStore for HeldWrites {
    async fn fetch_permission_table(
        &self,
        principal: &Principal,
    ) -> Result<PermissionTableDto, StoreError> {
        self.inner.fetch_permission_table(principal).await
    }

    async fn put_grant(
        &self,
        principal: &Principal,
        database: &ResourceName,
        collection: Option<&ResourceName>,
        level: GrantLevel,
    ) -> Result<(), StoreError> {
        self.release.notified().await;
        self.inner.put_grant(principal, database, collection, level).await
    }

    async fn delete_grant(
        &self,
        principal: &Principal,
        database: &ResourceName,
        collection: Option<&ResourceName>,
    ) -> Result<(), StoreError> {
        self.inner.delete_grant(principal, database, collection).await
    }
}

fn held_editor() -> PermissionResult<(Arc<HeldWrites>, Arc<PermissionEditor<HeldWrites>>)> {
    let store = Arc::new(HeldWrites::default());
    store.inner.seed(PRINCIPAL, PermissionTableDto::default());
    store.inner.seed("bob", PermissionTableDto::default());
    let editor = PermissionEditor::new(Arc::clone(&store), PRINCIPAL, EngineConfig::default())?;
    Ok((store, Arc::new(editor)))
}

async fn wait_until_busy(editor: &PermissionEditor<HeldWrites>) {
    while !editor.is_busy() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_second_mutation_is_refused_while_one_is_in_flight() -> PermissionResult<()> {
    init_logging();
    let (store, editor) = held_editor()?;

    let first = tokio::spawn({
        let editor = Arc::clone(&editor);
        async move {
            editor
                .request_change(Scope::database("shop"), LevelChoice::ReadWrite)
                .await
        }
    });
    wait_until_busy(&editor).await;

    assert_matches!(
        editor
            .request_change(Scope::database("other"), LevelChoice::ReadOnly)
            .await,
        Err(PermissionError::MutationInFlight(_))
    );

    // Protected changes can still be parked, but not confirmed.
    editor
        .request_change(Scope::database("_system"), LevelChoice::None)
        .await?;
    assert_matches!(
        editor.confirm_pending_change().await,
        Err(PermissionError::MutationInFlight(_))
    );
    assert!(editor.pending_change().await.is_some());

    store.release.notify_one();
    let outcome = first
        .await
        .map_err(|err| PermissionError::TaskFailed(err.to_string()))??;
    assert_matches!(outcome, ChangeOutcome::Applied(_));
    assert!(!editor.is_busy());
    assert_eq!(store.inner.write_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sessions_for_one_principal_share_the_lane() -> PermissionResult<()> {
    let (store, editor) = held_editor()?;
    let twin = editor.for_principal(PRINCIPAL);
    let bob = editor.for_principal("bob");

    let first = tokio::spawn({
        let editor = Arc::clone(&editor);
        async move {
            editor
                .request_change(Scope::database("shop"), LevelChoice::ReadWrite)
                .await
        }
    });
    wait_until_busy(&editor).await;

    assert!(twin.is_busy());
    assert_matches!(
        twin.request_change(Scope::database("shop"), LevelChoice::None)
            .await,
        Err(PermissionError::MutationInFlight(_))
    );
    assert!(!bob.is_busy());

    store.release.notify_one();
    first
        .await
        .map_err(|err| PermissionError::TaskFailed(err.to_string()))??;
    assert!(!twin.is_busy());

    let table = twin.load().await?;
    assert_eq!(table.database_default("shop"), PermissionLevel::ReadWrite);
    assert_eq!(store.inner.write_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_dropping_the_caller_does_not_cancel_an_issued_write() -> PermissionResult<()> {
    let (store, editor) = held_editor()?;

    let caller = tokio::spawn({
        let editor = Arc::clone(&editor);
        async move {
            editor
                .request_change(Scope::database("shop"), LevelChoice::ReadOnly)
                .await
        }
    });
    wait_until_busy(&editor).await;
    caller.abort();
    assert_matches!(caller.await, Err(err) if err.is_cancelled());

    store.release.notify_one();
    while editor.is_busy() {
        tokio::task::yield_now().await;
    }

    let table = editor.table().await.expect("reload finished");
    assert_eq!(table.database_default("shop"), PermissionLevel::ReadOnly);
    Ok(())
}
