//! Integration tests for the permission store and access gates.

mod common;

use common::{eventually, manifest, rejected, MockPermissions, Step};
use opsdesk_core::error::ErrorCode;
use opsdesk_core::rbac::{AccessGate, Capability, CapabilityRecord, Fallback, Gated, PermissionStore};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

fn hr_manifest() -> opsdesk_core::rbac::PermissionManifest {
    manifest(
        "u-1",
        json!([
            { "code": "HR_USERS", "canView": true, "canCreate": false, "canEdit": false, "canDelete": false, "active": true },
            { "code": "QUOTATIONS", "canView": true, "canCreate": true, "canEdit": true, "canDelete": true, "active": false }
        ]),
    )
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_concurrent_loads_issue_one_request() {
    let source = MockPermissions::new();
    let gate = Arc::new(Notify::new());
    source.script(Step::ok(hr_manifest()).gated(&gate));

    let store = PermissionStore::new(source.clone());
    let release = async {
        gate.notify_one();
    };

    let (first, second, _) = tokio::join!(store.load(), store.load(), release);

    assert_eq!(source.calls(), 1);
    let first = first.unwrap();
    let second = second.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(store.is_loaded());
}

#[tokio::test]
async fn test_begin_session_names_subject() {
    let source = MockPermissions::new();
    source.script(Step::ok(hr_manifest()));

    let store = PermissionStore::new(source.clone());
    store.begin_session("u-1");
    store.load().await.unwrap();

    assert_eq!(source.subjects()[0].as_ref().map(|s| s.as_str()), Some("u-1"));
    assert_eq!(store.subject().unwrap().as_str(), "u-1");
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_model() {
    let source = MockPermissions::new();
    source.script(Step::ok(hr_manifest()));
    source.script(Step::err(rejected(500, json!({ "message": "Directory unavailable" }))));

    let store = PermissionStore::new(source.clone());
    let original = store.load().await.unwrap();

    let err = store.load().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionLoadFailed);
    assert_eq!(store.last_error().as_deref(), Some("Directory unavailable"));

    let kept = store.snapshot().unwrap();
    assert!(Arc::ptr_eq(&original, &kept));
    assert!(store.current_capability("HR_USERS").can_view);
}

#[tokio::test]
async fn test_successful_reload_clears_last_error() {
    let source = MockPermissions::new();
    source.script(Step::err(rejected(500, json!({ "message": "Directory unavailable" }))));
    source.script(Step::ok(hr_manifest()));

    let store = PermissionStore::new(source.clone());
    assert!(store.load().await.is_err());
    assert!(!store.is_loaded());

    store.load().await.unwrap();
    assert!(store.last_error().is_none());
}

#[tokio::test]
async fn test_clear_beats_inflight_load() {
    let source = MockPermissions::new();
    let gate = Arc::new(Notify::new());
    source.script(Step::ok(hr_manifest()).gated(&gate));

    let store = PermissionStore::new(source.clone());
    let loader = store.clone();
    let pending = tokio::spawn(async move { loader.load().await });

    eventually(|| source.calls() == 1).await;
    store.clear();
    gate.notify_one();

    assert!(pending.await.unwrap().is_err());
    assert!(store.snapshot().is_none());
    assert_eq!(store.current_capability("HR_USERS"), CapabilityRecord::none());
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let source = MockPermissions::new();
    source.script(Step::ok(hr_manifest()));

    let store = PermissionStore::new(source.clone());
    store.load().await.unwrap();

    store.clear();
    store.clear();
    assert!(!store.is_loaded());
    assert!(store.subject().is_none());
}

#[tokio::test]
async fn test_subscribers_see_replacement_and_clear() {
    let source = MockPermissions::new();
    source.script(Step::ok(hr_manifest()));

    let store = PermissionStore::new(source.clone());
    let mut rx = store.subscribe();

    store.load().await.unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_some());

    store.clear();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_none());
}

// ============================================================================
// Gates against the store
// ============================================================================

#[tokio::test]
async fn test_gate_scenario_hr_users() {
    let source = MockPermissions::new();
    source.script(Step::ok(hr_manifest()));
    let store = PermissionStore::new(source);
    store.load().await.unwrap();

    let view = AccessGate::new("HR_USERS").render(&store, || "user list");
    assert!(matches!(view, Gated::Content("user list")));

    let create = AccessGate::new("HR_USERS")
        .require(Capability::Create)
        .fallback(Fallback::message("No access"))
        .render(&store, || "new user form");
    match create {
        Gated::Fallback(fallback) => assert_eq!(fallback.text(), Some("No access")),
        Gated::Content(_) => panic!("create should be denied"),
    }
}

#[tokio::test]
async fn test_inactive_module_denies_everything() {
    let source = MockPermissions::new();
    source.script(Step::ok(hr_manifest()));
    let store = PermissionStore::new(source);
    store.load().await.unwrap();

    for capability in Capability::all() {
        assert!(!AccessGate::new("QUOTATIONS").require(capability).allows(&store));
    }
}

#[tokio::test]
async fn test_gate_without_session_denies() {
    let store = PermissionStore::new(MockPermissions::new());

    let err = AccessGate::new("HR_USERS").enforce(&store).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AuthorizationDenied);
}
