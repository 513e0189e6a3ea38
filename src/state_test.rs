use super::*;

fn profile_json() -> serde_json::Value {
    serde_json::json!({
        "uid": "u-1",
        "email": "asha@example.com",
        "displayName": "Asha",
        "photoURL": "https://cdn.example.com/a.png",
        "role": "STUDENT",
        "membershipStatus": "approved",
        "createdAt": "2024-01-01T00:00:00Z",
        "institute": "IISER Bhopal",
        "course": "BS-MS",
        "bio": null,
        "parasStones": 100,
        "coins": 3,
        "parasHistory": [
            { "amount": 100, "transaction_type": "earning", "reason": "signup", "timestamp": "2024-01-01T00:00:00Z" }
        ]
    })
}

// =============================================================================
// SessionUser deserialization
// =============================================================================

#[test]
fn session_user_parses_full_profile() {
    let user: SessionUser = serde_json::from_value(profile_json()).unwrap();
    assert_eq!(user.uid, "u-1");
    assert_eq!(user.display_name(), Some("Asha"));
    assert_eq!(user.photo_url.as_deref(), Some("https://cdn.example.com/a.png"));
    assert_eq!(user.role, UserRole::Student);
    assert_eq!(user.membership_status, Some(MembershipStatus::Approved));
    assert_eq!(user.paras_stones, 100);
    assert_eq!(user.paras_history.len(), 1);
    assert_eq!(user.paras_history[0].reason.as_deref(), Some("signup"));
}

#[test]
fn session_user_numeric_uid() {
    let mut json = profile_json();
    json["uid"] = serde_json::json!(42);
    let user: SessionUser = serde_json::from_value(json).unwrap();
    assert_eq!(user.uid, "42");
}

#[test]
fn session_user_minimal_profile_defaults() {
    let user: SessionUser = serde_json::from_value(serde_json::json!({
        "uid": "u-2",
        "email": "b@example.com",
        "role": "TEACHER",
        "parasHistory": null
    }))
    .unwrap();
    assert_eq!(user.paras_stones, 0);
    assert!(user.paras_history.is_empty());
    assert_eq!(user.display_name(), None);
}

#[test]
fn session_user_unknown_role_tolerated() {
    let mut json = profile_json();
    json["role"] = serde_json::json!("MODERATOR");
    let user: SessionUser = serde_json::from_value(json).unwrap();
    assert_eq!(user.role, UserRole::Unknown);
}

#[test]
fn blank_display_name_is_none() {
    let mut json = profile_json();
    json["displayName"] = serde_json::json!("   ");
    let user: SessionUser = serde_json::from_value(json).unwrap();
    assert_eq!(user.display_name(), None);
}

#[test]
fn identity_projection() {
    let user: SessionUser = serde_json::from_value(profile_json()).unwrap();
    assert_eq!(user.identity(), AuthUser { uid: "u-1".into(), email: "asha@example.com".into() });
}

// =============================================================================
// SessionState predicates
// =============================================================================

#[test]
fn default_state_is_uninitialized_and_loading() {
    let state = SessionState::default();
    assert_eq!(state, SessionState::Uninitialized);
    assert!(state.is_loading());
    assert!(!state.is_authenticated());
}

#[test]
fn authenticated_always_has_user() {
    let user: SessionUser = serde_json::from_value(profile_json()).unwrap();
    let state = SessionState::Authenticated(user);
    assert!(state.is_authenticated());
    assert!(state.user().is_some());
    assert!(!state.is_loading());
}

#[test]
fn anonymous_has_no_user() {
    let state = SessionState::Anonymous;
    assert!(!state.is_authenticated());
    assert!(state.user().is_none());
    assert!(!state.is_loading());
}

// =============================================================================
// SessionSubscription
// =============================================================================

#[tokio::test]
async fn subscription_sees_changes() {
    let (tx, rx) = watch::channel(SessionState::Uninitialized);
    let mut sub = SessionSubscription::new(rx);
    assert!(sub.is_loading());

    tx.send_replace(SessionState::Anonymous);
    assert_eq!(sub.changed().await, Some(SessionState::Anonymous));
    assert!(!sub.is_authenticated());
}

#[tokio::test]
async fn subscription_resolved_skips_loading() {
    let (tx, rx) = watch::channel(SessionState::Loading);
    let mut sub = SessionSubscription::new(rx);

    let writer = async {
        tokio::task::yield_now().await;
        tx.send_replace(SessionState::Anonymous);
    };
    let (resolved, ()) = tokio::join!(sub.resolved(), writer);
    assert_eq!(resolved, Some(SessionState::Anonymous));
}

#[tokio::test]
async fn subscription_ends_when_writer_dropped() {
    let (tx, rx) = watch::channel(SessionState::Anonymous);
    let mut sub = SessionSubscription::new(rx);
    drop(tx);
    assert_eq!(sub.changed().await, None);
}
