use sitegate_types::{
    DeniedReason, EntityRef, PermissionDenied, RankingError, RankingFailure,
};

// ── PermissionDenied ─────────────────────────────────────────────

#[test]
fn denied_reason_status_codes() {
    assert_eq!(DeniedReason::LoginPage.status_code(), 401);
    assert_eq!(DeniedReason::OpOnly.status_code(), 403);
    assert_eq!(DeniedReason::Denied.status_code(), 403);
}

#[test]
fn login_page_display() {
    let err = PermissionDenied::login_page();
    let msg = format!("{err}");
    assert!(msg.contains("401"));
    assert!(msg.contains("logged in"));
    assert!(err.permission.is_none());
}

#[test]
fn op_only_display() {
    let err = PermissionDenied::op_only();
    assert!(format!("{err}").contains("operators"));
    assert_eq!(err.status_code(), 403);
}

#[test]
fn missing_permission_is_named() {
    let err = PermissionDenied::missing("post.delete");
    assert_eq!(err.reason, DeniedReason::Denied);
    assert_eq!(err.permission.as_deref(), Some("post.delete"));
    assert!(format!("{err}").contains("missing post.delete"));
}

#[test]
fn bare_denied_has_no_permission() {
    let err = PermissionDenied::denied();
    assert_eq!(err.reason, DeniedReason::Denied);
    assert!(!format!("{err}").contains("missing"));
}

#[test]
fn denied_round_trips_through_json() {
    let err = PermissionDenied::missing("site.manage");
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"DENIED\""));
    let back: PermissionDenied = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}

// ── RankingError ─────────────────────────────────────────────────

#[test]
fn ranking_error_carries_both_parties() {
    let err = RankingError::new(
        EntityRef::user("bob"),
        Some(EntityRef::user("alice")),
        "staff",
        RankingFailure::PromoterRankTooLow,
    );
    assert_eq!(err.target, EntityRef::user("bob"));
    assert_eq!(err.promoter, Some(EntityRef::user("alice")));

    let msg = format!("{err}");
    assert!(msg.contains("user:bob"));
    assert!(msg.contains("staff"));
    assert!(msg.contains("not high enough"));
}

#[test]
fn ranking_failure_display() {
    assert!(RankingFailure::NotInLadder.to_string().contains("not on the ladder"));
    assert!(RankingFailure::AlreadyHighest.to_string().contains("highest"));
    assert!(RankingFailure::AlreadyLowest.to_string().contains("lowest"));
    assert!(RankingFailure::PromoterNotRanked.to_string().contains("no rank"));
}

#[test]
fn error_is_debug() {
    let err = PermissionDenied::op_only();
    let _ = format!("{err:?}");
}
