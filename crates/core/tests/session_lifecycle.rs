mod common;

use std::time::Duration;

use common::{CODE, EMAIL, Harness};
use quill::QuillError;
use quill::protocol::{ErrorCode, SessionStatus};

const DAY: Duration = Duration::from_secs(24 * 3600);

#[tokio::test]
async fn created_session_is_live_and_persisted() {
	let h = Harness::new();
	let created = h.service.create_session().await.expect("session should be created");

	let report = h.service.session_status(&created.session_id);
	assert!(report.exists);
	assert_eq!(report.status, SessionStatus::Created);
	assert!(report.is_active);
	assert!(report.is_persistent);
	assert!(!report.needs_reconnection);
	assert_eq!(h.site.launches(), 1);
}

#[tokio::test]
async fn unknown_session_reports_not_found() {
	let h = Harness::new();
	let report = h.service.session_status("missing");
	assert!(!report.exists);
	assert_eq!(report.status, SessionStatus::NotFound);

	let err = h.service.reconnect_session("missing").await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::SessionNotFound);
}

#[tokio::test]
async fn failed_launch_leaves_no_record() {
	let h = Harness::new();
	h.site.fail_launches(true);
	let err = h.service.create_session().await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::BrowserFailed);
	assert!(h.store().get_all().is_empty());
	assert!(h.service.registry().is_empty());
}

#[tokio::test]
async fn verification_in_wrong_state_changes_nothing() {
	let h = Harness::new();
	let id = h.service.create_session().await.expect("session should be created").session_id;

	let err = h.service.submit_verification_code(&id, CODE).await.unwrap_err();
	assert!(matches!(err, QuillError::InvalidState { .. }), "{err}");
	assert_eq!(err.code(), ErrorCode::InvalidState);
	assert_eq!(h.service.session_status(&id).status, SessionStatus::Created);

	let err = h.service.wait_for_email_verification(&id, None).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::InvalidState);
	assert_eq!(h.store().get(&id).expect("record should exist").status, SessionStatus::Created);
}

#[tokio::test]
async fn killed_logged_in_session_needs_reconnection() {
	let mut h = Harness::new();
	let id = h.logged_in_session().await;
	h.restart();

	let report = h.service.session_status(&id);
	assert!(report.exists);
	assert_eq!(report.status, SessionStatus::LoggedIn);
	assert!(!report.is_active);
	assert!(report.is_persistent);
	assert!(report.needs_reconnection);
}

#[tokio::test]
async fn closing_keeps_the_record_for_reconnection() {
	let h = Harness::new();
	let id = h.logged_in_session().await;

	assert!(h.service.close_session(&id).await.expect("close should succeed"));
	assert_eq!(h.site.closed_pages(), 1);
	assert!(h.service.session_status(&id).needs_reconnection);
	assert!(!h.service.close_session(&id).await.expect("second close should succeed"));
}

#[tokio::test]
async fn listing_separates_live_and_stored_sessions() {
	let mut h = Harness::new();
	let stored = h.logged_in_session().await;
	h.restart();
	let live = h.service.create_session().await.expect("session should be created").session_id;

	let listing = h.service.list_sessions();
	assert_eq!(listing.active.len(), 1);
	assert_eq!(listing.active[0].id, live);
	assert_eq!(listing.persistent.len(), 2);
	let summary = listing.persistent.iter().find(|s| s.id == stored).expect("stored session should be listed");
	assert_eq!(summary.email.as_deref(), Some(EMAIL));
	assert_eq!(summary.subdomain.as_deref(), Some("adawrites"));
	assert!(summary.is_logged_in);
}

#[tokio::test]
async fn reconnect_is_a_noop_for_live_sessions() {
	let mut h = Harness::new();
	let id = h.logged_in_session().await;
	h.restart();
	let launches = h.site.launches();

	let first = h.service.reconnect_session(&id).await.expect("reconnect should succeed");
	assert!(first.success);
	assert!(first.reconnected);
	assert_eq!(h.site.launches(), launches + 1);

	let second = h.service.reconnect_session(&id).await.expect("second reconnect should succeed");
	assert!(second.success);
	assert!(!second.reconnected);
	assert!(!second.recreated);
	assert_eq!(h.site.launches(), launches + 1);
}

#[tokio::test]
async fn restored_cookies_keep_the_session_signed_in() {
	let mut h = Harness::new();
	let id = h.logged_in_session().await;
	h.restart();
	h.site.clear_events();

	let outcome = h.service.reconnect_session(&id).await.expect("reconnect should succeed");
	assert_eq!(outcome.verified, Some(true));
	assert!(h.site.navigations().last().is_some_and(|url| url == "https://substack.com/settings"));
	assert!(h.site.events().iter().any(|e| matches!(
		e,
		quill::testing::SiteEvent::CookieSet { name, .. } if name == "substack.sid"
	)));
	assert_eq!(h.service.session_status(&id).status, SessionStatus::LoggedIn);
}

#[tokio::test]
async fn rejected_cookies_reconnect_unverified() {
	let mut h = Harness::new();
	let id = h.logged_in_session().await;
	h.restart();
	h.site.reject_cookie_domain(".substack.com");
	h.site.reject_cookie_domain("substack.com");

	let outcome = h.service.reconnect_session(&id).await.expect("reconnect should still succeed");
	assert!(outcome.reconnected);
	assert_eq!(outcome.verified, Some(false));
}

#[tokio::test]
async fn sessions_that_never_logged_in_are_recreated() {
	let mut h = Harness::new();
	let id = h.service.create_session().await.expect("session should be created").session_id;
	h.service.initiate_login(&id, EMAIL).await.expect("login should start");
	h.restart();

	let outcome = h.service.reconnect_session(&id).await.expect("recreate should succeed");
	assert!(outcome.recreated);
	assert_eq!(outcome.verified, None);
	let report = h.service.session_status(&id);
	assert_eq!(report.status, SessionStatus::Created);
	assert!(report.is_active);
	assert_eq!(h.store().get(&id).expect("record should exist").email.as_deref(), Some(EMAIL));
}

#[tokio::test]
async fn cleanup_with_zero_thresholds_clears_everything() {
	let mut h = Harness::new();
	let stored = h.logged_in_session().await;
	h.restart();
	h.service.create_session().await.expect("session should be created");
	h.service.create_session().await.expect("session should be created");

	let report = h.service.cleanup_expired(Duration::ZERO, Duration::ZERO).await;
	assert_eq!(report.closed, 2);
	assert_eq!(report.evicted, 2);
	assert_eq!(report.expired, 1);
	assert!(h.service.registry().is_empty());
	assert!(h.store().get_all().is_empty());
	assert!(!h.service.session_status(&stored).exists);
}

#[tokio::test]
async fn old_browsers_close_before_their_records_expire() {
	let h = Harness::new();
	let id = h.logged_in_session().await;
	h.clock.advance(8 * DAY);

	let policy = h.service.config().cleanup.clone();
	let report = h.service.cleanup_expired(policy.active_max_age, policy.persistent_max_age).await;
	assert_eq!(report.closed, 1);
	assert_eq!(report.evicted, 0);
	assert_eq!(report.expired, 0);
	assert!(h.service.session_status(&id).needs_reconnection);

	h.clock.advance(90 * DAY);
	let report = h.service.cleanup_expired(policy.active_max_age, policy.persistent_max_age).await;
	assert_eq!(report.expired, 1);
	assert!(!h.service.session_status(&id).exists);
}

#[tokio::test]
async fn shutdown_closes_every_browser() {
	let h = Harness::new();
	h.logged_in_session().await;
	h.service.create_session().await.expect("session should be created");

	h.service.shutdown().await;
	assert!(h.service.registry().is_empty());
	assert_eq!(h.site.closed_pages(), 2);
	assert_eq!(h.store().get_all().len(), 2);
}
