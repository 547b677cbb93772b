mod common;

use std::time::Duration;

use common::Harness;
use quill::QuillError;
use quill::protocol::{ErrorCode, PostRequest};
use quill::testing::SiteEvent;
use quill::testing::preset::{self, COMPOSE, DASHBOARD, DRAFT, EDITOR, HOME, PUBLISHED};

fn post(title: &str, content: &str) -> PostRequest {
	PostRequest {
		title: title.into(),
		content: content.into(),
		..Default::default()
	}
}

#[tokio::test]
async fn publishing_sends_the_post_and_skips_subscribe_buttons() {
	let h = Harness::new();
	let id = h.logged_in_session().await;
	h.site.clear_events();

	let mut request = post("First post", "Hello, readers.");
	request.subtitle = Some("A beginning".into());
	let result = h.service.create_post(&id, &request).await.expect("post should publish");

	assert!(result.success);
	assert!(!result.is_draft);
	assert_eq!(result.current_url, PUBLISHED);
	assert_eq!(result.post_url.as_deref(), Some(PUBLISHED));
	assert_eq!(
		h.site.typed(),
		vec![
			("post-title".to_string(), "First post".to_string()),
			("post-subtitle".to_string(), "A beginning".to_string()),
			("div".to_string(), "Hello, readers.".to_string()),
		]
	);
	assert_eq!(h.site.clicked(), vec!["Continue", "Send to everyone now", "Publish without buttons"]);
}

#[tokio::test]
async fn drafts_never_click_send() {
	let h = Harness::new();
	let id = h.logged_in_session().await;
	h.site.clear_events();

	let mut request = post("Work in progress", "Not ready yet.");
	request.is_draft = true;
	let result = h.service.create_post(&id, &request).await.expect("draft should save");

	assert!(result.is_draft);
	assert_eq!(result.post_url.as_deref(), Some(DRAFT));
	let clicked = h.site.clicked();
	assert_eq!(clicked, vec!["Continue", "Save as draft"]);
	assert!(!clicked.iter().any(|c| c.to_lowercase().contains("send")));
}

#[tokio::test]
async fn oversized_posts_are_rejected_before_any_browser_work() {
	let h = Harness::new();
	let id = h.logged_in_session().await;
	h.site.clear_events();

	let err = h.service.create_post(&id, &post(&"t".repeat(201), "body")).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::InvalidInput);
	let err = h.service.create_post(&id, &post("Title", &"c".repeat(100_001))).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::InvalidInput);
	assert!(h.site.events().is_empty());

	h.service
		.create_post(&id, &post(&"t".repeat(200), "body"))
		.await
		.expect("a 200-character title is allowed");
}

#[tokio::test]
async fn posting_requires_a_logged_in_session() {
	let h = Harness::new();
	let id = h.service.create_session().await.expect("session should be created").session_id;
	let err = h.service.create_post(&id, &post("Title", "body")).await.unwrap_err();
	assert!(matches!(err, QuillError::InvalidState { .. }), "{err}");

	let err = h.service.create_post("missing", &post("Title", "body")).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::SessionNotFound);
}

#[tokio::test]
async fn intercepted_clicks_fall_back_to_script_clicks() {
	let h = Harness::new();
	h.site.edit_document(EDITOR, |doc| {
		for element in &mut doc.elements {
			if element.text == "Continue" {
				element.intercepts_click = true;
			}
		}
	});
	let id = h.logged_in_session().await;

	let result = h.service.create_post(&id, &post("Title", "body")).await.expect("post should publish");
	assert_eq!(result.post_url.as_deref(), Some(PUBLISHED));
	assert_eq!(h.site.dom_clicked(), vec!["Continue"]);
	assert!(!h.site.clicked().contains(&"Continue".to_string()));
}

#[tokio::test]
async fn accounts_without_a_publication_get_no_publication() {
	let h = Harness::new();
	h.site.edit_document(HOME, |doc| {
		doc.html = Some("<html><body><h1>Start writing today</h1></body></html>".into());
		doc.links.clear();
	});
	h.site.edit_document("https://substack.com/dashboard", |doc| doc.links.clear());
	let id = h.logged_in_session().await;

	let err = h.service.create_post(&id, &post("Title", "body")).await.unwrap_err();
	assert!(matches!(err, QuillError::NoPublication(_)), "{err}");
	assert_eq!(err.code(), ErrorCode::NoPublication);
}

#[tokio::test]
async fn explicit_subdomain_overrides_discovery() {
	let h = Harness::new();
	h.site.edit_document(HOME, |doc| {
		doc.html = Some("<html><body>Welcome</body></html>".into());
		doc.links.clear();
	});
	h.site.edit_document("https://substack.com/dashboard", |doc| doc.links.clear());
	let id = h.logged_in_session().await;

	let err = h.service.create_post(&id, &post("Title", "body")).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::ElementNotFound);

	let mut request = post("Title", "body");
	request.subdomain = Some("AdaWrites".into());
	let result = h.service.create_post(&id, &request).await.expect("post should publish");
	assert_eq!(result.post_url.as_deref(), Some(PUBLISHED));
}

#[tokio::test]
async fn unexpected_dialogs_are_accepted() {
	let h = Harness::new();
	h.site.edit_document(EDITOR, |doc| doc.dialog_on_load = true);
	let id = h.logged_in_session().await;
	h.site.clear_events();

	h.service.create_post(&id, &post("Title", "body")).await.expect("post should publish");
	assert!(h.site.events().contains(&SiteEvent::DialogAccepted));
}

#[tokio::test]
async fn stale_credentials_are_refreshed_before_publishing() {
	let h = Harness::new();
	let id = h.logged_in_session().await;
	let before = h.store().get(&id).and_then(|s| s.user_data).and_then(|u| u.auth_tokens).expect("tokens should be stored");

	h.clock.advance(Duration::from_secs(2 * 3600));
	h.service.create_post(&id, &post("Title", "body")).await.expect("post should publish");

	let after = h.store().get(&id).and_then(|s| s.user_data).and_then(|u| u.auth_tokens).expect("tokens should be stored");
	assert!(after.extracted_at > before.extracted_at);
}

#[tokio::test]
async fn posting_after_restart_reconnects_first() {
	let mut h = Harness::new();
	let id = h.logged_in_session().await;
	h.restart();

	let result = h.service.create_post(&id, &post("Title", "body")).await.expect("post should publish");
	assert_eq!(result.post_url.as_deref(), Some(PUBLISHED));
	assert!(h.service.session_status(&id).is_active);
}

#[tokio::test]
async fn dashboard_new_post_link_opens_the_editor() {
	let h = Harness::new();
	preset::editor_behind_new_post(&h.site);
	let id = h.logged_in_session().await;
	h.site.clear_events();

	let result = h.service.create_post(&id, &post("Title", "body")).await.expect("post should publish");
	assert_eq!(result.post_url.as_deref(), Some(PUBLISHED));
	let navigations = h.site.navigations();
	assert!(navigations.contains(&DASHBOARD.to_string()), "{navigations:?}");
	assert!(navigations.contains(&COMPOSE.to_string()), "{navigations:?}");
	assert_eq!(h.site.clicked(), vec!["New post", "Continue", "Send to everyone now", "Publish without buttons"]);
}

#[tokio::test]
async fn dashboard_write_menu_opens_a_text_post() {
	let h = Harness::new();
	preset::editor_behind_write_menu(&h.site);
	let id = h.logged_in_session().await;
	h.site.clear_events();

	let result = h.service.create_post(&id, &post("Title", "body")).await.expect("post should publish");
	assert_eq!(result.post_url.as_deref(), Some(PUBLISHED));
	assert_eq!(
		h.site.clicked(),
		vec!["Write", "Text post", "Continue", "Send to everyone now", "Publish without buttons"]
	);
}

#[tokio::test]
async fn missing_content_editor_aborts_with_diagnostics() {
	let h = Harness::new();
	h.site.edit_document(EDITOR, |doc| doc.elements.retain(|e| !e.content_editable));
	let id = h.logged_in_session().await;
	h.site.clear_events();

	let err = h.service.create_post(&id, &post("Title", "body")).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::ElementNotFound);
	match &err {
		QuillError::ElementNotFound { target, tried, diagnostics } => {
			assert_eq!(target, "content editor");
			assert!(tried.iter().any(|t| t == "any contenteditable block"), "{tried:?}");
			assert_eq!(diagnostics.url, EDITOR);
		}
		other => panic!("unexpected {other:?}"),
	}
	assert!(err.details().is_some_and(|d| d["page"]["url"] == EDITOR));
	assert!(h.site.clicked().is_empty());
}

#[tokio::test]
async fn missing_publish_button_aborts_after_continue() {
	let h = Harness::new();
	h.site.edit_document(EDITOR, |doc| doc.elements.retain(|e| e.text != "Send to everyone now"));
	let id = h.logged_in_session().await;
	h.site.clear_events();

	let err = h.service.create_post(&id, &post("Title", "body")).await.unwrap_err();
	match &err {
		QuillError::ElementNotFound { target, diagnostics, .. } => {
			assert_eq!(target, "publish button");
			assert_eq!(diagnostics.url, EDITOR);
		}
		other => panic!("unexpected {other:?}"),
	}
	assert_eq!(h.site.clicked(), vec!["Continue"]);
	assert!(h.site.dom_clicked().is_empty());
}
