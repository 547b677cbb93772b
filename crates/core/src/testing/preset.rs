//! A small Substack: one writer, Ada, with the publication `adawrites`.

use super::{FakeAction, FakeDocument, FakeElement, FakeSite};

pub const SIGN_IN: &str = "https://substack.com/sign-in";
pub const CODE_STEP: &str = "https://substack.com/sign-in?step=code";
pub const HOME: &str = "https://substack.com/home";
pub const EDITOR: &str = "https://adawrites.substack.com/publish/post";
pub const DASHBOARD: &str = "https://adawrites.substack.com/publish/home";
pub const PUBLISHED: &str = "https://adawrites.substack.com/p/first-post";
pub const DRAFT: &str = "https://adawrites.substack.com/publish/post/4242";
/// Editor reached from the dashboard when the direct editor URL shows nothing.
pub const COMPOSE: &str = "https://adawrites.substack.com/publish/post/new";

const PRELOADS: &str = r#"<html><head><title>Home</title><script>window._preloads = {"user":{"id":7,"name":"Ada Writer","email":"ada@example.com","handle":"ada"},"publication":{"subdomain":"adawrites"}}</script></head><body><a href="https://adawrites.substack.com">Ada Writes</a></body></html>"#;

pub(super) fn install(site: &FakeSite) {
	site.set_login_storage(&[("substack.user", r#"{"id":7}"#)]);

	site.add_document("https://substack.com/", FakeDocument::new("Substack"));
	site.add_document(
		SIGN_IN,
		FakeDocument::new("Sign in | Substack").with_elements(vec![
			FakeElement::new("input")
				.attr("type", "email")
				.attr("name", "email")
				.attr("placeholder", "Enter your email")
				.on_enter(FakeAction::Navigate(CODE_STEP.into())),
			FakeElement::new("button")
				.attr("type", "submit")
				.text("Continue")
				.on_click(FakeAction::Navigate(CODE_STEP.into())),
		]),
	);
	site.add_document(
		CODE_STEP,
		FakeDocument::new("Check your email | Substack").with_elements(vec![
			FakeElement::new("input")
				.attr("type", "text")
				.attr("name", "code")
				.attr("autocomplete", "one-time-code")
				.on_enter(FakeAction::Authenticate(HOME.into())),
			FakeElement::new("button")
				.attr("type", "submit")
				.text("Verify")
				.on_click(FakeAction::Authenticate(HOME.into())),
		]),
	);
	site.add_document(
		HOME,
		FakeDocument::new("Home")
			.requires_auth()
			.html(PRELOADS)
			.links(&["https://adawrites.substack.com", "https://substack.com/@ada"]),
	);
	site.add_document("https://substack.com/settings", FakeDocument::new("Settings").requires_auth());
	site.add_document(
		"https://substack.com/dashboard",
		FakeDocument::new("Dashboard")
			.requires_auth()
			.links(&["https://adawrites.substack.com/publish/home"]),
	);
	site.add_document(
		DASHBOARD,
		FakeDocument::new("Ada Writes | Dashboard").requires_auth().with_elements(vec![
			FakeElement::new("a")
				.attr("href", EDITOR)
				.text("New post")
				.on_click(FakeAction::Navigate(EDITOR.into())),
		]),
	);
	site.add_document(EDITOR, editor());
	site.add_document(DRAFT, FakeDocument::new("Draft | Ada Writes").requires_auth());
	site.add_document(PUBLISHED, FakeDocument::new("First post | Ada Writes"));
}

/// Replaces the code step with `inputs` and a Verify button. Entering the code
/// in the last input signs in.
pub fn code_step_with_inputs(site: &FakeSite, mut inputs: Vec<FakeElement>) {
	if let Some(last) = inputs.last_mut() {
		last.on_enter = Some(FakeAction::Authenticate(HOME.into()));
	}
	inputs.push(
		FakeElement::new("button")
			.text("Verify")
			.on_click(FakeAction::Authenticate(HOME.into())),
	);
	site.add_document(CODE_STEP, FakeDocument::new("Check your email | Substack").with_elements(inputs));
}

/// The direct editor URL renders an empty shell; the dashboard's "New post"
/// link opens the editor at [`COMPOSE`].
pub fn editor_behind_new_post(site: &FakeSite) {
	hide_direct_editor(site);
	site.add_document(
		DASHBOARD,
		FakeDocument::new("Ada Writes | Dashboard").requires_auth().with_elements(vec![
			FakeElement::new("a")
				.attr("href", COMPOSE)
				.text("New post")
				.on_click(FakeAction::Navigate(COMPOSE.into())),
		]),
	);
}

/// Like [`editor_behind_new_post`], but the dashboard only offers a "Write"
/// menu whose "Text post" item opens the editor.
pub fn editor_behind_write_menu(site: &FakeSite) {
	hide_direct_editor(site);
	site.add_document(
		DASHBOARD,
		FakeDocument::new("Ada Writes | Dashboard").requires_auth().with_elements(vec![
			FakeElement::new("button").text("Write").on_click(FakeAction::Reveal("write".into())),
			FakeElement::new("button")
				.attr("role", "menuitem")
				.text("Text post")
				.group("write")
				.on_click(FakeAction::Navigate(COMPOSE.into())),
		]),
	);
}

fn hide_direct_editor(site: &FakeSite) {
	site.add_document(EDITOR, FakeDocument::new("Loading | Ada Writes").requires_auth());
	site.add_document(COMPOSE, editor());
}

fn editor() -> FakeDocument {
	FakeDocument::new("Editing post | Ada Writes")
		.requires_auth()
		.with_elements(vec![
			FakeElement::new("textarea")
				.attr("data-testid", "post-title")
				.attr("placeholder", "Title"),
			FakeElement::new("textarea")
				.attr("data-testid", "post-subtitle")
				.attr("placeholder", "Add a subtitle"),
			FakeElement::new("div")
				.attr("class", "ProseMirror")
				.attr("role", "textbox")
				.editable(),
			FakeElement::new("button").text("Continue").on_click(FakeAction::Reveal("settings".into())),
			FakeElement::new("button")
				.text("Send to everyone now")
				.group("settings")
				.on_click(FakeAction::Reveal("subscribe".into())),
			FakeElement::new("button")
				.text("Save as draft")
				.group("settings")
				.on_click(FakeAction::Navigate(DRAFT.into())),
			FakeElement::new("button")
				.text("Publish without buttons")
				.group("subscribe")
				.on_click(FakeAction::Navigate(PUBLISHED.into())),
			FakeElement::new("button")
				.text("Add subscribe buttons")
				.group("subscribe")
				.on_click(FakeAction::Navigate(PUBLISHED.into())),
		])
}
