//! Selector cascades for Substack's sign-in, dashboard and editor pages.

use crate::browser::Strategy;
use crate::locator::Cascade;

const BUTTONS: &[&str] = &["button", r#"[role="button"]"#];
const CONTROLS: &[&str] = &["a", "button", r#"[role="button"]"#, r#"[role="menuitem"]"#];
const TEXT_INPUTS: &str = r#"input[type="text"], input[type="number"], input[type="tel"], input:not([type])"#;

pub fn email_input() -> Cascade {
	Cascade::new("email input")
		.specific("type=email", Strategy::css(r#"input[type="email"]"#))
		.specific("name=email", Strategy::css(r#"input[name="email"], input[autocomplete="email"]"#))
		.specific("placeholder mentions email", Strategy::css(r#"input[placeholder*="email" i]"#))
		.generic("any text input", Strategy::css(r#"input[type="text"], input:not([type])"#))
}

pub fn submit_button() -> Cascade {
	Cascade::new("submit button")
		.specific("type=submit", Strategy::css(r#"button[type="submit"]"#))
		.specific(
			"continue text",
			Strategy::text(BUTTONS, &["continue", "sign in", "log in", "next", "submit"]),
		)
}

pub fn verification_input() -> Cascade {
	Cascade::new("verification code input")
		.specific("name=code", Strategy::css(r#"input[name="code"], input[id="code"]"#))
		.specific(
			"verification named",
			Strategy::css(r#"input[name*="verification" i], input[id*="verification" i], input[name*="otp" i]"#),
		)
		.specific("one-time-code", Strategy::css(r#"input[autocomplete="one-time-code"]"#))
		.specific("placeholder mentions code", Strategy::css(r#"input[placeholder*="code" i]"#))
		.generic("text input mentioning code", Strategy::hinted(TEXT_INPUTS, &["code", "verification", "otp"]))
		// Page-structure dependent; the input that happens to be last may be unrelated.
		.generic("last text input", Strategy::last(TEXT_INPUTS))
}

pub fn verify_button() -> Cascade {
	Cascade::new("verify button")
		.specific("type=submit", Strategy::css(r#"button[type="submit"]"#))
		.specific(
			"verify text",
			Strategy::text(BUTTONS, &["verify", "continue", "submit", "sign in", "log in"]),
		)
}

pub fn user_name() -> Cascade {
	Cascade::new("display name")
		.specific("name test-id", Strategy::css(r#"[data-testid="user-name"], [data-testid="profile-name"]"#))
		.generic("name class", Strategy::css(".profile-name, .user-name"))
}

pub fn title_field() -> Cascade {
	Cascade::new("post title")
		.specific("title test-id", Strategy::css(r#"[data-testid="post-title"]"#))
		.specific(
			"contenteditable heading",
			Strategy::css(r#"h1[contenteditable="true"], [role="heading"][contenteditable="true"]"#),
		)
		.specific(
			"placeholder mentions title",
			Strategy::css(r#"textarea[placeholder*="title" i], input[placeholder*="title" i]"#),
		)
		.generic("first text field", Strategy::css(r#"textarea, input[type="text"]"#))
}

pub fn subtitle_field() -> Cascade {
	Cascade::new("post subtitle")
		.specific("subtitle test-id", Strategy::css(r#"[data-testid="post-subtitle"]"#))
		.specific(
			"placeholder mentions subtitle",
			Strategy::css(r#"textarea[placeholder*="subtitle" i], input[placeholder*="subtitle" i]"#),
		)
		.specific("contenteditable subheading", Strategy::css(r#"h3[contenteditable="true"]"#))
}

pub fn content_editor() -> Cascade {
	Cascade::new("content editor")
		.specific("prosemirror", Strategy::css(r#".ProseMirror[contenteditable="true"], .ProseMirror"#))
		.specific("editor test-id", Strategy::css(r#"[data-testid="editor"][contenteditable="true"]"#))
		.specific("textbox role", Strategy::css(r#"div[contenteditable="true"][role="textbox"]"#))
		.generic("any contenteditable block", Strategy::css(r#"div[contenteditable="true"]"#))
}

pub fn new_post() -> Cascade {
	Cascade::new("new post control")
		.specific("new post link", Strategy::css(r#"a[href*="/publish/post"]"#))
		.specific("new post text", Strategy::text(CONTROLS, &["new post"]))
}

pub fn write_menu() -> Cascade {
	Cascade::new("write menu")
		.specific("write text", Strategy::text(CONTROLS, &["write"]))
		.generic("create text", Strategy::text(CONTROLS, &["create"]))
}

pub fn text_post_option() -> Cascade {
	Cascade::new("text post option").specific(
		"text post",
		Strategy::text(&["a", "button", r#"[role="menuitem"]"#, r#"[role="option"]"#], &["text post"]),
	)
}

pub fn continue_button() -> Cascade {
	Cascade::new("continue button")
		.specific("publish test-id", Strategy::css(r#"[data-testid="publish-button"]"#))
		.specific("continue text", Strategy::text(BUTTONS, &["continue"]))
}

/// Final action of the publish funnel. Drafts never reach the send controls.
pub fn terminal_action(is_draft: bool) -> Cascade {
	if is_draft {
		Cascade::new("save draft button")
			.specific("save as draft", Strategy::text(BUTTONS, &["save as draft"]))
			.specific("save draft", Strategy::text(BUTTONS, &["save draft"]))
	} else {
		Cascade::new("publish button")
			.specific("send to everyone now", Strategy::text(BUTTONS, &["send to everyone now"]))
			.specific("publish now", Strategy::text(BUTTONS, &["publish now"]))
	}
}

pub fn subscribe_interstitial() -> Cascade {
	Cascade::new("subscribe buttons prompt").specific(
		"publish without buttons",
		Strategy::text(BUTTONS, &["publish without buttons", "without buttons", "no buttons"]),
	)
}

/// Landing-page copy shown to accounts that have no publication yet.
pub const NO_PUBLICATION_PROMPTS: &[&str] = &["start writing", "create your publication", "start your substack"];

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn draft_cascade_never_mentions_sending() {
		let draft = terminal_action(true);
		for step in &draft.steps {
			let json = serde_json::to_string(&step.strategy).unwrap();
			assert!(!json.contains("send to everyone"), "{json}");
			assert!(!json.contains("publish"), "{json}");
		}
	}

	#[test]
	fn code_cascade_ends_with_last_input_fallback() {
		let cascade = verification_input();
		let last = cascade.steps.last().unwrap();
		assert!(last.generic);
		assert!(matches!(last.strategy, Strategy::Last { .. }));
		assert!(cascade.steps.iter().take_while(|s| !s.generic).count() >= 4);
	}
}
