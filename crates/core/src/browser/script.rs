//! Page scripts evaluated through `Runtime.evaluate`.

/// Resolves a [`super::Strategy`] (as JSON) to a tagged element description.
pub(super) fn find(strategy_json: &str) -> String {
	format!(
		r#"(() => {{
	const s = {strategy_json};
	const visible = (el) => {{
		const style = getComputedStyle(el);
		return style.visibility !== 'hidden' && style.display !== 'none' && el.getClientRects().length > 0;
	}};
	const all = (sel) => Array.from(document.querySelectorAll(sel)).filter(visible);
	const attrText = (el) => Array.from(el.attributes).map((a) => a.name + '=' + a.value).join(' ').toLowerCase();
	const textOf = (el) => (el.innerText || el.value || el.getAttribute('aria-label') || '').trim().toLowerCase();
	let el = null;
	if (s.kind === 'css') el = all(s.css)[0] || null;
	else if (s.kind === 'last') {{ const found = all(s.css); el = found[found.length - 1] || null; }}
	else if (s.kind === 'hinted') el = all(s.css).find((e) => s.hints.some((h) => attrText(e).includes(h))) || null;
	else if (s.kind === 'text') el = all(s.tags.join(',')).find((e) => s.needles.some((n) => textOf(e).includes(n))) || null;
	if (!el) return null;
	if (!el.dataset.quillRef) {{
		window.__quillRefs = (window.__quillRefs || 0) + 1;
		el.dataset.quillRef = String(window.__quillRefs);
	}}
	const attributes = {{}};
	for (const a of el.attributes) attributes[a.name] = a.value;
	return {{
		reference: `[data-quill-ref="${{el.dataset.quillRef}}"]`,
		tag: el.tagName.toLowerCase(),
		text: (el.innerText || '').trim().slice(0, 200),
		attributes,
		contentEditable: el.isContentEditable,
	}};
}})()"#
	)
}

/// Runs `body` with `el` bound to the referenced element.
pub(super) fn on_element(reference: &str, body: &str) -> String {
	let selector = serde_json::Value::String(reference.to_string());
	format!(
		r#"(() => {{
	const el = document.querySelector({selector});
	if (!el) throw new Error('stale element reference ' + {selector});
	{body}
}})()"#
	)
}

pub(super) const FOCUS: &str = "el.focus(); return true;";

pub(super) const CLEAR: &str = r#"el.focus();
	if (el.isContentEditable) {
		el.innerHTML = '';
	} else {
		const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
		Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, '');
	}
	el.dispatchEvent(new Event('input', { bubbles: true }));
	return true;"#;

pub(super) const SCROLL_INTO_VIEW: &str = "el.scrollIntoView({ block: 'center', inline: 'center' }); return true;";

pub(super) const DOM_CLICK: &str = "el.click(); return true;";

/// Center point of the element and whether it is the topmost element there.
pub(super) const HIT_TEST: &str = r#"el.scrollIntoView({ block: 'center', inline: 'center' });
	const r = el.getBoundingClientRect();
	const x = r.left + r.width / 2;
	const y = r.top + r.height / 2;
	const hit = document.elementFromPoint(x, y);
	return { x, y, clear: !!hit && (hit === el || el.contains(hit)) };"#;

pub(super) const READY_STATE: &str = "document.readyState";

pub(super) const URL: &str = "location.href";

pub(super) const TITLE: &str = "document.title";

pub(super) const HTML: &str = "document.documentElement ? document.documentElement.outerHTML : ''";

pub(super) const LINKS: &str = "Array.from(document.querySelectorAll('a[href]'), (a) => a.href)";

pub(super) const LOCAL_STORAGE: &str = r#"(() => {
	const out = {};
	for (let i = 0; i < localStorage.length; i++) {
		const key = localStorage.key(i);
		out[key] = localStorage.getItem(key);
	}
	return out;
})()"#;

pub(super) fn set_local_storage(entries_json: &str) -> String {
	format!(
		r#"(() => {{
	const entries = {entries_json};
	for (const [k, v] of Object.entries(entries)) localStorage.setItem(k, v);
	return Object.keys(entries).length;
}})()"#
	)
}

pub(super) const DIAGNOSTICS: &str = r#"(() => {
	const html = document.documentElement ? document.documentElement.outerHTML : '';
	const inputs = Array.from(document.querySelectorAll('input, textarea, [contenteditable="true"]')).slice(0, 40).map((el) => ({
		tag: el.tagName.toLowerCase(),
		type: el.getAttribute('type') || undefined,
		name: el.getAttribute('name') || undefined,
		id: el.id || undefined,
		placeholder: el.getAttribute('placeholder') || undefined,
		ariaLabel: el.getAttribute('aria-label') || undefined,
		testId: el.getAttribute('data-testid') || undefined,
		contentEditable: el.isContentEditable,
	}));
	return { url: location.href, title: document.title, htmlLength: html.length, inputs };
})()"#;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn element_reference_is_embedded_as_string_literal() {
		let script = on_element(r#"[data-quill-ref="3"]"#, DOM_CLICK);
		assert!(script.contains(r#"document.querySelector("[data-quill-ref=\"3\"]")"#));
		assert!(script.contains("el.click()"));
	}

	#[test]
	fn find_script_inlines_strategy() {
		let script = find(r#"{"kind":"css","css":"input[type=\"email\"]"}"#);
		assert!(script.starts_with("(() => {"));
		assert!(script.contains(r#"const s = {"kind":"css""#));
	}
}
