//! Chromium executable discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Resolves the browser executable, preferring an explicit path.
///
/// Without an explicit path, well-known Chrome/Chromium locations are probed
/// for the current platform and bare command names are resolved on `PATH`.
pub fn find_chromium_executable(explicit: Option<&Path>) -> Option<PathBuf> {
	if let Some(path) = explicit {
		if path.exists() {
			return Some(path.to_path_buf());
		}
		if let Ok(resolved) = which::which(path) {
			return Some(resolved);
		}
		debug!(target = "quill.runtime", path = %path.display(), "explicit browser path not found; probing defaults");
	}

	let candidates: Vec<String> = if cfg!(target_os = "macos") {
		vec![
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_browser_candidates()
	} else {
		vec![
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"headless_shell",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	};

	for candidate in candidates {
		if candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':') {
			if Path::new(&candidate).exists() {
				return Some(PathBuf::from(candidate));
			}
		} else if let Ok(resolved) = which::which(&candidate) {
			return Some(resolved);
		}
	}

	None
}

fn windows_browser_candidates() -> Vec<String> {
	let mut candidates = Vec::new();

	let mut roots = Vec::new();
	for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
		if let Ok(value) = std::env::var(key) {
			roots.push(PathBuf::from(value));
		}
	}
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];

	for root in roots {
		for suffix in suffixes {
			let mut path = root.clone();
			for component in *suffix {
				path.push(component);
			}
			candidates.push(path.to_string_lossy().to_string());
		}
	}

	candidates.extend(["chrome.exe".to_string(), "msedge.exe".to_string(), "chromium.exe".to_string()]);
	candidates
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn windows_candidates_include_common_commands() {
		let candidates = windows_browser_candidates();
		assert!(candidates.contains(&"chrome.exe".to_string()));
		assert!(candidates.contains(&"msedge.exe".to_string()));
	}

	#[test]
	fn explicit_existing_path_wins() {
		let dir = tempfile::tempdir().unwrap();
		let fake = dir.path().join("my-chrome");
		std::fs::write(&fake, b"").unwrap();
		assert_eq!(find_chromium_executable(Some(&fake)), Some(fake));
	}
}
