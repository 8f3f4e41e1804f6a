//! Rendering a pack's embedded license for the `checkEula` prompt
//! (spec.md §4.7.2: "display the license (rendering RTF and plain text)").

/// Renders license bytes to plain text for display. RTF documents are
/// stripped down to their visible text with a small heuristic (not a full
/// RTF parser): control words, groups, and escapes are dropped and the
/// remaining runs are joined. Anything that isn't a `{\rtf1` document is
/// assumed to already be plain text and is returned (lossily) as UTF-8.
#[must_use]
pub fn render_license(bytes: &[u8]) -> String {
	let text = String::from_utf8_lossy(bytes);
	if text.trim_start().starts_with("{\\rtf") {
		strip_rtf(&text)
	} else {
		text.into_owned()
	}
}

fn strip_rtf(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	let mut chars = input.chars().peekable();

	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				// Control word: letters then an optional numeric parameter and one
				// delimiting space, or a single escaped character (`\{`, `\}`, `\\`).
				match chars.peek() {
					Some('{') | Some('}') | Some('\\') => {
						out.push(chars.next().unwrap());
					}
					_ => {
						while matches!(chars.peek(), Some(c) if c.is_ascii_alphabetic()) {
							chars.next();
						}
						while matches!(chars.peek(), Some(c) if c.is_ascii_digit() || *c == '-') {
							chars.next();
						}
						if matches!(chars.peek(), Some(' ')) {
							chars.next();
						}
					}
				}
			}
			'{' | '}' => {}
			'\r' | '\n' => {}
			other => out.push(other),
		}
	}

	out.trim().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn passes_through_plain_text_unchanged() {
		let text = "This is a plain-text license.\nSecond line.";
		assert_eq!(render_license(text.as_bytes()), text);
	}

	#[test]
	fn strips_rtf_control_words_and_groups() {
		let rtf = r"{\rtf1\ansi\deff0 {\fonttbl{\f0 Times New Roman;}} This is the \b license\b0  text.}";
		let rendered = render_license(rtf.as_bytes());
		assert!(rendered.contains("This is the license text."));
		assert!(!rendered.contains("\\rtf1"));
	}
}
