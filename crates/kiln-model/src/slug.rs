//! The single legal derivation path for a post's stable identifier.
//!
//! `spec.md` §4.1 is explicit that "slug generation is a pure function of
//! the title and is the *only* legal derivation path" — nothing else in
//! the workspace is allowed to mint a post id by another route.

/// Lowercases, strips non-alphanumerics to single hyphens, and trims the
/// result to a reasonable length. Pure: no I/O, no randomness, no clock.
pub fn slugify(title: &str) -> String {
	let mut slug = String::with_capacity(title.len());
	let mut last_was_hyphen = true; // suppress a leading hyphen
	for ch in title.chars() {
		if ch.is_alphanumeric() {
			slug.extend(ch.to_lowercase());
			last_was_hyphen = false;
		} else if !last_was_hyphen {
			slug.push('-');
			last_was_hyphen = true;
		}
	}
	while slug.ends_with('-') {
		slug.pop();
	}
	slug.truncate(floor_char_boundary(&slug, 80));
	while slug.ends_with('-') {
		slug.pop();
	}
	if slug.is_empty() {
		"untitled".to_string()
	} else {
		slug
	}
}

/// The largest char-boundary index `<= max`. `title` may contain any
/// Unicode alphanumeric (CJK, Cyrillic, etc. all pass `is_alphanumeric`),
/// so the raw byte index `max` can land inside a multi-byte character —
/// `String::truncate` panics on that, unlike on an ASCII-only string.
fn floor_char_boundary(s: &str, max: usize) -> usize {
	if max >= s.len() {
		return s.len();
	}
	(0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Appends a numeric disambiguator, used when a slug collides with an
/// already-persisted post from a different window.
pub fn disambiguate(slug: &str, n: u32) -> String {
	if n == 0 {
		slug.to_string()
	} else {
		format!("{slug}-{n}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lowercases_and_hyphenates() {
		assert_eq!(slugify("Hello, World!"), "hello-world");
	}

	#[test]
	fn collapses_runs_of_punctuation() {
		assert_eq!(slugify("a---b   c"), "a-b-c");
	}

	#[test]
	fn empty_title_falls_back() {
		assert_eq!(slugify("???"), "untitled");
	}

	#[test]
	fn is_pure_and_deterministic() {
		assert_eq!(slugify("Repeat Me"), slugify("Repeat Me"));
	}

	#[test]
	fn disambiguate_zero_is_identity() {
		assert_eq!(disambiguate("slug", 0), "slug");
		assert_eq!(disambiguate("slug", 2), "slug-2");
	}

	#[test]
	fn a_long_non_ascii_title_truncates_without_panicking() {
		// Every character here is 3 bytes in UTF-8, so a naive byte-80
		// truncate lands mid-character unless it rounds down to a boundary.
		let title: String = std::iter::repeat('読').take(40).collect();
		let slug = slugify(&title);
		assert!(slug.len() <= 80);
		assert!(!slug.is_empty());
	}

	proptest::proptest! {
		#[test]
		fn slugify_is_pure_for_any_input(title in "[ -~]{0,200}") {
			proptest::prop_assert_eq!(slugify(&title), slugify(&title));
		}

		#[test]
		fn slugify_output_is_always_well_formed(title in "[ -~]{0,200}") {
			let slug = slugify(&title);
			proptest::prop_assert!(!slug.is_empty());
			proptest::prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
			proptest::prop_assert!(slug.len() <= 80);
			proptest::prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
		}

		#[test]
		fn disambiguate_of_zero_is_always_identity(slug in "[a-z0-9-]{0,40}") {
			proptest::prop_assert_eq!(disambiguate(&slug, 0), slug);
		}

		#[test]
		fn slugify_never_panics_on_non_ascii_input(title in "\\PC{0,200}") {
			let slug = slugify(&title);
			proptest::prop_assert!(!slug.is_empty());
			proptest::prop_assert!(slug.len() <= 80);
		}
	}
}
