//! `split_into_n_parts`: deterministic equal-count subdivision, used by the
//! runner when a window overflows the writer's context budget
//! (`spec.md` §4.10).

use kiln_model::window::Window;

use crate::WindowError;

/// Splits `window` into exactly `n` contiguous, (as close to) equal-sized
/// parts. Labels become `"<label>-part-<k>-of-<n>"`, 1-indexed.
///
/// Deterministic: the same window and `n` always produce the same split
/// (`spec.md` §8's determinism properties extend to this operation even
/// though it isn't named as a cache key).
pub fn split_into_n_parts(window: &Window, n: u32) -> Result<Vec<Window>, WindowError> {
	if n < 2 {
		return Err(WindowError::InvalidWindowSpec(format!("split count must be >= 2, got {n}")));
	}
	if window.entries.is_empty() {
		return Err(WindowError::InvalidWindowSpec("cannot split an empty window".to_string()));
	}

	let n = n as usize;
	let total = window.entries.len();
	let base = total / n;
	let remainder = total % n;

	let mut parts = Vec::with_capacity(n);
	let mut offset = 0;
	for k in 0..n {
		// Distribute the remainder across the first `remainder` parts so
		// every part gets `base` or `base + 1` entries.
		let this_len = base + usize::from(k < remainder);
		if this_len == 0 {
			continue;
		}
		let slice = &window.entries[offset..offset + this_len];
		let label = format!("{}-part-{}-of-{}", window.label, k + 1, n);
		let start_time = slice.first().unwrap().timestamp;
		let end_time = slice.last().unwrap().timestamp;
		parts.push(Window::new(label, start_time, end_time, slice.to_vec()));
		offset += this_len;
	}

	Ok(parts)
}
