//! `create_windows`: the core partitioning algorithm.

use chrono::{DateTime, Duration, Utc};
use kiln_config::WindowUnit;
use kiln_model::entry::Entry;
use kiln_model::window::Window;

use crate::WindowError;

/// Groups `entries` (assumed ordered by timestamp) into a sequence of
/// overlapping windows.
///
/// `unit` selects whether `size` counts messages, bytes (character count,
/// per `SPEC_FULL.md` §9), or spans a duration in hours/days. `overlap_ratio`
/// must be in `[0, 0.5]`; window *n+1* re-includes the trailing
/// `overlap_ratio` share of window *n* (`spec.md` §4.6).
///
/// Returns a `Vec` rather than a true lazy iterator: the windowing engine
/// is pure and has no blocking I/O to defer, so eagerness costs nothing and
/// keeps the overlap bookkeeping simple. Callers that want to stop early
/// (e.g. resuming past a cursor) filter the returned sequence.
pub fn create_windows(entries: &[Entry], size: u32, unit: WindowUnit, overlap_ratio: f64) -> Result<Vec<Window>, WindowError> {
	if size == 0 {
		return Err(WindowError::InvalidWindowSpec("size must be positive".to_string()));
	}
	if !(0.0..=0.5).contains(&overlap_ratio) {
		return Err(WindowError::InvalidWindowSpec(format!(
			"overlap_ratio must be within [0, 0.5], got {overlap_ratio}"
		)));
	}
	if entries.is_empty() {
		return Ok(Vec::new());
	}

	match unit {
		WindowUnit::Messages => Ok(create_measured_windows(entries, size as u64, overlap_ratio, |_| 1)),
		WindowUnit::Bytes => Ok(create_measured_windows(entries, size as u64, overlap_ratio, |e| {
			e.char_len() as u64
		})),
		WindowUnit::Hours => Ok(create_time_windows(entries, Duration::hours(size as i64), overlap_ratio)),
		WindowUnit::Days => Ok(create_time_windows(entries, Duration::days(size as i64), overlap_ratio)),
	}
}

/// Partitions by a cumulative "measure" (message count or character count).
fn create_measured_windows(entries: &[Entry], size: u64, overlap_ratio: f64, measure_of: impl Fn(&Entry) -> u64) -> Vec<Window> {
	let mut prefix = Vec::with_capacity(entries.len() + 1);
	prefix.push(0u64);
	for e in entries {
		prefix.push(prefix.last().unwrap() + measure_of(e));
	}
	let total = *prefix.last().unwrap();

	let overlap_measure = (size as f64 * overlap_ratio).floor() as u64;
	let step = size.saturating_sub(overlap_measure).max(1);

	let mut windows = Vec::new();
	let mut idx = 0usize;
	let mut window_no = 0u32;
	let mut start_measure = 0u64;

	while start_measure < total && idx < entries.len() {
		let start_idx = first_index_at_or_above(&prefix, start_measure);
		if start_idx >= entries.len() {
			break;
		}
		let end_measure = start_measure + size;
		let mut end_idx = first_index_at_or_above(&prefix, end_measure);
		if end_idx <= start_idx {
			end_idx = start_idx + 1;
		}
		end_idx = end_idx.min(entries.len());

		let slice = &entries[start_idx..end_idx];
		let label = label_for(window_no, slice.first().map(|e| e.timestamp).unwrap_or_else(Utc::now));
		windows.push(Window::new(
			label,
			slice.first().map(|e| e.timestamp).unwrap(),
			slice.last().map(|e| e.timestamp).unwrap(),
			slice.to_vec(),
		));

		idx = end_idx;
		window_no += 1;
		start_measure += step;
	}

	windows
}

/// First index `i` such that `prefix[i] >= target` (prefix is non-decreasing).
fn first_index_at_or_above(prefix: &[u64], target: u64) -> usize {
	match prefix.binary_search(&target) {
		Ok(i) => i,
		Err(i) => i,
	}
	.min(prefix.len() - 1)
}

/// Partitions by wall-clock duration, re-including a trailing time slice
/// from the previous window on overlap.
fn create_time_windows(entries: &[Entry], duration: Duration, overlap_ratio: f64) -> Vec<Window> {
	let overlap_span = duration
		.num_milliseconds()
		.checked_mul((overlap_ratio * 1000.0) as i64)
		.map(|v| v / 1000)
		.unwrap_or(0);
	let step = Duration::milliseconds((duration.num_milliseconds() - overlap_span).max(1));

	let first_start = entries[0].timestamp;
	let last_ts = entries.last().unwrap().timestamp;

	let mut windows = Vec::new();
	let mut window_no = 0u32;
	let mut window_start = first_start;

	while window_start <= last_ts {
		let window_end = window_start + duration;
		let slice: Vec<Entry> = entries
			.iter()
			.filter(|e| e.timestamp >= window_start && e.timestamp < window_end)
			.cloned()
			.collect();

		if !slice.is_empty() {
			let label = label_for(window_no, window_start);
			let start_time = slice.first().unwrap().timestamp;
			let end_time = slice.last().unwrap().timestamp;
			windows.push(Window::new(label, start_time, end_time, slice));
			window_no += 1;
		}

		window_start += step;
	}

	windows
}

fn label_for(window_no: u32, start_time: DateTime<Utc>) -> String {
	format!("w{window_no:04}-{}", start_time.format("%Y%m%dT%H%M%SZ"))
}
