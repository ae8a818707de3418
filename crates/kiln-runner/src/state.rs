//! The window-splitting queue (`spec.md` §4.10): a depth-tagged
//! `VecDeque`, not recursion — so a window that keeps overflowing fails at
//! a bounded depth instead of growing the call stack. `PipelineRunner::run`
//! drives each queued window through `process_queued_window`, whose
//! `WindowOutcome` return value (`Done`, `SplitPending`) is the single
//! source of truth for what happened to it; nothing here tracks a
//! parallel per-window status of its own.

use kiln_model::window::Window;

/// One window still owed processing, tagged with the split depth it was
/// produced at. Windows from `kiln_window::create_windows` enter the
/// queue at depth 0; a split's children enter at `depth + 1`.
#[derive(Debug, Clone)]
pub struct QueuedWindow {
	pub window: Window,
	pub depth: u32,
}

impl QueuedWindow {
	pub fn new(window: Window, depth: u32) -> Self {
		Self { window, depth }
	}
}
