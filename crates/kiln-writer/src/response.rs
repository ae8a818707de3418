//! The writer's structured response shape: zero or more posts, parsed
//! once the model stops calling tools.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
	pub title: String,
	/// A single date string, or absent. Validated (not trusted) by the
	/// caller: the canonical date a persisted post carries is always the
	/// window's start time, never whatever the model wrote here
	/// (`spec.md` §4.8).
	pub date: Option<String>,
	pub body: String,
	#[serde(default)]
	pub authors: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWriterResponse {
	#[serde(default)]
	pub posts: Vec<RawPost>,
}
