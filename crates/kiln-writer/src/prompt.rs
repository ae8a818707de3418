//! Prompt assembly: one `askama` template per section, concatenated by a
//! single function. No section is ever hand-built through string
//! concatenation or branched by a feature flag (`spec.md` §4.8's "one
//! execution path").

use askama::Template;
use kiln_model::document::Document;
use kiln_model::window::Window;

use crate::error::WriterError;

struct EntryView {
	author: String,
	timestamp: String,
	content: String,
}

#[derive(Template)]
#[template(path = "entries.txt")]
struct EntriesTemplate<'a> {
	window_label: &'a str,
	entries: &'a [EntryView],
}

struct ProfileView {
	author_id: String,
	summary: String,
}

#[derive(Template)]
#[template(path = "profiles.txt")]
struct ProfilesTemplate<'a> {
	profiles: &'a [ProfileView],
}

struct RetrievedView {
	title: String,
	snippet: String,
}

#[derive(Template)]
#[template(path = "retrieval.txt")]
struct RetrievalTemplate<'a> {
	hits: &'a [RetrievedView],
}

#[derive(Template)]
#[template(path = "system_instructions.txt")]
struct SystemTemplate<'a> {
	instructions: &'a str,
}

/// The two halves of a writer request: a system section built once from
/// the configured instructions, and a user section carrying everything
/// specific to this window.
pub struct PromptSections {
	pub system: String,
	pub user: String,
}

/// Assembles the full prompt for one window. The only function in this
/// crate allowed to touch the template types directly.
pub fn assemble_prompt(system_instructions: &str, window: &Window, profiles: &[Document], retrieved: &[Document]) -> Result<PromptSections, WriterError> {
	let entry_views: Vec<EntryView> = window
		.entries
		.iter()
		.map(|e| EntryView { author: e.author_display.clone().unwrap_or_else(|| e.author_id.clone()), timestamp: e.timestamp.to_rfc3339(), content: e.content.clone() })
		.collect();
	let entries_section = EntriesTemplate { window_label: &window.label, entries: &entry_views }.render()?;

	let profile_views: Vec<ProfileView> = profiles.iter().map(|d| ProfileView { author_id: d.id.clone(), summary: d.content_body.clone() }).collect();
	let profiles_section = ProfilesTemplate { profiles: &profile_views }.render()?;

	let retrieved_views: Vec<RetrievedView> = retrieved.iter().map(|d| RetrievedView { title: d.title.clone(), snippet: d.content_body.clone() }).collect();
	let retrieval_section = RetrievalTemplate { hits: &retrieved_views }.render()?;

	let system = SystemTemplate { instructions: system_instructions }.render()?;
	let user = format!("{entries_section}\n\n{profiles_section}\n\n{retrieval_section}");

	Ok(PromptSections { system, user })
}
