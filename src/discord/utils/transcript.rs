// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::timestamp::datetime_from_timestamp;
use miette::IntoDiagnostic;
use twilight_http::client::Client;
use twilight_model::channel::message::MessageType;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};

const HISTORY_PAGE_SIZE: u16 = 100;
const WRAP_WIDTH: usize = 70;

/// Renders a ticket channel's full history, oldest first, as one plain-text document. System and administrative
/// messages are skipped; everything else contributes its author, timestamp, wrapped body, embed descriptions, and
/// attachment URLs. Must run before the channel is deleted.
pub async fn build_transcript(http_client: &Client, channel_id: Id<ChannelMarker>) -> miette::Result<String> {
	let mut transcript = String::new();
	// The channel's snowflake predates every message in it, so it works as the initial history cursor.
	let mut cursor: Id<MessageMarker> = channel_id.cast();

	loop {
		let page_response = http_client
			.channel_messages(channel_id)
			.after(cursor)
			.limit(HISTORY_PAGE_SIZE)
			.await
			.into_diagnostic()?;
		let mut page = page_response.models().await.into_diagnostic()?;
		let Some(newest) = page.iter().map(|message| message.id).max() else {
			break;
		};
		cursor = newest;
		page.sort_by_key(|message| message.id.get());

		for message in &page {
			if !matches!(message.kind, MessageType::Regular | MessageType::Reply) {
				continue;
			}

			let timestamp = datetime_from_timestamp(&message.timestamp)
				.map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
				.unwrap_or_else(|| String::from("unknown time"));
			let embed_descriptions: Vec<String> = message
				.embeds
				.iter()
				.filter_map(|embed| embed.description.clone())
				.collect();
			let attachment_urls: Vec<String> = message
				.attachments
				.iter()
				.map(|attachment| attachment.url.clone())
				.collect();

			transcript.push_str(&render_entry(
				&message.author.name,
				message.author.id.get(),
				&timestamp,
				&message.content,
				&embed_descriptions,
				&attachment_urls,
			));
		}

		if page.len() < usize::from(HISTORY_PAGE_SIZE) {
			break;
		}
	}

	Ok(transcript)
}

/// Renders one message's transcript entry.
pub fn render_entry(
	author_name: &str,
	author_id: u64,
	timestamp: &str,
	content: &str,
	embed_descriptions: &[String],
	attachment_urls: &[String],
) -> String {
	let content_block = if content.is_empty() {
		String::from("[no message content]\n")
	} else {
		format!("Content:\n{}\n", fill(content, WRAP_WIDTH))
	};

	let embeds_block = if embed_descriptions.is_empty() {
		String::new()
	} else {
		let filled: Vec<String> = embed_descriptions
			.iter()
			.map(|description| fill(description, WRAP_WIDTH))
			.collect();
		format!("\nEmbed description(s):\n{}\n", filled.join(",\n\n"))
	};

	let attachments_block = if attachment_urls.is_empty() {
		String::new()
	} else {
		format!("\nAttachment URL(s):\n{}\n", attachment_urls.join(",\n"))
	};

	format!(
		"{} ({}) at {} UTC\n\n{}{}{}\n\n",
		author_name, author_id, timestamp, content_block, embeds_block, attachments_block
	)
}

/// Collapses runs of whitespace and greedily wraps text at the given width. Words longer than the width are split
/// across lines rather than overflowing.
pub fn fill(text: &str, width: usize) -> String {
	let mut lines: Vec<String> = Vec::new();
	let mut current = String::new();

	for word in text.split_whitespace() {
		let mut word = word;
		// Hard-split anything that can't fit on a line by itself.
		while word.chars().count() > width {
			if !current.is_empty() {
				lines.push(std::mem::take(&mut current));
			}
			let head: String = word.chars().take(width).collect();
			let head_len = head.len();
			lines.push(head);
			word = &word[head_len..];
		}

		if current.is_empty() {
			current.push_str(word);
		} else if current.chars().count() + 1 + word.chars().count() <= width {
			current.push(' ');
			current.push_str(word);
		} else {
			lines.push(std::mem::take(&mut current));
			current.push_str(word);
		}
	}
	if !current.is_empty() {
		lines.push(current);
	}

	lines.join("\n")
}

#[cfg(test)]
mod tests {
	use super::{WRAP_WIDTH, fill, render_entry};

	#[test]
	fn fill_wraps_at_width() {
		let text = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen";
		let filled = fill(text, 20);
		for line in filled.lines() {
			assert!(line.chars().count() <= 20, "line too long: {:?}", line);
		}
		assert_eq!(filled.split_whitespace().count(), 14);
	}

	#[test]
	fn fill_collapses_internal_whitespace() {
		assert_eq!(fill("a\nb\t c", 70), "a b c");
	}

	#[test]
	fn fill_splits_oversized_words() {
		let word = "w".repeat(45);
		let filled = fill(&word, 20);
		let lines: Vec<&str> = filled.lines().collect();
		assert_eq!(lines.len(), 3);
		assert!(lines.iter().all(|line| line.chars().count() <= 20));
	}

	#[test]
	fn entries_carry_author_and_timestamp_header() {
		let entry = render_entry("penguin", 42, "2025-06-02 10:30:00", "hello", &[], &[]);
		assert!(entry.starts_with("penguin (42) at 2025-06-02 10:30:00 UTC\n\n"));
		assert!(entry.contains("Content:\nhello\n"));
		assert!(!entry.contains("Embed description(s):"));
		assert!(!entry.contains("Attachment URL(s):"));
	}

	#[test]
	fn empty_content_is_called_out() {
		let entry = render_entry("penguin", 42, "2025-06-02 10:30:00", "", &[], &[]);
		assert!(entry.contains("[no message content]"));
		assert!(!entry.contains("Content:"));
	}

	#[test]
	fn embeds_and_attachments_are_listed() {
		let embeds = vec![String::from("first embed"), String::from("second embed")];
		let urls = vec![
			String::from("https://cdn.example/one.png"),
			String::from("https://cdn.example/two.png"),
		];
		let entry = render_entry("penguin", 42, "2025-06-02 10:30:00", "hi", &embeds, &urls);
		assert!(entry.contains("Embed description(s):\nfirst embed,\n\nsecond embed\n"));
		assert!(entry.contains("Attachment URL(s):\nhttps://cdn.example/one.png,\nhttps://cdn.example/two.png\n"));
	}

	#[test]
	fn long_bodies_wrap_at_the_transcript_width() {
		let body = "word ".repeat(60);
		let entry = render_entry("penguin", 42, "2025-06-02 10:30:00", &body, &[], &[]);
		for line in entry.lines() {
			assert!(line.chars().count() <= WRAP_WIDTH, "line too long: {:?}", line);
		}
	}
}
