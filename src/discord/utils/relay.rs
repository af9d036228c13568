// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::model::Ticket;
use miette::Diagnostic;
use std::fmt;
use twilight_http::client::Client;
use twilight_http::error::{Error as HttpError, ErrorType};
use twilight_http::request::channel::reaction::RequestReactionType;
use twilight_http::response::{DeserializeBodyError, StatusCode};
use twilight_model::channel::{Attachment, Message};
use twilight_model::http::attachment::Attachment as AttachmentFile;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};

/// Inbound messages at or above this length (in characters) are cut before relaying mid-ticket.
pub const RELAY_CUT_THRESHOLD: usize = 1960;
/// The ticket-open flow wraps the first message in template text, so it cuts earlier.
pub const OPEN_CUT_THRESHOLD: usize = 1910;

/// Reaction placed on a message that was relayed successfully.
pub const DELIVERED_MARK: &str = "✅";
/// Reaction placed on a message that was cut to fit the transport's size ceiling.
pub const CUT_MARK: &str = "✂";

pub fn reaction(name: &'static str) -> RequestReactionType<'static> {
	RequestReactionType::Unicode { name }
}

/// Cuts content to stay under the given threshold. Returns the possibly shortened content and whether anything
/// was cut. A message of exactly `threshold - 1` characters passes through whole.
pub fn clip_content(content: &str, threshold: usize) -> (String, bool) {
	if content.chars().count() >= threshold {
		(content.chars().take(threshold - 1).collect(), true)
	} else {
		(String::from(content), false)
	}
}

/// The line a relayed message becomes on the other side of the ticket.
pub fn relayed_line(author_name: &str, content: &str) -> String {
	format!("**{}**: {}", author_name, content)
}

/// How a relay attempt failed. [DeliveryError::Unreachable] and [DeliveryError::Missing] are reported to users
/// with specific guidance; everything else gets a generic report and a log entry.
#[derive(Debug, Diagnostic)]
pub enum DeliveryError {
	/// The destination user refuses DMs from the bot (or the bot may not react to the source message).
	Unreachable,
	/// The destination object no longer exists.
	Missing,
	Http(HttpError),
	Deserialize(DeserializeBodyError),
	Download(reqwest::Error),
}

impl From<HttpError> for DeliveryError {
	fn from(error: HttpError) -> Self {
		if let ErrorType::Response { status, .. } = error.kind() {
			if *status == StatusCode::FORBIDDEN {
				return Self::Unreachable;
			}
			if *status == StatusCode::NOT_FOUND {
				return Self::Missing;
			}
		}
		Self::Http(error)
	}
}

impl From<DeserializeBodyError> for DeliveryError {
	fn from(error: DeserializeBodyError) -> Self {
		Self::Deserialize(error)
	}
}

impl From<reqwest::Error> for DeliveryError {
	fn from(error: reqwest::Error) -> Self {
		Self::Download(error)
	}
}

impl std::error::Error for DeliveryError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Unreachable | Self::Missing => None,
			Self::Http(error) => Some(error),
			Self::Deserialize(error) => Some(error),
			Self::Download(error) => Some(error),
		}
	}
}

impl fmt::Display for DeliveryError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unreachable => write!(f, "destination user unreachable"),
			Self::Missing => write!(f, "destination no longer exists"),
			Self::Http(error) => write!(f, "HTTP error: {}", error),
			Self::Deserialize(error) => write!(f, "deserialization error: {}", error),
			Self::Download(error) => write!(f, "attachment download error: {}", error),
		}
	}
}

impl DeliveryError {
	/// The report shown in the channel the failed relay originated from.
	pub fn user_report(&self) -> String {
		match self {
			Self::Unreachable => String::from(
				"Error: Couldn't send a message to this user; they have probably blocked the bot. Try DMing them \
				 directly. (Alternatively, the bot can't add a reaction to your message.)",
			),
			Self::Missing => String::from(
				"Error: The other end of this modmail no longer exists. It may have been deleted; close this modmail.",
			),
			error => format!("Something went wrong relaying this message. ({})", error),
		}
	}
}

/// Relays one mid-ticket message to the other side: the staff channel if it came from the user's DMs, the user's
/// DMs if it came from the staff channel. Cuts oversized content (marking the original with [CUT_MARK]) and
/// re-uploads attachments, then acknowledges the original with [DELIVERED_MARK].
pub async fn relay_message(
	message: &Message,
	ticket: &Ticket,
	from_user: bool,
	http_client: &Client,
) -> Result<(), DeliveryError> {
	let (content, cut) = clip_content(&message.content, RELAY_CUT_THRESHOLD);
	if cut {
		http_client
			.create_reaction(message.channel_id, message.id, &reaction(CUT_MARK))
			.await?;
	}

	let destination = if from_user {
		ticket.get_channel_id()
	} else {
		let dm_response = http_client.create_private_channel(ticket.get_user_id()).await?;
		dm_response.model().await?.id
	};

	let line = relayed_line(&message.author.name, &content);
	send_relayed(http_client, destination, &line, &message.attachments).await?;

	http_client
		.create_reaction(message.channel_id, message.id, &reaction(DELIVERED_MARK))
		.await?;
	Ok(())
}

/// Sends one relayed line, re-uploading the source message's attachments alongside it.
pub async fn send_relayed(
	http_client: &Client,
	destination: Id<ChannelMarker>,
	line: &str,
	attachments: &[Attachment],
) -> Result<(), DeliveryError> {
	let files = download_attachments(attachments).await?;
	let mut create_message = http_client.create_message(destination).content(line);
	if !files.is_empty() {
		create_message = create_message.attachments(&files);
	}
	create_message.await?;
	Ok(())
}

async fn download_attachments(attachments: &[Attachment]) -> Result<Vec<AttachmentFile>, DeliveryError> {
	let mut files = Vec::with_capacity(attachments.len());
	for (index, attachment) in attachments.iter().enumerate() {
		let bytes = reqwest::get(&attachment.url).await?.bytes().await?;
		files.push(AttachmentFile::from_bytes(
			attachment.filename.clone(),
			bytes.to_vec(),
			index as u64,
		));
	}
	Ok(files)
}

/// Marks a message as cut if its content met the given threshold. Used by the open flow, which clips at
/// [OPEN_CUT_THRESHOLD] rather than the relay threshold.
pub async fn mark_cut(
	http_client: &Client,
	channel_id: Id<ChannelMarker>,
	message_id: Id<MessageMarker>,
) -> Result<(), DeliveryError> {
	http_client
		.create_reaction(channel_id, message_id, &reaction(CUT_MARK))
		.await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::{OPEN_CUT_THRESHOLD, RELAY_CUT_THRESHOLD, clip_content, relayed_line};

	#[test]
	fn short_messages_pass_through_uncut() {
		let (content, cut) = clip_content("hello there", RELAY_CUT_THRESHOLD);
		assert_eq!(content, "hello there");
		assert!(!cut);
	}

	#[test]
	fn relay_cut_boundary_is_inclusive() {
		let just_under = "a".repeat(RELAY_CUT_THRESHOLD - 1);
		let (content, cut) = clip_content(&just_under, RELAY_CUT_THRESHOLD);
		assert_eq!(content.chars().count(), RELAY_CUT_THRESHOLD - 1);
		assert!(!cut);

		let at_threshold = "a".repeat(RELAY_CUT_THRESHOLD);
		let (content, cut) = clip_content(&at_threshold, RELAY_CUT_THRESHOLD);
		assert_eq!(content.chars().count(), RELAY_CUT_THRESHOLD - 1);
		assert!(cut);
	}

	#[test]
	fn open_flow_cuts_earlier_than_relay() {
		let message = "b".repeat(OPEN_CUT_THRESHOLD);
		let (open_content, open_cut) = clip_content(&message, OPEN_CUT_THRESHOLD);
		assert!(open_cut);
		assert_eq!(open_content.chars().count(), OPEN_CUT_THRESHOLD - 1);

		let (relay_content, relay_cut) = clip_content(&message, RELAY_CUT_THRESHOLD);
		assert!(!relay_cut);
		assert_eq!(relay_content.chars().count(), OPEN_CUT_THRESHOLD);
	}

	#[test]
	fn clipping_counts_characters_not_bytes() {
		let message = "née".repeat(RELAY_CUT_THRESHOLD / 3 + 1);
		let (content, cut) = clip_content(&message, RELAY_CUT_THRESHOLD);
		assert!(cut);
		assert_eq!(content.chars().count(), RELAY_CUT_THRESHOLD - 1);
	}

	#[test]
	fn relayed_lines_carry_the_author() {
		assert_eq!(relayed_line("penguin", "help me"), "**penguin**: help me");
	}
}
