// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::relay::{self, DeliveryError, OPEN_CUT_THRESHOLD, clip_content, relayed_line};
use super::responses::{footered_embed, simple_embed};
use crate::config::ConfigData;
use crate::model::{Ticket, database_id_from_discord_id};
use crate::schema::active_tickets;
use diesel::prelude::*;
use miette::IntoDiagnostic;
use twilight_http::client::Client;
use twilight_mention::fmt::Mention;
use twilight_model::channel::message::embed::Embed;
use twilight_model::channel::{Attachment, ChannelType};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, MessageMarker, UserMarker};

/// Looks up the open ticket a user is on the DM end of, if any.
pub fn find_ticket_for_user(db_connection: &mut PgConnection, user_id: Id<UserMarker>) -> QueryResult<Option<Ticket>> {
	active_tickets::table
		.find(database_id_from_discord_id(user_id.get()))
		.first(db_connection)
		.optional()
}

/// Looks up the open ticket a staff channel is dedicated to, if any.
pub fn find_ticket_for_channel(
	db_connection: &mut PgConnection,
	channel_id: Id<ChannelMarker>,
) -> QueryResult<Option<Ticket>> {
	active_tickets::table
		.filter(active_tickets::channel_id.eq(database_id_from_discord_id(channel_id.get())))
		.first(db_connection)
		.optional()
}

/// Derives the staff channel name for a ticket from the user's handle, per Discord's channel naming rules.
pub fn ticket_channel_name(handle: &str) -> String {
	let mut name: String = handle
		.to_lowercase()
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
		.collect();
	name.truncate(100);
	if name.trim_matches('-').is_empty() {
		String::from("modmail")
	} else {
		name
	}
}

/// The initial message a new ticket is built around.
pub struct TicketSeed<'a> {
	/// Display name of whoever wrote the initial message.
	pub author_name: &'a str,
	pub content: &'a str,
	pub attachments: &'a [Attachment],
	/// The originating message, when a real one exists to decorate with the cut mark.
	pub mark_target: Option<(Id<ChannelMarker>, Id<MessageMarker>)>,
}

/// Opens a new ticket with `target_user_id`: creates the staff channel, inserts the row, sends the paired
/// "opened" notices to both sides (pinned), and relays the seed message as the ticket's first relayed message.
///
/// The check-then-insert race with a concurrent open for the same user is settled by the store: the insert is
/// conflict-guarded, and the loser deletes its freshly created channel and reports the duplicate outcome to
/// `origin_channel` instead. Expected failures (duplicate, user unreachable) are reported to `origin_channel`
/// and are not errors.
pub async fn open_ticket(
	seed: &TicketSeed<'_>,
	target_user_id: Id<UserMarker>,
	opened_by_staff: bool,
	reason: &str,
	origin_channel: Id<ChannelMarker>,
	http_client: &Client,
	db_connection: &mut PgConnection,
	config: &ConfigData,
) -> miette::Result<()> {
	let from_user = !opened_by_staff;

	let (content, cut) = clip_content(seed.content, OPEN_CUT_THRESHOLD);
	if cut {
		if let Some((mark_channel, mark_message)) = seed.mark_target {
			if let Err(error) = relay::mark_cut(http_client, mark_channel, mark_message).await {
				tracing::warn!(source = ?error, "couldn't mark an over-length opening message as cut");
			}
		}
	}

	let existing = find_ticket_for_user(db_connection, target_user_id).into_diagnostic()?;
	if existing.is_some() {
		report_duplicate(http_client, origin_channel, &content).await?;
		return Ok(());
	}

	let target_user = http_client
		.user(target_user_id)
		.await
		.into_diagnostic()?
		.model()
		.await
		.into_diagnostic()?;
	let dm_channel = http_client
		.create_private_channel(target_user_id)
		.await
		.into_diagnostic()?
		.model()
		.await
		.into_diagnostic()?
		.id;

	let channel_name = ticket_channel_name(&target_user.name);
	let staff_channel = http_client
		.create_guild_channel(config.get_guild(), &channel_name)
		.kind(ChannelType::GuildText)
		.parent_id(config.get_ticket_category())
		.await
		.into_diagnostic()?
		.model()
		.await
		.into_diagnostic()?
		.id;

	let new_ticket = Ticket::new(target_user_id, staff_channel, reason);
	let inserted = diesel::insert_into(active_tickets::table)
		.values(&new_ticket)
		.on_conflict(active_tickets::user_id)
		.do_nothing()
		.execute(db_connection)
		.into_diagnostic()?;
	if inserted == 0 {
		// A concurrent open for this user won the race; this channel is an orphan.
		if let Err(error) = http_client.delete_channel(staff_channel).await {
			tracing::warn!(source = ?error, channel = staff_channel.get(), "couldn't delete channel from lost open race");
		}
		report_duplicate(http_client, origin_channel, &content).await?;
		return Ok(());
	}

	let (staff_notice, user_notice) = if from_user {
		(
			footered_embed(format!(
				"New modmail from {} (see their message below). Send a message in this channel to respond.\n\nA ✅ on \
				 your message means it's been successfully relayed, and a ✂ means it has been cut to stay within the \
				 character limit.",
				target_user_id.mention()
			))
			.into_diagnostic()?,
			footered_embed(
				"Opened a new modmail and sent your message.\n\nAll messages sent will be relayed back and forth \
				 between you and the moderators. A ✅ on your message means it's been successfully relayed, and a ✂ \
				 means it has been cut to stay within the character limit.",
			)
			.into_diagnostic()?,
		)
	} else {
		(
			footered_embed(format!(
				"Modmail opened by moderator {} to talk to user {}. The reason for this modmail is \"{}\".\n\nA ✅ on \
				 your message means it's been successfully relayed.",
				seed.author_name,
				target_user_id.mention(),
				new_ticket.reason
			))
			.into_diagnostic()?,
			footered_embed(format!(
				"A moderator opened a new modmail to speak with you (see their message below). Send a message in this \
				 DM to respond. The reason for this modmail is \"{}\".\n\nAll messages sent will be relayed back and \
				 forth between you and the moderators. A ✅ on your message means it's been successfully relayed, and \
				 a ✂ means it has been cut to stay within the character limit.",
				new_ticket.reason
			))
			.into_diagnostic()?,
		)
	};

	let user_notice_message = match send_notice(http_client, dm_channel, &user_notice).await {
		Ok(message) => Some(message),
		Err(DeliveryError::Unreachable | DeliveryError::Missing) => {
			// The row and channel stay; staff can still reach the ticket, and an operator can reconcile later.
			let report =
				simple_embed("Error: bot probably can't DM that user; they may have blocked it or closed their DMs.")
					.into_diagnostic()?;
			http_client
				.create_message(origin_channel)
				.embeds(&[report])
				.await
				.into_diagnostic()?;
			None
		}
		Err(error) => return Err(error).into_diagnostic(),
	};

	let staff_notice_message = send_notice(http_client, staff_channel, &staff_notice)
		.await
		.into_diagnostic()?;

	let first_relay_destination = if from_user { staff_channel } else { dm_channel };
	let line = relayed_line(seed.author_name, &content);
	if let Err(error) = relay::send_relayed(http_client, first_relay_destination, &line, seed.attachments).await {
		let report = simple_embed(error.user_report()).into_diagnostic()?;
		http_client
			.create_message(origin_channel)
			.embeds(&[report])
			.await
			.into_diagnostic()?;
	}

	if let Some(user_notice_message) = user_notice_message {
		if let Err(error) = http_client.create_pin(dm_channel, user_notice_message).await {
			tracing::warn!(source = ?error, "couldn't pin the opened notice in the user DM");
		}
	}
	if let Err(error) = http_client.create_pin(staff_channel, staff_notice_message).await {
		tracing::warn!(source = ?error, "couldn't pin the opened notice in the staff channel");
	}

	Ok(())
}

async fn send_notice(
	http_client: &Client,
	channel_id: Id<ChannelMarker>,
	notice: &Embed,
) -> Result<Id<MessageMarker>, DeliveryError> {
	let notice_response = http_client
		.create_message(channel_id)
		.embeds(std::slice::from_ref(notice))
		.await?;
	Ok(notice_response.model().await?.id)
}

async fn report_duplicate(
	http_client: &Client,
	origin_channel: Id<ChannelMarker>,
	content: &str,
) -> miette::Result<()> {
	let notice = simple_embed(
		"Error: you tried to open more than one modmail at once. The bot will handle this; no action is required on \
		 your part, and the rest of the modmail flow will continue as normal. However, the following message was \
		 probably not relayed, so you may want to send it again:",
	)
	.into_diagnostic()?;
	http_client
		.create_message(origin_channel)
		.embeds(&[notice])
		.await
		.into_diagnostic()?;
	if !content.is_empty() {
		http_client
			.create_message(origin_channel)
			.content(content)
			.await
			.into_diagnostic()?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::ticket_channel_name;

	#[test]
	fn handles_become_valid_channel_names() {
		assert_eq!(ticket_channel_name("LonelyPenguin"), "lonelypenguin");
		assert_eq!(ticket_channel_name("some user!"), "some-user-");
	}

	#[test]
	fn naming_is_deterministic() {
		assert_eq!(ticket_channel_name("Käte"), ticket_channel_name("Käte"));
	}

	#[test]
	fn unusable_handles_fall_back() {
		assert_eq!(ticket_channel_name("!!!"), "modmail");
		assert_eq!(ticket_channel_name(""), "modmail");
	}

	#[test]
	fn very_long_handles_are_capped() {
		let name = ticket_channel_name(&"a".repeat(150));
		assert_eq!(name.len(), 100);
	}
}
