// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::super::state::cooldowns::CloseCooldowns;
use super::super::utils::relay::DeliveryError;
use super::super::utils::responses::{NOT_IN_MODMAIL, branded_embed, simple_embed};
use super::super::utils::tickets::{find_ticket_for_channel, find_ticket_for_user};
use super::super::utils::transcript::build_transcript;
use crate::config::ConfigData;
use crate::model::Ticket;
use crate::schema::active_tickets;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use miette::{IntoDiagnostic, bail};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use twilight_http::client::Client;
use twilight_mention::fmt::Mention;
use twilight_model::application::command::{Command, CommandType};
use twilight_model::application::interaction::InteractionContextType;
use twilight_model::channel::message::MessageFlags;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::http::attachment::Attachment as AttachmentFile;
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use twilight_util::builder::InteractionResponseDataBuilder;
use twilight_util::builder::command::CommandBuilder;
use type_map::concurrent::TypeMap;

pub fn command_definition() -> Command {
	CommandBuilder::new("close", "Close this modmail and deliver its log", CommandType::ChatInput)
		.contexts([InteractionContextType::Guild, InteractionContextType::BotDm])
		.build()
}

pub async fn handle_command(
	interaction: &InteractionCreate,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let interaction_client = http_client.interaction(application_id);

	let Some(author_id) = interaction.author_id() else {
		bail!("Close command interaction has no author");
	};

	let mut db_connection = db_connection_pool.get().into_diagnostic()?;
	let ticket: Option<Ticket> = if interaction.guild_id.is_none() {
		find_ticket_for_user(&mut db_connection, author_id).into_diagnostic()?
	} else {
		match interaction.channel.as_ref() {
			Some(channel) => find_ticket_for_channel(&mut db_connection, channel.id).into_diagnostic()?,
			None => None,
		}
	};

	let Some(ticket) = ticket else {
		let response = InteractionResponseDataBuilder::new()
			.content(NOT_IN_MODMAIL)
			.flags(MessageFlags::EPHEMERAL)
			.build();
		let response = InteractionResponse {
			kind: InteractionResponseType::ChannelMessageWithSource,
			data: Some(response),
		};
		interaction_client
			.create_response(interaction.id, &interaction.token, &response)
			.await
			.into_diagnostic()?;
		return Ok(());
	};

	let cooldown_remaining = {
		let mut state = bot_state.write().await;
		let cooldowns = state.entry::<CloseCooldowns>().or_insert_with(CloseCooldowns::default);
		cooldowns.check_and_update(ticket.channel_id, Instant::now(), config.close_cooldown())
	};
	if let Some(remaining) = cooldown_remaining {
		let response = InteractionResponseDataBuilder::new()
			.content(format!(
				"On cooldown: you can't use this command for another {} seconds. This is probably because this modmail \
				 was very recently closed or a close is already in progress.",
				remaining.as_secs().max(1)
			))
			.flags(MessageFlags::EPHEMERAL)
			.build();
		let response = InteractionResponse {
			kind: InteractionResponseType::ChannelMessageWithSource,
			data: Some(response),
		};
		interaction_client
			.create_response(interaction.id, &interaction.token, &response)
			.await
			.into_diagnostic()?;
		return Ok(());
	}

	let working_notice = simple_embed("Creating logs and closing modmail...").into_diagnostic()?;
	let response = InteractionResponseDataBuilder::new().embeds([working_notice]).build();
	let response = InteractionResponse {
		kind: InteractionResponseType::ChannelMessageWithSource,
		data: Some(response),
	};
	interaction_client
		.create_response(interaction.id, &interaction.token, &response)
		.await
		.into_diagnostic()?;

	let closer_name = interaction
		.author()
		.map(|user| user.name.clone())
		.unwrap_or_else(|| String::from("unknown"));
	let ticket_user = http_client
		.user(ticket.get_user_id())
		.await
		.into_diagnostic()?
		.model()
		.await
		.into_diagnostic()?;

	// The transcript has to exist before the row or the channel goes away; it's the only durable record.
	let transcript = build_transcript(http_client, ticket.get_channel_id()).await?;
	let log_filename = format!(
		"log-{}-{}-{}.txt",
		ticket_user.name,
		ticket.reason,
		Utc::now().format("%Y-%m-%d")
	);

	let staff_closed_notice = branded_embed(format!(
		"Modmail with {} closed by {}. Modmail reason was \"{}\".",
		ticket.get_user_id().mention(),
		closer_name,
		ticket.reason
	))
	.into_diagnostic()?;
	let log_file = AttachmentFile::from_bytes(log_filename.clone(), transcript.clone().into_bytes(), 0);
	let log_delivery = async {
		http_client
			.create_message(config.get_log_channel())
			.embeds(std::slice::from_ref(&staff_closed_notice))
			.await?;
		http_client
			.create_message(config.get_log_channel())
			.content("Logs:")
			.attachments(std::slice::from_ref(&log_file))
			.await?;
		Ok::<(), twilight_http::error::Error>(())
	};
	if let Err(error) = log_delivery.await {
		tracing::warn!(source = ?error, "couldn't deliver a closure transcript to the log channel");
	}

	// Attempt the row delete regardless of how notification delivery goes, and the channel delete regardless of
	// whether the row delete worked; an orphan on either side is recoverable by an operator.
	let row_delete_result = diesel::delete(active_tickets::table.filter(active_tickets::channel_id.eq(ticket.channel_id)))
		.execute(&mut db_connection);

	let user_closed_notice = branded_embed(format!(
		"Modmail closed by {}. At time of closure, the modmail's reason was \"{}\".",
		closer_name, ticket.reason
	))
	.into_diagnostic()?;
	let user_log_file = AttachmentFile::from_bytes(log_filename, transcript.into_bytes(), 0);
	let user_delivery = async {
		let dm_channel = http_client
			.create_private_channel(ticket.get_user_id())
			.await?
			.model()
			.await?
			.id;
		http_client
			.create_message(dm_channel)
			.embeds(std::slice::from_ref(&user_closed_notice))
			.attachments(std::slice::from_ref(&user_log_file))
			.await?;
		Ok::<(), DeliveryError>(())
	};
	if let Err(error) = user_delivery.await {
		if matches!(error, DeliveryError::Unreachable) {
			let note = simple_embed("Note: Modmail closed, but couldn't DM the user to notify them.").into_diagnostic()?;
			interaction_client
				.create_followup(&interaction.token)
				.embeds(&[note])
				.await
				.into_diagnostic()?;
		} else {
			tracing::warn!(source = ?error, "couldn't deliver a closure notice to the ticket user");
		}
	}

	if let Err(error) = http_client.delete_channel(ticket.get_channel_id()).await {
		tracing::warn!(source = ?error, channel = ticket.channel_id, "couldn't delete a closed ticket's channel");
	}

	row_delete_result.into_diagnostic()?;

	Ok(())
}
