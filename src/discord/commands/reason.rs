// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::super::state::cooldowns::ReasonCooldowns;
use super::super::utils::relay::DeliveryError;
use super::super::utils::responses::{NOT_IN_MODMAIL, footered_embed, simple_embed};
use super::super::utils::tickets::{find_ticket_for_channel, find_ticket_for_user};
use crate::config::ConfigData;
use crate::model::{Ticket, truncate_reason};
use crate::schema::active_tickets;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use miette::{IntoDiagnostic, bail};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use twilight_http::client::Client;
use twilight_model::application::command::{Command, CommandType};
use twilight_model::application::interaction::InteractionContextType;
use twilight_model::application::interaction::application_command::{CommandData, CommandOptionValue};
use twilight_model::channel::message::MessageFlags;
use twilight_model::channel::message::embed::Embed;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_model::id::Id;
use twilight_model::id::marker::{ApplicationMarker, ChannelMarker};
use twilight_util::builder::InteractionResponseDataBuilder;
use twilight_util::builder::command::{CommandBuilder, StringBuilder};
use type_map::concurrent::TypeMap;

pub fn command_definition() -> Command {
	let reason = StringBuilder::new("reason", "The new reason/topic for this modmail")
		.required(true)
		.build();
	CommandBuilder::new("reason", "Set a new reason for this modmail", CommandType::ChatInput)
		.contexts([InteractionContextType::Guild, InteractionContextType::BotDm])
		.option(reason)
		.build()
}

pub async fn handle_command(
	interaction: &InteractionCreate,
	command_data: &CommandData,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let interaction_client = http_client.interaction(application_id);

	let Some(author_id) = interaction.author_id() else {
		bail!("Reason command interaction has no author");
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
		let cooldowns = state.entry::<ReasonCooldowns>().or_insert_with(ReasonCooldowns::default);
		cooldowns.check_and_update(
			ticket.channel_id,
			Instant::now(),
			config.reason_cooldown(),
			config.reason_cooldown_uses(),
		)
	};
	if let Some(remaining) = cooldown_remaining {
		let response = InteractionResponseDataBuilder::new()
			.content(format!(
				"On cooldown: you can't change this modmail's reason again for another {} seconds.",
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

	let mut new_reason: Option<String> = None;
	for option in &command_data.options {
		if option.name == "reason" {
			if let CommandOptionValue::String(value) = &option.value {
				new_reason = Some(value.clone());
			}
		}
	}
	let Some(new_reason) = new_reason else {
		bail!("Reason command received without its required reason option");
	};
	let new_reason = truncate_reason(&new_reason);

	diesel::update(active_tickets::table.filter(active_tickets::channel_id.eq(ticket.channel_id)))
		.set(active_tickets::reason.eq(&new_reason))
		.execute(&mut db_connection)
		.into_diagnostic()?;

	let author_name = interaction
		.author()
		.map(|user| user.name.clone())
		.unwrap_or_else(|| String::from("unknown"));
	let update_notice = footered_embed(format!(
		"{} set the modmail topic/reason to \"{}\"",
		author_name, new_reason
	))
	.into_diagnostic()?;

	let response = InteractionResponseDataBuilder::new()
		.content("Reason updated.")
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

	// The change notice goes to both ends of the ticket and gets pinned so the latest reason stays visible.
	let mut pin_failed = false;
	match send_and_pin(http_client, ticket.get_channel_id(), &update_notice).await {
		Ok(pinned) => pin_failed = pin_failed || !pinned,
		Err(error) => {
			tracing::warn!(source = ?error, "couldn't deliver a reason-change notice to the staff channel");
		}
	}

	let dm_delivery = async {
		let dm_channel = http_client
			.create_private_channel(ticket.get_user_id())
			.await?
			.model()
			.await?
			.id;
		Ok::<Id<ChannelMarker>, DeliveryError>(dm_channel)
	};
	match dm_delivery.await {
		Ok(dm_channel) => match send_and_pin(http_client, dm_channel, &update_notice).await {
			Ok(pinned) => pin_failed = pin_failed || !pinned,
			Err(DeliveryError::Unreachable) => {
				let note = simple_embed(
					"Note: Changed the reason, but couldn't DM the user; they have probably blocked the bot.",
				)
				.into_diagnostic()?;
				interaction_client
					.create_followup(&interaction.token)
					.embeds(&[note])
					.await
					.into_diagnostic()?;
			}
			Err(error) => {
				tracing::warn!(source = ?error, "couldn't deliver a reason-change notice to the ticket user");
			}
		},
		Err(error) => {
			tracing::warn!(source = ?error, "couldn't open a DM channel for a reason-change notice");
		}
	}

	if pin_failed {
		let note = simple_embed(
			"Note: Pinning the reason-change notice failed for either the user or for moderators. The reason was \
			 still changed. Unpin some older messages if you want newer reasons to be pinned.",
		)
		.into_diagnostic()?;
		interaction_client
			.create_followup(&interaction.token)
			.embeds(&[note])
			.await
			.into_diagnostic()?;
	}

	Ok(())
}

/// Sends the notice to a channel and pins it. Returns whether the pin succeeded; send failures are errors.
async fn send_and_pin(
	http_client: &Client,
	channel_id: Id<ChannelMarker>,
	notice: &Embed,
) -> Result<bool, DeliveryError> {
	let notice_response = http_client
		.create_message(channel_id)
		.embeds(std::slice::from_ref(notice))
		.await?;
	let notice_message = notice_response.model().await?.id;
	match http_client.create_pin(channel_id, notice_message).await {
		Ok(_) => Ok(true),
		Err(error) => {
			tracing::warn!(source = ?error, channel = channel_id.get(), "couldn't pin a reason-change notice");
			Ok(false)
		}
	}
}
