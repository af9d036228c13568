// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::super::state::open_prompt::{OpenPromptState, OpenPromptStates};
use super::super::utils::responses::NOT_PERMITTED;
use super::super::utils::tickets::find_ticket_for_channel;
use crate::config::ConfigData;
use crate::model::{DEFAULT_REASON, truncate_reason};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use miette::{IntoDiagnostic, bail};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use twilight_http::client::Client;
use twilight_model::application::command::{Command, CommandType};
use twilight_model::application::interaction::InteractionContextType;
use twilight_model::application::interaction::application_command::{CommandData, CommandOptionValue};
use twilight_model::channel::message::MessageFlags;
use twilight_model::channel::message::component::{ActionRow, Component, TextInput, TextInputStyle};
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::guild::Permissions;
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_model::id::Id;
use twilight_model::id::marker::{ApplicationMarker, UserMarker};
use twilight_util::builder::InteractionResponseDataBuilder;
use twilight_util::builder::command::{CommandBuilder, StringBuilder, UserBuilder};
use type_map::concurrent::TypeMap;

pub fn command_definition() -> Command {
	let user = UserBuilder::new("user", "The user to open a modmail with")
		.required(true)
		.build();
	let reason = StringBuilder::new("reason", "Initial reason for the modmail").build();
	CommandBuilder::new("open", "Open a modmail with a specific user", CommandType::ChatInput)
		.contexts([InteractionContextType::Guild])
		.default_member_permissions(Permissions::MODERATE_MEMBERS)
		.option(user)
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
		bail!("Open command interaction has no author");
	};
	if !config.is_moderator(author_id) {
		let response = InteractionResponseDataBuilder::new()
			.content(NOT_PERMITTED)
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

	if interaction.guild_id != Some(config.get_guild()) {
		let response = InteractionResponseDataBuilder::new()
			.content("You must be in the managed server to use this command.")
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

	// Opening from inside an active ticket channel would leak the new conversation to its user.
	if let Some(channel) = interaction.channel.as_ref() {
		let mut db_connection = db_connection_pool.get().into_diagnostic()?;
		if find_ticket_for_channel(&mut db_connection, channel.id)
			.into_diagnostic()?
			.is_some()
		{
			let response = InteractionResponseDataBuilder::new()
				.content("Error: you are currently in a modmail. Run this command in a different channel (for privacy).")
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
	}

	let mut target_user: Option<Id<UserMarker>> = None;
	let mut reason: Option<String> = None;
	for option in &command_data.options {
		match (option.name.as_str(), &option.value) {
			("user", CommandOptionValue::User(user_id)) => target_user = Some(*user_id),
			("reason", CommandOptionValue::String(value)) => reason = Some(value.clone()),
			_ => (),
		}
	}
	let Some(target_user) = target_user else {
		bail!("Open command received without its required user option");
	};
	let reason = match reason {
		Some(reason) => truncate_reason(&reason),
		None => String::from(DEFAULT_REASON),
	};

	let prompt_id = cuid2::create_id();
	let new_state = OpenPromptState { target_user, reason };
	{
		let mut state = bot_state.write().await;
		let prompt_states = state.entry::<OpenPromptStates>().or_insert_with(OpenPromptStates::default);
		prompt_states.states.insert(prompt_id.clone(), new_state);
	}

	let message_input = Component::TextInput(TextInput {
		custom_id: String::from("message"),
		label: String::from("Initial message"),
		max_length: None,
		min_length: None,
		placeholder: Some(String::from("The message to DM to the user to initiate this modmail")),
		required: Some(true),
		style: TextInputStyle::Paragraph,
		value: None,
	});
	let message_input_row = Component::ActionRow(ActionRow {
		components: vec![message_input],
	});
	let response = InteractionResponseDataBuilder::new()
		.custom_id(format!("open_prompt/{}/message", prompt_id))
		.title("Open Modmail")
		.components(vec![message_input_row])
		.build();
	let response = InteractionResponse {
		kind: InteractionResponseType::Modal,
		data: Some(response),
	};
	interaction_client
		.create_response(interaction.id, &interaction.token, &response)
		.await
		.into_diagnostic()?;

	tokio::spawn(expire_prompt(bot_state, prompt_id, config.open_prompt_timeout()));

	Ok(())
}

async fn expire_prompt(bot_state: Arc<RwLock<TypeMap>>, prompt_id: String, timeout: Duration) {
	sleep(timeout).await;
	let mut state = bot_state.write().await;
	let Some(prompt_states) = state.get_mut::<OpenPromptStates>() else {
		return;
	};
	prompt_states.states.remove(&prompt_id);
}
