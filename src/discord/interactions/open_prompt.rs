// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::super::state::locks::user_lock;
use super::super::state::open_prompt::OpenPromptStates;
use super::super::utils::responses::{SOMETHING_WENT_WRONG, simple_embed};
use super::super::utils::tickets::{TicketSeed, open_ticket};
use crate::config::ConfigData;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use miette::{IntoDiagnostic, bail};
use std::sync::Arc;
use tokio::sync::RwLock;
use twilight_http::client::Client;
use twilight_mention::fmt::Mention;
use twilight_model::application::interaction::modal::ModalInteractionData;
use twilight_model::channel::message::MessageFlags;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use twilight_util::builder::InteractionResponseDataBuilder;
use type_map::concurrent::TypeMap;

/// Handles the modal a moderator submits with the initial message for a staff-opened ticket.
pub async fn handle_modal(
	interaction: &InteractionCreate,
	modal_data: &ModalInteractionData,
	custom_id_path: &[String],
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let Some(prompt_id) = custom_id_path.get(1) else {
		bail!("Invalid custom ID for open prompt (parts: {:?})", custom_id_path);
	};
	let Some(action) = custom_id_path.get(2) else {
		bail!("Invalid custom ID for open prompt (parts: {:?})", custom_id_path);
	};
	if action != "message" {
		bail!(
			"Invalid action for open prompt: {} (custom ID parts: {:?})",
			action,
			custom_id_path
		);
	}

	let interaction_client = http_client.interaction(application_id);

	let prompt_state = {
		let mut state = bot_state.write().await;
		state
			.get_mut::<OpenPromptStates>()
			.and_then(|prompt_states| prompt_states.states.remove(prompt_id))
	};
	let Some(prompt_state) = prompt_state else {
		let response = InteractionResponseDataBuilder::new()
			.content("That prompt timed out. Use /open to try again.")
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

	let mut initial_message: Option<String> = None;
	for row in modal_data.components.iter() {
		for component in row.components.iter() {
			if component.custom_id.as_str() == "message" {
				initial_message = component.value.clone();
			}
		}
	}
	let Some(initial_message) = initial_message else {
		bail!("Open prompt modal submitted without its message field");
	};

	let Some(moderator) = interaction.author() else {
		bail!("Open prompt modal submission isn't from a user");
	};
	let Some(origin_channel) = interaction.channel.as_ref().map(|channel| channel.id) else {
		bail!("Open prompt modal submission has no channel");
	};

	let ack = simple_embed(format!("Opening a modmail with {}...", prompt_state.target_user.mention()))
		.into_diagnostic()?;
	let response = InteractionResponseDataBuilder::new().embeds([ack]).build();
	let response = InteractionResponse {
		kind: InteractionResponseType::ChannelMessageWithSource,
		data: Some(response),
	};
	interaction_client
		.create_response(interaction.id, &interaction.token, &response)
		.await
		.into_diagnostic()?;

	let lock = user_lock(&bot_state, prompt_state.target_user).await;
	let _guard = lock.lock().await;

	let mut db_connection = db_connection_pool.get().into_diagnostic()?;
	let seed = TicketSeed {
		author_name: &moderator.name,
		content: &initial_message,
		attachments: &[],
		mark_target: None,
	};
	let open_result = open_ticket(
		&seed,
		prompt_state.target_user,
		true,
		&prompt_state.reason,
		origin_channel,
		http_client,
		&mut db_connection,
		&config,
	)
	.await;
	if let Err(error) = open_result {
		tracing::error!(source = ?error, "An error occurred opening a staff-initiated ticket");
		let report = simple_embed(SOMETHING_WENT_WRONG).into_diagnostic()?;
		http_client
			.create_message(origin_channel)
			.embeds(&[report])
			.await
			.into_diagnostic()?;
	}

	Ok(())
}
