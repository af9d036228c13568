// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::super::state::confirm_open::{ConfirmOpenState, ConfirmOpenStates};
use super::super::state::locks::user_lock;
use super::super::utils::relay::{OPEN_CUT_THRESHOLD, clip_content};
use super::super::utils::responses::{SOMETHING_WENT_WRONG, branded_embed, simple_embed};
use super::super::utils::tickets::{TicketSeed, open_ticket};
use crate::config::ConfigData;
use crate::model::DEFAULT_REASON;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use miette::{IntoDiagnostic, bail};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::sleep;
use twilight_http::client::Client;
use twilight_mention::fmt::Mention;
use twilight_model::channel::Message;
use twilight_model::channel::message::MessageFlags;
use twilight_model::channel::message::component::{ActionRow, Button, ButtonStyle, Component};
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use twilight_util::builder::InteractionResponseDataBuilder;
use type_map::concurrent::TypeMap;

const CONFIRMATION_EXPIRED: &str = "This confirmation has expired. Send a new message to try again.";

/// Asks a DMing user without an open ticket to confirm that their message should open one. The prompt carries
/// Confirm/Cancel buttons and times out after the configured window, after which the buttons are disabled.
pub async fn send_confirmation_prompt(
	message: &Message,
	http_client: &Arc<Client>,
	config: &Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let (preview, _) = clip_content(&message.content, OPEN_CUT_THRESHOLD);
	let prompt_embed = branded_embed(format!(
		"Please confirm that you would like to open a modmail and relay your message to the moderators.\n\n**Your \
		 message**:\n\n{}",
		preview
	))
	.into_diagnostic()?;

	let confirm_id = cuid2::create_id();
	let components = confirmation_components(&confirm_id, false);

	let prompt_response = http_client
		.create_message(message.channel_id)
		.embeds(&[prompt_embed])
		.components(&components)
		.await
		.into_diagnostic()?;
	let prompt_message = prompt_response.model().await.into_diagnostic()?.id;

	let new_state = ConfirmOpenState {
		message: message.clone(),
		prompt_message,
	};
	{
		let mut state = bot_state.write().await;
		let confirm_states = state.entry::<ConfirmOpenStates>().or_insert_with(ConfirmOpenStates::default);
		confirm_states.states.insert(confirm_id.clone(), new_state);
	}

	tokio::spawn(expire_confirmation(
		Arc::clone(http_client),
		bot_state,
		confirm_id,
		config.confirm_timeout(),
	));

	Ok(())
}

async fn expire_confirmation(
	http_client: Arc<Client>,
	bot_state: Arc<RwLock<TypeMap>>,
	confirm_id: String,
	timeout: std::time::Duration,
) {
	sleep(timeout).await;
	let expired_state = {
		let mut state = bot_state.write().await;
		state
			.get_mut::<ConfirmOpenStates>()
			.and_then(|confirm_states| confirm_states.states.remove(&confirm_id))
	};
	let Some(expired_state) = expired_state else {
		return;
	};

	let channel = expired_state.message.channel_id;
	let disabled_components = confirmation_components(&confirm_id, true);
	if let Err(error) = http_client
		.update_message(channel, expired_state.prompt_message)
		.components(Some(&disabled_components))
		.await
	{
		tracing::warn!(source = ?error, "couldn't disable an expired confirmation prompt");
	}

	let Ok(notice) = simple_embed("Timed out, process cancelled. To try again, send a new message.") else {
		return;
	};
	if let Err(error) = http_client.create_message(channel).embeds(&[notice]).await {
		tracing::warn!(source = ?error, "couldn't notify a user of their expired confirmation prompt");
	}
}

pub async fn route_confirm_open_interaction(
	interaction: &InteractionCreate,
	custom_id_path: &[String],
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let Some(confirm_id) = custom_id_path.get(1) else {
		bail!("Invalid custom ID for open confirmation (parts: {:?})", custom_id_path);
	};
	let Some(action) = custom_id_path.get(2) else {
		bail!("Invalid custom ID for open confirmation (parts: {:?})", custom_id_path);
	};
	if action != "confirm" && action != "cancel" {
		bail!(
			"Invalid action for open confirmation: {} (custom ID parts: {:?})",
			action,
			custom_id_path
		);
	}

	let interaction_client = http_client.interaction(application_id);

	let presser = interaction.author_id();
	let prompted_user = {
		let state = bot_state.read().await;
		state
			.get::<ConfirmOpenStates>()
			.and_then(|confirm_states| confirm_states.states.get(confirm_id))
			.map(|confirm_state| confirm_state.message.author.id)
	};

	let confirm_state = match (prompted_user, presser) {
		(Some(prompted), Some(presser_id)) if prompted != presser_id => {
			let response = InteractionResponseDataBuilder::new()
				.content(format!("Only {} may respond to this confirmation.", prompted.mention()))
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
		_ => {
			let mut state = bot_state.write().await;
			state
				.get_mut::<ConfirmOpenStates>()
				.and_then(|confirm_states| confirm_states.states.remove(confirm_id))
		}
	};

	let Some(confirm_state) = confirm_state else {
		let response = InteractionResponseDataBuilder::new()
			.content(CONFIRMATION_EXPIRED)
			.components(Vec::new())
			.build();
		let response = InteractionResponse {
			kind: InteractionResponseType::UpdateMessage,
			data: Some(response),
		};
		interaction_client
			.create_response(interaction.id, &interaction.token, &response)
			.await
			.into_diagnostic()?;
		return Ok(());
	};

	// Resolve the prompt either way so the buttons can't be pressed twice.
	let disabled_components = confirmation_components(confirm_id, true);
	let response = InteractionResponseDataBuilder::new()
		.components(disabled_components)
		.build();
	let response = InteractionResponse {
		kind: InteractionResponseType::UpdateMessage,
		data: Some(response),
	};
	interaction_client
		.create_response(interaction.id, &interaction.token, &response)
		.await
		.into_diagnostic()?;

	let origin_channel = confirm_state.message.channel_id;

	if action == "cancel" {
		let notice = simple_embed("Cancelled.").into_diagnostic()?;
		http_client
			.create_message(origin_channel)
			.embeds(&[notice])
			.await
			.into_diagnostic()?;
		return Ok(());
	}

	let notice = simple_embed("Okay, relaying your message to the moderators...").into_diagnostic()?;
	http_client
		.create_message(origin_channel)
		.embeds(&[notice])
		.await
		.into_diagnostic()?;

	let author = &confirm_state.message.author;
	let lock = user_lock(&bot_state, author.id).await;
	let _guard = lock.lock().await;

	let mut db_connection = db_connection_pool.get().into_diagnostic()?;
	let seed = TicketSeed {
		author_name: &author.name,
		content: &confirm_state.message.content,
		attachments: &confirm_state.message.attachments,
		mark_target: Some((confirm_state.message.channel_id, confirm_state.message.id)),
	};
	let open_result = open_ticket(
		&seed,
		author.id,
		false,
		DEFAULT_REASON,
		origin_channel,
		http_client,
		&mut db_connection,
		&config,
	)
	.await;
	if let Err(error) = open_result {
		tracing::error!(source = ?error, "An error occurred opening a ticket from a confirmed DM");
		let report = simple_embed(SOMETHING_WENT_WRONG).into_diagnostic()?;
		http_client
			.create_message(origin_channel)
			.embeds(&[report])
			.await
			.into_diagnostic()?;
	}

	Ok(())
}

fn confirmation_components(confirm_id: &str, disabled: bool) -> Vec<Component> {
	let confirm_button = Component::Button(Button {
		custom_id: Some(format!("confirm_open/{}/confirm", confirm_id)),
		disabled,
		emoji: None,
		label: Some(String::from("Confirm")),
		style: ButtonStyle::Success,
		url: None,
		sku_id: None,
	});
	let cancel_button = Component::Button(Button {
		custom_id: Some(format!("confirm_open/{}/cancel", confirm_id)),
		disabled,
		emoji: None,
		label: Some(String::from("Cancel")),
		style: ButtonStyle::Secondary,
		url: None,
		sku_id: None,
	});
	vec![Component::ActionRow(ActionRow {
		components: vec![confirm_button, cancel_button],
	})]
}
