// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::interactions::confirm_open::send_confirmation_prompt;
use super::state::locks::user_lock;
use super::utils::gate;
use super::utils::relay::relay_message;
use super::utils::responses::simple_embed;
use super::utils::tickets::{find_ticket_for_channel, find_ticket_for_user};
use crate::config::ConfigData;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use miette::IntoDiagnostic;
use std::sync::Arc;
use tokio::sync::RwLock;
use twilight_http::client::Client;
use twilight_model::channel::Message;
use type_map::concurrent::TypeMap;

/// Routes one inbound message: nothing for bot or gated authors, relay for messages inside a ticket, and the
/// open-confirmation prompt for DMs that aren't part of one. Guild messages outside ticket channels are ordinary
/// traffic and are ignored. Slash commands never arrive here; they come in as interactions.
pub async fn handle_message(
	message: &Message,
	http_client: &Arc<Client>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: &Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	if message.author.bot {
		return Ok(());
	}

	let mut db_connection = db_connection_pool.get().into_diagnostic()?;
	if !gate::evaluate(config, &mut db_connection, message.author.id).into_diagnostic()? {
		tracing::debug!(user = message.author.id.get(), "dropping message from blacklisted user");
		return Ok(());
	}

	if message.guild_id.is_none() {
		handle_direct_message(message, http_client, &mut db_connection, config, bot_state).await
	} else {
		handle_guild_message(message, http_client, &mut db_connection, config, bot_state).await
	}
}

async fn handle_direct_message(
	message: &Message,
	http_client: &Arc<Client>,
	db_connection: &mut PgConnection,
	config: &Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let lock = user_lock(&bot_state, message.author.id).await;
	let _guard = lock.lock().await;

	let ticket = find_ticket_for_user(db_connection, message.author.id).into_diagnostic()?;
	match ticket {
		Some(ticket) => {
			if let Err(error) = relay_message(message, &ticket, true, http_client).await {
				let report = simple_embed(error.user_report()).into_diagnostic()?;
				http_client
					.create_message(message.channel_id)
					.embeds(&[report])
					.await
					.into_diagnostic()?;
			}
			Ok(())
		}
		None => send_confirmation_prompt(message, http_client, config, bot_state).await,
	}
}

async fn handle_guild_message(
	message: &Message,
	http_client: &Arc<Client>,
	db_connection: &mut PgConnection,
	config: &Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	if message.guild_id != Some(config.get_guild()) {
		return Ok(());
	}

	let Some(ticket) = find_ticket_for_channel(db_connection, message.channel_id).into_diagnostic()? else {
		return Ok(());
	};

	let lock = user_lock(&bot_state, ticket.get_user_id()).await;
	let _guard = lock.lock().await;

	if let Err(error) = relay_message(message, &ticket, false, http_client).await {
		let report = simple_embed(error.user_report()).into_diagnostic()?;
		http_client
			.create_message(message.channel_id)
			.embeds(&[report])
			.await
			.into_diagnostic()?;
	}
	Ok(())
}
