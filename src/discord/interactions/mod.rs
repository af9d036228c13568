// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::utils::gate;
use crate::config::ConfigData;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use miette::{IntoDiagnostic, bail};
use std::sync::Arc;
use tokio::sync::RwLock;
use twilight_http::client::Client;
use twilight_model::application::interaction::message_component::MessageComponentInteractionData;
use twilight_model::application::interaction::modal::ModalInteractionData;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use type_map::concurrent::TypeMap;

pub mod confirm_open;
mod open_prompt;

pub async fn route_interaction(
	interaction: &InteractionCreate,
	interaction_data: &MessageComponentInteractionData,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let Some(author_id) = interaction.author_id() else {
		bail!("Component interaction has no author: {:?}", interaction_data);
	};
	{
		let mut db_connection = db_connection_pool.get().into_diagnostic()?;
		if !gate::evaluate(&config, &mut db_connection, author_id).into_diagnostic()? {
			tracing::debug!(user = author_id.get(), "ignoring component interaction from blacklisted user");
			return Ok(());
		}
	}

	let custom_id_path: Vec<String> = interaction_data.custom_id.split('/').map(|s| s.to_string()).collect();

	match custom_id_path.first().map(|s| s.as_str()) {
		Some("confirm_open") => {
			confirm_open::route_confirm_open_interaction(
				interaction,
				&custom_id_path,
				http_client,
				application_id,
				db_connection_pool,
				config,
				bot_state,
			)
			.await
		}
		_ => bail!("Unknown component interaction encountered: {}", interaction_data.custom_id),
	}
}

pub async fn route_modal_submit(
	interaction: &InteractionCreate,
	modal_data: &ModalInteractionData,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let Some(author_id) = interaction.author_id() else {
		bail!("Modal submission has no author: {:?}", modal_data);
	};
	{
		let mut db_connection = db_connection_pool.get().into_diagnostic()?;
		if !gate::evaluate(&config, &mut db_connection, author_id).into_diagnostic()? {
			tracing::debug!(user = author_id.get(), "ignoring modal submission from blacklisted user");
			return Ok(());
		}
	}

	let custom_id_path: Vec<String> = modal_data.custom_id.split('/').map(|s| s.to_string()).collect();

	match custom_id_path.first().map(|s| s.as_str()) {
		Some("open_prompt") => {
			open_prompt::handle_modal(
				interaction,
				modal_data,
				&custom_id_path,
				http_client,
				application_id,
				db_connection_pool,
				config,
				bot_state,
			)
			.await
		}
		_ => bail!("Unknown modal submission encountered: {}", modal_data.custom_id),
	}
}
