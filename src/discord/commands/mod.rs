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
use twilight_model::application::command::Command;
use twilight_model::application::interaction::application_command::CommandData;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::id::Id;
use twilight_model::id::marker::ApplicationMarker;
use type_map::concurrent::TypeMap;

mod blacklist;
mod close;
mod open;
mod reason;

pub fn command_definitions() -> Vec<Command> {
	vec![
		blacklist::command_definition(),
		close::command_definition(),
		open::command_definition(),
		reason::command_definition(),
	]
}

pub async fn route_command(
	interaction: &InteractionCreate,
	command_data: &CommandData,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: Arc<ConfigData>,
	bot_state: Arc<RwLock<TypeMap>>,
) -> miette::Result<()> {
	let Some(author_id) = interaction.author_id() else {
		bail!("Command interaction has no author: {:?}", command_data);
	};
	{
		// Blacklisted users get no response at all; they shouldn't be able to tell they're being ignored.
		let mut db_connection = db_connection_pool.get().into_diagnostic()?;
		if !gate::evaluate(&config, &mut db_connection, author_id).into_diagnostic()? {
			tracing::debug!(
				user = author_id.get(),
				command = %command_data.name,
				"ignoring command from blacklisted user"
			);
			return Ok(());
		}
	}

	match command_data.name.as_str() {
		"blacklist" => {
			blacklist::handle_command(
				interaction,
				command_data,
				http_client,
				application_id,
				db_connection_pool,
				config,
			)
			.await
		}
		"close" => {
			close::handle_command(
				interaction,
				http_client,
				application_id,
				db_connection_pool,
				config,
				bot_state,
			)
			.await
		}
		"open" => {
			open::handle_command(
				interaction,
				command_data,
				http_client,
				application_id,
				db_connection_pool,
				config,
				bot_state,
			)
			.await
		}
		"reason" => {
			reason::handle_command(
				interaction,
				command_data,
				http_client,
				application_id,
				db_connection_pool,
				config,
				bot_state,
			)
			.await
		}
		_ => bail!("Unknown command encountered: {}\n{:?}", command_data.name, command_data),
	}
}
