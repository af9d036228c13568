// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::super::utils::relay::DeliveryError;
use super::super::utils::responses::{NOT_PERMITTED, branded_embed, simple_embed};
use crate::config::ConfigData;
use crate::model::{BlacklistEntry, database_id_from_discord_id};
use crate::schema::blacklist;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DbError};
use miette::{IntoDiagnostic, bail};
use std::sync::Arc;
use twilight_http::client::Client;
use twilight_http::error::ErrorType;
use twilight_http::response::StatusCode;
use twilight_mention::fmt::Mention;
use twilight_model::application::command::{Command, CommandType};
use twilight_model::application::interaction::InteractionContextType;
use twilight_model::application::interaction::application_command::{CommandData, CommandDataOption, CommandOptionValue};
use twilight_model::channel::message::MessageFlags;
use twilight_model::channel::message::embed::Embed;
use twilight_model::gateway::payload::incoming::InteractionCreate;
use twilight_model::guild::Permissions;
use twilight_model::http::attachment::Attachment as AttachmentFile;
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_model::id::Id;
use twilight_model::id::marker::{ApplicationMarker, UserMarker};
use twilight_util::builder::InteractionResponseDataBuilder;
use twilight_util::builder::command::{CommandBuilder, SubCommandBuilder, UserBuilder};

pub fn command_definition() -> Command {
	let add_user = UserBuilder::new("user", "The user to blacklist").required(true).build();
	let add = SubCommandBuilder::new("add", "Prevent a user from using the modmail system").option(add_user);
	let remove_user = UserBuilder::new("user", "The user to unblacklist").required(true).build();
	let remove = SubCommandBuilder::new("remove", "Allow a blacklisted user to use the modmail system again")
		.option(remove_user);
	let show = SubCommandBuilder::new("show", "Show who is currently blacklisted");
	CommandBuilder::new(
		"blacklist",
		"Manage which users may not use the modmail system",
		CommandType::ChatInput,
	)
	.contexts([InteractionContextType::Guild])
	.default_member_permissions(Permissions::MODERATE_MEMBERS)
	.option(add)
	.option(remove)
	.option(show)
	.build()
}

pub async fn handle_command(
	interaction: &InteractionCreate,
	command_data: &CommandData,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
	config: Arc<ConfigData>,
) -> miette::Result<()> {
	let interaction_client = http_client.interaction(application_id);

	let Some(author_id) = interaction.author_id() else {
		bail!("Blacklist command interaction has no author");
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

	let Some(subcommand_data) = command_data.options.first() else {
		bail!("Blacklist command invoked with no subcommand");
	};

	match subcommand_data.name.as_str() {
		"add" => {
			handle_add(
				interaction,
				&subcommand_data.value,
				http_client,
				application_id,
				db_connection_pool,
			)
			.await
		}
		"remove" => {
			handle_remove(
				interaction,
				&subcommand_data.value,
				http_client,
				application_id,
				db_connection_pool,
			)
			.await
		}
		"show" => handle_show(interaction, http_client, application_id, db_connection_pool).await,
		_ => bail!("Unknown blacklist subcommand encountered: {}", subcommand_data.name),
	}
}

fn subcommand_user(value: &CommandOptionValue) -> Option<Id<UserMarker>> {
	let CommandOptionValue::SubCommand(options) = value else {
		return None;
	};
	options.iter().find_map(|option: &CommandDataOption| {
		if option.name == "user" {
			if let CommandOptionValue::User(user_id) = &option.value {
				return Some(*user_id);
			}
		}
		None
	})
}

async fn handle_add(
	interaction: &InteractionCreate,
	subcommand_value: &CommandOptionValue,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
) -> miette::Result<()> {
	let interaction_client = http_client.interaction(application_id);
	let Some(target_user_id) = subcommand_user(subcommand_value) else {
		bail!("Blacklist add received without its required user option");
	};

	let target_user = match http_client.user(target_user_id).await {
		Ok(response) => response.model().await.into_diagnostic()?,
		Err(error) => {
			if let ErrorType::Response { status, .. } = error.kind() {
				if *status == StatusCode::NOT_FOUND {
					let report = simple_embed("Error: member not found.").into_diagnostic()?;
					respond_with_embed(interaction, &interaction_client, report, true).await?;
					return Ok(());
				}
			}
			return Err(error).into_diagnostic();
		}
	};

	let new_entry = BlacklistEntry {
		user_id: database_id_from_discord_id(target_user_id.get()),
		blacklisted_at: Utc::now(),
		username: target_user.name.clone(),
	};
	let mut db_connection = db_connection_pool.get().into_diagnostic()?;
	let insert_result = diesel::insert_into(blacklist::table)
		.values(new_entry)
		.execute(&mut db_connection);

	match insert_result {
		Ok(_) => (),
		Err(DbError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
			let report = simple_embed("User is already blacklisted.").into_diagnostic()?;
			respond_with_embed(interaction, &interaction_client, report, true).await?;
			return Ok(());
		}
		Err(error) => bail!(error),
	}

	let confirmation = branded_embed(format!(
		"Blacklisted {} from interacting with the modmail system.",
		target_user_id.mention()
	))
	.into_diagnostic()?;
	respond_with_embed(interaction, &interaction_client, confirmation, false).await?;

	let user_notice = branded_embed(
		"You have been blacklisted from the modmail system; this bot will no longer respond to any of your messages. \
		 If you believe this was in error, please DM a moderator directly.",
	)
	.into_diagnostic()?;
	if let Err(error) = dm_user(http_client, target_user_id, &user_notice).await {
		if matches!(error, DeliveryError::Unreachable) {
			let note = simple_embed("Note: Blacklisted user, but couldn't notify them; they have probably blocked the bot.")
				.into_diagnostic()?;
			interaction_client
				.create_followup(&interaction.token)
				.embeds(&[note])
				.await
				.into_diagnostic()?;
		} else {
			tracing::warn!(source = ?error, "couldn't notify a user of their blacklisting");
		}
	}

	Ok(())
}

async fn handle_remove(
	interaction: &InteractionCreate,
	subcommand_value: &CommandOptionValue,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
) -> miette::Result<()> {
	let interaction_client = http_client.interaction(application_id);
	let Some(target_user_id) = subcommand_user(subcommand_value) else {
		bail!("Blacklist remove received without its required user option");
	};

	let mut db_connection = db_connection_pool.get().into_diagnostic()?;
	let removed = diesel::delete(
		blacklist::table.filter(blacklist::user_id.eq(database_id_from_discord_id(target_user_id.get()))),
	)
	.execute(&mut db_connection)
	.into_diagnostic()?;

	if removed == 0 {
		let report = simple_embed("User is not blacklisted.").into_diagnostic()?;
		respond_with_embed(interaction, &interaction_client, report, true).await?;
		return Ok(());
	}

	let confirmation = branded_embed(format!(
		"Removed {} from the blacklist. They can once again interact with the modmail system.",
		target_user_id.mention()
	))
	.into_diagnostic()?;
	respond_with_embed(interaction, &interaction_client, confirmation, false).await?;

	let user_notice = branded_embed(
		"You have been removed from the modmail blacklist; you can once again use the modmail system.",
	)
	.into_diagnostic()?;
	if let Err(error) = dm_user(http_client, target_user_id, &user_notice).await {
		if matches!(error, DeliveryError::Unreachable) {
			let note =
				simple_embed("Note: Unblacklisted user, but couldn't notify them; they have probably blocked the bot.")
					.into_diagnostic()?;
			interaction_client
				.create_followup(&interaction.token)
				.embeds(&[note])
				.await
				.into_diagnostic()?;
		} else {
			tracing::warn!(source = ?error, "couldn't notify a user of their unblacklisting");
		}
	}

	Ok(())
}

async fn handle_show(
	interaction: &InteractionCreate,
	http_client: &Arc<Client>,
	application_id: Id<ApplicationMarker>,
	db_connection_pool: Pool<ConnectionManager<PgConnection>>,
) -> miette::Result<()> {
	let interaction_client = http_client.interaction(application_id);

	let mut db_connection = db_connection_pool.get().into_diagnostic()?;
	let entries: Vec<BlacklistEntry> = blacklist::table
		.order(blacklist::blacklisted_at.asc())
		.load(&mut db_connection)
		.into_diagnostic()?;

	let mut listing = String::from("timestamp (UTC), userid, username\n\n");
	for entry in &entries {
		listing.push_str(&format!(
			"{}, {}, {}\n",
			entry.blacklisted_at.format("%Y-%m-%d %H:%M:%S"),
			entry.user_id,
			entry.username
		));
	}

	let listing_filename = format!("{}-currently-blacklisted-users.txt", Utc::now().format("%Y-%m-%d"));
	let listing_file = AttachmentFile::from_bytes(listing_filename, listing.into_bytes(), 0);
	let response = InteractionResponseDataBuilder::new()
		.content("Users who are currently blacklisted (username accurate at time of initial blacklist):")
		.attachments([listing_file])
		.build();
	let response = InteractionResponse {
		kind: InteractionResponseType::ChannelMessageWithSource,
		data: Some(response),
	};
	interaction_client
		.create_response(interaction.id, &interaction.token, &response)
		.await
		.into_diagnostic()?;

	Ok(())
}

async fn respond_with_embed(
	interaction: &InteractionCreate,
	interaction_client: &twilight_http::client::InteractionClient<'_>,
	embed: Embed,
	ephemeral: bool,
) -> miette::Result<()> {
	let mut response = InteractionResponseDataBuilder::new().embeds([embed]);
	if ephemeral {
		response = response.flags(MessageFlags::EPHEMERAL);
	}
	let response = InteractionResponse {
		kind: InteractionResponseType::ChannelMessageWithSource,
		data: Some(response.build()),
	};
	interaction_client
		.create_response(interaction.id, &interaction.token, &response)
		.await
		.into_diagnostic()?;
	Ok(())
}

async fn dm_user(
	http_client: &Client,
	user_id: Id<UserMarker>,
	notice: &Embed,
) -> Result<(), DeliveryError> {
	let dm_channel = http_client.create_private_channel(user_id).await?.model().await?.id;
	http_client
		.create_message(dm_channel)
		.embeds(std::slice::from_ref(notice))
		.await?;
	Ok(())
}
