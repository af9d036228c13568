// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use knus::Decode;
use miette::{IntoDiagnostic, Result};
use std::time::Duration;
use tokio::fs::read_to_string;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};

pub async fn parse_config(config_path: &str) -> Result<ConfigData> {
	let config_file_contents = read_to_string(config_path).await.into_diagnostic()?;
	let config = knus::parse(config_path, &config_file_contents)?;
	Ok(config)
}

#[derive(Debug, Decode)]
pub struct ConfigData {
	#[knus(child)]
	pub discord: DiscordConfig,
	#[knus(child)]
	pub database: DatabaseConfig,
	/// The ID of the one guild this bot manages.
	///
	/// To get a Discord-facing version of this more easily, use [Self::get_guild].
	#[knus(child, unwrap(argument))]
	pub guild: u64,
	/// The ID of the category under which per-ticket staff channels are created.
	///
	/// To get a Discord-facing version of this more easily, use [Self::get_ticket_category].
	#[knus(child, unwrap(argument))]
	pub ticket_category: u64,
	/// The ID of the channel that receives closure notices and transcripts.
	///
	/// To get a Discord-facing version of this more easily, use [Self::get_log_channel].
	#[knus(child, unwrap(argument))]
	pub log_channel: u64,
	/// The IDs of users granted moderator privileges with this bot.
	#[knus(child, unwrap(arguments))]
	pub moderators: Vec<u64>,
	#[knus(child, unwrap(argument))]
	pub close_cooldown_seconds: Option<u64>,
	#[knus(child, unwrap(argument))]
	pub reason_cooldown_seconds: Option<u64>,
	#[knus(child, unwrap(argument))]
	pub reason_cooldown_uses: Option<u32>,
	#[knus(child, unwrap(argument))]
	pub confirm_timeout_seconds: Option<u64>,
	#[knus(child, unwrap(argument))]
	pub open_prompt_timeout_seconds: Option<u64>,
}

impl ConfigData {
	/// Gets the Discord-facing ID of the managed guild.
	pub fn get_guild(&self) -> Id<GuildMarker> {
		Id::new(self.guild)
	}

	/// Gets the Discord-facing ID of the ticket category.
	pub fn get_ticket_category(&self) -> Id<ChannelMarker> {
		Id::new(self.ticket_category)
	}

	/// Gets the Discord-facing ID of the staff log channel.
	pub fn get_log_channel(&self) -> Id<ChannelMarker> {
		Id::new(self.log_channel)
	}

	pub fn is_moderator(&self, user_id: Id<UserMarker>) -> bool {
		self.moderators.contains(&user_id.get())
	}

	/// Minimum time between closes of the same ticket channel.
	pub fn close_cooldown(&self) -> Duration {
		Duration::from_secs(self.close_cooldown_seconds.unwrap_or(300))
	}

	/// Window over which reason changes for one ticket channel are counted.
	pub fn reason_cooldown(&self) -> Duration {
		Duration::from_secs(self.reason_cooldown_seconds.unwrap_or(10))
	}

	/// Number of reason changes allowed per window.
	pub fn reason_cooldown_uses(&self) -> u32 {
		self.reason_cooldown_uses.unwrap_or(2)
	}

	/// How long a user has to confirm opening a ticket from a DM.
	pub fn confirm_timeout(&self) -> Duration {
		Duration::from_secs(self.confirm_timeout_seconds.unwrap_or(30))
	}

	/// How long a moderator has to submit the initial message for a staff-opened ticket.
	pub fn open_prompt_timeout(&self) -> Duration {
		Duration::from_secs(self.open_prompt_timeout_seconds.unwrap_or(60))
	}
}

#[derive(Debug, Decode)]
pub struct DiscordConfig {
	#[knus(child, unwrap(argument))]
	pub bot_token: String,
}

#[derive(Debug, Decode)]
pub struct DatabaseConfig {
	#[knus(child, unwrap(argument))]
	pub host: String,
	#[knus(child, unwrap(argument))]
	pub port: Option<u16>,
	#[knus(child, unwrap(argument))]
	pub username: String,
	#[knus(child, unwrap(argument))]
	pub password: String,
	#[knus(child, unwrap(argument))]
	pub database: String,
}

#[cfg(test)]
mod tests {
	use super::ConfigData;

	const FULL_DOCUMENT: &str = r#"
discord {
	bot-token "token-goes-here"
}
database {
	host "localhost"
	port 5433
	username "courier"
	password "hunter2"
	database "courier"
}
guild 100
ticket-category 200
log-channel 300
moderators 400 500
close-cooldown-seconds 60
"#;

	#[test]
	fn full_document_parses() {
		let config: ConfigData = knus::parse("test.kdl", FULL_DOCUMENT).expect("document parses");
		assert_eq!(config.discord.bot_token, "token-goes-here");
		assert_eq!(config.database.port, Some(5433));
		assert_eq!(config.guild, 100);
		assert_eq!(config.moderators, vec![400, 500]);
		assert_eq!(config.close_cooldown().as_secs(), 60);
	}

	#[test]
	fn timers_fall_back_to_defaults() {
		let config: ConfigData = knus::parse("test.kdl", FULL_DOCUMENT).expect("document parses");
		assert_eq!(config.reason_cooldown().as_secs(), 10);
		assert_eq!(config.reason_cooldown_uses(), 2);
		assert_eq!(config.confirm_timeout().as_secs(), 30);
		assert_eq!(config.open_prompt_timeout().as_secs(), 60);
	}

	#[test]
	fn moderator_check_uses_configured_ids() {
		let config: ConfigData = knus::parse("test.kdl", FULL_DOCUMENT).expect("document parses");
		assert!(config.is_moderator(twilight_model::id::Id::new(400)));
		assert!(!config.is_moderator(twilight_model::id::Id::new(401)));
	}
}
