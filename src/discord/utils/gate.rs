// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::ConfigData;
use crate::model::database_id_from_discord_id;
use crate::schema::blacklist;
use diesel::prelude::*;
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;

/// Operator identity that may always use the bot, regardless of the blacklist or the configured moderator list.
const OVERRIDE_USER_ID: u64 = 305704400041803776;

/// Checks whether a user currently has a blacklist row. Reads the table directly so that every event observes the
/// latest committed state.
pub fn is_blacklisted(db_connection: &mut PgConnection, user_id: Id<UserMarker>) -> QueryResult<bool> {
	let db_user_id = database_id_from_discord_id(user_id.get());
	let entry = blacklist::table
		.find(db_user_id)
		.select(blacklist::user_id)
		.first::<i64>(db_connection)
		.optional()?;
	Ok(entry.is_some())
}

/// Decides whether the bot reacts to this user at all. Moderators and the override identity are always allowed;
/// everyone else is allowed unless blacklisted. Callers must make denial silent on listener paths so a blacklisted
/// user can't tell being ignored apart from the bot being down.
pub fn is_allowed(config: &ConfigData, user_id: Id<UserMarker>, blacklisted: bool) -> bool {
	if user_id.get() == OVERRIDE_USER_ID || config.is_moderator(user_id) {
		return true;
	}
	!blacklisted
}

/// Combined blacklist lookup and gate decision.
pub fn evaluate(
	config: &ConfigData,
	db_connection: &mut PgConnection,
	user_id: Id<UserMarker>,
) -> QueryResult<bool> {
	let blacklisted = is_blacklisted(db_connection, user_id)?;
	Ok(is_allowed(config, user_id, blacklisted))
}

#[cfg(test)]
mod tests {
	use super::{OVERRIDE_USER_ID, is_allowed};
	use crate::config::{ConfigData, DatabaseConfig, DiscordConfig};
	use twilight_model::id::Id;

	fn test_config(moderators: Vec<u64>) -> ConfigData {
		ConfigData {
			discord: DiscordConfig {
				bot_token: String::from("token"),
			},
			database: DatabaseConfig {
				host: String::from("localhost"),
				port: None,
				username: String::from("courier"),
				password: String::from("courier"),
				database: String::from("courier"),
			},
			guild: 1,
			ticket_category: 2,
			log_channel: 3,
			moderators,
			close_cooldown_seconds: None,
			reason_cooldown_seconds: None,
			reason_cooldown_uses: None,
			confirm_timeout_seconds: None,
			open_prompt_timeout_seconds: None,
		}
	}

	#[test]
	fn ordinary_users_pass_unless_blacklisted() {
		let config = test_config(vec![9000]);
		assert!(is_allowed(&config, Id::new(42), false));
		assert!(!is_allowed(&config, Id::new(42), true));
	}

	#[test]
	fn moderators_bypass_the_blacklist() {
		let config = test_config(vec![9000]);
		assert!(is_allowed(&config, Id::new(9000), true));
	}

	#[test]
	fn override_identity_bypasses_everything() {
		let config = test_config(Vec::new());
		assert!(is_allowed(&config, Id::new(OVERRIDE_USER_ID), true));
	}
}
