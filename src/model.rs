// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::schema::{active_tickets, blacklist};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, UserMarker};

/// Maximum stored length of a ticket reason, in characters. Longer reasons are cut on every write path.
pub const MAX_REASON_LENGTH: usize = 72;

/// The reason a ticket carries when nobody has supplied one.
pub const DEFAULT_REASON: &str = "no reason specified";

/// The database representation of one open ticket: a relay session between a single user's DMs and a dedicated
/// staff channel. Closing the ticket deletes the row; the delivered transcript is the durable record.
#[derive(Clone, Debug, Insertable, Queryable)]
#[diesel(table_name = active_tickets)]
pub struct Ticket {
	/// The ID of the user on the DM end of the ticket. At most one open ticket exists per user.
	///
	/// To get a Discord-facing version of this more easily, use [Self::get_user_id].
	pub user_id: i64,
	/// The ID of the staff channel dedicated to this ticket.
	///
	/// To get a Discord-facing version of this more easily, use [Self::get_channel_id].
	pub channel_id: i64,
	/// The ticket's current topic/reason.
	pub reason: String,
}

impl Ticket {
	/// Creates a ticket row, truncating the reason to [MAX_REASON_LENGTH] characters.
	pub fn new(user_id: Id<UserMarker>, channel_id: Id<ChannelMarker>, reason: &str) -> Self {
		Self {
			user_id: database_id_from_discord_id(user_id.get()),
			channel_id: database_id_from_discord_id(channel_id.get()),
			reason: truncate_reason(reason),
		}
	}

	/// Gets the user on the DM end of the ticket.
	///
	/// For the raw database representation, use [Self::user_id].
	pub fn get_user_id(&self) -> Id<UserMarker> {
		Id::new(discord_id_from_database_id(self.user_id))
	}

	/// Gets the staff channel dedicated to this ticket.
	///
	/// For the raw database representation, use [Self::channel_id].
	pub fn get_channel_id(&self) -> Id<ChannelMarker> {
		Id::new(discord_id_from_database_id(self.channel_id))
	}
}

/// The database representation of one blacklisted user. The username is a snapshot from the moment of
/// blacklisting and is never re-synced.
#[derive(Clone, Debug, Insertable, Queryable)]
#[diesel(table_name = blacklist)]
pub struct BlacklistEntry {
	/// The ID of the blacklisted user.
	///
	/// To get a Discord-facing version of this more easily, use [Self::get_user_id].
	pub user_id: i64,
	/// When the user was blacklisted.
	pub blacklisted_at: DateTime<Utc>,
	/// The user's name at the time they were blacklisted.
	pub username: String,
}

impl BlacklistEntry {
	/// Gets the blacklisted user.
	///
	/// For the raw database representation, use [Self::user_id].
	pub fn get_user_id(&self) -> Id<UserMarker> {
		Id::new(discord_id_from_database_id(self.user_id))
	}
}

/// Cuts a requested ticket reason down to [MAX_REASON_LENGTH] characters.
pub fn truncate_reason(reason: &str) -> String {
	reason.chars().take(MAX_REASON_LENGTH).collect()
}

/// Converts an ID used with Discord (unsigned) to an ID for Postgres use (signed)
pub fn database_id_from_discord_id(discord_id: u64) -> i64 {
	discord_id as i64
}

/// Converts an ID retrieved from the database (signed) to an ID for use with Discord (unsigned)
pub fn discord_id_from_database_id(database_id: i64) -> u64 {
	database_id as u64
}

#[cfg(test)]
mod tests {
	use super::{MAX_REASON_LENGTH, Ticket, database_id_from_discord_id, discord_id_from_database_id, truncate_reason};
	use twilight_model::id::Id;

	#[test]
	fn short_reasons_are_stored_unchanged() {
		assert_eq!(truncate_reason("spam in #general"), "spam in #general");
	}

	#[test]
	fn reasons_are_cut_at_the_limit() {
		let long_reason = "x".repeat(MAX_REASON_LENGTH + 30);
		let stored = truncate_reason(&long_reason);
		assert_eq!(stored.chars().count(), MAX_REASON_LENGTH);

		let exact_reason = "y".repeat(MAX_REASON_LENGTH);
		assert_eq!(truncate_reason(&exact_reason), exact_reason);
	}

	#[test]
	fn reason_truncation_counts_characters_not_bytes() {
		let long_reason = "é".repeat(MAX_REASON_LENGTH + 1);
		assert_eq!(truncate_reason(&long_reason).chars().count(), MAX_REASON_LENGTH);
	}

	#[test]
	fn ticket_constructor_applies_truncation() {
		let long_reason = "z".repeat(200);
		let ticket = Ticket::new(Id::new(10), Id::new(20), &long_reason);
		assert_eq!(ticket.reason.chars().count(), MAX_REASON_LENGTH);
		assert_eq!(ticket.get_user_id(), Id::new(10));
		assert_eq!(ticket.get_channel_id(), Id::new(20));
	}

	#[test]
	fn id_conversions_round_trip_large_snowflakes() {
		let snowflake: u64 = 743536411369799804;
		assert_eq!(discord_id_from_database_id(database_id_from_discord_id(snowflake)), snowflake);
		let high_bit: u64 = u64::MAX - 3;
		assert_eq!(discord_id_from_database_id(database_id_from_discord_id(high_bit)), high_bit);
	}
}
