// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use twilight_model::channel::Message;
use twilight_model::id::Id;
use twilight_model::id::marker::MessageMarker;

#[derive(Debug, Default)]
pub struct ConfirmOpenStates {
	pub states: HashMap<String, ConfirmOpenState>,
}

/// A DM waiting on its author to confirm that it should open a ticket.
#[derive(Debug)]
pub struct ConfirmOpenState {
	/// The DM that would seed the new ticket.
	pub message: Message,
	/// The prompt carrying the confirm/cancel buttons, so resolution can disable them.
	pub prompt_message: Id<MessageMarker>,
}
