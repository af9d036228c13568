// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;

#[derive(Debug, Default)]
pub struct OpenPromptStates {
	pub states: HashMap<String, OpenPromptState>,
}

/// An /open invocation waiting on the moderator to submit the initial message.
#[derive(Debug)]
pub struct OpenPromptState {
	pub target_user: Id<UserMarker>,
	pub reason: String,
}
