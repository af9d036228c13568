// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;
use type_map::concurrent::TypeMap;

/// One lock per user, held across each inbound event's lookup-then-act sequence. This serializes racing ticket
/// opens for one user and keeps relays within one ticket in arrival order; events for different users proceed
/// in parallel.
#[derive(Debug, Default)]
pub struct UserLocks {
	locks: HashMap<u64, Arc<Mutex<()>>>,
}

pub async fn user_lock(bot_state: &Arc<RwLock<TypeMap>>, user_id: Id<UserMarker>) -> Arc<Mutex<()>> {
	let mut state = bot_state.write().await;
	let user_locks = state.entry::<UserLocks>().or_insert_with(UserLocks::default);
	Arc::clone(
		user_locks
			.locks
			.entry(user_id.get())
			.or_insert_with(|| Arc::new(Mutex::new(()))),
	)
}
