// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-channel limiter for /close: one invocation per window.
#[derive(Debug, Default)]
pub struct CloseCooldowns {
	last_invocation: HashMap<i64, Instant>,
}

impl CloseCooldowns {
	/// Records an invocation for a channel. If the channel is still cooling down, returns the remaining wait
	/// instead and doesn't restart the window.
	pub fn check_and_update(&mut self, channel_id: i64, now: Instant, window: Duration) -> Option<Duration> {
		if let Some(last) = self.last_invocation.get(&channel_id) {
			let elapsed = now.duration_since(*last);
			if elapsed < window {
				return Some(window - elapsed);
			}
		}
		self.last_invocation.insert(channel_id, now);
		None
	}
}

/// Per-channel limiter for /reason: a bounded number of invocations per rolling window.
#[derive(Debug, Default)]
pub struct ReasonCooldowns {
	invocations: HashMap<i64, Vec<Instant>>,
}

impl ReasonCooldowns {
	/// Records an invocation for a channel. If the channel has already used its allotment within the window,
	/// returns the wait until the oldest use ages out.
	pub fn check_and_update(
		&mut self,
		channel_id: i64,
		now: Instant,
		window: Duration,
		max_uses: u32,
	) -> Option<Duration> {
		let uses = self.invocations.entry(channel_id).or_default();
		uses.retain(|at| now.duration_since(*at) < window);
		if uses.len() >= max_uses as usize {
			let oldest = uses.iter().min().copied()?;
			return Some(window - now.duration_since(oldest));
		}
		uses.push(now);
		None
	}
}

#[cfg(test)]
mod tests {
	use super::{CloseCooldowns, ReasonCooldowns};
	use std::time::{Duration, Instant};

	#[test]
	fn close_allows_one_invocation_per_window() {
		let window = Duration::from_secs(300);
		let start = Instant::now();
		let mut cooldowns = CloseCooldowns::default();

		assert_eq!(cooldowns.check_and_update(1, start, window), None);
		let remaining = cooldowns.check_and_update(1, start + Duration::from_secs(10), window);
		assert_eq!(remaining, Some(Duration::from_secs(290)));
		assert_eq!(cooldowns.check_and_update(1, start + window, window), None);
	}

	#[test]
	fn close_cooldowns_are_per_channel() {
		let window = Duration::from_secs(300);
		let start = Instant::now();
		let mut cooldowns = CloseCooldowns::default();

		assert_eq!(cooldowns.check_and_update(1, start, window), None);
		assert_eq!(cooldowns.check_and_update(2, start, window), None);
	}

	#[test]
	fn reason_allows_the_configured_uses_then_blocks() {
		let window = Duration::from_secs(10);
		let start = Instant::now();
		let mut cooldowns = ReasonCooldowns::default();

		assert_eq!(cooldowns.check_and_update(1, start, window, 2), None);
		assert_eq!(cooldowns.check_and_update(1, start + Duration::from_secs(1), window, 2), None);
		let remaining = cooldowns.check_and_update(1, start + Duration::from_secs(2), window, 2);
		assert_eq!(remaining, Some(Duration::from_secs(8)));
	}

	#[test]
	fn reason_uses_age_out_of_the_window() {
		let window = Duration::from_secs(10);
		let start = Instant::now();
		let mut cooldowns = ReasonCooldowns::default();

		assert_eq!(cooldowns.check_and_update(1, start, window, 2), None);
		assert_eq!(cooldowns.check_and_update(1, start + Duration::from_secs(1), window, 2), None);
		assert_eq!(cooldowns.check_and_update(1, start + Duration::from_secs(11), window, 2), None);
	}
}
