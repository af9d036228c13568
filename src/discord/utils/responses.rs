// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use twilight_model::channel::message::embed::Embed;
use twilight_util::builder::embed::{EmbedAuthorBuilder, EmbedBuilder, EmbedFooterBuilder, ImageSource};
use twilight_validate::embed::EmbedValidationError;

pub const EMBED_AUTHOR_NAME: &str = "Server Modmail";
pub const EMBED_AUTHOR_ICON: &str =
	"https://cdn.discordapp.com/attachments/743536411369799804/854865953083228181/mail_icon.png";
pub const EMBED_FOOTER: &str = "Use /close to close this modmail, and /reason to change its reason.";

pub const NOT_IN_MODMAIL: &str = "You are probably not in a modmail.";
pub const NOT_PERMITTED: &str = "You are not permitted to use this command.";
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong. The error has been recorded; please try again.";

/// Embed with only a description, for short notices and error reports.
pub fn simple_embed(description: impl Into<String>) -> Result<Embed, EmbedValidationError> {
	Ok(EmbedBuilder::new().description(description).validate()?.build())
}

/// Embed carrying the modmail author header; the larger lifecycle notices use this.
pub fn branded_embed(description: impl Into<String>) -> Result<Embed, EmbedValidationError> {
	Ok(EmbedBuilder::new()
		.description(description)
		.author(embed_author())
		.validate()?
		.build())
}

/// [branded_embed] plus the standard footer pointing at /close and /reason.
pub fn footered_embed(description: impl Into<String>) -> Result<Embed, EmbedValidationError> {
	Ok(EmbedBuilder::new()
		.description(description)
		.author(embed_author())
		.footer(EmbedFooterBuilder::new(EMBED_FOOTER).build())
		.validate()?
		.build())
}

fn embed_author() -> twilight_model::channel::message::embed::EmbedAuthor {
	let mut author = EmbedAuthorBuilder::new(EMBED_AUTHOR_NAME);
	if let Ok(icon) = ImageSource::url(EMBED_AUTHOR_ICON) {
		author = author.icon_url(icon);
	}
	author.build()
}
