// © 2025 ElementalAlchemist and the Dainsleif Mains Development Team
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod config;
mod database;
mod discord;
mod model;
mod schema;

use miette::IntoDiagnostic;
use std::sync::Arc;

#[tokio::main]
async fn main() -> miette::Result<()> {
	tracing_subscriber::fmt::init();

	let config = Arc::new(config::parse_config("config.kdl").await?);

	let db_connection_pool = database::connect_db(&config)?;
	database::run_embedded_migrations(&db_connection_pool).into_diagnostic()?;

	let http_client = discord::set_up_client(&config);
	discord::run_bot(db_connection_pool, config, http_client).await
}
