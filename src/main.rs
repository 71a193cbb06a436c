/*
 * Copyright (C) 2020 Oakes, Gregory <gregoryoakes@fastmail.com>
 * Author: Oakes, Gregory <gregory.oakes@fastmail.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use card_binder::{app, config::Config, db, provider::PokemonTcg, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    if config.card_api_key.is_none() {
        tracing::warn!("no card API key configured, requests will be rate limited");
    }

    let db_pool = db::create_pool(config.database_url.as_str())?;
    db::init_db(&db_pool).await?;

    let provider = Arc::new(PokemonTcg::new(
        config.card_api_url.clone(),
        config.card_api_key.clone(),
    ));
    let api = app(db_pool, config.jwt.clone(), provider).await?;

    tracing::info!(addr = %config.bind_addr, "listening");
    warp::serve(api).run(config.bind_addr).await;
    Ok(())
}
