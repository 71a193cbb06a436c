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

use std::{convert::Infallible, sync::Arc};

use warp::{Filter, Reply};

pub mod guard;

pub mod auth;
pub mod card;
pub mod collection;
pub mod deck;
pub mod provider;
pub mod user;

pub mod config;
pub mod db;

mod error;
mod util;
pub use auth::JWTConfig;
pub use error::{handle_rejects, Error, Level, Notice};

/// Builds the whole `/api` filter. The database schema must already exist,
/// see [`db::init_db`].
pub async fn app(
    db_pool: db::Pool,
    jwt_config: Option<JWTConfig>,
    provider: Arc<dyn provider::CardProvider>,
) -> Result<impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone, Error> {
    let keys = Arc::new(auth::Keys::from_config(jwt_config)?);

    let auth_api = auth::api(db_pool.clone(), keys.clone());
    let user_api = user::api(db_pool.clone(), keys.clone());
    let card_api = card::api(keys.clone(), provider.clone());
    let collection_api = collection::api(db_pool.clone(), keys.clone(), provider.clone());
    let deck_api = deck::api(db_pool, keys, provider);

    let route = warp::path("api")
        .and(
            auth_api
                .or(user_api)
                .or(card_api)
                .or(collection_api)
                .or(deck_api),
        )
        .with(warp::filters::trace::request())
        .recover(error::handle_rejects);
    Ok(route)
}
