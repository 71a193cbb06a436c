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

use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reply::{json, with_status, Json, WithStatus},
    Filter, Rejection, Reply,
};

use crate::{
    auth::Keys,
    card::{self, Card},
    db,
    guard::{self, Session},
    provider::CardProvider,
    Error,
};

pub fn api(
    db_pool: db::Pool,
    keys: Arc<Keys>,
    provider: Arc<dyn CardProvider>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let add_to_collection = warp::path("collection")
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_db(db_pool.clone()))
        .and(guard::with_provider(provider))
        .and_then(add_to_collection);

    let list_collection = warp::path("collection")
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys))
        .and(guard::with_db(db_pool))
        .and_then(list_collection);

    add_to_collection.or(list_collection)
}

/// One claim of ownership of a card. A user may hold several for the same card.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: i32,
    pub card: Card,
}

async fn add_to_collection(
    card_id: String,
    session: Session,
    pool: db::Pool,
    provider: Arc<dyn CardProvider>,
) -> Result<WithStatus<Json>, Rejection> {
    let conn = db::get_db_conn(&pool).await?;
    let card = card::ensure_card(&conn, provider.as_ref(), &card_id).await?;

    let row = conn
        .query_one(
            "INSERT INTO collection_items (user_id, card_id) VALUES ($1, $2) RETURNING id",
            &[&session.user_id, &card.id],
        )
        .await
        .map_err(Error::DBError)?;
    let item = CollectionItem {
        id: row.get("id"),
        card,
    };
    tracing::info!(
        user_id = session.user_id,
        card_id = item.card.id.as_str(),
        "card added to collection"
    );

    Ok(with_status(json(&item), StatusCode::CREATED))
}

async fn list_collection(session: Session, pool: db::Pool) -> Result<Json, Rejection> {
    let conn = db::get_db_conn(&pool).await?;
    let rows = conn
        .query(
            r#"
            SELECT collection_items.id, cards.id AS card_id, cards.name, cards.images
            FROM collection_items
            JOIN cards ON cards.id = collection_items.card_id
            WHERE collection_items.user_id = $1
            ORDER BY collection_items.id
            "#,
            &[&session.user_id],
        )
        .await
        .map_err(Error::DBError)?;

    let items = rows
        .iter()
        .map(|row| {
            Ok(CollectionItem {
                id: row.get("id"),
                card: Card::from_columns(row.get("card_id"), row.get("name"), row.get("images"))?,
            })
        })
        .collect::<Result<Vec<CollectionItem>, Error>>()?;

    Ok(json(&items))
}
