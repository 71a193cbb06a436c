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

//! The local card cache.
//!
//! Cards are mirrored from the provider the first time they are referenced and
//! are never refreshed afterwards. A cached record can therefore go stale if the
//! provider changes it, which is accepted in exchange for not hitting the
//! network on every lookup.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use warp::{
    reply::{json, Json},
    Filter, Rejection, Reply,
};

use crate::{
    auth::Keys,
    db,
    guard::{self, Session},
    provider::CardProvider,
    util, Error,
};

pub fn api(
    keys: Arc<Keys>,
    provider: Arc<dyn CardProvider>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("cards")
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys))
        .and(warp::query())
        .and(guard::with_provider(provider))
        .and_then(search_cards)
}

/// A card record as served by the provider and mirrored locally.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

impl Card {
    pub(crate) fn from_columns(
        id: String,
        name: Option<String>,
        images: &str,
    ) -> Result<Self, Error> {
        Ok(Card {
            id,
            name,
            images: serde_json::from_str(images)?,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

async fn search_cards(
    session: Session,
    query: SearchQuery,
    provider: Arc<dyn CardProvider>,
) -> Result<Json, Rejection> {
    let cards = provider
        .search(&query.query)
        .await
        .map_err(Error::Provider)?;
    tracing::debug!(
        user_id = session.user_id,
        query = query.query.as_str(),
        results = cards.len(),
        "card search"
    );
    Ok(json(&cards))
}

pub async fn cached_card(conn: &db::Conn, id: &str) -> Result<Option<Card>, Error> {
    let row = conn
        .query_opt("SELECT id, name, images FROM cards WHERE id = $1", &[&id])
        .await?;
    match row {
        Some(row) => Ok(Some(Card::from_columns(
            row.get("id"),
            row.get("name"),
            row.get("images"),
        )?)),
        None => Ok(None),
    }
}

/// Returns the cached card, fetching and storing it on a miss.
///
/// A provider failure is returned as is and nothing is written.
pub async fn ensure_card(
    conn: &db::Conn,
    provider: &dyn CardProvider,
    id: &str,
) -> Result<Card, Error> {
    util::require("card id", id, util::CARD_ID_MAX_LEN)?;
    if let Some(card) = cached_card(conn, id).await? {
        tracing::debug!(card_id = id, "card cache hit");
        return Ok(card);
    }

    tracing::info!(card_id = id, "card cache miss, fetching from provider");
    let fetched = provider.fetch_by_id(id).await?;
    let images = serde_json::to_string(&fetched.images)?;
    // First writer wins if two requests miss on the same id.
    conn.execute(
        r#"
        INSERT INTO cards (id, name, images)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
        &[&id, &fetched.name, &images],
    )
    .await?;

    cached_card(conn, id)
        .await?
        .ok_or(Error::NotFound("Card not found."))
}
