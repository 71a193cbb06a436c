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

//! Decks and the cards in them.
//!
//! Ownership is checked on every request against the session's user id. Deck
//! items reference cards by id only and do not go through the card cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use mobc_postgres::tokio_postgres::row::Row;
use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reply::{json, with_status, Json, WithStatus},
    Filter, Rejection, Reply,
};

use crate::{
    auth::Keys,
    card::Card,
    db,
    guard::{self, Session},
    provider::CardProvider,
    util, Error,
};

const DECK_DENIED: &'static str = "Deck not found or access denied.";
const DECK_ITEM_DENIED: &'static str = "Deck item not found or access denied.";
/// Card lookups in flight at once while viewing a deck.
const VIEW_LOOKUPS_IN_FLIGHT: usize = 4;

pub fn api(
    db_pool: db::Pool,
    keys: Arc<Keys>,
    provider: Arc<dyn CardProvider>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create_deck = warp::path("decks")
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(warp::body::json())
        .and(guard::with_db(db_pool.clone()))
        .and_then(create_deck);

    let list_decks = warp::path("decks")
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_db(db_pool.clone()))
        .and_then(list_decks);

    let view_deck = warp::path("decks")
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_db(db_pool.clone()))
        .and(guard::with_provider(provider))
        .and_then(view_deck);

    let add_card_to_deck = warp::path("decks")
        .and(warp::path::param())
        .and(warp::path("cards"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::post())
        .and(guard::authenticated(keys.clone()))
        .and(guard::with_db(db_pool.clone()))
        .and_then(add_card_to_deck);

    let remove_card_from_deck = warp::path("deck-items")
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::delete())
        .and(guard::authenticated(keys))
        .and(guard::with_db(db_pool))
        .and_then(remove_card_from_deck);

    create_deck
        .or(list_decks)
        .or(view_deck)
        .or(add_card_to_deck)
        .or(remove_card_from_deck)
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a Row> for Deck {
    fn from(item: &'a Row) -> Self {
        Deck {
            id: item.get("id"),
            name: item.get("name"),
            description: item.get("description"),
            created_at: item.get("created_at"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeck {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewDeck {
    fn validate(&self) -> Result<(), Error> {
        util::require("name", &self.name, util::DECK_NAME_MAX_LEN)?;
        if let Some(description) = &self.description {
            util::limit(
                "description",
                description,
                util::DECK_DESCRIPTION_MAX_LEN,
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeckItem {
    pub id: i32,
    pub deck_id: i32,
    pub card_id: String,
}

/// A deck item with its card as currently served by the provider. `card` is
/// `None` when the provider could not be reached for that item.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeckEntry {
    pub id: i32,
    pub card_id: String,
    pub card: Option<Card>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeckView {
    pub deck: Deck,
    pub items: Vec<DeckEntry>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RemovedItem {
    pub deck_id: i32,
}

async fn create_deck(
    session: Session,
    new_deck: NewDeck,
    pool: db::Pool,
) -> Result<WithStatus<Json>, Rejection> {
    new_deck.validate()?;
    let conn = db::get_db_conn(&pool).await?;
    let row = conn
        .query_one(
            r#"
            INSERT INTO deck (user_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_at
            "#,
            &[&session.user_id, &new_deck.name, &new_deck.description],
        )
        .await
        .map_err(Error::DBError)?;
    let deck = Deck::from(&row);
    tracing::info!(user_id = session.user_id, deck_id = deck.id, "deck created");

    Ok(with_status(json(&deck), StatusCode::CREATED))
}

async fn list_decks(session: Session, pool: db::Pool) -> Result<Json, Rejection> {
    let rows = db::get_db_conn(&pool)
        .await?
        .query(
            r#"
            SELECT id, name, description, created_at
            FROM deck
            WHERE user_id = $1
            ORDER BY id
            "#,
            &[&session.user_id],
        )
        .await
        .map_err(Error::DBError)?;

    Ok(json(&rows.iter().map(Deck::from).collect::<Vec<Deck>>()))
}

async fn owned_deck(conn: &db::Conn, session: &Session, deck_id: i32) -> Result<Option<Deck>, Error> {
    let row = conn
        .query_opt(
            r#"
            SELECT id, name, description, created_at
            FROM deck
            WHERE id = $1 AND user_id = $2
            "#,
            &[&deck_id, &session.user_id],
        )
        .await?;
    Ok(row.as_ref().map(Deck::from))
}

async fn view_deck(
    deck_id: i32,
    session: Session,
    pool: db::Pool,
    provider: Arc<dyn CardProvider>,
) -> Result<Json, Rejection> {
    let conn = db::get_db_conn(&pool).await?;
    let deck = owned_deck(&conn, &session, deck_id)
        .await?
        .ok_or(Error::NotFound("Deck not found."))?;

    let items = conn
        .query(
            "SELECT id, deck_id, card_id FROM deck_item WHERE deck_id = $1 ORDER BY id",
            &[&deck.id],
        )
        .await
        .map_err(Error::DBError)?
        .iter()
        .map(|row| DeckItem {
            id: row.get("id"),
            deck_id: row.get("deck_id"),
            card_id: row.get("card_id"),
        })
        .collect::<Vec<DeckItem>>();

    let items = resolve_cards(provider, items).await;
    Ok(json(&DeckView { deck, items }))
}

/// Looks up every item's card on the provider, cached or not, keeping the
/// item order. A failed lookup leaves `card` empty.
async fn resolve_cards(provider: Arc<dyn CardProvider>, items: Vec<DeckItem>) -> Vec<DeckEntry> {
    stream::iter(items)
        .map(|item| {
            let provider = provider.clone();
            async move {
                let card = match provider.fetch_by_id(&item.card_id).await {
                    Ok(card) => Some(card),
                    Err(e) => {
                        tracing::warn!(card_id = item.card_id.as_str(), error = %e, "card lookup failed");
                        None
                    }
                };
                DeckEntry {
                    id: item.id,
                    card_id: item.card_id,
                    card,
                }
            }
        })
        .buffered(VIEW_LOOKUPS_IN_FLIGHT)
        .collect::<Vec<DeckEntry>>()
        .await
}

async fn add_card_to_deck(
    deck_id: i32,
    card_id: String,
    session: Session,
    pool: db::Pool,
) -> Result<WithStatus<Json>, Rejection> {
    util::require("card id", &card_id, util::CARD_ID_MAX_LEN)?;
    let conn = db::get_db_conn(&pool).await?;
    if owned_deck(&conn, &session, deck_id).await?.is_none() {
        tracing::info!(user_id = session.user_id, deck_id, "deck access denied");
        return Err(Error::AccessDenied(DECK_DENIED).into());
    }

    let row = conn
        .query_one(
            "INSERT INTO deck_item (deck_id, card_id) VALUES ($1, $2) RETURNING id",
            &[&deck_id, &card_id],
        )
        .await
        .map_err(Error::DBError)?;
    let item = DeckItem {
        id: row.get("id"),
        deck_id,
        card_id,
    };
    tracing::info!(deck_id, deck_item_id = item.id, "card added to deck");

    Ok(with_status(json(&item), StatusCode::CREATED))
}

async fn remove_card_from_deck(
    deck_item_id: i32,
    session: Session,
    pool: db::Pool,
) -> Result<Json, Rejection> {
    let row = db::get_db_conn(&pool)
        .await?
        .query_opt(
            r#"
            DELETE FROM deck_item
            USING deck
            WHERE deck_item.id = $1
                AND deck_item.deck_id = deck.id
                AND deck.user_id = $2
            RETURNING deck_item.deck_id
            "#,
            &[&deck_item_id, &session.user_id],
        )
        .await
        .map_err(Error::DBError)?;

    match row {
        Some(row) => {
            let deck_id: i32 = row.get("deck_id");
            tracing::info!(deck_id, deck_item_id, "card removed from deck");
            Ok(json(&RemovedItem { deck_id }))
        }
        None => {
            tracing::info!(
                user_id = session.user_id,
                deck_item_id,
                "deck item access denied"
            );
            Err(Error::AccessDenied(DECK_ITEM_DENIED).into())
        }
    }
}
