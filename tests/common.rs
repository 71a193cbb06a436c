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

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    env,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use lazy_static::lazy_static;
use mobc_postgres::tokio_postgres::types::ToSql;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use warp::{Filter, Reply};

use card_binder::{
    auth,
    card::Card,
    db,
    provider::{CardProvider, ProviderError},
};

lazy_static! {
    static ref SCHEMA_READY: tokio::sync::Mutex<bool> = tokio::sync::Mutex::new(false);
}

pub fn secret() -> String {
    "integration-test-secret".to_string()
}

/// A pool on the database named by `DATABASE_URL`, with the schema in place.
pub async fn db_pool() -> db::Pool {
    let url = env::var("DATABASE_URL").expect("DATABASE_URL is set");
    let pool = db::create_pool(url.as_str()).expect("valid DATABASE_URL");
    let mut ready = SCHEMA_READY.lock().await;
    if !*ready {
        db::init_db(&pool).await.expect("schema initialized");
        *ready = true;
    }
    pool
}

/// A pool that is never connected to. Enough for requests that are rejected
/// before reaching the database.
pub fn offline_pool() -> db::Pool {
    db::create_pool("postgres://postgres@127.0.0.1:1/offline").expect("valid url")
}

/// Appends a random suffix so that reruns against the same database do not collide.
pub fn unique(prefix: &str) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix, suffix.to_lowercase())
}

pub async fn count(pool: &db::Pool, sql: &str, params: &[&(dyn ToSql + Sync)]) -> i64 {
    db::get_db_conn(pool)
        .await
        .expect("connection")
        .query_one(sql, params)
        .await
        .expect("count query")
        .get(0)
}

pub fn card(id: &str, name: &str) -> Card {
    let mut images = BTreeMap::new();
    images.insert("small".to_string(), format!("https://images.example/{}.png", id));
    images.insert(
        "large".to_string(),
        format!("https://images.example/{}_hires.png", id),
    );
    Card {
        id: id.to_string(),
        name: Some(name.to_string()),
        images,
    }
}

/// An in-memory card catalog that counts how often it is asked for cards.
#[derive(Default)]
pub struct FakeProvider {
    cards: HashMap<String, Card>,
    fetches: AtomicUsize,
    searches: AtomicUsize,
    latency: Duration,
}

impl FakeProvider {
    pub fn with_cards(cards: Vec<Card>) -> Arc<Self> {
        Arc::new(FakeProvider {
            cards: cards.into_iter().map(|c| (c.id.clone(), c)).collect(),
            ..Default::default()
        })
    }

    /// Like `with_cards`, but every lookup by id waits for `latency` first.
    pub fn slow(cards: Vec<Card>, latency: Duration) -> Arc<Self> {
        Arc::new(FakeProvider {
            cards: cards.into_iter().map(|c| (c.id.clone(), c)).collect(),
            latency,
            ..Default::default()
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardProvider for FakeProvider {
    async fn search(&self, query: &str) -> Result<Vec<Card>, ProviderError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let query = query.to_lowercase();
        let mut found: Vec<Card> = self
            .cards
            .values()
            .filter(|c| {
                c.name
                    .as_ref()
                    .map_or(false, |n| n.to_lowercase().contains(&query))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Card, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.cards
            .get(id)
            .cloned()
            .ok_or(ProviderError::HttpStatus(reqwest::StatusCode::NOT_FOUND))
    }
}

pub async fn api(
    pool: db::Pool,
    provider: Arc<FakeProvider>,
) -> impl Filter<Extract = (impl Reply,), Error = std::convert::Infallible> + Clone {
    card_binder::app(pool, Some(card_binder::JWTConfig::Secret(secret())), provider)
        .await
        .expect("app initialized")
}

/// Registers a user through the API and returns their bearer token.
pub async fn register<F>(api: &F, username: &str, password: &str) -> String
where
    F: Filter + 'static,
    F::Extract: Reply + Send,
{
    let res = warp::test::request()
        .method("POST")
        .path("/api/register")
        .json(&auth::Register {
            username: username.to_string(),
            password: password.to_string(),
        })
        .reply(api)
        .await;
    assert_eq!(res.status(), 201, "registration created new resource");
    serde_json::from_slice::<auth::RegisterResp>(res.body())
        .expect("register responds with a token")
        .token
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
