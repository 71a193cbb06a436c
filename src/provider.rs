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

//! Client for the remote card catalog.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::card::Card;

pub const DEFAULT_CARD_API_URL: &'static str = "https://api.pokemontcg.io/v2";

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error("card API responded with {0}")]
    HttpStatus(StatusCode),
}

/// The remote catalog that card records are mirrored from.
#[async_trait]
pub trait CardProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Card>, ProviderError>;

    async fn fetch_by_id(&self, id: &str) -> Result<Card, ProviderError>;
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Pokémon TCG API v2 client.
#[derive(Clone, Debug)]
pub struct PokemonTcg {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl PokemonTcg {
    pub fn new<S: Into<String>>(base_url: S, api_key: Option<String>) -> Self {
        PokemonTcg {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get<T>(&self, request: reqwest::RequestBuilder) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = match &self.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        };
        let response = request.send().await?;
        if response.status() == StatusCode::OK {
            Ok(response.json::<Envelope<T>>().await?.data)
        } else {
            Err(ProviderError::HttpStatus(response.status()))
        }
    }
}

#[async_trait]
impl CardProvider for PokemonTcg {
    async fn search(&self, query: &str) -> Result<Vec<Card>, ProviderError> {
        tracing::debug!(query, "searching card API");
        let request = self
            .client
            .get(format!("{}/cards", self.base_url))
            .query(&[("q", query)]);
        self.get(request).await
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Card, ProviderError> {
        tracing::debug!(card_id = id, "fetching card from card API");
        let request = self.client.get(format!("{}/cards/{}", self.base_url, id));
        self.get(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn card_json(id: &str, name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": name,
            "supertype": "Pokémon",
            "hp": "120",
            "images": {
                "small": format!("https://images.example/{}.png", id),
                "large": format!("https://images.example/{}_hires.png", id)
            }
        })
    }

    #[tokio::test]
    async fn fetch_by_id_reads_the_data_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards/base1-4"))
            .and(header("X-Api-Key", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": card_json("base1-4", "Charizard") })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = PokemonTcg::new(server.uri(), Some("secret".to_string()));
        let card = provider.fetch_by_id("base1-4").await.unwrap();
        assert_eq!(card.id, "base1-4");
        assert_eq!(card.name.as_deref(), Some("Charizard"));
        assert_eq!(
            card.images.get("small").map(String::as_str),
            Some("https://images.example/base1-4.png")
        );
    }

    #[tokio::test]
    async fn search_forwards_the_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards"))
            .and(query_param("q", "name:charizard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [card_json("base1-4", "Charizard"), card_json("base4-4", "Charizard")],
                "page": 1,
                "count": 2
            })))
            .mount(&server)
            .await;

        let provider = PokemonTcg::new(format!("{}/", server.uri()), None);
        let cards = provider.search("name:charizard").await.unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].id, "base4-4");
    }

    #[tokio::test]
    async fn records_without_a_name_are_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards/x1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "data": { "id": "x1", "images": {} } }),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cards"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "id": "x1" }, card_json("base1-4", "Charizard")]
            })))
            .mount(&server)
            .await;

        let provider = PokemonTcg::new(server.uri(), None);
        let card = provider.fetch_by_id("x1").await.unwrap();
        assert_eq!(card.id, "x1");
        assert_eq!(card.name, None);
        assert!(card.images.is_empty());

        let cards = provider.search("x").await.unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].name, None);
    }

    #[tokio::test]
    async fn non_ok_status_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = PokemonTcg::new(server.uri(), None);
        match provider.fetch_by_id("missing").await {
            Err(ProviderError::HttpStatus(status)) => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cards"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let provider = PokemonTcg::new(server.uri(), None);
        assert!(matches!(
            provider.search("").await,
            Err(ProviderError::Network(_))
        ));
    }
}
