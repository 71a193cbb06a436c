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

use serde::{Deserialize, Serialize};
use warp::{Filter, Rejection};

use crate::{
    auth::{BearerToken, Keys},
    db,
    provider::CardProvider,
    Error,
};

/// The authenticated identity of the user making a request.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i32,
    pub username: String,
}

impl From<BearerToken> for Session {
    fn from(token: BearerToken) -> Self {
        Session {
            user_id: token.sub,
            username: token.username,
        }
    }
}

pub fn with_db(
    db_pool: db::Pool,
) -> impl Filter<Extract = (db::Pool,), Error = Infallible> + Clone {
    warp::any().map(move || db_pool.clone())
}

pub fn with_keys(
    keys: Arc<Keys>,
) -> impl Filter<Extract = (Arc<Keys>,), Error = Infallible> + Clone {
    warp::any().map(move || keys.clone())
}

pub fn with_provider(
    provider: Arc<dyn CardProvider>,
) -> impl Filter<Extract = (Arc<dyn CardProvider>,), Error = Infallible> + Clone {
    warp::any().map(move || provider.clone())
}

fn session_from_header(keys: &Keys, header: Option<String>) -> Result<Session, Error> {
    let header = header.ok_or(Error::Unauthorized)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(Error::Unauthorized)?
        .trim();
    Ok(Session::from(keys.verify(token)?))
}

/// Resolves the `Authorization: Bearer` header into a [`Session`].
///
/// Place it after the path filters of a route so that it only rejects requests
/// that were meant for that route.
pub fn authenticated(
    keys: Arc<Keys>,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |h: Option<String>| {
        let k = keys.clone();
        async move { session_from_header(&k, h).map_err(|e| Rejection::from(e)) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::JWTConfig, handle_rejects};

    fn keys() -> Arc<Keys> {
        Arc::new(Keys::from_config(Some(JWTConfig::Secret("guard".to_string()))).unwrap())
    }

    fn whoami(
        keys: Arc<Keys>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
        warp::path("whoami")
            .and(authenticated(keys))
            .map(|session: Session| warp::reply::json(&session))
            .recover(handle_rejects)
    }

    #[tokio::test]
    async fn bearer_token_becomes_a_session() {
        let keys = keys();
        let token = keys.issue(42, "ash").unwrap();
        let res = warp::test::request()
            .path("/whoami")
            .header("Authorization", format!("Bearer {}", token))
            .reply(&whoami(keys))
            .await;
        assert_eq!(res.status(), 200);
        let session: Session = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(
            session,
            Session {
                user_id: 42,
                username: "ash".to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let res = warp::test::request()
            .path("/whoami")
            .reply(&whoami(keys()))
            .await;
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn wrong_scheme_is_unauthorized() {
        let keys = keys();
        let token = keys.issue(42, "ash").unwrap();
        let res = warp::test::request()
            .path("/whoami")
            .header("Authorization", format!("Basic {}", token))
            .reply(&whoami(keys))
            .await;
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let res = warp::test::request()
            .path("/whoami")
            .header("Authorization", "Bearer not.a.token")
            .reply(&whoami(keys()))
            .await;
        assert_eq!(res.status(), 401);
    }
}
