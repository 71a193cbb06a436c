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

use mobc_postgres::tokio_postgres::row::Row;
use serde::{Deserialize, Serialize};
use warp::{
    reply::{json, Json},
    Filter, Rejection, Reply,
};

use crate::{
    auth::Keys,
    db,
    guard::{self, Session},
    Error,
};

pub fn api(
    db_pool: db::Pool,
    keys: Arc<Keys>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("user")
        .and(warp::path::end())
        .and(warp::get())
        .and(guard::authenticated(keys))
        .and(guard::with_db(db_pool))
        .and_then(read_user)
}

#[derive(Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
}

impl<'a> From<&'a Row> for User {
    fn from(item: &'a Row) -> Self {
        User {
            id: item.get("id"),
            username: item.get("username"),
        }
    }
}

async fn read_user(session: Session, pool: db::Pool) -> Result<Json, Rejection> {
    let row = db::get_db_conn(&pool)
        .await?
        .query_opt(
            "SELECT id, username FROM users WHERE id = $1",
            &[&session.user_id],
        )
        .await
        .map_err(Error::DBError)?
        .ok_or(Error::NotFound("User not found."))?;

    Ok(json(&User::from(&row)))
}
