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

use std::{fs, path::PathBuf, sync::Arc};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use jsonwebtoken::{
    decode as jwt_decode, encode as jwt_encode, Algorithm, DecodingKey, EncodingKey,
    Header as JWTHeader, Validation,
};
use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reply::{json, with_status, Json, WithStatus},
    Filter, Rejection, Reply,
};

use crate::{db, guard, util, Error, Notice};

/// Tokens stay valid for a week.
const TOKEN_LIFETIME_SECONDS: u64 = 604800;
const TOKEN_LEEWAY_SECONDS: u64 = 60;

pub fn api(
    db_pool: db::Pool,
    keys: Arc<Keys>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(guard::with_db(db_pool.clone()))
        .and(guard::with_keys(keys.clone()))
        .and_then(register);

    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(guard::with_db(db_pool))
        .and(guard::with_keys(keys))
        .and_then(login);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .map(|| json(&Notice::info("You have been logged out.")));

    register.or(login).or(logout)
}

/// Where token signing keys come from.
#[derive(Debug, Clone)]
pub enum JWTConfig {
    /// HS256 with a shared secret.
    Secret(String),
    /// RS256 with PEM encoded keys read from disk.
    Rsa { private: PathBuf, public: PathBuf },
}

pub struct Keys {
    encoder: EncodingKey,
    decoder: DecodingKey,
    algorithm: Algorithm,
}

impl Keys {
    pub fn from_config(config: Option<JWTConfig>) -> Result<Self, Error> {
        match config {
            Some(JWTConfig::Secret(secret)) => Ok(Keys::from_secret(secret.as_bytes())),
            Some(JWTConfig::Rsa { private, public }) => Ok(Keys {
                encoder: EncodingKey::from_rsa_pem(fs::read(private)?.as_ref())?,
                decoder: DecodingKey::from_rsa_pem(fs::read(public)?.as_ref())?,
                algorithm: Algorithm::RS256,
            }),
            None => {
                tracing::warn!("no JWT key configured, tokens will not survive a restart");
                Ok(Keys::from_secret(util::random_string(32).as_bytes()))
            }
        }
    }

    fn from_secret(secret: &[u8]) -> Self {
        Keys {
            encoder: EncodingKey::from_secret(secret),
            decoder: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn issue(&self, user_id: i32, username: &str) -> Result<String, Error> {
        let now = Utc::now().timestamp() as u64;
        let payload = BearerToken {
            iat: now,
            exp: now + TOKEN_LIFETIME_SECONDS,
            sub: user_id,
            username: username.to_string(),
        };
        Ok(jwt_encode(
            &JWTHeader::new(self.algorithm),
            &payload,
            &self.encoder,
        )?)
    }

    pub fn verify(&self, token: &str) -> Result<BearerToken, Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = TOKEN_LEEWAY_SECONDS;
        Ok(jwt_decode::<BearerToken>(token, &self.decoder, &validation)?.claims)
    }
}

/// The claims of a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerToken {
    pub iat: u64,
    pub exp: u64,
    pub sub: i32,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Register {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResp {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResp {
    pub token: String,
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(Error::HashError)?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let parsed = PasswordHash::new(hash).map_err(Error::HashError)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::HashError(e)),
    }
}

async fn register(
    form: Register,
    pool: db::Pool,
    keys: Arc<Keys>,
) -> Result<WithStatus<Json>, Rejection> {
    util::require("username", &form.username, util::USERNAME_MAX_LEN)?;
    util::require("password", &form.password, usize::MAX)?;

    let conn = db::get_db_conn(&pool).await?;
    let taken = conn
        .query_opt("SELECT id FROM users WHERE username = $1", &[&form.username])
        .await
        .map_err(Error::DBError)?;
    if taken.is_some() {
        tracing::info!(username = form.username.as_str(), "username already exists");
        return Err(Error::UsernameTaken.into());
    }

    let password_hash = hash_password(&form.password)?;
    let row = conn
        .query_one(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id",
            &[&form.username, &password_hash],
        )
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                Error::UsernameTaken
            } else {
                Error::DBError(e)
            }
        })?;
    let user_id: i32 = row.get("id");
    tracing::info!(user_id, username = form.username.as_str(), "registered user");

    let token = keys.issue(user_id, &form.username)?;
    Ok(with_status(json(&RegisterResp { token }), StatusCode::CREATED))
}

async fn login(form: Login, pool: db::Pool, keys: Arc<Keys>) -> Result<Json, Rejection> {
    let conn = db::get_db_conn(&pool).await?;
    let row = conn
        .query_opt(
            "SELECT id, password_hash FROM users WHERE username = $1",
            &[&form.username],
        )
        .await
        .map_err(Error::DBError)?
        .ok_or(Error::InvalidCredentials)?;

    let password_hash: String = row.get("password_hash");
    if !verify_password(&form.password, &password_hash)? {
        return Err(Error::InvalidCredentials.into());
    }

    let user_id: i32 = row.get("id");
    tracing::info!(user_id, "user logged in");
    let token = keys.issue(user_id, &form.username)?;
    Ok(json(&LoginResp { token }))
}
