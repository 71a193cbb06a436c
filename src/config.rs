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

use std::{env, net::SocketAddr, path::PathBuf};

use crate::{auth::JWTConfig, provider::DEFAULT_CARD_API_URL, Error};

const DEFAULT_DATABASE_URL: &'static str = "postgres://postgres@0.0.0.0:5432";
const DEFAULT_BIND_ADDR: &'static str = "0.0.0.0:3030";

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt: Option<JWTConfig>,
    pub card_api_url: String,
    pub card_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr.parse::<SocketAddr>().map_err(|_| {
            Error::Config(format!("BIND_ADDR is not a socket address: {}", bind_addr))
        })?;

        let jwt = match lookup("JWT_SECRET") {
            Some(secret) => Some(JWTConfig::Secret(secret)),
            None => match (lookup("JWT_PRIVATE_KEY"), lookup("JWT_PUBLIC_KEY")) {
                (Some(private), Some(public)) => Some(JWTConfig::Rsa {
                    private: PathBuf::from(private),
                    public: PathBuf::from(public),
                }),
                (None, None) => None,
                _ => {
                    return Err(Error::Config(
                        "JWT_PRIVATE_KEY and JWT_PUBLIC_KEY must be set together".to_string(),
                    ))
                }
            },
        };

        Ok(Config {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr,
            jwt,
            card_api_url: lookup("CARD_API_URL")
                .unwrap_or_else(|| DEFAULT_CARD_API_URL.to_string()),
            card_api_key: lookup("CARD_API_KEY").or_else(|| lookup("POKEMON_TCG_API_KEY")),
        })
    }
}
