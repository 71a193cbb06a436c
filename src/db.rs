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


use std::{str::FromStr, time::Duration};

use mobc::Connection;
use mobc_postgres::{
    tokio_postgres::{error::SqlState, Config, NoTls},
    PgConnectionManager,
};

use crate::Error;

pub type Conn = Connection<PgConnectionManager<NoTls>>;
pub type Pool = mobc::Pool<PgConnectionManager<NoTls>>;

const DB_POOL_MAX_OPEN: u64 = 32;
const DB_POOL_MAX_IDLE: u64 = 8;
const DB_POOL_TIMEOUT_SECONDS: u64 = 15;

const SCHEMA: &'static str = include_str!("init.sql");
const TEARDOWN: &'static str = include_str!("uninit.sql");

/// Builds the connection pool. No connection is opened until the first checkout,
/// so a bad host only shows up on first use.
pub fn create_pool(db_url: &str) -> Result<Pool, Error> {
    let config = Config::from_str(db_url)?;
    tracing::debug!(hosts = ?config.get_hosts(), dbname = ?config.get_dbname(), "database pool");

    Ok(mobc::Pool::builder()
        .max_open(DB_POOL_MAX_OPEN)
        .max_idle(DB_POOL_MAX_IDLE)
        .get_timeout(Some(Duration::from_secs(DB_POOL_TIMEOUT_SECONDS)))
        .build(PgConnectionManager::new(config, NoTls)))
}

pub async fn get_db_conn(db_pool: &Pool) -> Result<Conn, Error> {
    Ok(db_pool.get().await?)
}

async fn run_script(db_pool: &Pool, script: &str) -> Result<(), Error> {
    get_db_conn(db_pool)
        .await?
        .batch_execute(script)
        .await
        .map_err(Error::DBError)
}

/// Creates every table and index that does not exist yet.
pub async fn init_db(db_pool: &Pool) -> Result<(), Error> {
    run_script(db_pool, SCHEMA).await?;
    tracing::info!("database schema initialized");
    Ok(())
}

/// Drops all tables, data included.
pub async fn uninit_db(db_pool: &Pool) -> Result<(), Error> {
    run_script(db_pool, TEARDOWN).await?;
    tracing::warn!("database schema dropped");
    Ok(())
}

pub fn is_unique_violation(e: &mobc_postgres::tokio_postgres::Error) -> bool {
    e.code() == Some(&SqlState::UNIQUE_VIOLATION)
}
