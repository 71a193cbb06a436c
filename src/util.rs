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

use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::Error;

pub const USERNAME_MAX_LEN: usize = 80;
pub const CARD_ID_MAX_LEN: usize = 120;
pub const DECK_NAME_MAX_LEN: usize = 120;
pub const DECK_DESCRIPTION_MAX_LEN: usize = 500;

pub fn random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Rejects an empty value or one longer than `max` characters.
pub fn require(field: &str, value: &str, max: usize) -> Result<(), Error> {
    if value.trim().is_empty() {
        Err(Error::MalformedRequest(format!("{} must not be empty", field)))
    } else {
        limit(field, value, max)
    }
}

pub fn limit(field: &str, value: &str, max: usize) -> Result<(), Error> {
    if value.chars().count() > max {
        Err(Error::MalformedRequest(format!(
            "{} must be at most {} characters",
            field, max
        )))
    } else {
        Ok(())
    }
}
