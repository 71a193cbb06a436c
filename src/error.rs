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

use std::convert::Infallible;

use jsonwebtoken::errors::ErrorKind as JWTErrorKind;
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, reject, Rejection, Reply};

use crate::{db, provider::ProviderError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    DBPoolError(#[from] mobc::Error<mobc_postgres::tokio_postgres::Error>),
    #[error(transparent)]
    DBError(#[from] mobc_postgres::tokio_postgres::Error),
    #[error("unauthorized request")]
    Unauthorized,
    #[error(transparent)]
    JWTError(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    JSONError(#[from] serde_json::Error),
    #[error("password hashing failed: {0}")]
    HashError(argon2::password_hash::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("Username already exists.")]
    UsernameTaken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("{0}")]
    AccessDenied(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    MalformedRequest(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Unauthorized | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::JWTError(e) => match e.kind() {
                JWTErrorKind::InvalidToken
                | JWTErrorKind::InvalidIssuer
                | JWTErrorKind::InvalidSignature
                | JWTErrorKind::ExpiredSignature
                | JWTErrorKind::ImmatureSignature
                | JWTErrorKind::InvalidAlgorithm
                | JWTErrorKind::MissingRequiredClaim(_)
                | JWTErrorKind::Base64(_)
                | JWTErrorKind::Json(_)
                | JWTErrorKind::Utf8(_) => StatusCode::UNAUTHORIZED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::UsernameTaken => StatusCode::CONFLICT,
            Error::AccessDenied(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Error::Provider(_) => StatusCode::BAD_GATEWAY,
            Error::DBError(e) if db::is_unique_violation(e) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The text shown to the client. Internal failures are not described.
    pub fn message(&self) -> String {
        match self {
            Error::JWTError(_) if self.status() == StatusCode::UNAUTHORIZED => {
                Error::Unauthorized.to_string()
            }
            Error::Provider(_) => "Could not fetch data from the card API".to_string(),
            Error::DBError(_) if self.status() == StatusCode::CONFLICT => "conflict".to_string(),
            Error::Unauthorized
            | Error::UsernameTaken
            | Error::InvalidCredentials
            | Error::AccessDenied(_)
            | Error::NotFound(_)
            | Error::MalformedRequest(_) => self.to_string(),
            _ => "internal error".to_string(),
        }
    }
}

impl reject::Reject for Error {}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

/// A transient, flash-style message sent back with the outcome of a request.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub level: Level,
}

impl Notice {
    pub fn info<S: Into<String>>(message: S) -> Self {
        Notice {
            message: message.into(),
            level: Level::Info,
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Notice {
            message: message.into(),
            level: Level::Error,
        }
    }
}

pub async fn handle_rejects(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<Error>() {
        let code = e.status();
        if code.is_server_error() {
            tracing::error!(error = %e, "request failed");
        } else if code == StatusCode::BAD_GATEWAY {
            tracing::warn!(error = %e, "card provider failure");
        }
        (code, e.message())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(_) = err.find::<warp::reject::MethodNotAllowed>() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
        )
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&Notice::error(message)),
        code,
    ))
}
