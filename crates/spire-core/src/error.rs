// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the error taxonomy for the loading subsystem.
//!
//! Resource failures are data: they are recorded, retried, or degraded, and
//! never bubble up through the tracking API. Only control-plane misuse
//! (starting an uninitialized manager, unreadable configuration) surfaces as a
//! returned `Err`.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The category of a resource failure, used to decide whether it is worth
/// retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A transport-level failure (connection reset, slow CDN, aborted fetch).
    Network,
    /// The server answered with an HTTP status.
    Http {
        /// The HTTP status code.
        status: u16,
    },
    /// The payload could not be parsed.
    Syntax,
    /// The payload had an unexpected shape.
    Type,
    /// The resource did not answer in time.
    Timeout,
    /// Anything else.
    Other,
}

/// A failure reported for a single tracked resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceFailure {
    /// What went wrong.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
}

impl ResourceFailure {
    /// Creates a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A transient transport failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    /// An HTTP status failure.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Http { status }, message)
    }

    /// A timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// Returns the HTTP status, if the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::Http { status } => Some(status),
            _ => None,
        }
    }

    /// Returns `true` for failures that retrying cannot fix: client errors
    /// (4xx) and parse/shape errors.
    pub fn is_permanent(&self) -> bool {
        match self.kind {
            FailureKind::Http { status } => (400..500).contains(&status),
            FailureKind::Syntax | FailureKind::Type => true,
            FailureKind::Network | FailureKind::Timeout | FailureKind::Other => false,
        }
    }
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Network => write!(f, "network error: {}", self.message),
            FailureKind::Http { status } => write!(f, "HTTP {status}: {}", self.message),
            FailureKind::Syntax => write!(f, "syntax error: {}", self.message),
            FailureKind::Type => write!(f, "type error: {}", self.message),
            FailureKind::Timeout => write!(f, "timeout: {}", self.message),
            FailureKind::Other => write!(f, "error: {}", self.message),
        }
    }
}

impl std::error::Error for ResourceFailure {}

/// Errors returned by the control API.
#[derive(Debug, Error)]
pub enum LoadingError {
    /// `start_loading` was called before `initialize`.
    #[error("loading manager is not initialized")]
    NotInitialized,
    /// The manager was disposed and can no longer be used.
    #[error("loading manager has been disposed")]
    Disposed,
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while reading configuration overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text is not valid JSON for the override schema.
    #[error("invalid loading config: {0}")]
    Parse(#[from] serde_json::Error),
}
