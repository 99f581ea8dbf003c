// SPDX-License-Identifier: MIT

//! Parse errors for the structured-value textual syntax (§4.3, §6).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CodecError {
    #[error("unterminated string at offset {0}")]
    UnterminatedString(usize),

    #[error("missing separator at offset {0}")]
    MissingSeparator(usize),

    #[error("empty item at offset {0}")]
    EmptyItem(usize),

    #[error("illegal initial character '{1}' at offset {0}")]
    IllegalInitialCharacter(usize, char),

    #[error("illegal number at offset {0}: {1}")]
    IllegalNumber(usize, String),

    #[error("unexpected trailing data at offset {0}")]
    TrailingData(usize),
}

pub type Result<T> = std::result::Result<T, CodecError>;
