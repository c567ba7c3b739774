//! Rule scheduling phases.
//!
//! Declaration order is firing order: the phase scheduler iterates phases in
//! the order they appear here, matching the order the phase-tag modifier
//! recognises them in (request header, request body, response header,
//! response body, postprocess), with `None` reserved as a terminator/default
//! that never fires.

use std::fmt;

use thiserror::Error;

/// A scheduling phase a rule can be registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Reserved sentinel; a rule left at this phase never fires.
    None,
    /// Request headers are available.
    RequestHeader,
    /// Request body chunks are streaming through the filter.
    RequestBody,
    /// Response headers are available.
    ResponseHeader,
    /// Response body chunks are streaming through the filter.
    ResponseBody,
    /// The transaction has finished; logging and cleanup rules fire here.
    Postprocess,
}

impl Phase {
    /// All phases a rule can usefully be scheduled against, in firing order.
    pub const ORDERED: [Self; 6] = [
        Self::None,
        Self::RequestHeader,
        Self::RequestBody,
        Self::ResponseHeader,
        Self::ResponseBody,
        Self::Postprocess,
    ];
}

/// The phase tag failed to parse.
#[derive(Debug, Error)]
#[error("unknown phase tag: {0}")]
pub struct UnknownPhaseTag(pub String);

impl std::str::FromStr for Phase {
    type Err = UnknownPhaseTag;

    /// Parse a `phase:<tag>` modifier value (spec §4.3). Matching is
    /// case-insensitive over the tags `REQUEST_HEADER`, `REQUEST`,
    /// `RESPONSE_HEADER`, `RESPONSE`, `POSTPROCESS`, `NONE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "REQUEST_HEADER" => Ok(Self::RequestHeader),
            "REQUEST" => Ok(Self::RequestBody),
            "RESPONSE_HEADER" => Ok(Self::ResponseHeader),
            "RESPONSE" => Ok(Self::ResponseBody),
            "POSTPROCESS" => Ok(Self::Postprocess),
            _ => Err(UnknownPhaseTag(s.to_owned())),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::None => "NONE",
            Self::RequestHeader => "REQUEST_HEADER",
            Self::RequestBody => "REQUEST",
            Self::ResponseHeader => "RESPONSE_HEADER",
            Self::ResponseBody => "RESPONSE",
            Self::Postprocess => "POSTPROCESS",
        };
        f.write_str(tag)
    }
}
