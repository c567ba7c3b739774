//! Engine configuration: buffering knobs and inspection toggles (spec §4.7,
//! §6; SPEC_FULL §10.3).
//!
//! Loaded the way the teacher loads `AppConfig`: layered with `figment`
//! rather than hand-rolled env parsing. Unlike `AppConfig` this crate has no
//! CLI front-end to flatten into, so there is no `clap`/`ortho_config` layer
//! here — the host intermediary's own directive parser is expected to
//! populate an `EngineConfig` and hand it to the engine.

use figment::Figment;
use figment::providers::Env;
use serde::{Deserialize, Serialize};

use crate::flags::TxFlags;

/// What a buffering filter does when accumulated body data exceeds its
/// configured limit (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitAction {
    /// Flush the whole buffer, then keep accumulating from empty.
    FlushAll,
    /// Flush only the overflow, keeping the limit's worth of bytes resident.
    FlushPart,
}

/// Buffering and inspection configuration for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum resident request-body bytes before a flush is forced.
    /// Negative means unlimited (`BufferAll`, spec §4.7).
    pub request_body_buffer_limit: i64,
    /// What to do when `request_body_buffer_limit` is exceeded.
    pub request_body_limit_action: LimitAction,
    /// Maximum resident response-body bytes before a flush is forced.
    pub response_body_buffer_limit: i64,
    /// What to do when `response_body_buffer_limit` is exceeded.
    pub response_body_limit_action: LimitAction,
    /// Whether the request body filter buffers at all. When `false` the
    /// filter always runs in `nobuf` regardless of the limit fields.
    pub buffer_req: bool,
    /// Whether the response body filter buffers at all.
    pub buffer_res: bool,
    /// Request headers are subject to inspection by default.
    pub inspect_reqhdr: bool,
    /// Request body is subject to inspection by default.
    pub inspect_reqbody: bool,
    /// Response headers are subject to inspection by default.
    pub inspect_reshdr: bool,
    /// Response body is subject to inspection by default.
    pub inspect_resbody: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_body_buffer_limit: -1,
            request_body_limit_action: LimitAction::FlushPart,
            response_body_buffer_limit: -1,
            response_body_limit_action: LimitAction::FlushPart,
            buffer_req: true,
            buffer_res: true,
            inspect_reqhdr: true,
            inspect_reqbody: true,
            inspect_reshdr: true,
            inspect_resbody: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration layered from the process environment (prefix
    /// `INTERLOCK_`), falling back to defaults for anything unset.
    ///
    /// # Errors
    /// Returns a [`figment::Error`] if an env var is present but does not
    /// parse into its field's type.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Self::default()))
            .merge(Env::prefixed("INTERLOCK_"))
            .extract()
    }

    /// The [`TxFlags`] a freshly created transaction should start with,
    /// derived from the inspection toggles (spec §6).
    #[must_use]
    pub fn default_tx_flags(&self) -> TxFlags {
        let mut flags = TxFlags::empty();
        if self.inspect_reqhdr {
            flags.insert(TxFlags::INSPECT_REQHDR);
        }
        if self.inspect_reqbody {
            flags.insert(TxFlags::INSPECT_REQBODY);
        }
        if self.inspect_reshdr {
            flags.insert(TxFlags::INSPECT_RESHDR);
        }
        if self.inspect_resbody {
            flags.insert(TxFlags::INSPECT_RESBODY);
        }
        flags
    }
}

/// Load configuration layered from the environment and, behind the
/// `toml-config` feature, an optional TOML file.
#[cfg(feature = "toml-config")]
impl EngineConfig {
    /// Load configuration from `path` (if it exists) merged under the
    /// environment (prefix `INTERLOCK_`), env taking precedence.
    ///
    /// # Errors
    /// Returns a [`figment::Error`] if the file exists but fails to parse,
    /// or a value does not coerce into its field's type.
    pub fn load_with_file(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(Self::default()))
            .merge(figment::providers::Toml::file(path.as_ref()))
            .merge(Env::prefixed("INTERLOCK_"))
            .extract()
    }
}
