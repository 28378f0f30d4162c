//! Protocol-prefixed archive addresses for host integrations:
//! `sga-v2://mod.sga` opens with layout auto-detection, `sga-dow://` and
//! `sga-ic://` force a layout when the file table alone cannot decide.
//!
//! The prefix table is owned by the registry instance; there is no global
//! dispatch state.

use crate::archive::GameFormat;
use crate::essence::{FsError, FsResult, SgaFs};

pub struct OpenerRegistry {
    protocols: Vec<(String, Option<GameFormat>)>,
}

impl OpenerRegistry {
    /// A registry with the three standard prefixes.
    pub fn new() -> OpenerRegistry {
        let mut registry = OpenerRegistry {
            protocols: Vec::new(),
        };
        registry.register("sga-v2", None);
        registry.register("sga-dow", Some(GameFormat::DawnOfWar));
        registry.register("sga-ic", Some(GameFormat::ImpossibleCreatures));
        registry
    }

    /// Later registrations win over earlier ones for the same scheme.
    pub fn register(&mut self, scheme: &str, hint: Option<GameFormat>) {
        self.protocols
            .retain(|(existing, _)| existing.as_str() != scheme);
        self.protocols.push((scheme.to_string(), hint));
    }

    /// Opens `scheme://path`, or a bare path with auto-detection. Unknown
    /// schemes are invalid paths, not filesystem misses.
    pub fn open(&self, url: &str) -> FsResult<SgaFs> {
        match url.split_once("://") {
            Some((scheme, rest)) => {
                let hint = self
                    .protocols
                    .iter()
                    .find(|(existing, _)| existing.as_str() == scheme)
                    .map(|(_, hint)| *hint)
                    .ok_or_else(|| FsError::InvalidPath(url.to_string()))?;
                SgaFs::open_with_format(rest, hint)
            }
            None => SgaFs::open(url),
        }
    }
}

impl Default for OpenerRegistry {
    fn default() -> Self {
        OpenerRegistry::new()
    }
}
