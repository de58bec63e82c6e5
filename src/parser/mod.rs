//! Turning a router's configuration dump into scoped blocks of logical lines.
//!
//! The dump passes through two stages:
//!
//! - [`LineReassembler`] undoes the terminal's hard wrapping.
//! - [`ContextTracker`] groups the logical lines into [`ContextBlock`]s, one
//!   per global run or `tunnel select` / `pp select` section.
//!
//! The result is a [`ParsedConfig`], which is immutable and meant to be
//! shared behind an `Arc` by every entity extractor reading from it.
//! [`Tokens`] is the cursor those extractors use on each line.

use std::fmt;
use std::ops::RangeInclusive;

use log::trace;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

pub use context::{ContextBlock, ContextKind, ContextTracker, Scope, ScopeId};
pub use reassemble::{LineReassembler, LogicalLine, SplicedToken, WrapConfig};
pub use tokens::Tokens;

/// Every context block of one configuration dump.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    blocks: Vec<ContextBlock>,
    fingerprint: [u8; 32],
}

impl ParsedConfig {
    pub fn parse(text: &str, wrap: &WrapConfig) -> Self {
        let lines = LineReassembler::new(wrap.clone()).reassemble(text);
        let blocks = ContextTracker::track(lines);
        trace!("parsed configuration into {} blocks", blocks.len());
        Self {
            blocks,
            fingerprint: Self::calculate_fingerprint(text),
        }
    }

    /// SHA-256 of the raw dump.
    pub fn calculate_fingerprint(text: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.finalize().into()
    }

    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    pub fn blocks(&self) -> &[ContextBlock] {
        &self.blocks
    }

    /// All global lines, in dump order.
    pub fn global(&self) -> ContextBlock {
        self.merged(Scope::Global)
    }

    /// All lines of every block with the given scope, in dump order.
    ///
    /// Returns `None` when the dump never selects that scope.
    pub fn scoped(&self, kind: ContextKind, id: ScopeId) -> Option<ContextBlock> {
        let block = self.merged(Scope::Scoped(kind, id));
        if block.lines.is_empty() {
            None
        } else {
            Some(block)
        }
    }

    /// Merged blocks for every selected scope of `kind`, in order of first
    /// appearance.
    pub fn scopes(&self, kind: ContextKind) -> Vec<ContextBlock> {
        let mut ids: Vec<ScopeId> = Vec::new();
        for block in &self.blocks {
            if let Scope::Scoped(block_kind, id) = block.scope {
                if block_kind == kind && !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids.into_iter()
            .map(|id| self.merged(Scope::Scoped(kind, id)))
            .collect()
    }

    /// Every line that contains a token produced by a no-separator join.
    pub fn spliced_lines(&self) -> impl Iterator<Item = &LogicalLine> {
        self.blocks
            .iter()
            .flat_map(|block| block.lines.iter())
            .filter(|line| !line.spliced.is_empty())
    }

    fn merged(&self, scope: Scope) -> ContextBlock {
        let mut merged = ContextBlock::new(scope);
        for block in self.blocks.iter().filter(|block| block.scope == scope) {
            merged.lines.extend(block.lines.iter().cloned());
        }
        merged
    }
}

mod context;
mod reassemble;
mod tokens;
