//! Typed configuration records and their codecs.
//!
//! Every entity implements [`Extract`] to read records out of a
//! [`ContextBlock`] and [`Build`] to render a record back into the command
//! lines that produce it. Extraction walks each line with a [`Tokens`]
//! cursor through a fixed sequence of phases; building emits the fields in
//! that same order, so `build(extract(text))` reproduces canonical text and
//! `extract(build(record))` reproduces the record.
//!
//! The [`Registry`] maps each [`EntityKind`] to its [`Codec`]. It is built
//! explicitly with [`Registry::builtin`] and passed by reference.
//!
//! # Entities
//!
//! - [`IpFilter`] / [`IpFilterDynamic`] - `ip filter` rules
//! - [`SecureFilter`] - filter lists applied to an interface
//! - [`DnsServerSelect`] - per-domain DNS forwarding
//! - [`Tunnel`] - a `tunnel select` section
//! - [`PpInterface`] - a `pp select` section

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use log::trace;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::parser::{ContextBlock, ContextKind, ParsedConfig, Tokens};

pub use dns::{DnsServer, DnsServerSelect, RecordType};
pub use ip_filter::{FilterAction, FilterPorts, IpFilter, IpFilterDynamic};
pub use pp::{AuthMyname, DisconnectTime, PpInterface};
pub use secure_filter::{Direction, FilterList, SecureFilter};
pub use tunnel::{
    IkeKeepalive, KeepaliveMode, L2tpKeepalive, MssLimit, SaPolicy, Tunnel, TunnelAuth,
    TunnelEncapsulation, TunnelIpsec, TunnelL2tp,
};

/// Range of `ip filter` numbers.
pub const FILTER_NUMBERS: RangeInclusive<u64> = 1..=2_147_483_647;

/// Reads records of one entity type out of a block.
pub trait Extract: Sized {
    /// Returns every record found in `block`.
    ///
    /// Lines that do not start with one of the entity's command prefixes
    /// are skipped. A line that does but fails a phase aborts extraction.
    fn extract(block: &ContextBlock) -> Result<Vec<Self>, ConfigError>;
}

/// Renders a record into command lines.
pub trait Build {
    fn build(&self) -> Result<Vec<String>, ConfigError>;

    /// Commands that remove the record from the router.
    fn delete_commands(&self) -> Vec<String>;
}

/// Ties an entity type to its [`EntityKind`] and [`Record`] variant.
pub trait Entity: Extract + Build + Into<Record> {
    const KIND: EntityKind;

    fn from_record(record: &Record) -> Option<&Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    IpFilter,
    IpFilterDynamic,
    SecureFilter,
    DnsServerSelect,
    Tunnel,
    PpInterface,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::IpFilter,
        EntityKind::IpFilterDynamic,
        EntityKind::SecureFilter,
        EntityKind::DnsServerSelect,
        EntityKind::Tunnel,
        EntityKind::PpInterface,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::IpFilter => "ip_filter",
            EntityKind::IpFilterDynamic => "ip_filter_dynamic",
            EntityKind::SecureFilter => "secure_filter",
            EntityKind::DnsServerSelect => "dns_server_select",
            EntityKind::Tunnel => "tunnel",
            EntityKind::PpInterface => "pp_interface",
        }
    }

    /// The context the entity lives in, `None` for global entities.
    pub fn context(self) -> Option<ContextKind> {
        match self {
            EntityKind::Tunnel => Some(ContextKind::Tunnel),
            EntityKind::PpInterface => Some(ContextKind::Pp),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::UnknownEntity(s.to_string()))
    }
}

/// Any typed configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    IpFilter(IpFilter),
    IpFilterDynamic(IpFilterDynamic),
    SecureFilter(SecureFilter),
    DnsServerSelect(DnsServerSelect),
    Tunnel(Tunnel),
    PpInterface(PpInterface),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::IpFilter(_) => EntityKind::IpFilter,
            Record::IpFilterDynamic(_) => EntityKind::IpFilterDynamic,
            Record::SecureFilter(_) => EntityKind::SecureFilter,
            Record::DnsServerSelect(_) => EntityKind::DnsServerSelect,
            Record::Tunnel(_) => EntityKind::Tunnel,
            Record::PpInterface(_) => EntityKind::PpInterface,
        }
    }
}

type ExtractFn = fn(&ContextBlock) -> Result<Vec<Record>, ConfigError>;
type BuildFn = fn(&Record) -> Result<Vec<String>, ConfigError>;

/// Extractor and builder pair for one entity kind.
#[derive(Clone, Copy)]
pub struct Codec {
    pub kind: EntityKind,
    pub extract: ExtractFn,
    pub build: BuildFn,
    pub delete: BuildFn,
}

impl Codec {
    pub fn of<T: Entity>() -> Self {
        Self {
            kind: T::KIND,
            extract: extract_records::<T>,
            build: build_record::<T>,
            delete: delete_record::<T>,
        }
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("kind", &self.kind).finish()
    }
}

fn extract_records<T: Entity>(block: &ContextBlock) -> Result<Vec<Record>, ConfigError> {
    Ok(T::extract(block)?.into_iter().map(Into::into).collect())
}

fn downcast<T: Entity>(record: &Record) -> Result<&T, ConfigError> {
    T::from_record(record).ok_or_else(|| {
        ConfigError::build(
            T::KIND.name(),
            format!("got a {} record", record.kind()),
        )
    })
}

fn build_record<T: Entity>(record: &Record) -> Result<Vec<String>, ConfigError> {
    downcast::<T>(record)?.build()
}

fn delete_record<T: Entity>(record: &Record) -> Result<Vec<String>, ConfigError> {
    Ok(downcast::<T>(record)?.delete_commands())
}

/// Table of codecs by entity kind.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    codecs: HashMap<EntityKind, Codec>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every entity shipped with the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Codec::of::<IpFilter>());
        registry.register(Codec::of::<IpFilterDynamic>());
        registry.register(Codec::of::<SecureFilter>());
        registry.register(Codec::of::<DnsServerSelect>());
        registry.register(Codec::of::<Tunnel>());
        registry.register(Codec::of::<PpInterface>());
        registry
    }

    /// Adds or replaces the codec for `codec.kind`.
    pub fn register(&mut self, codec: Codec) {
        self.codecs.insert(codec.kind, codec);
    }

    pub fn codec(&self, kind: EntityKind) -> Result<&Codec, ConfigError> {
        self.codecs
            .get(&kind)
            .ok_or_else(|| ConfigError::UnknownEntity(kind.name().to_string()))
    }

    pub fn kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|kind| self.codecs.contains_key(kind))
            .collect()
    }

    /// Extracts every record of `kind` from the blocks it can live in.
    pub fn extract(
        &self,
        kind: EntityKind,
        config: &ParsedConfig,
    ) -> Result<Vec<Record>, ConfigError> {
        let codec = self.codec(kind)?;
        let blocks = match kind.context() {
            None => vec![config.global()],
            Some(context) => config.scopes(context),
        };
        let mut records = Vec::new();
        for block in &blocks {
            records.extend((codec.extract)(block)?);
        }
        trace!("extracted {} {} records", records.len(), kind);
        Ok(records)
    }

    pub fn extract_block(
        &self,
        kind: EntityKind,
        block: &ContextBlock,
    ) -> Result<Vec<Record>, ConfigError> {
        (self.codec(kind)?.extract)(block)
    }

    pub fn build(&self, record: &Record) -> Result<Vec<String>, ConfigError> {
        (self.codec(record.kind())?.build)(record)
    }

    pub fn delete_commands(&self, record: &Record) -> Result<Vec<String>, ConfigError> {
        (self.codec(record.kind())?.delete)(record)
    }
}

/// Renders a flag as the bare `on`/`off` token.
pub(crate) fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Checks that a builder field renders as exactly one token.
pub(crate) fn require_token(
    entity: EntityKind,
    field: &str,
    value: &str,
) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::build(entity.name(), format!("{field} is empty")));
    }
    if value.contains(char::is_whitespace) {
        return Err(ConfigError::build(
            entity.name(),
            format!("{field} '{value}' contains whitespace"),
        ));
    }
    Ok(())
}

/// Checks free text that renders as the tail of a command.
pub(crate) fn require_text(entity: EntityKind, field: &str, text: &str) -> Result<(), ConfigError> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() || normalized != text {
        return Err(ConfigError::build(
            entity.name(),
            format!("{field} '{text}' must be non-empty single-spaced text"),
        ));
    }
    Ok(())
}

pub(crate) fn require_range(
    entity: EntityKind,
    field: &str,
    value: u64,
    range: RangeInclusive<u64>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::build(
            entity.name(),
            format!(
                "{field} {value} outside {}..={}",
                range.start(),
                range.end()
            ),
        ))
    }
}

mod dns;
mod ip_filter;
mod pp;
mod secure_filter;
mod tunnel;
