use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;

use super::*;

/// Upper bound on servers in one `dns server select` line.
const MAX_SERVERS: usize = 2;

const SELECT_IDS: RangeInclusive<u64> = 1..=65535;
const PP_NUMBERS: RangeInclusive<u64> = 1..=65535;

/// Original-sender field: an address, a prefix or an address range.
static SENDER: Lazy<Regex> = Lazy::new(|| {
    match Regex::new(r"^[0-9A-Fa-f:.]+(/\d{1,3}|-[0-9A-Fa-f:.]+)?$") {
        Ok(re) => re,
        Err(err) => panic!("invalid sender regex: {err}"),
    }
});

fn is_server_address(token: &str) -> bool {
    token.parse::<IpAddr>().is_ok()
}

fn is_sender(token: &str) -> bool {
    if !SENDER.is_match(token) {
        return false;
    }
    let first = token.split(['/', '-']).next().unwrap_or_default();
    is_server_address(first)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    A,
    Aaaa,
    Ptr,
    Mx,
    Ns,
    Cname,
    Any,
}

impl RecordType {
    const ALL: [RecordType; 7] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Ptr,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Cname,
        RecordType::Any,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "a",
            RecordType::Aaaa => "aaaa",
            RecordType::Ptr => "ptr",
            RecordType::Mx => "mx",
            RecordType::Ns => "ns",
            RecordType::Cname => "cname",
            RecordType::Any => "any",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DnsServer {
    pub address: String,
    /// Rendered as `edns=on` / `edns=off` right after the address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edns: Option<bool>,
}

/// `dns server select <id> <server> [edns=on|off] [<server> [edns=on|off]]
/// [<type>] <pattern> [<sender>] [restrict pp <n>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DnsServerSelect {
    pub id: u32,
    pub servers: Vec<DnsServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict_pp: Option<u32>,
}

impl DnsServerSelect {
    fn parse(tokens: &mut Tokens<'_>) -> Result<Self, ConfigError> {
        let id = tokens.expect_number_in("select id", SELECT_IDS)? as u32;

        // Servers. A server is only taken while a token is left for the
        // pattern, so an address-shaped pattern is never eaten here.
        let mut servers = Vec::new();
        while servers.len() < MAX_SERVERS && tokens.remaining() >= 2 {
            let Some(address) = tokens.next_if(is_server_address) else {
                break;
            };
            let edns = match tokens.next_if(|t| t.starts_with("edns=")) {
                Some("edns=on") => Some(true),
                Some("edns=off") => Some(false),
                Some(other) => return Err(tokens.error(format!("invalid option '{other}'"))),
                None => None,
            };
            servers.push(DnsServer {
                address: address.to_string(),
                edns,
            });
        }
        if servers.is_empty() {
            return Err(tokens.error("no server address"));
        }

        let record_type = if tokens.remaining() >= 2 {
            tokens
                .next_if(|t| RecordType::from_token(t).is_some())
                .and_then(RecordType::from_token)
        } else {
            None
        };

        let pattern = tokens.expect("query pattern")?.to_string();

        let sender = tokens.next_if(is_sender).map(str::to_string);

        let restrict_pp = if tokens.next_if_eq("restrict") {
            tokens.expect_keyword("pp")?;
            Some(tokens.expect_number_in("pp number", PP_NUMBERS)? as u32)
        } else {
            None
        };

        tokens.finish()?;
        Ok(DnsServerSelect {
            id,
            servers,
            record_type,
            pattern,
            sender,
            restrict_pp,
        })
    }
}

impl DnsServerSelect {
    /// Without a record type the pattern is located by position only, so a
    /// pattern shaped like an option, a type or a server must end the line.
    fn check_pattern_position(&self) -> Result<(), ConfigError> {
        if self.record_type.is_some() {
            return Ok(());
        }
        let followed = self.sender.is_some() || self.restrict_pp.is_some();
        let reason = if self.pattern.starts_with("edns=") {
            "would be read as an edns option"
        } else if followed && RecordType::from_token(&self.pattern).is_some() {
            "would be read as a record type"
        } else if followed && self.servers.len() < MAX_SERVERS && is_server_address(&self.pattern)
        {
            "would be read as a server address"
        } else {
            return Ok(());
        };
        Err(ConfigError::build(
            Self::KIND.name(),
            format!(
                "pattern '{}' {reason}; set record_type to place it",
                self.pattern
            ),
        ))
    }
}

impl Extract for DnsServerSelect {
    fn extract(block: &ContextBlock) -> Result<Vec<Self>, ConfigError> {
        let mut records = Vec::new();
        for line in &block.lines {
            let mut tokens = Tokens::new(line);
            if !tokens.eat_prefix(&["dns", "server", "select"]) {
                continue;
            }
            records.push(DnsServerSelect::parse(&mut tokens)?);
        }
        Ok(records)
    }
}

impl Build for DnsServerSelect {
    fn build(&self) -> Result<Vec<String>, ConfigError> {
        require_range(Self::KIND, "id", u64::from(self.id), SELECT_IDS)?;
        if self.servers.is_empty() || self.servers.len() > MAX_SERVERS {
            return Err(ConfigError::build(
                Self::KIND.name(),
                format!("expected 1 to {MAX_SERVERS} servers, got {}", self.servers.len()),
            ));
        }
        require_token(Self::KIND, "pattern", &self.pattern)?;
        self.check_pattern_position()?;

        let mut parts = vec!["dns server select".to_string(), self.id.to_string()];
        for server in &self.servers {
            if !is_server_address(&server.address) {
                return Err(ConfigError::build(
                    Self::KIND.name(),
                    format!("'{}' is not an IP address", server.address),
                ));
            }
            parts.push(server.address.clone());
            if let Some(edns) = server.edns {
                parts.push(format!("edns={}", on_off(edns)));
            }
        }
        if let Some(record_type) = self.record_type {
            parts.push(record_type.as_str().to_string());
        }
        parts.push(self.pattern.clone());
        if let Some(sender) = &self.sender {
            if !is_sender(sender) {
                return Err(ConfigError::build(
                    Self::KIND.name(),
                    format!("'{sender}' is not an address, prefix or range"),
                ));
            }
            parts.push(sender.clone());
        }
        if let Some(pp) = self.restrict_pp {
            require_range(Self::KIND, "restrict pp", u64::from(pp), PP_NUMBERS)?;
            parts.push(format!("restrict pp {pp}"));
        }
        Ok(vec![parts.join(" ")])
    }

    fn delete_commands(&self) -> Vec<String> {
        vec![format!("no dns server select {}", self.id)]
    }
}

impl Entity for DnsServerSelect {
    const KIND: EntityKind = EntityKind::DnsServerSelect;

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::DnsServerSelect(select) => Some(select),
            _ => None,
        }
    }
}

impl From<DnsServerSelect> for Record {
    fn from(select: DnsServerSelect) -> Self {
        Record::DnsServerSelect(select)
    }
}
