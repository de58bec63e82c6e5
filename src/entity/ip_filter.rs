use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FilterAction {
    Pass,
    Reject,
    Restrict,
    RestrictLog,
    PassLog,
    RejectLog,
    RestrictNolog,
    PassNolog,
    RejectNolog,
}

impl FilterAction {
    const ALL: [FilterAction; 9] = [
        FilterAction::Pass,
        FilterAction::Reject,
        FilterAction::Restrict,
        FilterAction::RestrictLog,
        FilterAction::PassLog,
        FilterAction::RejectLog,
        FilterAction::RestrictNolog,
        FilterAction::PassNolog,
        FilterAction::RejectNolog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterAction::Pass => "pass",
            FilterAction::Reject => "reject",
            FilterAction::Restrict => "restrict",
            FilterAction::RestrictLog => "restrict-log",
            FilterAction::PassLog => "pass-log",
            FilterAction::RejectLog => "reject-log",
            FilterAction::RestrictNolog => "restrict-nolog",
            FilterAction::PassNolog => "pass-nolog",
            FilterAction::RejectNolog => "reject-nolog",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == token)
    }
}

/// Port fields of a static filter. A destination port is only written
/// after a source port, which may be `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FilterPorts {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// `ip filter <n> <action> <src> <dst> [<proto> [<srcport> [<dstport>]]] [established]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IpFilter {
    pub number: u32,
    pub action: FilterAction,
    pub source: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<FilterPorts>,
    #[serde(default)]
    pub established: bool,
}

impl IpFilter {
    pub fn new(
        number: u32,
        action: FilterAction,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            number,
            action,
            source: source.into(),
            destination: destination.into(),
            protocol: None,
            ports: None,
            established: false,
        }
    }

    fn parse(tokens: &mut Tokens<'_>) -> Result<Self, ConfigError> {
        let number = filter_number(tokens)?;

        let action = tokens.expect("action")?;
        let action = FilterAction::from_token(action)
            .ok_or_else(|| tokens.error(format!("unknown action '{action}'")))?;

        let source = tokens.expect("source address")?.to_string();
        let destination = tokens.expect("destination address")?.to_string();

        let not_flag = |token: &str| token != "established";
        let protocol = tokens.next_if(not_flag).map(str::to_string);
        let ports = match protocol {
            Some(_) => tokens.next_if(not_flag).map(|source| FilterPorts {
                source: source.to_string(),
                destination: tokens.next_if(not_flag).map(str::to_string),
            }),
            None => None,
        };
        let established = tokens.next_if_eq("established");
        tokens.finish()?;

        Ok(IpFilter {
            number,
            action,
            source,
            destination,
            protocol,
            ports,
            established,
        })
    }
}

fn filter_number(tokens: &mut Tokens<'_>) -> Result<u32, ConfigError> {
    let value = tokens.expect_number_in("filter number", FILTER_NUMBERS)?;
    u32::try_from(value).map_err(|_| tokens.error("filter number overflow"))
}

/// True for `ip filter <number> ...`, leaving out `ip filter dynamic`,
/// `ip filter source-route` and friends.
fn is_static_filter(tokens: &Tokens<'_>) -> bool {
    tokens.peek() == Some("ip")
        && tokens.peek_nth(1) == Some("filter")
        && tokens
            .peek_nth(2)
            .is_some_and(|token| token.starts_with(|c: char| c.is_ascii_digit()))
}

impl Extract for IpFilter {
    fn extract(block: &ContextBlock) -> Result<Vec<Self>, ConfigError> {
        let mut records = Vec::new();
        for line in &block.lines {
            let mut tokens = Tokens::new(line);
            if !is_static_filter(&tokens) {
                continue;
            }
            tokens.eat_prefix(&["ip", "filter"]);
            records.push(IpFilter::parse(&mut tokens)?);
        }
        Ok(records)
    }
}

impl Build for IpFilter {
    fn build(&self) -> Result<Vec<String>, ConfigError> {
        require_range(Self::KIND, "number", u64::from(self.number), FILTER_NUMBERS)?;
        require_token(Self::KIND, "source", &self.source)?;
        require_token(Self::KIND, "destination", &self.destination)?;

        let mut parts = vec![
            "ip".to_string(),
            "filter".to_string(),
            self.number.to_string(),
            self.action.as_str().to_string(),
            self.source.clone(),
            self.destination.clone(),
        ];
        if let Some(protocol) = &self.protocol {
            require_token(Self::KIND, "protocol", protocol)?;
            parts.push(protocol.clone());
        }
        if let Some(ports) = &self.ports {
            if self.protocol.is_none() {
                return Err(ConfigError::build(
                    Self::KIND.name(),
                    "ports require a protocol",
                ));
            }
            require_token(Self::KIND, "source port", &ports.source)?;
            parts.push(ports.source.clone());
            if let Some(destination) = &ports.destination {
                require_token(Self::KIND, "destination port", destination)?;
                parts.push(destination.clone());
            }
        }
        if self.established {
            parts.push("established".to_string());
        }
        Ok(vec![parts.join(" ")])
    }

    fn delete_commands(&self) -> Vec<String> {
        vec![format!("no ip filter {}", self.number)]
    }
}

impl Entity for IpFilter {
    const KIND: EntityKind = EntityKind::IpFilter;

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::IpFilter(filter) => Some(filter),
            _ => None,
        }
    }
}

impl From<IpFilter> for Record {
    fn from(filter: IpFilter) -> Self {
        Record::IpFilter(filter)
    }
}

/// `ip filter dynamic <n> <src> <dst> <proto> [syslog on|off]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IpFilterDynamic {
    pub number: u32,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    /// Rendered as `syslog on` / `syslog off`; omitted when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog: Option<bool>,
}

impl Extract for IpFilterDynamic {
    fn extract(block: &ContextBlock) -> Result<Vec<Self>, ConfigError> {
        let mut records = Vec::new();
        for line in &block.lines {
            let mut tokens = Tokens::new(line);
            if !tokens.eat_prefix(&["ip", "filter", "dynamic"]) {
                continue;
            }
            let number = filter_number(&mut tokens)?;
            let source = tokens.expect("source address")?.to_string();
            let destination = tokens.expect("destination address")?.to_string();
            let protocol = tokens.expect("protocol")?.to_string();
            let syslog = if tokens.next_if_eq("syslog") {
                Some(tokens.expect_on_off("syslog")?)
            } else {
                None
            };
            tokens.finish()?;
            records.push(IpFilterDynamic {
                number,
                source,
                destination,
                protocol,
                syslog,
            });
        }
        Ok(records)
    }
}

impl Build for IpFilterDynamic {
    fn build(&self) -> Result<Vec<String>, ConfigError> {
        require_range(Self::KIND, "number", u64::from(self.number), FILTER_NUMBERS)?;
        require_token(Self::KIND, "source", &self.source)?;
        require_token(Self::KIND, "destination", &self.destination)?;
        require_token(Self::KIND, "protocol", &self.protocol)?;

        let mut command = format!(
            "ip filter dynamic {} {} {} {}",
            self.number, self.source, self.destination, self.protocol
        );
        if let Some(syslog) = self.syslog {
            command.push_str(" syslog ");
            command.push_str(on_off(syslog));
        }
        Ok(vec![command])
    }

    fn delete_commands(&self) -> Vec<String> {
        vec![format!("no ip filter dynamic {}", self.number)]
    }
}

impl Entity for IpFilterDynamic {
    const KIND: EntityKind = EntityKind::IpFilterDynamic;

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::IpFilterDynamic(filter) => Some(filter),
            _ => None,
        }
    }
}

impl From<IpFilterDynamic> for Record {
    fn from(filter: IpFilterDynamic) -> Self {
        Record::IpFilterDynamic(filter)
    }
}
