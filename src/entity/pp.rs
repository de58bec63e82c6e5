use super::*;
use crate::parser::{Scope, ScopeId};

const MTU_BYTES: RangeInclusive<u64> = 64..=1500;
const DISCONNECT_SECONDS: RangeInclusive<u64> = 1..=21_474_836;
const NAT_DESCRIPTORS: RangeInclusive<u64> = 1..=2_147_483_647;

/// `pp auth myname <user> <password>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuthMyname {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectTime {
    Off,
    Seconds(u32),
}

/// One `pp select <n>` (or `pp select anonymous`) section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PpInterface {
    pub id: ScopeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_on: Option<bool>,
    /// LAN interface carrying PPPoE, as in `pppoe use lan2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pppoe_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pppoe_service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pppoe_ac_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auth_accept: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_myname: Option<AuthMyname>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnect_time: Option<DisconnectTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_mss_limit: Option<MssLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_filter_in: Option<FilterList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_filter_out: Option<FilterList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_descriptor: Option<u32>,
    /// Without `pp enable` / `pp disable` the block ends with `pp select none`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl PpInterface {
    pub fn new(id: ScopeId) -> Self {
        Self {
            id,
            description: None,
            always_on: None,
            pppoe_use: None,
            pppoe_service_name: None,
            pppoe_ac_name: None,
            bind: None,
            auth_accept: Vec::new(),
            auth_myname: None,
            disconnect_time: None,
            address: None,
            mtu: None,
            tcp_mss_limit: None,
            secure_filter_in: None,
            secure_filter_out: None,
            nat_descriptor: None,
            enabled: None,
        }
    }

    fn expect_own_id(&self, t: &mut Tokens<'_>) -> Result<(), ConfigError> {
        let token = t.expect("pp number")?;
        match ScopeId::parse(token) {
            Some(id) if id == self.id => Ok(()),
            _ => Err(t.error(format!("pp {token} inside pp {}", self.id))),
        }
    }

    fn parse_block(id: ScopeId, block: &ContextBlock) -> Result<Self, ConfigError> {
        let mut pp = PpInterface::new(id);

        for line in &block.lines {
            let mut t = Tokens::new(line);
            if t.eat_prefix(&["pp", "select"]) {
                if !t.next_if_eq("none") {
                    pp.expect_own_id(&mut t)?;
                }
            } else if t.eat_prefix(&["pp", "enable"]) {
                pp.expect_own_id(&mut t)?;
                pp.enabled = Some(true);
            } else if t.eat_prefix(&["pp", "disable"]) {
                pp.expect_own_id(&mut t)?;
                pp.enabled = Some(false);
            } else if t.eat_prefix(&["description"]) {
                pp.description = Some(
                    t.rest_joined()
                        .ok_or_else(|| t.error("missing description"))?,
                );
            } else if t.eat_prefix(&["pp", "always-on"]) {
                pp.always_on = Some(t.expect_on_off("always-on")?);
            } else if t.eat_prefix(&["pppoe", "use"]) {
                pp.pppoe_use = Some(t.expect("interface")?.to_string());
            } else if t.eat_prefix(&["pppoe", "service-name"]) {
                pp.pppoe_service_name = Some(t.expect("service name")?.to_string());
            } else if t.eat_prefix(&["pppoe", "ac-name"]) {
                pp.pppoe_ac_name = Some(t.expect("ac name")?.to_string());
            } else if t.eat_prefix(&["pp", "bind"]) {
                pp.bind = Some(t.expect("interface")?.to_string());
            } else if t.eat_prefix(&["pp", "auth", "accept"]) {
                pp.auth_accept = t.rest().into_iter().map(str::to_string).collect();
                if pp.auth_accept.is_empty() {
                    return Err(t.error("missing authentication protocols"));
                }
            } else if t.eat_prefix(&["pp", "auth", "myname"]) {
                let user = t.expect("user")?.to_string();
                let password = t.expect("password")?.to_string();
                pp.auth_myname = Some(AuthMyname { user, password });
            } else if t.eat_prefix(&["pp", "disconnect", "time"]) {
                pp.disconnect_time = Some(if t.next_if_eq("off") {
                    DisconnectTime::Off
                } else {
                    DisconnectTime::Seconds(
                        t.expect_number_in("disconnect time", DISCONNECT_SECONDS)? as u32,
                    )
                });
            } else if t.eat_prefix(&["ip", "pp", "address"]) {
                pp.address = Some(t.expect("address")?.to_string());
            } else if t.eat_prefix(&["ip", "pp", "mtu"]) {
                pp.mtu = Some(t.expect_number_in("mtu", MTU_BYTES)? as u16);
            } else if t.eat_prefix(&["ip", "pp", "tcp", "mss", "limit"]) {
                pp.tcp_mss_limit = Some(MssLimit::parse(&mut t)?);
            } else if t.eat_prefix(&["ip", "pp", "secure", "filter"]) {
                let direction = Direction::parse(&mut t)?;
                let list = FilterList::parse(&mut t)?;
                match direction {
                    Direction::In => pp.secure_filter_in = Some(list),
                    Direction::Out => pp.secure_filter_out = Some(list),
                }
            } else if t.eat_prefix(&["ip", "pp", "nat", "descriptor"]) {
                pp.nat_descriptor =
                    Some(t.expect_number_in("nat descriptor", NAT_DESCRIPTORS)? as u32);
            } else {
                trace!("pp {} skips '{}'", id, line.text.trim());
                continue;
            }
            t.finish()?;
        }
        Ok(pp)
    }
}

impl Extract for PpInterface {
    fn extract(block: &ContextBlock) -> Result<Vec<Self>, ConfigError> {
        match block.scope {
            Scope::Scoped(ContextKind::Pp, id) => Ok(vec![PpInterface::parse_block(id, block)?]),
            _ => Ok(Vec::new()),
        }
    }
}

impl Build for PpInterface {
    fn build(&self) -> Result<Vec<String>, ConfigError> {
        let kind = Self::KIND;
        let mut commands = vec![format!("pp select {}", self.id)];

        if let Some(description) = &self.description {
            require_text(kind, "description", description)?;
            commands.push(format!("description {description}"));
        }
        if let Some(always_on) = self.always_on {
            commands.push(format!("pp always-on {}", on_off(always_on)));
        }
        if let Some(interface) = &self.pppoe_use {
            require_token(kind, "pppoe interface", interface)?;
            commands.push(format!("pppoe use {interface}"));
        }
        if let Some(name) = &self.pppoe_service_name {
            require_token(kind, "service name", name)?;
            commands.push(format!("pppoe service-name {name}"));
        }
        if let Some(name) = &self.pppoe_ac_name {
            require_token(kind, "ac name", name)?;
            commands.push(format!("pppoe ac-name {name}"));
        }
        if let Some(bind) = &self.bind {
            require_token(kind, "bind", bind)?;
            commands.push(format!("pp bind {bind}"));
        }
        if !self.auth_accept.is_empty() {
            for protocol in &self.auth_accept {
                require_token(kind, "auth protocol", protocol)?;
            }
            commands.push(format!("pp auth accept {}", self.auth_accept.join(" ")));
        }
        if let Some(myname) = &self.auth_myname {
            require_token(kind, "user", &myname.user)?;
            require_token(kind, "password", &myname.password)?;
            commands.push(format!("pp auth myname {} {}", myname.user, myname.password));
        }
        match self.disconnect_time {
            Some(DisconnectTime::Off) => commands.push("pp disconnect time off".to_string()),
            Some(DisconnectTime::Seconds(seconds)) => {
                require_range(kind, "disconnect time", u64::from(seconds), DISCONNECT_SECONDS)?;
                commands.push(format!("pp disconnect time {seconds}"));
            }
            None => {}
        }
        if let Some(address) = &self.address {
            require_token(kind, "address", address)?;
            commands.push(format!("ip pp address {address}"));
        }
        if let Some(mtu) = self.mtu {
            require_range(kind, "mtu", u64::from(mtu), MTU_BYTES)?;
            commands.push(format!("ip pp mtu {mtu}"));
        }
        if let Some(limit) = self.tcp_mss_limit {
            commands.push(format!("ip pp tcp mss limit {}", limit.render(kind)?));
        }
        if let Some(list) = &self.secure_filter_in {
            commands.push(format!("ip pp secure filter in {}", list.render(kind)?));
        }
        if let Some(list) = &self.secure_filter_out {
            commands.push(format!("ip pp secure filter out {}", list.render(kind)?));
        }
        if let Some(descriptor) = self.nat_descriptor {
            require_range(kind, "nat descriptor", u64::from(descriptor), NAT_DESCRIPTORS)?;
            commands.push(format!("ip pp nat descriptor {descriptor}"));
        }
        match self.enabled {
            Some(true) => commands.push(format!("pp enable {}", self.id)),
            Some(false) => commands.push(format!("pp disable {}", self.id)),
            None => commands.push("pp select none".to_string()),
        }
        Ok(commands)
    }

    fn delete_commands(&self) -> Vec<String> {
        let mut commands = Vec::new();
        if self.enabled == Some(true) {
            commands.push(format!("pp disable {}", self.id));
        }
        commands.push(format!("no pp select {}", self.id));
        commands
    }
}

impl Entity for PpInterface {
    const KIND: EntityKind = EntityKind::PpInterface;

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::PpInterface(pp) => Some(pp),
            _ => None,
        }
    }
}

impl From<PpInterface> for Record {
    fn from(pp: PpInterface) -> Self {
        Record::PpInterface(pp)
    }
}
