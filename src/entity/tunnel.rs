use super::*;
use crate::parser::{Scope, ScopeId};

const TUNNEL_IDS: RangeInclusive<u64> = 1..=65535;
const MSS_BYTES: RangeInclusive<u64> = 536..=1460;
const SECONDS: RangeInclusive<u64> = 1..=65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TunnelEncapsulation {
    Ipsec,
    Ipip,
    L2tp,
    L2tpv3,
    L2tpv3Raw,
}

impl TunnelEncapsulation {
    const ALL: [TunnelEncapsulation; 5] = [
        TunnelEncapsulation::Ipsec,
        TunnelEncapsulation::Ipip,
        TunnelEncapsulation::L2tp,
        TunnelEncapsulation::L2tpv3,
        TunnelEncapsulation::L2tpv3Raw,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TunnelEncapsulation::Ipsec => "ipsec",
            TunnelEncapsulation::Ipip => "ipip",
            TunnelEncapsulation::L2tp => "l2tp",
            TunnelEncapsulation::L2tpv3 => "l2tpv3",
            TunnelEncapsulation::L2tpv3Raw => "l2tpv3-raw",
        }
    }

    fn parse(tokens: &mut Tokens<'_>) -> Result<Self, ConfigError> {
        let token = tokens.expect("encapsulation")?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == token)
            .ok_or_else(|| tokens.error(format!("unknown encapsulation '{token}'")))
    }
}

/// Value of a `tcp mss limit` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MssLimit {
    Auto,
    Off,
    Bytes(u16),
}

impl MssLimit {
    pub(crate) fn parse(tokens: &mut Tokens<'_>) -> Result<Self, ConfigError> {
        match tokens.peek() {
            Some("auto") => {
                tokens.next();
                Ok(MssLimit::Auto)
            }
            Some("off") => {
                tokens.next();
                Ok(MssLimit::Off)
            }
            _ => Ok(MssLimit::Bytes(
                tokens.expect_number_in("mss", MSS_BYTES)? as u16
            )),
        }
    }

    pub(crate) fn render(self, entity: EntityKind) -> Result<String, ConfigError> {
        match self {
            MssLimit::Auto => Ok("auto".to_string()),
            MssLimit::Off => Ok("off".to_string()),
            MssLimit::Bytes(bytes) => {
                require_range(entity, "mss", u64::from(bytes), MSS_BYTES)?;
                Ok(bytes.to_string())
            }
        }
    }
}

/// `ipsec sa policy <policy> <gateway> <esp|ah> <algorithm>...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SaPolicy {
    pub policy_id: u32,
    pub gateway_id: u32,
    pub protocol: String,
    pub algorithms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeepaliveMode {
    Dpd,
    Heartbeat,
}

impl KeepaliveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            KeepaliveMode::Dpd => "dpd",
            KeepaliveMode::Heartbeat => "heartbeat",
        }
    }
}

/// `ipsec ike keepalive use <gateway> on|off [dpd|heartbeat [<interval> [<retry>]]]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IkeKeepalive {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<KeepaliveMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
}

/// IPsec settings of a tunnel. IKE commands are keyed by the tunnel's own
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TunnelIpsec {
    /// `ipsec tunnel <n>`
    pub tunnel_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sa_policy: Option<SaPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<IkeKeepalive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TunnelAuth {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// `l2tp keepalive use on|off [<interval> [<retry>]]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct L2tpKeepalive {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TunnelL2tp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_auth: Option<TunnelAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive: Option<L2tpKeepalive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_router_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_router_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_end_id: Option<String>,
}

impl TunnelL2tp {
    fn is_empty(&self) -> bool {
        *self == TunnelL2tp::default()
    }
}

/// One `tunnel select <n>` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Tunnel {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encapsulation: Option<TunnelEncapsulation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipsec: Option<TunnelIpsec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l2tp: Option<TunnelL2tp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_filter_in: Option<FilterList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_filter_out: Option<FilterList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_mss_limit: Option<MssLimit>,
    /// `tunnel enable <n>` / `tunnel disable <n>`. A block without either
    /// is closed with `tunnel select none`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Tunnel {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            description: None,
            encapsulation: None,
            ipsec: None,
            l2tp: None,
            secure_filter_in: None,
            secure_filter_out: None,
            tcp_mss_limit: None,
            enabled: None,
        }
    }
}

/// IPsec lines seen so far; `ipsec tunnel` may follow the IKE lines.
#[derive(Default)]
struct IpsecDraft {
    tunnel_id: Option<u32>,
    sa_policy: Option<SaPolicy>,
    keepalive: Option<IkeKeepalive>,
    local_address: Option<String>,
    pre_shared_key: Option<String>,
    remote_address: Option<String>,
    first_line: Option<usize>,
}

impl IpsecDraft {
    fn touch(&mut self, line_no: usize) {
        self.first_line.get_or_insert(line_no);
    }

    fn finish(self, block: &ContextBlock) -> Result<Option<TunnelIpsec>, ConfigError> {
        let Some(first_line) = self.first_line else {
            return Ok(None);
        };
        let Some(tunnel_id) = self.tunnel_id else {
            let line = block
                .lines
                .iter()
                .find(|line| line.line_no == first_line)
                .map(|line| line.text.trim().to_string())
                .unwrap_or_default();
            return Err(ConfigError::Parse {
                line_no: first_line,
                line,
                reason: "ipsec settings without 'ipsec tunnel'".to_string(),
            });
        };
        Ok(Some(TunnelIpsec {
            tunnel_id,
            sa_policy: self.sa_policy,
            keepalive: self.keepalive,
            local_address: self.local_address,
            pre_shared_key: self.pre_shared_key,
            remote_address: self.remote_address,
        }))
    }
}

fn expect_gateway(tokens: &mut Tokens<'_>, tunnel_id: u32) -> Result<(), ConfigError> {
    let gateway = tokens.expect_number_in("gateway", TUNNEL_IDS)?;
    if gateway != u64::from(tunnel_id) {
        return Err(tokens.error(format!(
            "gateway {gateway} does not match tunnel {tunnel_id}"
        )));
    }
    Ok(())
}

fn optional_seconds(tokens: &mut Tokens<'_>, what: &str) -> Result<Option<u32>, ConfigError> {
    if tokens.is_empty() {
        Ok(None)
    } else {
        Ok(Some(tokens.expect_number_in(what, SECONDS)? as u32))
    }
}

/// Checks the selector number against the tunnel's own.
fn expect_own_id(tokens: &mut Tokens<'_>, id: u32) -> Result<(), ConfigError> {
    let number = tokens.expect_number_in("tunnel number", TUNNEL_IDS)?;
    if number != u64::from(id) {
        return Err(tokens.error(format!("tunnel {number} inside tunnel {id}")));
    }
    Ok(())
}

impl Tunnel {
    fn parse_block(id: u32, block: &ContextBlock) -> Result<Self, ConfigError> {
        let mut tunnel = Tunnel::new(id);
        let mut ipsec = IpsecDraft::default();
        let mut l2tp = TunnelL2tp::default();
        let mut has_l2tp = false;

        for line in &block.lines {
            let mut t = Tokens::new(line);
            if t.eat_prefix(&["tunnel", "select"]) {
                if !t.next_if_eq("none") {
                    expect_own_id(&mut t, id)?;
                }
            } else if t.eat_prefix(&["tunnel", "encapsulation"]) {
                tunnel.encapsulation = Some(TunnelEncapsulation::parse(&mut t)?);
            } else if t.eat_prefix(&["tunnel", "enable"]) {
                expect_own_id(&mut t, id)?;
                tunnel.enabled = Some(true);
            } else if t.eat_prefix(&["tunnel", "disable"]) {
                expect_own_id(&mut t, id)?;
                tunnel.enabled = Some(false);
            } else if t.eat_prefix(&["description"]) {
                tunnel.description = Some(
                    t.rest_joined()
                        .ok_or_else(|| t.error("missing description"))?,
                );
            } else if t.eat_prefix(&["ipsec", "tunnel"]) {
                ipsec.touch(line.line_no);
                ipsec.tunnel_id = Some(t.expect_number_in("ipsec tunnel", TUNNEL_IDS)? as u32);
            } else if t.eat_prefix(&["ipsec", "sa", "policy"]) {
                ipsec.touch(line.line_no);
                let policy_id = t.expect_number_in("policy id", TUNNEL_IDS)? as u32;
                let gateway_id = t.expect_number_in("gateway", TUNNEL_IDS)? as u32;
                let protocol = t.expect_one_of("protocol", &["esp", "ah"])?.to_string();
                let algorithms: Vec<String> = t.rest().into_iter().map(str::to_string).collect();
                if algorithms.is_empty() {
                    return Err(t.error("missing algorithms"));
                }
                ipsec.sa_policy = Some(SaPolicy {
                    policy_id,
                    gateway_id,
                    protocol,
                    algorithms,
                });
            } else if t.eat_prefix(&["ipsec", "ike", "keepalive", "use"]) {
                ipsec.touch(line.line_no);
                expect_gateway(&mut t, id)?;
                let enabled = t.expect_on_off("keepalive")?;
                let mode = match t.next_if(|m| m == "dpd" || m == "heartbeat") {
                    Some("dpd") => Some(KeepaliveMode::Dpd),
                    Some(_) => Some(KeepaliveMode::Heartbeat),
                    None => None,
                };
                let (interval, retry) = if mode.is_some() {
                    let interval = optional_seconds(&mut t, "interval")?;
                    let retry = match interval {
                        Some(_) => optional_seconds(&mut t, "retry")?,
                        None => None,
                    };
                    (interval, retry)
                } else {
                    (None, None)
                };
                ipsec.keepalive = Some(IkeKeepalive {
                    enabled,
                    mode,
                    interval,
                    retry,
                });
            } else if t.eat_prefix(&["ipsec", "ike", "local", "address"]) {
                ipsec.touch(line.line_no);
                expect_gateway(&mut t, id)?;
                ipsec.local_address = Some(t.expect("local address")?.to_string());
            } else if t.eat_prefix(&["ipsec", "ike", "remote", "address"]) {
                ipsec.touch(line.line_no);
                expect_gateway(&mut t, id)?;
                ipsec.remote_address = Some(t.expect("remote address")?.to_string());
            } else if t.eat_prefix(&["ipsec", "ike", "pre-shared-key"]) {
                ipsec.touch(line.line_no);
                expect_gateway(&mut t, id)?;
                t.expect_keyword("text")?;
                ipsec.pre_shared_key = Some(t.expect("pre-shared key")?.to_string());
            } else if t.eat_prefix(&["ip", "tunnel", "secure", "filter"]) {
                let direction = Direction::parse(&mut t)?;
                let list = FilterList::parse(&mut t)?;
                match direction {
                    Direction::In => tunnel.secure_filter_in = Some(list),
                    Direction::Out => tunnel.secure_filter_out = Some(list),
                }
            } else if t.eat_prefix(&["ip", "tunnel", "tcp", "mss", "limit"]) {
                tunnel.tcp_mss_limit = Some(MssLimit::parse(&mut t)?);
            } else if t.peek() == Some("l2tp") {
                t.next();
                if Self::parse_l2tp(&mut t, &mut l2tp)? {
                    has_l2tp = true;
                } else {
                    trace!("tunnel {} skips '{}'", id, line.text.trim());
                    continue;
                }
            } else {
                trace!("tunnel {} skips '{}'", id, line.text.trim());
                continue;
            }
            t.finish()?;
        }

        tunnel.ipsec = ipsec.finish(block)?;
        if has_l2tp {
            tunnel.l2tp = Some(l2tp);
        }
        Ok(tunnel)
    }

    /// Applies one `l2tp ...` line. Returns false for l2tp commands that are
    /// not modelled.
    fn parse_l2tp(t: &mut Tokens<'_>, l2tp: &mut TunnelL2tp) -> Result<bool, ConfigError> {
        if t.eat_prefix(&["always-on"]) {
            l2tp.always_on = Some(t.expect_on_off("always-on")?);
        } else if t.eat_prefix(&["hostname"]) {
            l2tp.hostname = Some(t.expect("hostname")?.to_string());
        } else if t.eat_prefix(&["tunnel", "auth"]) {
            let enabled = t.expect_on_off("tunnel auth")?;
            let password = t.next().map(str::to_string);
            l2tp.tunnel_auth = Some(TunnelAuth { enabled, password });
        } else if t.eat_prefix(&["keepalive", "use"]) {
            let enabled = t.expect_on_off("keepalive")?;
            let interval = optional_seconds(t, "interval")?;
            let retry = match interval {
                Some(_) => optional_seconds(t, "retry")?,
                None => None,
            };
            l2tp.keepalive = Some(L2tpKeepalive {
                enabled,
                interval,
                retry,
            });
        } else if t.eat_prefix(&["syslog"]) {
            l2tp.syslog = Some(t.expect_on_off("syslog")?);
        } else if t.eat_prefix(&["local", "router-id"]) {
            l2tp.local_router_id = Some(t.expect("router-id")?.to_string());
        } else if t.eat_prefix(&["remote", "router-id"]) {
            l2tp.remote_router_id = Some(t.expect("router-id")?.to_string());
        } else if t.eat_prefix(&["remote", "end-id"]) {
            l2tp.remote_end_id = Some(t.expect("end-id")?.to_string());
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn build_ipsec(&self, ipsec: &TunnelIpsec, commands: &mut Vec<String>) -> Result<(), ConfigError> {
        let kind = Self::KIND;
        require_range(kind, "ipsec tunnel", u64::from(ipsec.tunnel_id), TUNNEL_IDS)?;
        commands.push(format!("ipsec tunnel {}", ipsec.tunnel_id));

        if let Some(policy) = &ipsec.sa_policy {
            if policy.protocol != "esp" && policy.protocol != "ah" {
                return Err(ConfigError::build(
                    kind.name(),
                    format!("unknown sa protocol '{}'", policy.protocol),
                ));
            }
            if policy.algorithms.is_empty() {
                return Err(ConfigError::build(kind.name(), "sa policy has no algorithms"));
            }
            for algorithm in &policy.algorithms {
                require_token(kind, "algorithm", algorithm)?;
            }
            commands.push(format!(
                "ipsec sa policy {} {} {} {}",
                policy.policy_id,
                policy.gateway_id,
                policy.protocol,
                policy.algorithms.join(" ")
            ));
        }

        if let Some(keepalive) = &ipsec.keepalive {
            let mut command = format!(
                "ipsec ike keepalive use {} {}",
                self.id,
                on_off(keepalive.enabled)
            );
            match (keepalive.mode, keepalive.interval, keepalive.retry) {
                (None, None, None) => {}
                (Some(mode), interval, retry) => {
                    command.push(' ');
                    command.push_str(mode.as_str());
                    push_timers(kind, &mut command, interval, retry)?;
                }
                (None, _, _) => {
                    return Err(ConfigError::build(
                        kind.name(),
                        "keepalive timers require a mode",
                    ));
                }
            }
            commands.push(command);
        }

        if let Some(address) = &ipsec.local_address {
            require_token(kind, "local address", address)?;
            commands.push(format!("ipsec ike local address {} {}", self.id, address));
        }
        if let Some(key) = &ipsec.pre_shared_key {
            require_token(kind, "pre-shared key", key)?;
            commands.push(format!("ipsec ike pre-shared-key {} text {}", self.id, key));
        }
        if let Some(address) = &ipsec.remote_address {
            require_token(kind, "remote address", address)?;
            commands.push(format!("ipsec ike remote address {} {}", self.id, address));
        }
        Ok(())
    }

    fn build_l2tp(l2tp: &TunnelL2tp, commands: &mut Vec<String>) -> Result<(), ConfigError> {
        let kind = Self::KIND;
        if l2tp.is_empty() {
            return Err(ConfigError::build(kind.name(), "l2tp section has no settings"));
        }
        if let Some(always_on) = l2tp.always_on {
            commands.push(format!("l2tp always-on {}", on_off(always_on)));
        }
        if let Some(hostname) = &l2tp.hostname {
            require_token(kind, "hostname", hostname)?;
            commands.push(format!("l2tp hostname {hostname}"));
        }
        if let Some(auth) = &l2tp.tunnel_auth {
            let mut command = format!("l2tp tunnel auth {}", on_off(auth.enabled));
            if let Some(password) = &auth.password {
                require_token(kind, "tunnel auth password", password)?;
                command.push(' ');
                command.push_str(password);
            }
            commands.push(command);
        }
        if let Some(keepalive) = &l2tp.keepalive {
            let mut command = format!("l2tp keepalive use {}", on_off(keepalive.enabled));
            push_timers(kind, &mut command, keepalive.interval, keepalive.retry)?;
            commands.push(command);
        }
        if let Some(syslog) = l2tp.syslog {
            commands.push(format!("l2tp syslog {}", on_off(syslog)));
        }
        if let Some(id) = &l2tp.local_router_id {
            require_token(kind, "local router-id", id)?;
            commands.push(format!("l2tp local router-id {id}"));
        }
        if let Some(id) = &l2tp.remote_router_id {
            require_token(kind, "remote router-id", id)?;
            commands.push(format!("l2tp remote router-id {id}"));
        }
        if let Some(id) = &l2tp.remote_end_id {
            require_token(kind, "remote end-id", id)?;
            commands.push(format!("l2tp remote end-id {id}"));
        }
        Ok(())
    }
}

fn push_timers(
    kind: EntityKind,
    command: &mut String,
    interval: Option<u32>,
    retry: Option<u32>,
) -> Result<(), ConfigError> {
    match (interval, retry) {
        (None, None) => {}
        (Some(interval), retry) => {
            require_range(kind, "interval", u64::from(interval), SECONDS)?;
            command.push_str(&format!(" {interval}"));
            if let Some(retry) = retry {
                require_range(kind, "retry", u64::from(retry), SECONDS)?;
                command.push_str(&format!(" {retry}"));
            }
        }
        (None, Some(_)) => {
            return Err(ConfigError::build(kind.name(), "retry requires an interval"));
        }
    }
    Ok(())
}

impl Extract for Tunnel {
    fn extract(block: &ContextBlock) -> Result<Vec<Self>, ConfigError> {
        match block.scope {
            Scope::Scoped(ContextKind::Tunnel, ScopeId::Number(id)) => {
                Ok(vec![Tunnel::parse_block(id, block)?])
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl Build for Tunnel {
    fn build(&self) -> Result<Vec<String>, ConfigError> {
        let kind = Self::KIND;
        require_range(kind, "id", u64::from(self.id), TUNNEL_IDS)?;

        let mut commands = vec![format!("tunnel select {}", self.id)];
        if let Some(description) = &self.description {
            require_text(kind, "description", description)?;
            commands.push(format!("description {description}"));
        }
        if let Some(encapsulation) = self.encapsulation {
            commands.push(format!("tunnel encapsulation {}", encapsulation.as_str()));
        }
        if let Some(ipsec) = &self.ipsec {
            self.build_ipsec(ipsec, &mut commands)?;
        }
        if let Some(l2tp) = &self.l2tp {
            Self::build_l2tp(l2tp, &mut commands)?;
        }
        if let Some(list) = &self.secure_filter_in {
            commands.push(format!("ip tunnel secure filter in {}", list.render(kind)?));
        }
        if let Some(list) = &self.secure_filter_out {
            commands.push(format!("ip tunnel secure filter out {}", list.render(kind)?));
        }
        if let Some(limit) = self.tcp_mss_limit {
            commands.push(format!("ip tunnel tcp mss limit {}", limit.render(kind)?));
        }
        match self.enabled {
            Some(true) => commands.push(format!("tunnel enable {}", self.id)),
            Some(false) => commands.push(format!("tunnel disable {}", self.id)),
            None => commands.push("tunnel select none".to_string()),
        }
        Ok(commands)
    }

    fn delete_commands(&self) -> Vec<String> {
        let mut commands = Vec::new();
        if self.enabled == Some(true) {
            commands.push(format!("tunnel disable {}", self.id));
        }
        if let Some(ipsec) = &self.ipsec {
            commands.push(format!("tunnel select {}", self.id));
            commands.push(format!("no ipsec tunnel {}", ipsec.tunnel_id));
            commands.push("tunnel select none".to_string());
        }
        commands.push(format!("no tunnel select {}", self.id));
        commands
    }
}

impl Entity for Tunnel {
    const KIND: EntityKind = EntityKind::Tunnel;

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::Tunnel(tunnel) => Some(tunnel),
            _ => None,
        }
    }
}

impl From<Tunnel> for Record {
    fn from(tunnel: Tunnel) -> Self {
        Record::Tunnel(tunnel)
    }
}
