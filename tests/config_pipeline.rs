use rtxconf::entity::{
    DnsServerSelect, EntityKind, FilterAction, KeepaliveMode, MssLimit, PpInterface, Record,
    Registry, Tunnel, TunnelEncapsulation,
};
use rtxconf::error::ConfigError;
use rtxconf::parser::{ContextKind, LineReassembler, ParsedConfig, Scope, ScopeId, WrapConfig};

const RTX1210: &str = include_str!("fixtures/rtx1210_config.txt");

fn parsed() -> ParsedConfig {
    ParsedConfig::parse(RTX1210, &WrapConfig::default())
}

fn records(kind: EntityKind) -> Vec<Record> {
    Registry::builtin()
        .extract(kind, &parsed())
        .expect("extract fixture")
}

fn tunnels() -> Vec<Tunnel> {
    records(EntityKind::Tunnel)
        .into_iter()
        .map(|record| match record {
            Record::Tunnel(tunnel) => tunnel,
            other => panic!("unexpected record {other:?}"),
        })
        .collect()
}

fn pps() -> Vec<PpInterface> {
    records(EntityKind::PpInterface)
        .into_iter()
        .map(|record| match record {
            Record::PpInterface(pp) => pp,
            other => panic!("unexpected record {other:?}"),
        })
        .collect()
}

#[test]
fn split_filter_number_is_restored() {
    let lines = LineReassembler::default().reassemble(
        "ip lan2 secure filter in 200020 20010\n0 200102 200103\nip route default gateway pp 1\n",
    );
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0].text,
        "ip lan2 secure filter in 200020 200100 200102 200103"
    );
}

#[test]
fn fixture_counts_by_kind() {
    let expected = [
        (EntityKind::IpFilter, 9),
        (EntityKind::IpFilterDynamic, 3),
        (EntityKind::SecureFilter, 2),
        (EntityKind::DnsServerSelect, 2),
        (EntityKind::Tunnel, 2),
        (EntityKind::PpInterface, 2),
    ];
    for (kind, count) in expected {
        assert_eq!(records(kind).len(), count, "{kind}");
    }
}

#[test]
fn wrapped_lists_in_fixture_are_rejoined() {
    let global = records(EntityKind::SecureFilter);
    match &global[0] {
        Record::SecureFilter(filter) => {
            assert_eq!(filter.interface, "lan1");
            assert_eq!(filter.list.filters.last(), Some(&100099));
            assert_eq!(filter.list.filters.len(), 9);
        }
        other => panic!("unexpected record {other:?}"),
    }
    match &global[1] {
        Record::SecureFilter(filter) => {
            assert_eq!(filter.interface, "lan2");
            assert_eq!(filter.list.filters.len(), 8);
            assert_eq!(
                filter.list.dynamic,
                vec![200080, 200081, 200082, 200083, 200084, 200085]
            );
        }
        other => panic!("unexpected record {other:?}"),
    }

    let pp = &pps()[0];
    let filter_in = pp.secure_filter_in.as_ref().expect("pp filter in");
    assert_eq!(&filter_in.filters[7..], &[200030, 200032]);
    let filter_out = pp.secure_filter_out.as_ref().expect("pp filter out");
    assert_eq!(filter_out.filters.last(), Some(&200027));
    assert_eq!(filter_out.dynamic.len(), 6);
}

#[test]
fn scoped_lines_never_leak_into_global() {
    let parsed = parsed();
    let global = parsed.global();
    assert!(global.is_global());
    for line in global.canonical_lines() {
        assert!(!line.starts_with("ipsec tunnel"), "{line}");
        assert!(!line.starts_with("ip pp "), "{line}");
        assert!(!line.starts_with("l2tp "), "{line}");
    }

    let tunnel = parsed
        .scoped(ContextKind::Tunnel, ScopeId::Number(1))
        .expect("tunnel 1");
    assert_eq!(tunnel.scope, Scope::Scoped(ContextKind::Tunnel, ScopeId::Number(1)));
    assert!(
        tunnel
            .canonical_lines()
            .iter()
            .all(|line| !line.starts_with("ip filter"))
    );
    assert!(parsed.scoped(ContextKind::Tunnel, ScopeId::Number(3)).is_none());
}

#[test]
fn tunnels_carry_their_own_settings() {
    let tunnels = tunnels();
    let (l2tpv3, ipsec) = (&tunnels[0], &tunnels[1]);

    assert_eq!(l2tpv3.id, 1);
    assert_eq!(l2tpv3.encapsulation, Some(TunnelEncapsulation::L2tpv3));
    assert_eq!(l2tpv3.description.as_deref(), Some("tunnel to-branch"));
    assert_eq!(
        l2tpv3.l2tp.as_ref().and_then(|l2tp| l2tp.hostname.as_deref()),
        Some("hq-rtx1210")
    );
    assert_eq!(
        l2tpv3.secure_filter_in.as_ref().map(|list| list.filters.clone()),
        Some(vec![300030, 300039])
    );

    assert_eq!(ipsec.id, 2);
    assert_eq!(ipsec.l2tp, None);
    let settings = ipsec.ipsec.as_ref().expect("ipsec");
    assert_eq!(settings.tunnel_id, 102);
    assert_eq!(
        settings.keepalive.as_ref().and_then(|k| k.mode),
        Some(KeepaliveMode::Dpd)
    );
    assert_eq!(settings.remote_address.as_deref(), Some("any"));
    assert_eq!(ipsec.tcp_mss_limit, Some(MssLimit::Bytes(1350)));
    assert_eq!(ipsec.enabled, Some(true));
}

#[test]
fn anonymous_pp_is_its_own_scope() {
    let pps = pps();
    assert_eq!(pps[0].id, ScopeId::Number(1));
    assert_eq!(pps[0].nat_descriptor, Some(1000));
    assert_eq!(pps[1].id, ScopeId::Anonymous);
    assert_eq!(pps[1].bind.as_deref(), Some("tunnel10"));
    assert_eq!(pps[1].mtu, Some(1258));
    assert!(pps[1].auth_myname.is_none());
}

#[test]
fn global_entities_read_from_fixture() {
    let filters = records(EntityKind::IpFilter);
    match &filters[5] {
        Record::IpFilter(filter) => {
            assert_eq!(filter.number, 200026);
            assert_eq!(filter.action, FilterAction::Pass);
            assert!(filter.established);
        }
        other => panic!("unexpected record {other:?}"),
    }

    let dns: Vec<DnsServerSelect> = records(EntityKind::DnsServerSelect)
        .into_iter()
        .filter_map(|record| match record {
            Record::DnsServerSelect(select) => Some(select),
            _ => None,
        })
        .collect();
    assert_eq!(dns[0].servers[0].edns, Some(true));
    assert_eq!(dns[1].servers.len(), 2);
    assert_eq!(dns[1].restrict_pp, Some(1));
}

/// Renders records of one kind back into dump text. Every command after
/// the first of a record is indented, as the router prints context bodies.
fn render(registry: &Registry, records: &[Record]) -> String {
    let mut text = String::new();
    for record in records {
        for (i, line) in registry.build(record).expect("build").iter().enumerate() {
            if i > 0 && record.kind().context().is_some() {
                text.push(' ');
            }
            text.push_str(line);
            text.push('\n');
        }
    }
    text
}

#[test]
fn every_kind_round_trips_through_builders() {
    let registry = Registry::builtin();
    let parsed = parsed();
    for kind in EntityKind::ALL {
        let original = registry.extract(kind, &parsed).expect("extract");
        let text = render(&registry, &original);
        let reparsed = registry
            .extract(kind, &ParsedConfig::parse(&text, &WrapConfig::default()))
            .expect("reparse");
        assert_eq!(reparsed, original, "{kind}");
    }
}

#[test]
fn records_survive_json() {
    for kind in EntityKind::ALL {
        for record in records(kind) {
            let json = serde_json::to_string(&record).expect("serialize");
            let back: Record = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, record);
        }
    }
}

#[test]
fn implausible_splice_is_reported_with_its_line() {
    let text = "ip lan1 secure filter in 100000 1000000000\n00 100099\n";
    let err = match Registry::builtin().extract(
        EntityKind::SecureFilter,
        &ParsedConfig::parse(text, &WrapConfig::default()),
    ) {
        Ok(_) => panic!("spliced number is out of range"),
        Err(err) => err,
    };
    assert_eq!(
        err,
        ConfigError::SuspectReassembly {
            line_no: 2,
            token: "100000000000".to_string(),
            min: 1,
            max: 2_147_483_647,
        }
    );
}

#[test]
fn column_width_limits_continuations() {
    let wrap = WrapConfig {
        column_width: Some(80),
        ..WrapConfig::default()
    };
    // A short line cannot have been wrapped, so the next line stands alone.
    let lines = LineReassembler::new(wrap).reassemble("ip lan1 secure filter in 10\n20 30\n");
    assert_eq!(lines.len(), 2);
}
