use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    pub(crate) fn parse(tokens: &mut Tokens<'_>) -> Result<Self, ConfigError> {
        match tokens.expect_one_of("direction", &["in", "out"])? {
            "in" => Ok(Direction::In),
            _ => Ok(Direction::Out),
        }
    }
}

/// Static filter numbers followed by dynamic filter numbers, as in
/// `10 11 12 dynamic 100 101`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FilterList {
    #[serde(default)]
    pub filters: Vec<u32>,
    #[serde(default)]
    pub dynamic: Vec<u32>,
}

impl FilterList {
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.dynamic.is_empty()
    }

    /// Consumes the rest of the line as a filter list.
    pub(crate) fn parse(tokens: &mut Tokens<'_>) -> Result<Self, ConfigError> {
        let mut list = FilterList::default();
        while let Some(token) = tokens.peek() {
            if token == "dynamic" {
                break;
            }
            list.filters.push(filter_number(tokens)?);
        }
        if tokens.next_if_eq("dynamic") {
            while !tokens.is_empty() {
                list.dynamic.push(filter_number(tokens)?);
            }
            if list.dynamic.is_empty() {
                return Err(tokens.error("'dynamic' without filter numbers"));
            }
        }
        if list.is_empty() {
            return Err(tokens.error("empty filter list"));
        }
        Ok(list)
    }

    pub(crate) fn render(&self, entity: EntityKind) -> Result<String, ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::build(entity.name(), "empty filter list"));
        }
        let mut parts = Vec::with_capacity(self.filters.len() + self.dynamic.len() + 1);
        for number in &self.filters {
            require_range(entity, "filter number", u64::from(*number), FILTER_NUMBERS)?;
            parts.push(number.to_string());
        }
        if !self.dynamic.is_empty() {
            parts.push("dynamic".to_string());
            for number in &self.dynamic {
                require_range(entity, "dynamic filter number", u64::from(*number), FILTER_NUMBERS)?;
                parts.push(number.to_string());
            }
        }
        Ok(parts.join(" "))
    }
}

fn filter_number(tokens: &mut Tokens<'_>) -> Result<u32, ConfigError> {
    let value = tokens.expect_number_in("filter number", FILTER_NUMBERS)?;
    u32::try_from(value).map_err(|_| tokens.error("filter number overflow"))
}

/// `ip <interface> secure filter <in|out> <list>` outside any context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecureFilter {
    pub interface: String,
    pub direction: Direction,
    #[serde(flatten)]
    pub list: FilterList,
}

impl Extract for SecureFilter {
    fn extract(block: &ContextBlock) -> Result<Vec<Self>, ConfigError> {
        let mut records = Vec::new();
        for line in &block.lines {
            let mut tokens = Tokens::new(line);
            if tokens.peek() != Some("ip")
                || tokens.peek_nth(2) != Some("secure")
                || tokens.peek_nth(3) != Some("filter")
            {
                continue;
            }
            tokens.next();
            let interface = tokens.expect("interface")?.to_string();
            tokens.eat_prefix(&["secure", "filter"]);
            let direction = Direction::parse(&mut tokens)?;
            let list = FilterList::parse(&mut tokens)?;
            records.push(SecureFilter {
                interface,
                direction,
                list,
            });
        }
        Ok(records)
    }
}

impl Build for SecureFilter {
    fn build(&self) -> Result<Vec<String>, ConfigError> {
        require_token(Self::KIND, "interface", &self.interface)?;
        Ok(vec![format!(
            "ip {} secure filter {} {}",
            self.interface,
            self.direction.as_str(),
            self.list.render(Self::KIND)?
        )])
    }

    fn delete_commands(&self) -> Vec<String> {
        vec![format!(
            "no ip {} secure filter {}",
            self.interface,
            self.direction.as_str()
        )]
    }
}

impl Entity for SecureFilter {
    const KIND: EntityKind = EntityKind::SecureFilter;

    fn from_record(record: &Record) -> Option<&Self> {
        match record {
            Record::SecureFilter(filter) => Some(filter),
            _ => None,
        }
    }
}

impl From<SecureFilter> for Record {
    fn from(filter: SecureFilter) -> Self {
        Record::SecureFilter(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, FilterList, SecureFilter};
    use crate::entity::{Build, Extract};
    use crate::error::ConfigError;
    use crate::parser::{ParsedConfig, WrapConfig};

    fn extract(text: &str) -> Result<Vec<SecureFilter>, ConfigError> {
        let parsed = ParsedConfig::parse(text, &WrapConfig::default());
        SecureFilter::extract(&parsed.global())
    }

    #[test]
    fn reads_static_and_dynamic_lists() {
        let filters = extract(
            "ip lan2 secure filter in 200020 200021 200099\n\
             ip lan2 secure filter out 200099 dynamic 200080 200081\n\
             ip filter 200020 reject 10.0.0.0/8 * * * *\n",
        )
        .expect("extract");
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].direction, Direction::In);
        assert_eq!(filters[0].list.filters, vec![200020, 200021, 200099]);
        assert!(filters[0].list.dynamic.is_empty());
        assert_eq!(filters[1].list.dynamic, vec![200080, 200081]);
    }

    #[test]
    fn wrapped_list_splits_after_reassembly() {
        let filters = extract("ip lan2 secure filter in 200020 20010\n0 200102\n").expect("extract");
        assert_eq!(filters[0].list.filters, vec![200020, 200100, 200102]);
        assert_eq!(
            filters[0].build().expect("build"),
            vec!["ip lan2 secure filter in 200020 200100 200102"]
        );
    }

    #[test]
    fn wrapped_dynamic_keyword_is_separated() {
        let filters =
            extract("ip lan2 secure filter out 200099 200098\ndynamic 200080\n").expect("extract");
        assert_eq!(filters[0].list.filters, vec![200099, 200098]);
        assert_eq!(filters[0].list.dynamic, vec![200080]);
    }

    #[test]
    fn bad_splice_is_flagged_not_accepted() {
        let err = match extract("ip lan2 secure filter in 2000000000\n1 5\n") {
            Ok(_) => panic!("20000000001 exceeds the filter range"),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            ConfigError::SuspectReassembly { line_no: 2, ref token, .. } if token == "20000000001"
        ));
    }

    #[test]
    fn non_numeric_entry_is_a_parse_error() {
        let err = match extract("ip lan1 secure filter in 10 abc\n") {
            Ok(_) => panic!("abc is not a filter number"),
            Err(err) => err,
        };
        match err {
            ConfigError::Parse { line_no, line, .. } => {
                assert_eq!(line_no, 1);
                assert_eq!(line, "ip lan1 secure filter in 10 abc");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn dynamic_only_list_round_trips() {
        let filters = extract("ip lan1 secure filter out dynamic 100 101\n").expect("extract");
        assert!(filters[0].list.filters.is_empty());
        assert_eq!(
            filters[0].build().expect("build"),
            vec!["ip lan1 secure filter out dynamic 100 101"]
        );
        assert_eq!(
            filters[0].delete_commands(),
            vec!["no ip lan1 secure filter out"]
        );
    }

    #[test]
    fn builder_rejects_empty_list() {
        let filter = SecureFilter {
            interface: "lan1".to_string(),
            direction: Direction::In,
            list: FilterList::default(),
        };
        assert!(matches!(filter.build(), Err(ConfigError::Build { .. })));
    }
}
