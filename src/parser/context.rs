use super::*;

/// The kinds of sub-context a configuration dump can enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    Tunnel,
    Pp,
}

impl ContextKind {
    pub const ALL: [ContextKind; 2] = [ContextKind::Tunnel, ContextKind::Pp];

    /// Command keyword that selects this context (`tunnel select 1`).
    pub fn keyword(self) -> &'static str {
        match self {
            ContextKind::Tunnel => "tunnel",
            ContextKind::Pp => "pp",
        }
    }

    /// Prefixes of commands that belong to the context even when the dump
    /// prints them without indentation.
    fn contextual_prefixes(self) -> &'static [&'static str] {
        match self {
            ContextKind::Tunnel => &["tunnel ", "ipsec ", "l2tp ", "description ", "ip tunnel "],
            ContextKind::Pp => &["pp ", "pppoe ", "ppp ", "ip pp ", "description "],
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        ContextKind::ALL.into_iter().find(|kind| kind.keyword() == word)
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Identifier of a selected context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScopeId {
    Number(u32),
    /// `pp select anonymous`
    Anonymous,
}

impl ScopeId {
    pub fn parse(token: &str) -> Option<Self> {
        if token == "anonymous" {
            return Some(ScopeId::Anonymous);
        }
        match token.parse::<u32>() {
            Ok(n) if n > 0 => Some(ScopeId::Number(n)),
            _ => None,
        }
    }

    pub fn number(self) -> Option<u32> {
        match self {
            ScopeId::Number(n) => Some(n),
            ScopeId::Anonymous => None,
        }
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeId::Number(n) => write!(f, "{n}"),
            ScopeId::Anonymous => f.write_str("anonymous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Scoped(ContextKind, ScopeId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Scoped(kind, id) => write!(f, "{kind} {id}"),
        }
    }
}

/// Lines of configuration that belong to one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub scope: Scope,
    pub lines: Vec<LogicalLine>,
}

impl ContextBlock {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            lines: Vec::new(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.scope == Scope::Global
    }

    /// The scope's lines with indentation removed, as builders render them.
    pub fn canonical_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| line.text.trim().to_string())
            .collect()
    }
}

enum Transition {
    Enter(ContextKind, ScopeId),
    Exit(ContextKind),
}

fn transition(text: &str) -> Option<Transition> {
    let words: Vec<&str> = text.split_whitespace().collect();
    match words.as_slice() {
        ["no", keyword, "select", ..] => ContextKind::from_keyword(keyword).map(Transition::Exit),
        [keyword, "select", "none"] => ContextKind::from_keyword(keyword).map(Transition::Exit),
        [keyword, "select", id] => {
            let kind = ContextKind::from_keyword(keyword)?;
            ScopeId::parse(id).map(|id| Transition::Enter(kind, id))
        }
        [keyword, "enable" | "disable", _, ..] => {
            ContextKind::from_keyword(keyword).map(Transition::Exit)
        }
        _ => None,
    }
}

/// Splits a stream of logical lines into [`ContextBlock`]s.
///
/// Selecting a context always starts a new block at the same depth; the
/// router has no nested contexts. The lines that enter and leave a context
/// are kept in that context's block.
#[derive(Debug)]
pub struct ContextTracker {
    blocks: Vec<ContextBlock>,
    current: ContextBlock,
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTracker {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            current: ContextBlock::new(Scope::Global),
        }
    }

    pub fn track(lines: impl IntoIterator<Item = LogicalLine>) -> Vec<ContextBlock> {
        let mut tracker = ContextTracker::new();
        for line in lines {
            tracker.push(line);
        }
        tracker.finish()
    }

    pub fn scope(&self) -> Scope {
        self.current.scope
    }

    pub fn push(&mut self, line: LogicalLine) {
        let trimmed = line.text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }

        match transition(trimmed) {
            Some(Transition::Enter(kind, id)) => {
                self.switch(Scope::Scoped(kind, id));
                self.current.lines.push(line);
            }
            Some(Transition::Exit(kind)) => {
                if !matches!(self.current.scope, Scope::Scoped(active, _) if active == kind) {
                    self.switch(Scope::Global);
                }
                self.current.lines.push(line);
                self.switch(Scope::Global);
            }
            None => {
                if let Scope::Scoped(kind, _) = self.current.scope {
                    let indented = line.text.starts_with(char::is_whitespace);
                    if !indented
                        && !kind
                            .contextual_prefixes()
                            .iter()
                            .any(|prefix| trimmed.starts_with(prefix))
                    {
                        trace!("'{}' leaves {}", trimmed, self.current.scope);
                        self.switch(Scope::Global);
                    }
                }
                self.current.lines.push(line);
            }
        }
    }

    pub fn finish(mut self) -> Vec<ContextBlock> {
        self.flush();
        self.blocks
    }

    fn switch(&mut self, scope: Scope) {
        if self.current.scope == scope && scope == Scope::Global {
            return;
        }
        self.flush();
        self.current = ContextBlock::new(scope);
    }

    fn flush(&mut self) {
        if !self.current.lines.is_empty() {
            let block = std::mem::replace(&mut self.current, ContextBlock::new(Scope::Global));
            self.blocks.push(block);
        }
    }
}
