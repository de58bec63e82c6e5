use super::*;

/// How the router's terminal wraps long configuration lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WrapConfig {
    /// Terminal width the dump was captured at. When set, only a physical
    /// line that reaches `column_width - 1` characters can be continued.
    #[serde(default)]
    pub column_width: Option<usize>,
    /// Words that start a wrapped continuation and always follow a space.
    #[serde(default = "default_reserved_keywords")]
    pub reserved_keywords: Vec<String>,
}

fn default_reserved_keywords() -> Vec<String> {
    vec!["dynamic".to_string()]
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            column_width: None,
            reserved_keywords: default_reserved_keywords(),
        }
    }
}

/// A token created by joining two physical lines with no separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplicedToken {
    /// Physical line number (1-based) of the continuation.
    pub line_no: usize,
    pub token: String,
}

/// One line of configuration as the router meant it, before wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// First physical line number (1-based).
    pub line_no: usize,
    /// Last physical line number, equal to `line_no` for unwrapped lines.
    pub end_line_no: usize,
    pub text: String,
    pub spliced: Vec<SplicedToken>,
}

impl LogicalLine {
    fn new(line_no: usize, text: &str) -> Self {
        Self {
            line_no,
            end_line_no: line_no,
            text: text.to_string(),
            spliced: Vec::new(),
        }
    }

    pub fn is_wrapped(&self) -> bool {
        self.end_line_no != self.line_no
    }

    /// Whether `token` was produced by a no-separator join on this line.
    pub fn is_spliced(&self, token: &str) -> bool {
        self.spliced.iter().any(|s| s.token == token)
    }
}

enum Join {
    Glue,
    Splice,
    Space,
}

/// Rebuilds logical lines from a hard-wrapped dump.
///
/// A physical line continues the previous one when its trimmed text starts
/// with a digit, with `=` or with a reserved keyword. Digits on both sides of
/// the boundary (with no whitespace on either side) are taken as one number
/// cut in half. This is an approximation: a standalone token that happens to
/// begin with a digit right at the wrap column is joined onto the previous
/// number. Spliced tokens are recorded so that range validation further down
/// can report them as [`ConfigError::SuspectReassembly`].
#[derive(Debug, Clone, Default)]
pub struct LineReassembler {
    config: WrapConfig,
}

impl LineReassembler {
    pub fn new(config: WrapConfig) -> Self {
        Self { config }
    }

    pub fn reassemble(&self, text: &str) -> Vec<LogicalLine> {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        let mut lines: Vec<LogicalLine> = Vec::new();
        let mut current: Option<LogicalLine> = None;
        let mut last_physical_len = 0;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let join = match &current {
                Some(line) if self.can_wrap(last_physical_len) => self.join_kind(&line.text, raw),
                _ => None,
            };

            let joined = match (join, current.as_mut()) {
                (Some(join), Some(line)) => {
                    Self::join(line, raw, line_no, join);
                    trace!("line {} continues line {}: {:?}", line_no, line.line_no, line.text);
                    true
                }
                _ => false,
            };
            if !joined {
                lines.extend(current.take());
                current = Some(LogicalLine::new(line_no, raw));
            }
            last_physical_len = raw.chars().count();
        }

        lines.extend(current);
        lines
    }

    fn can_wrap(&self, physical_len: usize) -> bool {
        match self.config.column_width {
            Some(width) => physical_len + 1 >= width,
            None => true,
        }
    }

    fn join_kind(&self, current: &str, raw: &str) -> Option<Join> {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('=') {
            return Some(Join::Glue);
        }
        if self.starts_with_keyword(trimmed) {
            return Some(Join::Space);
        }
        if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        if current.ends_with(|c: char| c.is_ascii_digit())
            && raw.starts_with(|c: char| c.is_ascii_digit())
        {
            Some(Join::Splice)
        } else {
            Some(Join::Space)
        }
    }

    fn starts_with_keyword(&self, trimmed: &str) -> bool {
        self.config.reserved_keywords.iter().any(|keyword| {
            trimmed
                .strip_prefix(keyword.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        })
    }

    fn join(line: &mut LogicalLine, raw: &str, line_no: usize, join: Join) {
        match join {
            Join::Glue => {
                line.text.truncate(line.text.trim_end().len());
                line.text.push_str(raw.trim());
            }
            Join::Space => {
                line.text.truncate(line.text.trim_end().len());
                line.text.push(' ');
                line.text.push_str(raw.trim());
            }
            Join::Splice => {
                let head = line
                    .text
                    .rsplit(char::is_whitespace)
                    .next()
                    .unwrap_or_default();
                let tail = raw.split(char::is_whitespace).next().unwrap_or_default();
                line.spliced.push(SplicedToken {
                    line_no,
                    token: format!("{head}{tail}"),
                });
                line.text.push_str(raw.trim_end());
            }
        }
        line.end_line_no = line_no;
    }
}
