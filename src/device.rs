//! Prompt and output classification for RTX router shells.
//!
//! The RTX CLI only has two prompt levels, the login user prompt (`> `) and the
//! administrator prompt (`# `). Besides prompts the session has to react to a
//! few interactive requests: the administrator password, the "save new
//! configuration" question printed when leaving administrator mode, and the
//! pager. Every other line is command output, optionally marked as an error.

use log::trace;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConnectError;

/// What the last line read from the shell represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShellState {
    /// Plain command output.
    Output,
    /// Pager line waiting for a key press.
    More,
    /// Error message printed by the router.
    Error,
    /// Login user prompt (`>`).
    User,
    /// Administrator prompt (`#`).
    Administrator,
    /// `Password:` request after `administrator`.
    PasswordRequest,
    /// `(Y/N)` question, printed when leaving with unsaved changes.
    SaveConfirm,
}

impl ShellState {
    pub fn is_prompt(self) -> bool {
        matches!(self, ShellState::User | ShellState::Administrator)
    }
}

// Patterns are matched in order; the first hit wins. Prompts require a trailing
// space so the bare `#` separator lines of a configuration dump never match.
const STATE_PATTERNS: &[(ShellState, &str)] = &[
    (ShellState::More, r"^\s*-{2,}\s*(more|MORE|つづく)\s*-{2,}"),
    (ShellState::Error, r"^(Error|エラー)\s*:"),
    (ShellState::Error, r"^(Invalid|Incorrect|Unrecognized) "),
    (ShellState::PasswordRequest, r"^\s*Password:\s*$"),
    (ShellState::SaveConfirm, r"(?i)\(\s*y\s*/\s*n\s*\)\s*:?\s*$"),
    (ShellState::User, r"^(\[[^\]]*\]\s*)?[\w.\-]*> +$"),
    (ShellState::Administrator, r"^(\[[^\]]*\]\s*)?[\w.\-]*# +$"),
];

static STATE_REGEX: Lazy<RegexSet> = Lazy::new(|| {
    match RegexSet::new(STATE_PATTERNS.iter().map(|(_, pattern)| *pattern)) {
        Ok(set) => set,
        Err(err) => panic!("invalid shell state regex: {err}"),
    }
});

/// Strips carriage-return and backspace runs the router uses to redraw lines.
pub static IGNORE_START_LINE: Lazy<Regex> =
    Lazy::new(
        || match Regex::new(r"^(\r+(\s+\r+)*)|(\u{8}+(\s+\u{8}+)*)") {
            Ok(re) => re,
            Err(err) => panic!("invalid IGNORE_START_LINE regex: {err}"),
        },
    );

/// ANSI escape sequences emitted by some firmware revisions.
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| match Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]") {
    Ok(re) => re,
    Err(err) => panic!("invalid ANSI_ESCAPE regex: {err}"),
});

/// Removes terminal control noise from a chunk of shell output.
pub fn clean_output(data: &str) -> String {
    let without_ansi = ANSI_ESCAPE.replace_all(data, "");
    without_ansi.replace('\0', "")
}

/// Tracks the shell state of one RTX session from the lines it prints.
#[derive(Debug, Clone)]
pub struct RtxShellHandler {
    current: ShellState,

    /// Last prompt text matched.
    current_prompt: Option<String>,

    /// Prompt level seen most recently, kept while output lines stream by.
    last_prompt_state: Option<ShellState>,

    /// Set once an error line has been read since the last reset.
    saw_error: bool,

    /// Error lines collected since the last reset.
    error_lines: Vec<String>,

    /// The administrator password has been answered in this exchange.
    password_sent: bool,
}

impl Default for RtxShellHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RtxShellHandler {
    pub fn new() -> Self {
        Self {
            current: ShellState::Output,
            current_prompt: None,
            last_prompt_state: None,
            saw_error: false,
            error_lines: Vec::new(),
            password_sent: false,
        }
    }

    /// Classifies a line without changing any state.
    pub fn classify(line: &str) -> ShellState {
        STATE_REGEX
            .matches(line)
            .into_iter()
            .next()
            .and_then(|index| STATE_PATTERNS.get(index))
            .map(|(state, _)| *state)
            .unwrap_or(ShellState::Output)
    }

    /// Reads a line of output and updates the current state.
    pub fn read(&mut self, line: &str) {
        trace!("Read line: '{:?}'", line);
        let state = Self::classify(line);
        trace!("Converted to state: '{:?}'", state);
        if state == ShellState::Error {
            self.saw_error = true;
            self.error_lines.push(line.trim().to_string());
        }
        if state.is_prompt() {
            self.current_prompt = Some(line.to_string());
            self.last_prompt_state = Some(state);
        }
        self.current = state;
    }

    /// Returns true and records the prompt when `buffer` is a shell prompt.
    pub fn read_prompt(&mut self, buffer: &str) -> bool {
        if Self::classify(buffer).is_prompt() {
            self.read(buffer);
            return true;
        }
        false
    }

    /// Returns the input the shell is waiting for, if `buffer` is a question.
    ///
    /// The administrator password is answered once per exchange. A second
    /// request means the router refused it and fails with
    /// [`ConnectError::PrivilegeRejected`]. A password request without a
    /// password is left for the caller to time out on.
    pub fn read_need_write(
        &mut self,
        buffer: &str,
        admin_password: Option<&str>,
    ) -> Result<Option<String>, ConnectError> {
        let answer = match Self::classify(buffer) {
            ShellState::More => Some(" ".to_string()),
            ShellState::SaveConfirm => Some("N\r".to_string()),
            ShellState::PasswordRequest if admin_password.is_some() && self.password_sent => {
                self.read(buffer);
                return Err(ConnectError::PrivilegeRejected(
                    "administrator password requested again".to_string(),
                ));
            }
            ShellState::PasswordRequest => admin_password.map(|pw| {
                self.password_sent = true;
                format!("{pw}\r")
            }),
            _ => None,
        };
        if answer.is_some() {
            self.read(buffer);
        }
        Ok(answer)
    }

    pub fn current_state(&self) -> ShellState {
        self.current
    }

    pub fn current_prompt(&self) -> Option<&str> {
        self.current_prompt.as_deref()
    }

    /// Whether the most recent prompt was the administrator prompt.
    pub fn is_administrator(&self) -> bool {
        self.last_prompt_state == Some(ShellState::Administrator)
    }

    pub fn error(&self) -> bool {
        self.saw_error
    }

    pub fn error_lines(&self) -> &[String] {
        &self.error_lines
    }

    /// Clears the error flag before a new command is sent.
    pub fn reset_error(&mut self) {
        self.saw_error = false;
        self.error_lines.clear();
    }

    /// Clears per-exchange state before a new command is sent.
    pub fn begin_exchange(&mut self) {
        self.reset_error();
        self.password_sent = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{RtxShellHandler, ShellState, clean_output};
    use crate::error::ConnectError;

    #[test]
    fn user_and_administrator_prompts_are_recognized() {
        assert_eq!(RtxShellHandler::classify("> "), ShellState::User);
        assert_eq!(RtxShellHandler::classify("[RTX1210] > "), ShellState::User);
        assert_eq!(RtxShellHandler::classify("# "), ShellState::Administrator);
        assert_eq!(
            RtxShellHandler::classify("[RTX830] # "),
            ShellState::Administrator
        );
    }

    #[test]
    fn bare_comment_separator_is_not_a_prompt() {
        assert_eq!(RtxShellHandler::classify("#"), ShellState::Output);
        assert_eq!(RtxShellHandler::classify("# Admin"), ShellState::Output);
        assert_eq!(
            RtxShellHandler::classify("ip filter 1 pass * * * * *"),
            ShellState::Output
        );
    }

    #[test]
    fn error_state_is_detected_after_error_line() {
        let mut handler = RtxShellHandler::new();
        handler.read("Error: Invalid parameter");
        assert!(handler.error());
        assert_eq!(handler.current_state(), ShellState::Error);
        assert_eq!(handler.error_lines(), ["Error: Invalid parameter"]);

        handler.reset_error();
        assert!(!handler.error());
        assert!(handler.error_lines().is_empty());
    }

    #[test]
    fn prompt_level_survives_output_lines() {
        let mut handler = RtxShellHandler::new();
        assert!(handler.read_prompt("# "));
        handler.read("some output");
        assert!(handler.is_administrator());
        assert_eq!(handler.current_prompt(), Some("# "));
        assert_eq!(handler.current_state(), ShellState::Output);

        assert!(handler.read_prompt("> "));
        assert!(!handler.is_administrator());
    }

    #[test]
    fn password_request_uses_supplied_password() {
        let mut handler = RtxShellHandler::new();
        assert_eq!(
            handler
                .read_need_write("Password: ", Some("secret"))
                .expect("first request"),
            Some("secret\r".to_string())
        );
        assert_eq!(handler.current_state(), ShellState::PasswordRequest);

        let mut without = RtxShellHandler::new();
        assert_eq!(
            without
                .read_need_write("Password: ", None)
                .expect("no password"),
            None
        );
    }

    #[test]
    fn repeated_password_request_is_a_rejection() {
        let mut handler = RtxShellHandler::new();
        handler.begin_exchange();
        handler
            .read_need_write("Password: ", Some("wrong"))
            .expect("first request");
        handler.read("Password incorrect.");

        let err = match handler.read_need_write("Password: ", Some("wrong")) {
            Ok(answer) => panic!("password sent twice: {answer:?}"),
            Err(err) => err,
        };
        assert!(matches!(err, ConnectError::PrivilegeRejected(_)));
        assert!(!err.is_retryable());

        // The next exchange may answer again.
        handler.begin_exchange();
        assert_eq!(
            handler
                .read_need_write("Password: ", Some("secret"))
                .expect("new exchange"),
            Some("secret\r".to_string())
        );
    }

    #[test]
    fn save_question_is_declined() {
        let mut handler = RtxShellHandler::new();
        assert_eq!(
            handler
                .read_need_write("Save new configuration ? (Y/N)", None)
                .expect("save question"),
            Some("N\r".to_string())
        );
        assert_eq!(handler.current_state(), ShellState::SaveConfirm);
    }

    #[test]
    fn clean_output_strips_escape_sequences() {
        assert_eq!(clean_output("\x1b[2Kip route\0 default"), "ip route default");
    }
}
