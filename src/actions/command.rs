//! Decoding model output into a [`Command`].
//!
//! Model replies are free text. They may wrap the answer in markdown fences,
//! split it into `<think>`/`<answer>` sections, or restate earlier calls
//! while reasoning before emitting the real one. The parser locates the last
//! `do(...)` or `finish(...)` call in the text and validates it into a
//! closed [`Action`] variant.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Upper bound of the normalized coordinate space.
pub const NORMALIZED_MAX: u16 = 1000;

/// Command parse errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No recognizable command in model output")]
    NoCommand,
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Action {action} needs {needed} coordinates, found {found}")]
    MissingCoordinates {
        action: &'static str,
        needed: usize,
        found: usize,
    },
    #[error("Coordinate {0} is outside the 0-1000 range")]
    CoordinateOutOfRange(u64),
    #[error("Launch without an app name")]
    MissingApp,
    #[error("Input without text")]
    MissingText,
}

/// A position on the 0-1000 normalized grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedPoint {
    pub x: u16,
    pub y: u16,
}

impl NormalizedPoint {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for NormalizedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// The action vocabulary the agent can execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Tap { at: NormalizedPoint },
    Swipe { from: NormalizedPoint, to: NormalizedPoint },
    Back,
    Home,
    Launch { app: String },
    Input { text: String },
    Finish,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Tap { .. } => "Tap",
            Action::Swipe { .. } => "Swipe",
            Action::Back => "Back",
            Action::Home => "Home",
            Action::Launch { .. } => "Launch",
            Action::Input { .. } => "Input",
            Action::Finish => "Finish",
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Action::Finish)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Tap { at } => write!(f, "Tap {}", at),
            Action::Swipe { from, to } => write!(f, "Swipe {} -> {}", from, to),
            Action::Launch { app } => write!(f, "Launch [{}]", app),
            Action::Input { text } => write!(f, "Input \"{}\"", text),
            other => f.write_str(other.name()),
        }
    }
}

/// A decoded instruction from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Model rationale. Equals the whole reply when it has no think section.
    pub thought: String,
    pub action: Action,
}

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").unwrap());
static CALL_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(do|finish)\s*\(").unwrap());
static ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\baction\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static APP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bapp\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\btext\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static COORDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*(\d+(?:\s*,\s*\d+)*)\s*\]").unwrap());
static FINISH_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)finish").unwrap());

/// Parse a model reply into a [`Command`].
///
/// # Arguments
/// * `response` - Raw text content returned by the model.
///
/// # Returns
/// The command from the last structured call, a parameterless finish when
/// only the finish keyword is present, or a [`ParseError`].
pub fn parse_command(response: &str) -> Result<Command, ParseError> {
    let text = strip_fences(response);
    let (thinking, _) = split_think_answer(&text);
    let thought = if thinking.is_empty() {
        response.to_string()
    } else {
        thinking
    };

    if let Some(call) = last_call(&text) {
        let action = match call.kind {
            CallKind::Finish => Some(Action::Finish),
            CallKind::Do => parse_do_call(call.body)?,
        };
        if let Some(action) = action {
            return Ok(Command { thought, action });
        }
    }

    if FINISH_WORD_RE.is_match(&text) {
        return Ok(Command {
            thought,
            action: Action::Finish,
        });
    }

    Err(ParseError::NoCommand)
}

/// Remove markdown code-fence markers, keeping their contents.
pub fn strip_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Split `<think>...</think><answer>...</answer>` output.
///
/// Returns `(thinking, answer)`; thinking is empty when there is no answer tag.
pub fn split_think_answer(content: &str) -> (String, String) {
    if !content.contains("<answer>") {
        return (String::new(), content.to_string());
    }

    let parts: Vec<&str> = content.splitn(2, "<answer>").collect();
    let thinking = parts[0]
        .replace("<think>", "")
        .replace("</think>", "")
        .trim()
        .to_string();
    let answer = parts
        .get(1)
        .map(|s| s.replace("</answer>", "").trim().to_string())
        .unwrap_or_default();

    (thinking, answer)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Do,
    Finish,
}

#[derive(Debug)]
struct Call<'a> {
    kind: CallKind,
    /// Text between the parentheses.
    body: &'a str,
}

/// Find the last complete `do(...)`/`finish(...)` call.
///
/// Scanning resumes after each complete call, so a call name inside an
/// earlier call's quoted argument is never taken as a call of its own.
fn last_call(text: &str) -> Option<Call<'_>> {
    let mut last = None;
    let mut pos = 0;

    while let Some(caps) = CALL_START_RE.captures_at(text, pos) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        let kind = match &caps[1] {
            "do" => CallKind::Do,
            _ => CallKind::Finish,
        };
        let body_start = whole.end();
        match matching_paren(&text[body_start..]) {
            Some(len) => {
                let body_end = body_start + len;
                last = Some(Call {
                    kind,
                    body: &text[body_start..body_end],
                });
                pos = body_end + 1;
            }
            None => pos = body_start,
        }
    }

    last
}

/// Byte offset of the `)` closing a call whose `(` was just consumed.
///
/// Parentheses inside quoted strings do not count.
fn matching_paren(rest: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;

    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn quoted(re: &Regex, body: &str) -> Option<String> {
    re.captures(body)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
}

fn coordinates(body: &str) -> Result<Vec<u16>, ParseError> {
    let mut values = Vec::new();
    for caps in COORDS_RE.captures_iter(body) {
        for raw in caps[1].split(',') {
            let raw = raw.trim();
            // \d+ guarantees digits; only overflow can fail here.
            let value: u64 = raw.parse().unwrap_or(u64::MAX);
            if value > u64::from(NORMALIZED_MAX) {
                return Err(ParseError::CoordinateOutOfRange(value));
            }
            values.push(value as u16);
        }
    }
    Ok(values)
}

/// Decode the body of a `do(...)` call. `None` when it names no action.
fn parse_do_call(body: &str) -> Result<Option<Action>, ParseError> {
    let Some(keyword) = quoted(&ACTION_RE, body) else {
        return Ok(None);
    };
    let coords = coordinates(body)?;

    let action = match keyword.trim().to_lowercase().as_str() {
        "tap" | "click" => {
            require_coords("Tap", &coords, 2)?;
            Action::Tap {
                at: NormalizedPoint::new(coords[0], coords[1]),
            }
        }
        "swipe" | "scroll" => {
            require_coords("Swipe", &coords, 4)?;
            Action::Swipe {
                from: NormalizedPoint::new(coords[0], coords[1]),
                to: NormalizedPoint::new(coords[2], coords[3]),
            }
        }
        "back" => Action::Back,
        "home" => Action::Home,
        "launch" | "open" => match quoted(&APP_RE, body) {
            Some(app) if !app.trim().is_empty() => Action::Launch {
                app: app.trim().to_string(),
            },
            _ => return Err(ParseError::MissingApp),
        },
        "input" | "type" | "type_name" => match quoted(&TEXT_RE, body) {
            Some(text) if !text.is_empty() => Action::Input { text },
            _ => return Err(ParseError::MissingText),
        },
        "finish" => Action::Finish,
        _ => return Err(ParseError::UnknownAction(keyword)),
    };

    Ok(Some(action))
}

fn require_coords(action: &'static str, coords: &[u16], needed: usize) -> Result<(), ParseError> {
    if coords.len() < needed {
        return Err(ParseError::MissingCoordinates {
            action,
            needed,
            found: coords.len(),
        });
    }
    Ok(())
}
