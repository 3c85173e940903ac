// src/bundle/parse.rs

//! Dependency extraction from script sources.
//!
//! This is a scanner, not a parser: it understands exactly enough of the
//! language (comments, string and template literals, regular expression
//! literals) to find `require('literal')` calls that are real code.

use std::fmt;

/// A static `require` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    pub specifier: String,
    pub line: usize,
    pub column: usize,
}

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Everything the scanner found in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Static requires in source order, repeats included.
    pub requires: Vec<Require>,
    /// `require(...)` calls whose argument is not a single string literal.
    pub dynamic: Vec<Position>,
}

impl Scan {
    /// Distinct specifiers in order of first appearance.
    pub fn specifiers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for req in &self.requires {
            if !seen.contains(&req.specifier.as_str()) {
                seen.push(&req.specifier);
            }
        }
        seen
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub position: Position,
    pub message: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

/// Keywords after which a `/` starts a regular expression.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "instanceof", "new", "delete", "void",
    "throw", "yield", "await",
];

/// The last significant token, for the division/regex ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    Start,
    Punct(char),
    Word { regex_may_follow: bool },
}

impl Prev {
    fn regex_may_follow(self) -> bool {
        match self {
            Prev::Start => true,
            Prev::Punct(c) => "(,=:[!&|?{};+-*%<>~^".contains(c),
            Prev::Word { regex_may_follow } => regex_may_follow,
        }
    }
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// Positioned just after `/*`.
    fn skip_block_comment(&mut self, start: Position) -> Result<(), ScanError> {
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    return Err(ScanError {
                        position: start,
                        message: "unterminated block comment".to_string(),
                    });
                }
            }
        }
    }

    /// Positioned just after the opening quote. An unterminated string ends
    /// at the line break; it is the engine's problem, not ours.
    fn skip_string(&mut self, quote: char) {
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' => return,
                c if c == quote => {
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Skip literal template text, positioned just after the opening
    /// backtick or the `}` closing a substitution.
    fn skip_template_text(&mut self, start: Position) -> Result<TemplateStop, ScanError> {
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('`') => return Ok(TemplateStop::Closed),
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    return Ok(TemplateStop::Substitution);
                }
                Some(_) => {}
                None => return Err(unterminated_template(start)),
            }
        }
    }

    /// Try to skip a regular expression literal (positioned on the `/`).
    /// Restores the position and returns false when the line ends first.
    fn skip_regex(&mut self) -> bool {
        let saved = (self.pos, self.line, self.column);
        self.bump();
        let mut in_class = false;
        while let Some(c) = self.peek() {
            match c {
                '\n' => break,
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '[' => {
                    in_class = true;
                    self.bump();
                }
                ']' => {
                    in_class = false;
                    self.bump();
                }
                '/' if !in_class => {
                    self.bump();
                    while self.peek().is_some_and(is_ident_char) {
                        self.bump();
                    }
                    return true;
                }
                _ => {
                    self.bump();
                }
            }
        }
        (self.pos, self.line, self.column) = saved;
        false
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_char(c) {
                break;
            }
            word.push(c);
            self.bump();
        }
        word
    }

    /// Positioned right after the word `require`.
    fn scan_require_call(&mut self, at: Position, scan: &mut Scan) -> Result<(), ScanError> {
        self.skip_whitespace();
        if self.peek() != Some('(') {
            // A bare reference such as `typeof require`.
            return Ok(());
        }
        self.bump();
        self.skip_whitespace();

        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => {
                scan.dynamic.push(at);
                return Ok(());
            }
        };
        let literal_start = self.position();
        self.bump();

        let mut specifier = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        specifier.push(escaped);
                    }
                }
                Some('\n') | None => {
                    return Err(ScanError {
                        position: literal_start,
                        message: "unterminated string in require()".to_string(),
                    });
                }
                Some(c) => {
                    specifier.push(c);
                    self.bump();
                }
            }
        }

        self.skip_whitespace();
        if self.peek() == Some(')') {
            scan.requires.push(Require {
                specifier,
                line: at.line,
                column: at.column,
            });
        } else {
            // e.g. require('./locale/' + name)
            scan.dynamic.push(at);
        }
        Ok(())
    }
}

/// Where literal template text ended.
enum TemplateStop {
    Closed,
    /// At a `${`; code follows.
    Substitution,
}

/// An open template substitution: the template's start and the `{` depth
/// inside the substitution.
struct OpenTemplate {
    start: Position,
    depth: usize,
}

fn unterminated_template(start: Position) -> ScanError {
    ScanError {
        position: start,
        message: "unterminated template literal".to_string(),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Find the `require` calls of a script.
pub fn scan_requires(source: &str) -> Result<Scan, ScanError> {
    let mut sc = Scanner::new(source);
    let mut scan = Scan::default();
    let mut prev = Prev::Start;
    let mut templates: Vec<OpenTemplate> = Vec::new();

    if sc.peek() == Some('#') && sc.peek_at(1) == Some('!') {
        sc.skip_line();
    }

    while let Some(c) = sc.peek() {
        let start = sc.position();
        match c {
            c if c.is_whitespace() => {
                sc.bump();
            }
            '/' if sc.peek_at(1) == Some('/') => sc.skip_line(),
            '/' if sc.peek_at(1) == Some('*') => {
                sc.bump();
                sc.bump();
                sc.skip_block_comment(start)?;
            }
            '/' => {
                if !(prev.regex_may_follow() && sc.skip_regex()) {
                    sc.bump();
                    prev = Prev::Punct('/');
                    continue;
                }
                prev = Prev::Word {
                    regex_may_follow: false,
                };
            }
            '\'' | '"' => {
                sc.bump();
                sc.skip_string(c);
                prev = Prev::Word {
                    regex_may_follow: false,
                };
            }
            '`' => {
                sc.bump();
                prev = enter_template_text(&mut sc, start, &mut templates)?;
            }
            '{' if !templates.is_empty() => {
                sc.bump();
                if let Some(open) = templates.last_mut() {
                    open.depth += 1;
                }
                prev = Prev::Punct('{');
            }
            '}' if templates.last().is_some_and(|open| open.depth == 0) => {
                // End of a `${...}`: back to template text.
                sc.bump();
                if let Some(open) = templates.pop() {
                    prev = enter_template_text(&mut sc, open.start, &mut templates)?;
                }
            }
            '}' if !templates.is_empty() => {
                sc.bump();
                if let Some(open) = templates.last_mut() {
                    open.depth -= 1;
                }
                prev = Prev::Punct('}');
            }
            '+' | '-' if sc.peek_at(1) == Some(c) => {
                sc.bump();
                sc.bump();
                // After an operand this is postfix, and `x++ / 2` divides.
                let postfix = matches!(
                    prev,
                    Prev::Word {
                        regex_may_follow: false
                    } | Prev::Punct(')' | ']')
                );
                prev = if postfix {
                    Prev::Word {
                        regex_may_follow: false,
                    }
                } else {
                    Prev::Punct(c)
                };
            }
            c if is_ident_char(c) => {
                let word = sc.read_word();
                let member_access = prev == Prev::Punct('.');
                if word == "require" && !member_access {
                    sc.scan_require_call(start, &mut scan)?;
                }
                prev = Prev::Word {
                    regex_may_follow: REGEX_KEYWORDS.contains(&word.as_str()),
                };
            }
            other => {
                sc.bump();
                prev = Prev::Punct(other);
            }
        }
    }

    match templates.first() {
        Some(open) => Err(unterminated_template(open.start)),
        None => Ok(scan),
    }
}

/// Skip template text; on a `${`, remember the template and return to code.
fn enter_template_text(
    sc: &mut Scanner,
    start: Position,
    templates: &mut Vec<OpenTemplate>,
) -> Result<Prev, ScanError> {
    match sc.skip_template_text(start)? {
        TemplateStop::Closed => Ok(Prev::Word {
            regex_may_follow: false,
        }),
        TemplateStop::Substitution => {
            templates.push(OpenTemplate { start, depth: 0 });
            Ok(Prev::Punct('{'))
        }
    }
}

/// Check that a `.json` module is valid JSON.
pub fn validate_json(source: &str) -> Result<(), ScanError> {
    serde_json::from_str::<serde_json::Value>(source)
        .map(|_| ())
        .map_err(|err| ScanError {
            position: Position {
                line: err.line().max(1),
                column: err.column().max(1),
            },
            message: format!("invalid JSON: {err}"),
        })
}
