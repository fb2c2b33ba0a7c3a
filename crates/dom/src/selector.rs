//! Element matching
//!
//! [`ElementMatcher`] is the single seam every watcher matches through.
//! [`Selector`] is the CSS implementation; any `Fn(&DomArena, NodeId) -> bool`
//! is a matcher too, which keeps test predicates trivial.
//!
//! Supported grammar:
//!
//! ```text
//! list      := complex ("," complex)*
//! complex   := compound (combinator compound)*      combinator: ' ' '>' '+' '~'
//! compound  := (type | "*")? (#id | .class | [attr] | :pseudo)*
//! attr      := name (("=" | "~=" | "|=" | "^=" | "$=" | "*=") value)?
//! pseudo    := first-child | last-child | only-child | empty | not(list)
//! ```

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::NodeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Predicate over tree nodes: "is this node matched"
pub trait ElementMatcher {
    fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool;

    /// Human readable form for logs
    fn describe(&self) -> String {
        "<predicate>".to_string()
    }
}

impl<F> ElementMatcher for F
where
    F: Fn(&DomArena, NodeId) -> bool,
{
    fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool {
        self(arena, node_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    DashMatch(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrCondition {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    Not(Vec<Vec<Part>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    /// None means universal
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    compound: Compound,
    // Relation to the previous (left) part
    combinator: Option<Combinator>,
}

/// Parsed CSS selector list
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    groups: Vec<Vec<Part>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = Parser::new(source);
        let groups = parser.parse_list(None)?;
        if !parser.at_end() {
            return Err(parser.error("trailing input"));
        }
        Ok(Self {
            source: source.trim().to_string(),
            groups,
        })
    }

    /// Parse several selectors, failing on the first bad one
    pub fn parse_all<S: AsRef<str>>(sources: &[S]) -> Result<Vec<Self>> {
        sources.iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    /// Selector list matching whatever any of `selectors` matches
    pub fn union<'a, I>(selectors: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Selector>,
    {
        let mut sources = Vec::new();
        let mut groups = Vec::new();
        for selector in selectors {
            sources.push(selector.source.as_str());
            groups.extend(selector.groups.iter().cloned());
        }
        if groups.is_empty() {
            return None;
        }
        Some(Self {
            source: sources.join(","),
            groups,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl ElementMatcher for Selector {
    fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool {
        matches_list(arena, node_id, &self.groups)
    }

    fn describe(&self) -> String {
        self.source.clone()
    }
}

impl FromStr for Selector {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Selector {}

impl Hash for Selector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

// ---------------------------------------------------------------------------
// Matching (right to left)
// ---------------------------------------------------------------------------

fn matches_list(arena: &DomArena, node_id: NodeId, groups: &[Vec<Part>]) -> bool {
    groups
        .iter()
        .any(|parts| matches_complex(arena, node_id, parts))
}

fn matches_complex(arena: &DomArena, node_id: NodeId, parts: &[Part]) -> bool {
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };
    if !matches_compound(arena, node_id, &last.compound) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }

    match last.combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => arena
            .parent_id(node_id)
            .is_some_and(|parent| matches_complex(arena, parent, rest)),
        Combinator::Descendant => {
            let mut cursor = arena.parent_id(node_id);
            while let Some(ancestor) = cursor {
                if matches_complex(arena, ancestor, rest) {
                    return true;
                }
                cursor = arena.parent_id(ancestor);
            }
            false
        }
        Combinator::AdjacentSibling => arena
            .previous_element_sibling(node_id)
            .is_some_and(|sibling| matches_complex(arena, sibling, rest)),
        Combinator::GeneralSibling => {
            let mut cursor = arena.previous_element_sibling(node_id);
            while let Some(sibling) = cursor {
                if matches_complex(arena, sibling, rest) {
                    return true;
                }
                cursor = arena.previous_element_sibling(sibling);
            }
            false
        }
    }
}

fn matches_compound(arena: &DomArena, node_id: NodeId, compound: &Compound) -> bool {
    let Ok(node) = arena.get(node_id) else {
        return false;
    };
    if !node.is_element() {
        return false;
    }

    if let Some(tag) = &compound.tag {
        if !node.node_name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }

    if let Some(id) = &compound.id {
        if node.attr("id") != Some(id.as_str()) {
            return false;
        }
    }

    if !compound
        .classes
        .iter()
        .all(|class| node.classes().any(|c| c == class))
    {
        return false;
    }

    for cond in &compound.attrs {
        let Some(actual) = node.attr(&cond.name) else {
            return false;
        };
        let matched = match &cond.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => actual == v,
            AttrOp::Includes(v) => actual.split_ascii_whitespace().any(|w| w == v),
            AttrOp::DashMatch(v) => {
                actual == v || actual.strip_prefix(v.as_str()).is_some_and(|r| r.starts_with('-'))
            }
            AttrOp::Prefix(v) => !v.is_empty() && actual.starts_with(v.as_str()),
            AttrOp::Suffix(v) => !v.is_empty() && actual.ends_with(v.as_str()),
            AttrOp::Substring(v) => !v.is_empty() && actual.contains(v.as_str()),
        };
        if !matched {
            return false;
        }
    }

    compound.pseudos.iter().all(|pseudo| match pseudo {
        Pseudo::FirstChild => {
            arena.parent_id(node_id).is_some() && arena.previous_element_sibling(node_id).is_none()
        }
        Pseudo::LastChild => {
            arena.parent_id(node_id).is_some() && arena.next_element_sibling(node_id).is_none()
        }
        Pseudo::OnlyChild => {
            arena.parent_id(node_id).is_some()
                && arena.previous_element_sibling(node_id).is_none()
                && arena.next_element_sibling(node_id).is_none()
        }
        Pseudo::Empty => node.children_ids.iter().all(|&child| {
            arena
                .get(child)
                .map(|c| c.is_text() && c.node_value.is_empty())
                .unwrap_or(true)
        }),
        Pseudo::Not(groups) => !matches_list(arena, node_id, groups),
    })
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> DomError {
        DomError::invalid_selector(self.source, format!("{} at offset {}", reason, self.pos))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    /// Returns true if any whitespace was skipped
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn parse_list(&mut self, terminator: Option<char>) -> Result<Vec<Vec<Part>>> {
        let mut groups = Vec::new();
        loop {
            self.skip_ws();
            groups.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                None if terminator.is_none() => break,
                Some(c) if Some(c) == terminator => break,
                _ => return Err(self.error("unexpected character")),
            }
        }
        Ok(groups)
    }

    fn parse_complex(&mut self) -> Result<Vec<Part>> {
        let mut parts = vec![Part {
            compound: self.parse_compound()?,
            combinator: None,
        }];

        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') | Some(')') => break,
                Some('>') => Combinator::Child,
                Some('+') => Combinator::AdjacentSibling,
                Some('~') => Combinator::GeneralSibling,
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.error("unexpected character")),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_ws();
            }
            parts.push(Part {
                compound: self.parse_compound()?,
                combinator: Some(combinator),
            });
        }

        Ok(parts)
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let start = self.pos;
        let mut compound = Compound::default();

        if self.eat('*') {
            // universal
        } else if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.error("expected selector"));
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attr(&mut self) -> Result<AttrCondition> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();

        if self.eat(']') {
            return Ok(AttrCondition {
                name,
                op: AttrOp::Exists,
            });
        }

        let op_char = match self.peek() {
            Some('=') => None,
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.pos += 1;
                Some(c)
            }
            _ => return Err(self.error("expected attribute operator")),
        };
        self.expect('=')?;
        self.skip_ws();
        let value = self.parse_attr_value()?;
        self.skip_ws();
        self.expect(']')?;

        let op = match op_char {
            None => AttrOp::Equals(value),
            Some('~') => AttrOp::Includes(value),
            Some('|') => AttrOp::DashMatch(value),
            Some('^') => AttrOp::Prefix(value),
            Some('$') => AttrOp::Suffix(value),
            _ => AttrOp::Substring(value),
        };
        Ok(AttrCondition { name, op })
    }

    fn parse_attr_value(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => return Ok(value),
                        Some('\\') => match self.bump() {
                            Some(c) => value.push(c),
                            None => return Err(self.error("unterminated string")),
                        },
                        Some(c) => value.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
            }
            _ => self.parse_ident(),
        }
    }

    fn parse_pseudo(&mut self) -> Result<Pseudo> {
        let name = self.parse_ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Pseudo::FirstChild),
            "last-child" => Ok(Pseudo::LastChild),
            "only-child" => Ok(Pseudo::OnlyChild),
            "empty" => Ok(Pseudo::Empty),
            "not" => {
                self.expect('(')?;
                let groups = self.parse_list(Some(')'))?;
                self.expect(')')?;
                Ok(Pseudo::Not(groups))
            }
            _ => Err(self.error(&format!("unsupported pseudo-class ':{}'", name))),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}
