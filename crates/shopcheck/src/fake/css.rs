//! Small CSS selector engine and query resolution for the fake DOM.
//!
//! Supports tag, `*`, `.class`, `#id`, `[attr]`, `[attr=value]` (quoted or
//! bare), descendant and `>` child combinators and `,` selector lists.

use super::dom::{Dom, NodeId};
use crate::locator::{Query, Selector};
use crate::result::{ShopError, ShopResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let el = dom.get(node);
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(&el.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attrs.get("id") != Some(id) {
                return false;
            }
        }
        self.classes.iter().all(|c| el.has_class(c))
            && self.attrs.iter().all(|(name, value)| match (el.attrs.get(name), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            })
    }
}

/// A parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    alternatives: Vec<Vec<(Combinator, Compound)>>,
}

impl SelectorList {
    pub fn parse(input: &str) -> ShopResult<Self> {
        Parser::new(input).parse()
    }

    pub fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        node != Dom::ROOT
            && self
                .alternatives
                .iter()
                .any(|complex| matches_complex(dom, node, complex))
    }
}

fn matches_complex(dom: &Dom, node: NodeId, parts: &[(Combinator, Compound)]) -> bool {
    let Some(((_, last), rest)) = parts.split_last() else {
        return false;
    };
    if !last.matches(dom, node) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match parts[parts.len() - 1].0 {
        Combinator::Child => dom
            .parent(node)
            .filter(|p| *p != Dom::ROOT)
            .is_some_and(|p| matches_complex(dom, p, rest)),
        Combinator::Descendant => dom
            .ancestors(node)
            .into_iter()
            .any(|a| matches_complex(dom, a, rest)),
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> ShopError {
        ShopError::driver(format!("invalid selector {:?}: {reason}", self.input))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn quoted(&mut self, quote: char) -> ShopResult<String> {
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    if let Some(escaped) = self.peek() {
                        out.push(escaped);
                        self.pos += 1;
                    }
                }
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
        Err(self.error("unterminated string"))
    }

    fn attribute(&mut self) -> ShopResult<(String, Option<String>)> {
        self.pos += 1;
        self.skip_ws();
        let name = self.ident();
        if name.is_empty() {
            return Err(self.error("empty attribute name"));
        }
        self.skip_ws();
        let value = match self.peek() {
            Some(']') => None,
            Some('=') => {
                self.pos += 1;
                self.skip_ws();
                let v = match self.peek() {
                    Some(q @ ('\'' | '"')) => self.quoted(q)?,
                    _ => self.ident(),
                };
                self.skip_ws();
                Some(v)
            }
            _ => return Err(self.error("unsupported attribute operator")),
        };
        if self.peek() != Some(']') {
            return Err(self.error("expected ]"));
        }
        self.pos += 1;
        Ok((name, value))
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn compound(&mut self) -> ShopResult<Compound> {
        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.pos += 1;
            compound.tag = Some("*".to_string());
        } else if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            compound.tag = Some(self.ident());
        }
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    let class = self.ident();
                    if class.is_empty() {
                        return Err(self.error("empty class name"));
                    }
                    compound.classes.push(class);
                }
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident());
                }
                Some('[') => compound.attrs.push(self.attribute()?),
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn parse(mut self) -> ShopResult<SelectorList> {
        let mut alternatives = Vec::new();
        let mut current: Vec<(Combinator, Compound)> = Vec::new();
        let mut combinator = Combinator::Descendant;
        self.skip_ws();
        while self.pos < self.chars.len() {
            match self.peek() {
                Some(',') => {
                    if current.is_empty() {
                        return Err(self.error("empty selector in list"));
                    }
                    alternatives.push(std::mem::take(&mut current));
                    combinator = Combinator::Descendant;
                    self.pos += 1;
                    self.skip_ws();
                }
                Some('>') => {
                    if current.is_empty() {
                        return Err(self.error("leading combinator"));
                    }
                    combinator = Combinator::Child;
                    self.pos += 1;
                    self.skip_ws();
                }
                _ => {
                    let compound = self.compound()?;
                    current.push((combinator, compound));
                    combinator = Combinator::Descendant;
                    self.skip_ws();
                }
            }
        }
        if current.is_empty() {
            return Err(self.error("empty selector"));
        }
        alternatives.push(current);
        Ok(SelectorList { alternatives })
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolve a locator query against the DOM, in document order
pub fn resolve(dom: &Dom, query: &Query) -> ShopResult<Vec<NodeId>> {
    let order = dom.document_order();
    let sort_dedup = |mut nodes: Vec<NodeId>| {
        nodes.sort_by_key(|n| order[*n]);
        nodes.dedup();
        nodes
    };

    let mut current = vec![Dom::ROOT];
    for step in query.steps() {
        current = match step {
            Selector::Css(css) => {
                let list = SelectorList::parse(css)?;
                sort_dedup(
                    current
                        .iter()
                        .flat_map(|scope| dom.descendants(*scope))
                        .filter(|n| list.matches(dom, *n))
                        .collect(),
                )
            }
            Selector::HasText(text) => {
                let needle = normalize(text);
                current
                    .into_iter()
                    .filter(|n| normalize(&dom.text_content(*n)).contains(&needle))
                    .collect()
            }
            Selector::Parent => sort_dedup(
                current
                    .iter()
                    .filter_map(|n| dom.parent(*n))
                    .filter(|p| *p != Dom::ROOT)
                    .collect(),
            ),
            Selector::Nth(i) => current.get(*i).copied().into_iter().collect(),
            Selector::Last => current.last().copied().into_iter().collect(),
            Selector::Role { role, name } => {
                let needle = name.as_deref().map(normalize);
                sort_dedup(
                    current
                        .iter()
                        .flat_map(|scope| dom.descendants(*scope))
                        .filter(|n| dom.role(*n).as_deref() == Some(role.as_str()))
                        .filter(|n| {
                            needle
                                .as_ref()
                                .map_or(true, |want| normalize(&dom.accessible_name(*n)).contains(want))
                        })
                        .collect(),
                )
            }
        };
    }
    current.retain(|n| *n != Dom::ROOT);
    Ok(current)
}
