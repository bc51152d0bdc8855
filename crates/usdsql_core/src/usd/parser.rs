//! USDA (ASCII) layer parser.
//!
//! The input is first split into a queue of tokens (words, strings, paths,
//! asset paths and punctuation), which the parser then consumes from the
//! front, building the prim arena as it goes.
//!
//! # Supported Syntax
//!
//! - Layer metadata block: `( defaultPrim = "World" upAxis = "Y" )`
//! - `def`, `over` and `class` prims, typed or untyped, with metadata
//!   (`kind`, `active`, `instanceable`; everything else is skipped)
//! - Attributes: `[custom] [uniform] <type> <name> [= <value>]`, including
//!   `.timeSamples` and `.connect` forms and trailing metadata
//! - Relationships: `[custom] rel <name> [= </target> | [</a>, </b>]]`
//! - `variantSet` and `reorder` statements are consumed but not composed

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

use super::types::*;

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Unclosed block starting at line {0}")]
    UnclosedBlock(usize),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A lexical token of the USDA text format.
#[derive(Clone, Debug, PartialEq)]
enum Token {
    /// Keyword, identifier, type name or number
    Word(String),
    /// Quoted string (quotes removed, escapes resolved)
    Str(String),
    /// `<...>` path
    Path(String),
    /// `@...@` asset path
    Asset(String),
    /// One of `{ } ( ) [ ] = , ;`
    Punct(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{}", w),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Path(p) => write!(f, "<{}>", p),
            Token::Asset(a) => write!(f, "@{}@", a),
            Token::Punct(c) => write!(f, "{}", c),
        }
    }
}

const PUNCTUATION: &[char] = &['{', '}', '(', ')', '[', ']', '=', ',', ';'];

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !PUNCTUATION.contains(&c) && !matches!(c, '<' | '>' | '@' | '"' | '\'' | '#')
}

/// Split USDA content into line-numbered tokens.
fn tokenize(content: &str) -> ParseResult<VecDeque<(usize, Token)>> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = VecDeque::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Comments run to end of line (this also covers the `#usda 1.0` header)
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if PUNCTUATION.contains(&c) {
            tokens.push_back((line, Token::Punct(c)));
            i += 1;
            continue;
        }

        let start_line = line;
        match c {
            '"' | '\'' => {
                let triple = i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c;
                i += if triple { 3 } else { 1 };

                let mut text = String::new();
                loop {
                    if i >= chars.len() {
                        return Err(ParseError::Parse {
                            line: start_line,
                            message: "Unterminated string".to_string(),
                        });
                    }
                    let ch = chars[i];
                    if triple {
                        if ch == c && i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c {
                            i += 3;
                            break;
                        }
                    } else if ch == c {
                        i += 1;
                        break;
                    } else if ch == '\n' {
                        return Err(ParseError::Parse {
                            line: start_line,
                            message: "Newline in single-line string".to_string(),
                        });
                    }

                    if ch == '\\' && i + 1 < chars.len() {
                        let escaped = chars[i + 1];
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                        i += 2;
                        continue;
                    }

                    if ch == '\n' {
                        line += 1;
                    }
                    text.push(ch);
                    i += 1;
                }
                tokens.push_back((start_line, Token::Str(text)));
            }
            '<' => {
                let end = chars[i + 1..].iter().position(|&ch| ch == '>' || ch == '\n');
                match end {
                    Some(len) if chars[i + 1 + len] == '>' => {
                        let path: String = chars[i + 1..i + 1 + len].iter().collect();
                        tokens.push_back((line, Token::Path(path)));
                        i += len + 2;
                    }
                    _ => {
                        return Err(ParseError::Parse {
                            line,
                            message: "Unterminated path, expected '>'".to_string(),
                        })
                    }
                }
            }
            '@' => {
                let triple = i + 2 < chars.len() && chars[i + 1] == '@' && chars[i + 2] == '@';
                let delimiter: &[char] = if triple { &['@', '@', '@'] } else { &['@'] };
                let body_start = i + delimiter.len();
                let end = (body_start..chars.len())
                    .find(|&j| chars[j..].starts_with(delimiter));
                match end {
                    Some(j) => {
                        let asset: String = chars[body_start..j].iter().collect();
                        line += asset.matches('\n').count();
                        tokens.push_back((start_line, Token::Asset(asset)));
                        i = j + delimiter.len();
                    }
                    None => {
                        return Err(ParseError::Parse {
                            line,
                            message: "Unterminated asset path, expected '@'".to_string(),
                        })
                    }
                }
            }
            '>' => {
                return Err(ParseError::Parse {
                    line,
                    message: "Unexpected '>'".to_string(),
                })
            }
            _ => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                let mut word: String = chars[start..i].iter().collect();

                // Array type names: `float3[]`
                if i + 1 < chars.len() && chars[i] == '[' && chars[i + 1] == ']' {
                    word.push_str("[]");
                    i += 2;
                }
                tokens.push_back((line, Token::Word(word)));
            }
        }
    }

    Ok(tokens)
}

/// The parsed contents of one USDA layer.
#[derive(Clone, Debug, Default)]
pub struct ParsedLayer {
    /// Layer-level metadata
    pub metadata: LayerMetadata,

    /// Prim arena, indexed by [`PrimId`]
    pub prims: Vec<PrimSpec>,

    /// Root prims (children of the pseudo-root) in declared order
    pub roots: Vec<PrimId>,
}

/// Qualifiers that may precede a property declaration.
const PROPERTY_QUALIFIERS: &[&str] = &["custom", "uniform", "varying", "config"];

/// List-op keywords that may precede a property or metadata key.
const LIST_OPS: &[&str] = &["prepend", "append", "add", "delete", "reorder"];

/// Deepest tuple, array or metadata nesting accepted inside one value.
const MAX_VALUE_DEPTH: usize = 128;

/// USDA file parser.
pub struct UsdaParser {
    tokens: VecDeque<(usize, Token)>,
    current_line: usize,
    value_depth: usize,
    layer: ParsedLayer,
}

impl UsdaParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> ParseResult<Self> {
        Ok(Self {
            tokens: tokenize(content)?,
            current_line: 1,
            value_depth: 0,
            layer: ParsedLayer::default(),
        })
    }

    /// Parse the USDA content into a prim arena.
    pub fn parse(mut self) -> ParseResult<ParsedLayer> {
        if self.peek_punct('(') {
            self.bump();
            for (key, value) in self.parse_metadata()? {
                self.apply_layer_metadata(&key, value);
            }
        }

        while let Some(token) = self.peek() {
            match token {
                Token::Punct(';') => {
                    self.bump();
                }
                Token::Word(w) if Specifier::from_keyword(w).is_some() => {
                    self.parse_prim(None)?;
                }
                other => {
                    let message = format!("Expected prim definition, found '{}'", other);
                    return Err(self.error(message));
                }
            }
        }

        Ok(self.layer)
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.front().map(|(_, t)| t)
    }

    fn peek_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == c)
    }

    fn peek_word(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Word(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    fn bump(&mut self) -> Option<Token> {
        let (line, token) = self.tokens.pop_front()?;
        self.current_line = line;
        Some(token)
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        self.bump().ok_or(ParseError::UnexpectedEof)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let line = self.tokens.front().map(|(l, _)| *l).unwrap_or(self.current_line);
        ParseError::Parse {
            line,
            message: message.into(),
        }
    }

    fn expect_punct(&mut self, c: char) -> ParseResult<()> {
        match self.next_token()? {
            Token::Punct(p) if p == c => Ok(()),
            other => Err(ParseError::Parse {
                line: self.current_line,
                message: format!("Expected '{}', found '{}'", c, other),
            }),
        }
    }

    fn expect_word(&mut self, what: &str) -> ParseResult<String> {
        match self.next_token()? {
            Token::Word(w) => Ok(w),
            other => Err(ParseError::Parse {
                line: self.current_line,
                message: format!("Expected {}, found '{}'", what, other),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Prims
    // ------------------------------------------------------------------

    /// Parse `def|over|class [Type] "Name" [( metadata )] { body }`.
    ///
    /// Nested prims are tracked on an explicit stack of open blocks.
    fn parse_prim(&mut self, parent: Option<PrimId>) -> ParseResult<PrimId> {
        let (root, root_line) = self.parse_prim_header(parent)?;
        let mut open = vec![(root, root_line)];

        while let Some(&(id, start_line)) = open.last() {
            let Some(token) = self.peek() else {
                return Err(ParseError::UnclosedBlock(start_line));
            };

            match token {
                Token::Punct('}') => {
                    self.bump();
                    open.pop();
                }
                Token::Punct(';') => {
                    self.bump();
                }
                Token::Word(w) if Specifier::from_keyword(w).is_some() => {
                    let child = self.parse_prim_header(Some(id))?;
                    open.push(child);
                }
                Token::Word(w) if w == "variantSet" => {
                    self.skip_variant_set()?;
                }
                Token::Word(w) if w == "reorder" && self.is_reorder_statement() => {
                    // reorder nameChildren = [...] / reorder properties = [...]
                    self.bump();
                    self.bump();
                    self.expect_punct('=')?;
                    self.parse_value()?;
                }
                Token::Word(_) => self.parse_property(id)?,
                other => {
                    let message = format!("Unexpected '{}' in prim body", other);
                    return Err(self.error(message));
                }
            }
        }

        Ok(root)
    }

    /// Parse a prim declaration up to and including its opening brace and
    /// insert it under `parent`. Returns the prim and its declaration line.
    fn parse_prim_header(&mut self, parent: Option<PrimId>) -> ParseResult<(PrimId, usize)> {
        let keyword = self.expect_word("specifier")?;
        let specifier = Specifier::from_keyword(&keyword)
            .ok_or_else(|| self.error(format!("Unknown specifier '{}'", keyword)))?;

        let type_name = match self.peek() {
            Some(Token::Word(_)) => self.expect_word("prim type")?,
            _ => String::new(),
        };

        let name = match self.next_token()? {
            Token::Str(name) => name,
            other => {
                return Err(ParseError::Parse {
                    line: self.current_line,
                    message: format!("Expected quoted prim name, found '{}'", other),
                })
            }
        };
        if name.is_empty() || name.contains('/') {
            return Err(ParseError::Parse {
                line: self.current_line,
                message: format!("Invalid prim name '{}'", name),
            });
        }
        let start_line = self.current_line;

        let metadata = if self.peek_punct('(') {
            self.bump();
            self.parse_metadata()?
        } else {
            Vec::new()
        };

        self.expect_opening_brace(start_line)?;

        let id = self.insert_prim(parent, name, type_name, specifier);
        for (key, value) in metadata {
            self.apply_prim_metadata(id, &key, &value);
        }

        Ok((id, start_line))
    }

    /// Expect and consume an opening brace.
    fn expect_opening_brace(&mut self, start_line: usize) -> ParseResult<()> {
        match self.bump() {
            Some(Token::Punct('{')) => Ok(()),
            Some(other) => Err(ParseError::Parse {
                line: self.current_line,
                message: format!("Expected opening brace, found '{}'", other),
            }),
            None => Err(ParseError::UnclosedBlock(start_line)),
        }
    }

    fn is_reorder_statement(&self) -> bool {
        matches!(
            self.tokens.get(1),
            Some((_, Token::Word(w))) if w == "nameChildren" || w == "properties"
        )
    }

    /// Insert a prim under `parent`, merging into an existing sibling of the
    /// same name so that paths stay unique.
    fn insert_prim(
        &mut self,
        parent: Option<PrimId>,
        name: String,
        type_name: String,
        specifier: Specifier,
    ) -> PrimId {
        let siblings = match parent {
            Some(p) => &self.layer.prims[p.0].children,
            None => &self.layer.roots,
        };

        if let Some(&existing) = siblings.iter().find(|id| self.layer.prims[id.0].name == name) {
            let spec = &mut self.layer.prims[existing.0];
            log::debug!("Merging duplicate prim spec '{}' (line {})", name, self.current_line);
            if !type_name.is_empty() {
                spec.type_name = type_name;
            }
            if spec.specifier == Specifier::Over {
                spec.specifier = specifier;
            }
            return existing;
        }

        let id = PrimId(self.layer.prims.len());
        self.layer.prims.push(PrimSpec {
            name,
            type_name,
            specifier,
            parent,
            ..Default::default()
        });
        match parent {
            Some(p) => self.layer.prims[p.0].children.push(id),
            None => self.layer.roots.push(id),
        }
        id
    }

    fn apply_prim_metadata(&mut self, id: PrimId, key: &str, value: &UsdValue) {
        let spec = &mut self.layer.prims[id.0];
        match key {
            "kind" => spec.kind = value.as_str().map(str::to_string),
            "active" => spec.active = value.as_bool(),
            "instanceable" => spec.instanceable = value.as_bool(),
            _ => {}
        }
    }

    fn apply_layer_metadata(&mut self, key: &str, value: UsdValue) {
        let metadata = &mut self.layer.metadata;
        match key {
            "defaultPrim" => metadata.default_prim = value.as_str().map(str::to_string),
            "upAxis" => metadata.up_axis = value.as_str().map(str::to_string),
            "metersPerUnit" => metadata.meters_per_unit = value.as_f64(),
            "doc" => metadata.doc = value.as_str().map(str::to_string),
            _ => {}
        }
    }

    /// Skip a `variantSet "name" = { "a" { ... } "b" (...) { ... } }` block.
    fn skip_variant_set(&mut self) -> ParseResult<()> {
        let start_line = self.tokens.front().map(|(l, _)| *l).unwrap_or(self.current_line);
        self.bump();
        match self.next_token()? {
            Token::Str(_) => {}
            other => {
                return Err(ParseError::Parse {
                    line: self.current_line,
                    message: format!("Expected variant set name, found '{}'", other),
                })
            }
        }
        self.expect_punct('=')?;
        self.expect_punct('{')?;
        self.skip_block(start_line)
    }

    /// Skip a block (consume until matching closing brace).
    fn skip_block(&mut self, start_line: usize) -> ParseResult<()> {
        let mut depth = 1;

        while depth > 0 {
            match self.bump() {
                Some(Token::Punct('{')) => depth += 1,
                Some(Token::Punct('}')) => depth -= 1,
                Some(_) => {}
                None => return Err(ParseError::UnclosedBlock(start_line)),
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Parse an attribute or relationship declaration.
    fn parse_property(&mut self, id: PrimId) -> ParseResult<()> {
        let mut custom = false;
        let mut variability = Variability::Varying;
        let mut list_op = None;

        while let Some(word) = self.peek_word() {
            if PROPERTY_QUALIFIERS.contains(&word) {
                if word == "custom" {
                    custom = true;
                } else if word == "uniform" {
                    variability = Variability::Uniform;
                }
                self.bump();
            } else if LIST_OPS.contains(&word) {
                list_op = Some(word.to_string());
                self.bump();
            } else {
                break;
            }
        }

        if self.peek_word() == Some("rel") {
            self.bump();
            return self.parse_relationship(id, custom, list_op.as_deref());
        }

        let type_name = self.expect_word("attribute type")?;
        let full_name = self.expect_word("attribute name")?;

        let split = full_name.rsplit_once('.').and_then(|(base, suffix)| match suffix {
            "timeSamples" | "connect" | "spline" | "default" => {
                Some((base.to_string(), suffix.to_string()))
            }
            _ => None,
        });
        let (name, suffix) = match split {
            Some((base, suffix)) => (base, Some(suffix)),
            None => (full_name, None),
        };

        let attr = self.attribute_mut(id, &name, &type_name);
        attr.custom |= custom;
        if variability == Variability::Uniform {
            attr.variability = Variability::Uniform;
        }

        if self.peek_punct('=') {
            self.bump();
            match suffix.as_deref() {
                Some("timeSamples") | Some("spline") => {
                    let start_line = self.current_line;
                    self.expect_punct('{')?;
                    let count = self.count_block_entries(start_line)?;
                    self.attribute_mut(id, &name, &type_name).time_sample_count = count;
                }
                Some("connect") => {
                    let targets = self.parse_value()?.paths();
                    let attr = self.attribute_mut(id, &name, &type_name);
                    if list_op.as_deref() == Some("delete") {
                        attr.connections.retain(|t| !targets.contains(t));
                    } else {
                        attr.connections.extend(targets);
                    }
                }
                _ => {
                    let value = self.parse_value()?;
                    self.attribute_mut(id, &name, &type_name).default = match value {
                        UsdValue::Atom(ref a) if a == "None" => None,
                        other => Some(other),
                    };
                }
            }
        }

        self.skip_trailing_metadata()
    }

    fn parse_relationship(&mut self, id: PrimId, custom: bool, list_op: Option<&str>) -> ParseResult<()> {
        let full_name = self.expect_word("relationship name")?;
        let name = full_name
            .strip_suffix(".default")
            .unwrap_or(&full_name)
            .to_string();

        let targets = if self.peek_punct('=') {
            self.bump();
            self.parse_value()?.paths()
        } else {
            Vec::new()
        };

        let rel = self.relationship_mut(id, &name);
        rel.custom |= custom;
        match list_op {
            Some("delete") => rel.targets.retain(|t| !targets.contains(t)),
            Some("prepend") => {
                let mut merged = targets;
                merged.extend(rel.targets.drain(..));
                rel.targets = merged;
            }
            Some("append") | Some("add") => rel.targets.extend(targets),
            _ => rel.targets = targets,
        }

        self.skip_trailing_metadata()
    }

    fn skip_trailing_metadata(&mut self) -> ParseResult<()> {
        if self.peek_punct('(') {
            self.bump();
            self.parse_metadata()?;
        }
        Ok(())
    }

    fn property_index(&mut self, id: PrimId, name: &str, make: impl FnOnce() -> PropertyKind) -> usize {
        let properties = &mut self.layer.prims[id.0].properties;
        match properties.iter().position(|p| p.name == name) {
            Some(i) => i,
            None => {
                properties.push(PropertySpec {
                    name: name.to_string(),
                    kind: make(),
                });
                properties.len() - 1
            }
        }
    }

    fn attribute_mut(&mut self, id: PrimId, name: &str, type_name: &str) -> &mut AttributeSpec {
        let index = self.property_index(id, name, || {
            PropertyKind::Attribute(AttributeSpec {
                type_name: type_name.to_string(),
                ..Default::default()
            })
        });

        let property = &mut self.layer.prims[id.0].properties[index];
        if !matches!(property.kind, PropertyKind::Attribute(_)) {
            log::warn!("Property '{}' redeclared as an attribute", name);
            property.kind = PropertyKind::Attribute(AttributeSpec {
                type_name: type_name.to_string(),
                ..Default::default()
            });
        }
        match &mut property.kind {
            PropertyKind::Attribute(attr) => attr,
            PropertyKind::Relationship(_) => unreachable!("property kind was just set"),
        }
    }

    fn relationship_mut(&mut self, id: PrimId, name: &str) -> &mut RelationshipSpec {
        let index = self.property_index(id, name, || PropertyKind::Relationship(RelationshipSpec::default()));

        let property = &mut self.layer.prims[id.0].properties[index];
        if !matches!(property.kind, PropertyKind::Relationship(_)) {
            log::warn!("Property '{}' redeclared as a relationship", name);
            property.kind = PropertyKind::Relationship(RelationshipSpec::default());
        }
        match &mut property.kind {
            PropertyKind::Relationship(rel) => rel,
            PropertyKind::Attribute(_) => unreachable!("property kind was just set"),
        }
    }

    // ------------------------------------------------------------------
    // Metadata and values
    // ------------------------------------------------------------------

    /// Parse `key = value` entries up to and including the closing paren.
    /// The opening paren must already be consumed.
    fn parse_metadata(&mut self) -> ParseResult<Vec<(String, UsdValue)>> {
        let start_line = self.current_line;
        let mut entries = Vec::new();

        loop {
            let token = match self.bump() {
                Some(t) => t,
                None => return Err(ParseError::UnclosedBlock(start_line)),
            };

            match token {
                Token::Punct(')') => return Ok(entries),
                Token::Punct(';') => {}
                // A bare string is the doc string
                Token::Str(doc) => entries.push(("doc".to_string(), UsdValue::String(doc))),
                Token::Word(word) => {
                    let key = if LIST_OPS.contains(&word.as_str()) {
                        self.expect_word("metadata key")?
                    } else {
                        word
                    };
                    self.expect_punct('=')?;
                    let value = self.parse_value()?;
                    entries.push((key, value));
                }
                other => {
                    return Err(ParseError::Parse {
                        line: self.current_line,
                        message: format!("Unexpected '{}' in metadata", other),
                    })
                }
            }
        }
    }

    /// Parse a single value.
    fn parse_value(&mut self) -> ParseResult<UsdValue> {
        match self.next_token()? {
            Token::Str(s) => Ok(UsdValue::String(s)),
            Token::Path(p) => Ok(UsdValue::Path(p)),
            Token::Asset(a) => {
                // Reference/payload target prim and layer offsets
                if matches!(self.peek(), Some(Token::Path(_))) {
                    self.bump();
                }
                if self.peek_punct('(') {
                    self.bump();
                    self.nested(Self::parse_metadata)?;
                }
                Ok(UsdValue::Asset(a))
            }
            Token::Word(w) => Ok(UsdValue::Atom(w)),
            Token::Punct('(') => Ok(UsdValue::Tuple(self.nested(|p| p.parse_sequence(')'))?)),
            Token::Punct('[') => Ok(UsdValue::Array(self.nested(|p| p.parse_sequence(']'))?)),
            Token::Punct('{') => {
                let start_line = self.current_line;
                Ok(UsdValue::Block(self.collect_block(start_line)?.0))
            }
            other => Err(ParseError::Parse {
                line: self.current_line,
                message: format!("Expected value, found '{}'", other),
            }),
        }
    }

    /// Run `parse` one value nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.value_depth >= MAX_VALUE_DEPTH {
            return Err(ParseError::Parse {
                line: self.current_line,
                message: "nesting too deep".to_string(),
            });
        }
        self.value_depth += 1;
        let result = parse(self);
        self.value_depth -= 1;
        result
    }

    /// Parse comma separated values up to `close` (already-open sequence).
    fn parse_sequence(&mut self, close: char) -> ParseResult<Vec<UsdValue>> {
        let start_line = self.current_line;
        let mut items = Vec::new();

        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start_line)),
                Some(Token::Punct(c)) if *c == close => {
                    self.bump();
                    return Ok(items);
                }
                Some(Token::Punct(',')) => {
                    self.bump();
                }
                Some(_) => {
                    let item = self.parse_value()?;
                    if let UsdValue::Atom(ref a) = item {
                        check_number(a)?;
                    }
                    items.push(item);
                }
            }
        }
    }

    /// Consume an already-open braced block, returning its text and the number
    /// of top-level comma separated entries.
    fn collect_block(&mut self, start_line: usize) -> ParseResult<(String, usize)> {
        let mut depth = 1;
        let mut parts = Vec::new();
        let mut entries = 0;
        let mut pending_entry = false;

        while depth > 0 {
            let token = match self.bump() {
                Some(t) => t,
                None => return Err(ParseError::UnclosedBlock(start_line)),
            };
            match token {
                Token::Punct('{') | Token::Punct('(') | Token::Punct('[') => depth += 1,
                Token::Punct('}') | Token::Punct(')') | Token::Punct(']') => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                break;
            }

            if depth == 1 && token == Token::Punct(',') {
                if pending_entry {
                    entries += 1;
                }
                pending_entry = false;
            } else {
                pending_entry = true;
            }
            parts.push(token.to_string());
        }

        if pending_entry {
            entries += 1;
        }
        Ok((format!(" {} ", parts.join(" ")), entries))
    }

    fn count_block_entries(&mut self, start_line: usize) -> ParseResult<usize> {
        Ok(self.collect_block(start_line)?.1)
    }
}

/// Reject words inside tuples/arrays that start like a number but do not parse.
fn check_number(word: &str) -> ParseResult<()> {
    let looks_numeric = word
        .chars()
        .next()
        .map(|c| c.is_ascii_digit() || ((c == '-' || c == '+' || c == '.') && word.len() > 1))
        .unwrap_or(false);

    if looks_numeric && word.parse::<f64>().is_err() && !matches!(word, "-inf" | "+inf") {
        return Err(ParseError::InvalidNumber(word.to_string()));
    }
    Ok(())
}

/// Parse a USDA string into a prim arena.
pub fn parse_usda(content: &str) -> ParseResult<ParsedLayer> {
    UsdaParser::new(content)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(layer: &ParsedLayer, ids: &[PrimId]) -> Vec<String> {
        ids.iter().map(|id| layer.prims[id.0].name.clone()).collect()
    }

    #[test]
    fn test_parse_simple_scene() {
        let usda = r#"#usda 1.0
(
    defaultPrim = "World"
    upAxis = "Y"
    metersPerUnit = 0.01
)

def Xform "World"
{
    def Cube "Cube"
    {
        double size = 2
    }

    def Sphere "Sphere" { double radius = 1.5 }

    def Xform "Group"
    {
        def Mesh "Mesh"
        {
        }
    }
}
"#;

        let layer = parse_usda(usda).unwrap();
        assert_eq!(layer.metadata.default_prim.as_deref(), Some("World"));
        assert_eq!(layer.metadata.up_axis.as_deref(), Some("Y"));
        assert_eq!(layer.metadata.meters_per_unit, Some(0.01));
        assert_eq!(layer.roots.len(), 1);

        let world = &layer.prims[layer.roots[0].0];
        assert_eq!(world.type_name, "Xform");
        assert_eq!(names(&layer, &world.children), vec!["Cube", "Sphere", "Group"]);

        let sphere = &layer.prims[world.children[1].0];
        let radius = sphere.properties[0].as_attribute().unwrap();
        assert_eq!(radius.default, Some(UsdValue::Atom("1.5".to_string())));
    }

    #[test]
    fn test_parse_untyped_and_specifiers() {
        let usda = r#"#usda 1.0
def "Untyped" {}
over "Override" {}
class Xform "_Base" {}
"#;

        let layer = parse_usda(usda).unwrap();
        let specs: Vec<_> = layer
            .roots
            .iter()
            .map(|id| {
                let p = &layer.prims[id.0];
                (p.name.as_str(), p.type_name.as_str(), p.specifier)
            })
            .collect();
        assert_eq!(
            specs,
            vec![
                ("Untyped", "", Specifier::Def),
                ("Override", "", Specifier::Over),
                ("_Base", "Xform", Specifier::Class),
            ]
        );
    }

    #[test]
    fn test_parse_prim_metadata() {
        let usda = r#"#usda 1.0
def Xform "Asset" (
    kind = "component"
    instanceable = true
    prepend references = @./other.usda@</Root>
    customData = {
        string note = "x"
    }
)
{
    def Mesh "Hidden" (active = false) {}
}
"#;

        let layer = parse_usda(usda).unwrap();
        let asset = &layer.prims[layer.roots[0].0];
        assert_eq!(asset.kind.as_deref(), Some("component"));
        assert_eq!(asset.instanceable, Some(true));

        let hidden = &layer.prims[asset.children[0].0];
        assert_eq!(hidden.active, Some(false));
    }

    #[test]
    fn test_parse_properties() {
        let usda = r#"#usda 1.0
def Mesh "Tri"
{
    point3f[] points = [(0, 0, 0), (1, 0, 0), (0.5, 1, 0)]
    int[] faceVertexCounts = [3]
    uniform token subdivisionScheme = "none"
    custom double weight
    double weight.timeSamples = {
        0: 1.0,
        10: 2.0,
    }
    rel material:binding = </Looks/Red>
    rel proxyPrim
    color3f[] primvars:displayColor = [(1, 0, 0)] (
        interpolation = "constant"
    )
}
"#;

        let layer = parse_usda(usda).unwrap();
        let tri = &layer.prims[layer.roots[0].0];
        let props: Vec<_> = tri.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            props,
            vec![
                "points",
                "faceVertexCounts",
                "subdivisionScheme",
                "weight",
                "material:binding",
                "proxyPrim",
                "primvars:displayColor",
            ]
        );

        let points = tri.properties[0].as_attribute().unwrap();
        assert!(points.is_array());
        match points.default.as_ref().unwrap() {
            UsdValue::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("Expected array, got {:?}", other),
        }

        let scheme = tri.properties[2].as_attribute().unwrap();
        assert_eq!(scheme.variability, Variability::Uniform);

        let weight = tri.properties[3].as_attribute().unwrap();
        assert!(weight.custom);
        assert_eq!(weight.time_sample_count, 2);
        assert!(weight.default.is_none());

        let binding = tri.properties[4].as_relationship().unwrap();
        assert_eq!(binding.targets, vec!["/Looks/Red".to_string()]);
        assert!(tri.properties[5].as_relationship().unwrap().targets.is_empty());
    }

    #[test]
    fn test_duplicate_siblings_merge() {
        let usda = r#"#usda 1.0
def Xform "World" {
    def "A" {}
}
over "World" {
    def Cube "B" {}
}
"#;

        let layer = parse_usda(usda).unwrap();
        assert_eq!(layer.roots.len(), 1);
        let world = &layer.prims[layer.roots[0].0];
        assert_eq!(world.specifier, Specifier::Def);
        assert_eq!(names(&layer, &world.children), vec!["A", "B"]);
    }

    #[test]
    fn test_variant_sets_are_skipped() {
        let usda = r#"#usda 1.0
def Xform "Model" (
    variants = {
        string shading = "red"
    }
    prepend variantSets = "shading"
)
{
    variantSet "shading" = {
        "red" {
            def Mesh "RedOnly" {}
        }
        "blue" (doc = "blue") {
        }
    }
    reorder nameChildren = ["Child"]
    def "Child" {}
}
"#;

        let layer = parse_usda(usda).unwrap();
        let model = &layer.prims[layer.roots[0].0];
        assert_eq!(names(&layer, &model.children), vec!["Child"]);
    }

    #[test]
    fn test_unclosed_block() {
        let usda = "#usda 1.0\ndef Xform \"World\" {\n    def Cube \"Cube\" {\n";
        // Reported against the innermost open prim
        assert_eq!(parse_usda(usda).unwrap_err(), ParseError::UnclosedBlock(3));
    }

    #[test]
    fn test_deeply_nested_prims() {
        let depth = 10_000;
        let mut usda = String::from("#usda 1.0\n");
        for i in 0..depth {
            usda.push_str(&format!("def Xform \"P{}\" {{\n", i));
        }
        usda.push_str("double3 xformOp:translate = (1, 2, 3)\n");
        for _ in 0..depth {
            usda.push_str("}\n");
        }

        let layer = parse_usda(&usda).unwrap();
        assert_eq!(layer.prims.len(), depth);
        assert_eq!(layer.roots.len(), 1);

        let deepest = &layer.prims[depth - 1];
        assert_eq!(deepest.name, format!("P{}", depth - 1));
        assert_eq!(deepest.parent, Some(PrimId(depth - 2)));
        assert_eq!(deepest.properties.len(), 1);
        assert!(deepest.children.is_empty());
    }

    #[test]
    fn test_deeply_nested_value() {
        let depth = 10_000;
        let usda = format!(
            "#usda 1.0\ndef \"A\" {{\n    int[] values = {}1{}\n}}\n",
            "[".repeat(depth),
            "]".repeat(depth)
        );
        match parse_usda(&usda) {
            Err(ParseError::Parse { line, message }) => {
                assert_eq!(line, 3);
                assert_eq!(message, "nesting too deep");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // Ordinary nesting is unaffected
        let usda = "#usda 1.0\ndef \"A\" {\n    int2[] pairs = [(1, 2), (3, 4)]\n}\n";
        assert!(parse_usda(usda).is_ok());
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let usda = "#usda 1.0\n\ndef Xform \"World {\n}\n";
        match parse_usda(usda) {
            Err(ParseError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_number() {
        let usda = "#usda 1.0\ndef Mesh \"M\" {\n    int[] faceVertexCounts = [3, 4x]\n}\n";
        assert_eq!(
            parse_usda(usda).unwrap_err(),
            ParseError::InvalidNumber("4x".to_string())
        );
    }

    #[test]
    fn test_garbage_at_top_level() {
        let usda = "#usda 1.0\nhello world\n";
        assert!(matches!(parse_usda(usda), Err(ParseError::Parse { line: 2, .. })));
    }
}
