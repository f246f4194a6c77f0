use serde_json::Value;

use crate::error::Error;
use crate::lexer::{self, ElementKind, Placeholder, TagKind, Token};
use crate::options::{MissingValue, TemplateOptions};
use crate::scope;

const PARAGRAPH: &str = "w:p";
const TABLE_ROW: &str = "w:tr";
const TABLE_CELL: &str = "w:tc";
const LINE_BREAK: &str = "</w:t><w:br/><w:t xml:space=\"preserve\">";

#[derive(Debug)]
enum Node {
    Xml(String),
    Value {
        name: String,
        raw: String,
    },
    Raw {
        name: String,
        fallback: String,
    },
    Section {
        name: String,
        inverted: bool,
        body: Vec<Node>,
    },
}

/// A loop or raw tag after expansion: `start..=end` of the current token
/// slice is replaced by the node built from `body`.
struct Region {
    start: usize,
    end: usize,
    kind: RegionKind,
}

enum RegionKind {
    Section {
        name: String,
        inverted: bool,
        body: Vec<Token>,
    },
    Raw {
        name: String,
    },
}

/// Renders one XML part. Parts without any tag are returned unchanged.
pub(crate) fn render_part(
    xml: &str,
    data: &Value,
    opts: &TemplateOptions,
    part: &str,
) -> Result<String, Error> {
    let tokens = lexer::tokenize(xml, opts, part)?;
    if !tokens.iter().any(|t| matches!(t, Token::Tag(_))) {
        return Ok(xml.to_string());
    }

    let nodes = build(&tokens, opts, part)?;
    let mut out = String::with_capacity(xml.len());
    Renderer { opts, part }.render(&nodes, &[data], &mut out)?;

    roxmltree::Document::parse(&out)?;
    log::debug!("rendered {part}: {} -> {} bytes", xml.len(), out.len());
    Ok(out)
}

fn build(tokens: &[Token], opts: &TemplateOptions, part: &str) -> Result<Vec<Node>, Error> {
    let mut regions = Vec::new();
    let mut stack: Vec<(usize, &Placeholder)> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let Token::Tag(tag) = token else { continue };
        match tag.kind {
            TagKind::Open | TagKind::Inverted => stack.push((i, tag)),
            TagKind::Close => {
                let Some((open, open_tag)) = stack.pop() else {
                    return Err(Error::template(
                        part,
                        format!("closing tag '{}' has no matching opening tag", tag.raw),
                    ));
                };
                if !tag.name.is_empty() && tag.name != open_tag.name {
                    return Err(Error::template(
                        part,
                        format!("'{}' closes '{}'", tag.raw, open_tag.raw),
                    ));
                }
                if stack.is_empty() {
                    regions.push(expand_loop(tokens, open_tag, open, i, opts));
                }
            }
            TagKind::Raw if stack.is_empty() => regions.push(expand_raw(tokens, tag, i, part)?),
            TagKind::Raw | TagKind::Value => {}
        }
    }
    if let Some((_, open_tag)) = stack.last() {
        return Err(Error::template(part, format!("unclosed loop '{}'", open_tag.raw)));
    }

    regions.sort_by_key(|r| r.start);
    let mut nodes = Vec::new();
    let mut next = 0;
    for region in regions {
        if region.start < next {
            return Err(Error::template(part, "loops expand into overlapping regions"));
        }
        nodes.extend(tokens[next..region.start].iter().map(leaf));
        nodes.push(match region.kind {
            RegionKind::Section {
                name,
                inverted,
                body,
            } => Node::Section {
                name,
                inverted,
                body: build(&body, opts, part)?,
            },
            RegionKind::Raw { name } => Node::Raw {
                name,
                fallback: tokens[region.start..=region.end]
                    .iter()
                    .map(Token::source)
                    .collect(),
            },
        });
        next = region.end + 1;
    }
    nodes.extend(tokens[next..].iter().map(leaf));
    Ok(nodes)
}

fn leaf(token: &Token) -> Node {
    match token {
        Token::Tag(tag) => Node::Value {
            name: tag.name.clone(),
            raw: tag.raw.clone(),
        },
        other => Node::Xml(other.source().to_string()),
    }
}

fn expand_loop(
    tokens: &[Token],
    tag: &Placeholder,
    open: usize,
    close: usize,
    opts: &TemplateOptions,
) -> Region {
    let section = |body: Vec<Token>| RegionKind::Section {
        name: tag.name.clone(),
        inverted: tag.kind == TagKind::Inverted,
        body,
    };

    // Tags in different cells of one row repeat the whole row.
    if let (Some(c1), Some(c2)) = (
        enclosing(tokens, open, TABLE_CELL),
        enclosing(tokens, close, TABLE_CELL),
    ) && c1 != c2
        && let Some(row) = enclosing(tokens, open, TABLE_ROW)
        && enclosing(tokens, close, TABLE_ROW) == Some(row)
    {
        let body = (row.0..=row.1)
            .filter(|&j| j != open && j != close)
            .map(|j| tokens[j].clone())
            .collect();
        return Region {
            start: row.0,
            end: row.1,
            kind: section(body),
        };
    }

    if opts.paragraph_loop
        && let (Some(p1), Some(p2)) = (
            enclosing(tokens, open, PARAGRAPH),
            enclosing(tokens, close, PARAGRAPH),
        )
        && p1 != p2
        && alone_in(tokens, p1, open)
        && alone_in(tokens, p2, close)
        && balanced(&tokens[p1.1 + 1..p2.0])
    {
        return Region {
            start: p1.0,
            end: p2.1,
            kind: section(tokens[p1.1 + 1..p2.0].to_vec()),
        };
    }

    Region {
        start: open,
        end: close,
        kind: section(tokens[open + 1..close].to_vec()),
    }
}

fn expand_raw(tokens: &[Token], tag: &Placeholder, at: usize, part: &str) -> Result<Region, Error> {
    let Some(paragraph) = enclosing(tokens, at, PARAGRAPH) else {
        return Err(Error::template(
            part,
            format!("raw tag '{}' must be inside a paragraph", tag.raw),
        ));
    };
    if !alone_in(tokens, paragraph, at) {
        return Err(Error::template(
            part,
            format!("raw tag '{}' must be the only text in its paragraph", tag.raw),
        ));
    }
    Ok(Region {
        start: paragraph.0,
        end: paragraph.1,
        kind: RegionKind::Raw {
            name: tag.name.clone(),
        },
    })
}

/// Token indices of the opening and closing `name` element around `at`.
fn enclosing(tokens: &[Token], at: usize, name: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut start = None;
    for j in (0..at).rev() {
        let Some(el) = tokens[j].element().filter(|el| el.name == name) else {
            continue;
        };
        match el.kind {
            ElementKind::Close => depth += 1,
            ElementKind::Open if depth == 0 => {
                start = Some(j);
                break;
            }
            ElementKind::Open => depth -= 1,
            ElementKind::Empty => {}
        }
    }
    let start = start?;

    let mut depth = 0usize;
    for (j, token) in tokens.iter().enumerate().skip(at + 1) {
        let Some(el) = token.element().filter(|el| el.name == name) else {
            continue;
        };
        match el.kind {
            ElementKind::Open => depth += 1,
            ElementKind::Close if depth == 0 => return Some((start, j)),
            ElementKind::Close => depth -= 1,
            ElementKind::Empty => {}
        }
    }
    None
}

/// True when the only text in `range` is the tag at `at`, give or take
/// whitespace.
fn alone_in(tokens: &[Token], range: (usize, usize), at: usize) -> bool {
    (range.0..=range.1).filter(|&j| j != at).all(|j| match &tokens[j] {
        Token::Tag(_) => false,
        Token::Text(text) => text.trim().is_empty(),
        Token::Xml { .. } => true,
    })
}

fn balanced(tokens: &[Token]) -> bool {
    let mut depth = 0i64;
    for token in tokens {
        match token.element().map(|el| el.kind) {
            Some(ElementKind::Open) => depth += 1,
            Some(ElementKind::Close) => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

struct Renderer<'a> {
    opts: &'a TemplateOptions,
    part: &'a str,
}

impl Renderer<'_> {
    fn render(&self, nodes: &[Node], scopes: &[&Value], out: &mut String) -> Result<(), Error> {
        for node in nodes {
            match node {
                Node::Xml(raw) => out.push_str(raw),
                Node::Value { name, raw } => {
                    match scope::resolve(&self.opts.parser, name, scopes) {
                        Some(value) => self.push_text(&scope::display(&value), out),
                        None => self.missing(name, raw, out)?,
                    }
                }
                Node::Raw { name, fallback } => {
                    match scope::resolve(&self.opts.parser, name, scopes) {
                        Some(value) => out.push_str(&scope::display(&value)),
                        None => self.missing(name, fallback, out)?,
                    }
                }
                Node::Section {
                    name,
                    inverted,
                    body,
                } => self.section(name, *inverted, body, scopes, out)?,
            }
        }
        Ok(())
    }

    fn section(
        &self,
        name: &str,
        inverted: bool,
        body: &[Node],
        scopes: &[&Value],
        out: &mut String,
    ) -> Result<(), Error> {
        let value = scope::resolve(&self.opts.parser, name, scopes);
        if inverted {
            if !value.as_ref().is_some_and(scope::is_truthy) {
                self.render(body, scopes, out)?;
            }
            return Ok(());
        }

        match value {
            Some(Value::Array(items)) => {
                for item in &items {
                    self.render(body, &with_scope(scopes, item), out)?;
                }
            }
            Some(object @ Value::Object(_)) => {
                self.render(body, &with_scope(scopes, &object), out)?;
            }
            Some(value) if scope::is_truthy(&value) => self.render(body, scopes, out)?,
            _ => {}
        }
        Ok(())
    }

    fn push_text(&self, text: &str, out: &mut String) {
        let escaped = lexer::escape(text);
        if self.opts.linebreaks {
            let lines: Vec<&str> = escaped.split('\n').map(|l| l.trim_end_matches('\r')).collect();
            out.push_str(&lines.join(LINE_BREAK));
        } else {
            out.push_str(&escaped);
        }
    }

    fn missing(&self, name: &str, keep: &str, out: &mut String) -> Result<(), Error> {
        match self.opts.missing {
            MissingValue::Empty => {
                log::warn!("{}: no value for '{name}', leaving it empty", self.part);
            }
            MissingValue::Keep => {
                log::warn!("{}: no value for '{name}', keeping the tag", self.part);
                out.push_str(keep);
            }
            MissingValue::Error => {
                return Err(Error::template(self.part, format!("no value for '{name}'")));
            }
        }
        Ok(())
    }
}

fn with_scope<'a>(scopes: &[&'a Value], top: &'a Value) -> Vec<&'a Value> {
    let mut inner = scopes.to_vec();
    inner.push(top);
    inner
}
