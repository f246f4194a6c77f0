//! Splits a WordprocessingML part into markup and `<w:t>` text, then pulls
//! delimited tags out of the text even when Word has scattered a single tag
//! over several runs.

use crate::error::Error;
use crate::options::{LoopPrefix, TemplateOptions};

const TEXT_ELEMENT: &str = "w:t";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ElementKind {
    Open,
    Close,
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Element {
    pub(crate) name: String,
    pub(crate) kind: ElementKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TagKind {
    Value,
    Open,
    Inverted,
    Close,
    Raw,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Placeholder {
    pub(crate) kind: TagKind,
    pub(crate) name: String,
    /// Source text including delimiters, still XML-escaped.
    pub(crate) raw: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Token {
    /// Markup, or character data outside `<w:t>`.
    Xml {
        raw: String,
        element: Option<Element>,
    },
    /// Escaped character data inside `<w:t>`.
    Text(String),
    Tag(Placeholder),
}

impl Token {
    pub(crate) fn element(&self) -> Option<&Element> {
        match self {
            Token::Xml { element, .. } => element.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn source(&self) -> &str {
        match self {
            Token::Xml { raw, .. } | Token::Text(raw) => raw,
            Token::Tag(tag) => &tag.raw,
        }
    }
}

pub(crate) fn tokenize(xml: &str, opts: &TemplateOptions, part: &str) -> Result<Vec<Token>, Error> {
    if opts.delimiters.start.is_empty() || opts.delimiters.end.is_empty() {
        return Err(Error::template(part, "tag delimiters must not be empty"));
    }
    let mut tokens = split_markup(xml, part)?;

    let text_slots: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| matches!(t, Token::Text(_)))
        .map(|(i, _)| i)
        .collect();
    if text_slots.is_empty() {
        return Ok(tokens);
    }

    let mut full = String::new();
    let mut offsets = Vec::with_capacity(text_slots.len());
    for &i in &text_slots {
        offsets.push(full.len());
        full.push_str(tokens[i].source());
    }

    let start = escape(&opts.delimiters.start);
    let end = escape(&opts.delimiters.end);
    let spans = find_spans(&full, &start, &end, part)?;
    if spans.is_empty() {
        return Ok(tokens);
    }

    // Rebuild back to front so earlier indices stay valid while splicing.
    for (slot, &i) in text_slots.iter().enumerate().rev() {
        let lo = offsets[slot];
        let hi = lo + tokens[i].source().len();
        let mut pieces = Vec::new();
        let mut cursor = lo;
        let mut hosts_tag = false;

        for &(s, e) in spans.iter().filter(|&&(s, e)| s < hi && e > lo) {
            if s >= lo {
                if s > cursor {
                    pieces.push(Token::Text(full[cursor..s].to_string()));
                }
                let inner = &full[s + start.len()..e - end.len()];
                pieces.push(Token::Tag(classify(inner, &full[s..e], &opts.loop_prefix)));
                hosts_tag = true;
            }
            cursor = cursor.max(e.min(hi));
        }
        if cursor < hi {
            pieces.push(Token::Text(full[cursor..hi].to_string()));
        }

        if hosts_tag && i > 0 {
            preserve_space(&mut tokens[i - 1]);
        }
        tokens.splice(i..=i, pieces);
    }

    Ok(tokens)
}

fn split_markup(xml: &str, part: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut in_text = false;
    let mut rest = xml;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            tokens.push(chars(rest, in_text));
            break;
        };
        if lt > 0 {
            tokens.push(chars(&rest[..lt], in_text));
        }
        let markup_len = markup_end(&rest[lt..])
            .ok_or_else(|| Error::template(part, "unterminated markup"))?;
        let raw = &rest[lt..lt + markup_len];
        let element = parse_element(raw);
        if let Some(el) = &element
            && el.name == TEXT_ELEMENT
        {
            in_text = el.kind == ElementKind::Open;
        }
        tokens.push(Token::Xml {
            raw: raw.to_string(),
            element,
        });
        rest = &rest[lt + markup_len..];
    }

    Ok(tokens)
}

fn chars(s: &str, in_text: bool) -> Token {
    if in_text {
        Token::Text(s.to_string())
    } else {
        Token::Xml {
            raw: s.to_string(),
            element: None,
        }
    }
}

/// Length of the markup starting at `s[0] == '<'`, including the closing `>`.
fn markup_end(s: &str) -> Option<usize> {
    for (open, close) in [("<!--", "-->"), ("<![CDATA[", "]]>"), ("<?", "?>")] {
        if s.starts_with(open) {
            return s.find(close).map(|i| i + close.len());
        }
    }
    let mut quote = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

fn parse_element(raw: &str) -> Option<Element> {
    if raw.starts_with("<?") || raw.starts_with("<!") {
        return None;
    }
    let (body, kind) = if let Some(body) = raw.strip_prefix("</") {
        (body, ElementKind::Close)
    } else if raw.ends_with("/>") {
        (&raw[1..], ElementKind::Empty)
    } else {
        (&raw[1..], ElementKind::Open)
    };
    let name: String = body
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
        .collect();
    Some(Element { name, kind })
}

/// Byte spans `[start, end)` of every delimited tag in `full`.
fn find_spans(
    full: &str,
    start: &str,
    end: &str,
    part: &str,
) -> Result<Vec<(usize, usize)>, Error> {
    let mut spans = Vec::new();
    let mut pos = 0;
    loop {
        let next_start = full[pos..].find(start).map(|i| pos + i);
        let next_end = full[pos..].find(end).map(|i| pos + i);
        let Some(s) = next_start.filter(|&s| next_end.is_none_or(|e| s <= e)) else {
            match next_end {
                Some(e) => {
                    return Err(Error::template(
                        part,
                        format!("unopened tag near '{}'", excerpt(full, e)),
                    ));
                }
                None => break,
            }
        };
        let after = s + start.len();
        let Some(e) = full[after..].find(end) else {
            return Err(Error::template(
                part,
                format!("unclosed tag near '{}'", excerpt(full, s)),
            ));
        };
        let e = after + e + end.len();
        spans.push((s, e));
        pos = e;
    }
    Ok(spans)
}

fn excerpt(full: &str, at: usize) -> &str {
    let mut end = (at + 20).min(full.len());
    while !full.is_char_boundary(end) {
        end -= 1;
    }
    &full[at..end]
}

fn classify(inner: &str, raw: &str, prefix: &LoopPrefix) -> Placeholder {
    let text = unescape(inner);
    let text = text.trim();
    let strip = |p: &str| {
        if p.is_empty() {
            None
        } else {
            text.strip_prefix(p).map(|rest| rest.trim().to_string())
        }
    };

    let (kind, name) = if let Some(name) = strip(&prefix.raw) {
        (TagKind::Raw, name)
    } else if let Some(name) = strip(&prefix.close) {
        (TagKind::Close, name)
    } else if let Some(name) = strip(&prefix.inverted) {
        (TagKind::Inverted, name)
    } else if let Some(name) = strip(&prefix.open) {
        (TagKind::Open, name)
    } else {
        (TagKind::Value, text.to_string())
    };

    Placeholder {
        kind,
        name,
        raw: raw.to_string(),
    }
}

fn preserve_space(token: &mut Token) {
    if let Token::Xml { raw, element: Some(el) } = token
        && el.name == TEXT_ELEMENT
        && el.kind == ElementKind::Open
        && !raw.contains("xml:space")
    {
        *raw = format!("<w:t xml:space=\"preserve\"{}", &raw[TEXT_ELEMENT.len() + 1..]);
    }
}

pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Delimiters;

    fn tags(tokens: &[Token]) -> Vec<(TagKind, &str)> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Tag(p) => Some((p.kind, p.name.as_str())),
                _ => None,
            })
            .collect()
    }

    fn joined(tokens: &[Token]) -> String {
        tokens.iter().map(Token::source).collect()
    }

    #[test]
    fn finds_tag_inside_single_run() {
        let xml = r#"<w:p><w:r><w:t>Hello {name}!</w:t></w:r></w:p>"#;
        let tokens = tokenize(xml, &TemplateOptions::default(), "doc").unwrap();
        assert_eq!(tags(&tokens), vec![(TagKind::Value, "name")]);
        assert_eq!(
            joined(&tokens),
            r#"<w:p><w:r><w:t xml:space="preserve">Hello {name}!</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn merges_tag_split_across_runs() {
        let xml = concat!(
            "<w:p>",
            "<w:r><w:t>Dear {first</w:t></w:r>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>Na</w:t></w:r>",
            "<w:r><w:t>me}, hi</w:t></w:r>",
            "</w:p>"
        );
        let tokens = tokenize(xml, &TemplateOptions::default(), "doc").unwrap();
        assert_eq!(tags(&tokens), vec![(TagKind::Value, "firstName")]);
        let text = joined(&tokens);
        assert!(text.contains(r#"<w:t xml:space="preserve">Dear {firstName}</w:t>"#));
        assert!(text.contains("<w:b/></w:rPr><w:t></w:t>"));
        assert!(text.contains("<w:t>, hi</w:t>"));
    }

    #[test]
    fn ignores_braces_outside_text_elements() {
        let xml = r#"<w:p w:rsidR="{abc}"><w:r><w:instrText>{x}</w:instrText></w:r></w:p>"#;
        let tokens = tokenize(xml, &TemplateOptions::default(), "doc").unwrap();
        assert!(tags(&tokens).is_empty());
        assert_eq!(joined(&tokens), xml);
    }

    #[test]
    fn classifies_custom_prefixes() {
        let opts = TemplateOptions {
            delimiters: Delimiters {
                start: "{{".into(),
                end: "}}".into(),
            },
            loop_prefix: LoopPrefix {
                open: "FOR ".into(),
                close: "ENDFOR".into(),
                ..LoopPrefix::default()
            },
            ..TemplateOptions::default()
        };
        let xml = "<w:t>{{FOR cars}}{{name}}{{ENDFOR}}{{ENDFOR cars}}{{^none}}{{@raw}}</w:t>";
        let tokens = tokenize(xml, &opts, "doc").unwrap();
        assert_eq!(
            tags(&tokens),
            vec![
                (TagKind::Open, "cars"),
                (TagKind::Value, "name"),
                (TagKind::Close, ""),
                (TagKind::Close, "cars"),
                (TagKind::Inverted, "none"),
                (TagKind::Raw, "raw"),
            ]
        );
    }

    #[test]
    fn unescapes_tag_names() {
        let xml = "<w:t>{a &amp; b}</w:t>";
        let tokens = tokenize(xml, &TemplateOptions::default(), "doc").unwrap();
        assert_eq!(tags(&tokens), vec![(TagKind::Value, "a & b")]);
    }

    #[test]
    fn unclosed_tag_is_an_error() {
        let err = tokenize("<w:t>Hello {name</w:t>", &TemplateOptions::default(), "doc")
            .unwrap_err();
        assert!(err.to_string().contains("unclosed tag"), "{err}");
    }

    #[test]
    fn empty_delimiters_are_rejected() {
        for (start, end) in [("", ""), ("", "}"), ("{", "")] {
            let opts = TemplateOptions {
                delimiters: Delimiters {
                    start: start.into(),
                    end: end.into(),
                },
                ..TemplateOptions::default()
            };
            let err = tokenize("<w:t>Hello</w:t>", &opts, "doc").unwrap_err();
            assert!(err.to_string().contains("delimiters must not be empty"), "{err}");
        }
    }

    #[test]
    fn unopened_tag_is_an_error() {
        let err = tokenize("<w:t>Hello name}</w:t>", &TemplateOptions::default(), "doc")
            .unwrap_err();
        assert!(err.to_string().contains("unopened tag"), "{err}");
    }

    #[test]
    fn quoted_gt_does_not_end_markup() {
        let xml = r#"<w:p a="x>y"><w:t>{v}</w:t></w:p>"#;
        let tokens = tokenize(xml, &TemplateOptions::default(), "doc").unwrap();
        assert_eq!(
            tokens[0].element(),
            Some(&Element {
                name: "w:p".into(),
                kind: ElementKind::Open
            })
        );
        assert_eq!(tags(&tokens), vec![(TagKind::Value, "v")]);
    }
}
