//! Prompt templates: a Handlebars-compatible subset.
//!
//! Supported tags:
//!
//! ```text
//! {{path}}  {{{path}}}                 interpolation (never HTML-escaped)
//! {{#if path}} .. {{else}} .. {{/if}}  conditional section
//! {{#unless path}} .. {{/unless}}      negated conditional
//! {{#each path}} .. {{else}} .. {{/each}}
//! {{! comment }}
//! ```
//!
//! Paths are `this`, `this.a.b`, `a.b`, `../a`, `@index`, `@first`, `@last`.
//! Inside `#each` a bare path resolves against the current element.
//!
//! Block tags that sit alone on their line are "standalone": the whole line,
//! including its newline, is dropped from the output. This keeps
//! `{{#each}}` bodies at exactly one rendered line per element.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::{LaddrrError, Result};

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Unless,
    Each,
}

impl BlockKind {
    fn name(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Unless => "unless",
            BlockKind::Each => "each",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "if" => Some(BlockKind::If),
            "unless" => Some(BlockKind::Unless),
            "each" => Some(BlockKind::Each),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DataVar {
    Index,
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathKind {
    /// Field lookup relative to a context; empty means `this`.
    Field(Vec<String>),
    Data(DataVar),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    up: usize,
    kind: PathKind,
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Var(Path),
    Block {
        kind: BlockKind,
        path: Path,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Token {
    Text(String),
    Var(Path),
    Open(BlockKind, Path),
    Else,
    Close(BlockKind),
    Comment,
}

impl Token {
    fn is_block_tag(&self) -> bool {
        matches!(
            self,
            Token::Open(..) | Token::Else | Token::Close(_) | Token::Comment
        )
    }
}

fn template_err(msg: impl Into<String>) -> LaddrrError {
    LaddrrError::Template(msg.into())
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = src;
    let mut offset = 0usize;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }
        let tag = &rest[start..];
        let at = offset + start;
        let (inner, consumed, triple) = if let Some(body) = tag.strip_prefix("{{{") {
            let end = body
                .find("}}}")
                .ok_or_else(|| template_err(format!("unterminated '{{{{{{' at byte {at}")))?;
            (&body[..end], end + 6, true)
        } else {
            let body = &tag[2..];
            let end = body
                .find("}}")
                .ok_or_else(|| template_err(format!("unterminated '{{{{' at byte {at}")))?;
            (&body[..end], end + 4, false)
        };
        tokens.push(classify(inner.trim(), triple, at)?);
        rest = &tag[consumed..];
        offset = at + consumed;
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

fn classify(inner: &str, triple: bool, at: usize) -> Result<Token> {
    if inner.is_empty() {
        return Err(template_err(format!("empty tag at byte {at}")));
    }
    if triple {
        return Ok(Token::Var(parse_path(inner, at)?));
    }
    if inner.starts_with('!') {
        return Ok(Token::Comment);
    }
    if inner == "else" {
        return Ok(Token::Else);
    }
    if let Some(open) = inner.strip_prefix('#') {
        let mut parts = open.split_whitespace();
        let name = parts.next().unwrap_or("");
        let kind = BlockKind::from_name(name)
            .ok_or_else(|| template_err(format!("unknown helper '#{name}' at byte {at}")))?;
        let arg = parts.next().ok_or_else(|| {
            template_err(format!("'#{name}' needs an argument at byte {at}"))
        })?;
        if parts.next().is_some() {
            return Err(template_err(format!(
                "'#{name}' takes exactly one argument at byte {at}"
            )));
        }
        return Ok(Token::Open(kind, parse_path(arg, at)?));
    }
    if let Some(close) = inner.strip_prefix('/') {
        let kind = BlockKind::from_name(close.trim())
            .ok_or_else(|| template_err(format!("unknown closing tag '/{close}' at byte {at}")))?;
        return Ok(Token::Close(kind));
    }
    Ok(Token::Var(parse_path(inner, at)?))
}

fn parse_path(raw: &str, at: usize) -> Result<Path> {
    if raw.chars().any(char::is_whitespace) {
        return Err(template_err(format!(
            "helpers are not supported: '{raw}' at byte {at}"
        )));
    }
    let mut rest = raw;
    let mut up = 0;
    while let Some(r) = rest.strip_prefix("../") {
        up += 1;
        rest = r;
    }
    if let Some(var) = rest.strip_prefix('@') {
        let data = match var {
            "index" => DataVar::Index,
            "first" => DataVar::First,
            "last" => DataVar::Last,
            other => {
                return Err(template_err(format!(
                    "unknown data variable '@{other}' at byte {at}"
                )))
            }
        };
        return Ok(Path {
            up,
            kind: PathKind::Data(data),
        });
    }

    let mut segments: Vec<String> = Vec::new();
    for (i, seg) in rest.split('.').enumerate() {
        if seg.is_empty() {
            return Err(template_err(format!("malformed path '{raw}' at byte {at}")));
        }
        if i == 0 && seg == "this" {
            continue;
        }
        segments.push(seg.to_string());
    }
    Ok(Path {
        up,
        kind: PathKind::Field(segments),
    })
}

// ---------------------------------------------------------------------------
// Standalone-line whitespace control
// ---------------------------------------------------------------------------

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t' || c == '\r')
}

/// Drop the lines occupied solely by block tags.
fn strip_standalone(tokens: &mut [Token]) {
    let n = tokens.len();
    // cut_start[i]: bytes to drop from the front of text token i
    // cut_end[i]:   byte offset to truncate text token i at
    let mut cut_start: Vec<Option<usize>> = vec![None; n];
    let mut cut_end: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        if !tokens[i].is_block_tag() {
            continue;
        }

        let left = if i == 0 {
            Some(None)
        } else if let Token::Text(t) = &tokens[i - 1] {
            match t.rfind('\n') {
                Some(nl) if is_blank(&t[nl + 1..]) => Some(Some(nl + 1)),
                None if i - 1 == 0 && is_blank(t) => Some(Some(0)),
                _ => None,
            }
        } else {
            None
        };

        let right = if i + 1 == n {
            Some(None)
        } else if let Token::Text(t) = &tokens[i + 1] {
            match t.find('\n') {
                Some(nl) if is_blank(&t[..nl]) => Some(Some(nl + 1)),
                None if i + 1 == n - 1 && is_blank(t) => Some(Some(t.len())),
                _ => None,
            }
        } else {
            None
        };

        if let (Some(l), Some(r)) = (left, right) {
            if let Some(end) = l {
                cut_end[i - 1] = Some(end);
            }
            if let Some(start) = r {
                cut_start[i + 1] = Some(start);
            }
        }
    }

    for (i, token) in tokens.iter_mut().enumerate() {
        if let Token::Text(t) = token {
            let start = cut_start[i].unwrap_or(0);
            let end = cut_end[i].unwrap_or(t.len());
            *t = if start <= end {
                t[start..end].to_string()
            } else {
                String::new()
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Tree building
// ---------------------------------------------------------------------------

struct OpenBlock {
    kind: BlockKind,
    path: Path,
    body: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

fn build(tokens: Vec<Token>) -> Result<Vec<Node>> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<OpenBlock> = Vec::new();

    fn sink<'a>(root: &'a mut Vec<Node>, stack: &'a mut [OpenBlock]) -> &'a mut Vec<Node> {
        match stack.last_mut() {
            Some(top) => match &mut top.otherwise {
                Some(o) => o,
                None => &mut top.body,
            },
            None => root,
        }
    }

    for token in tokens {
        match token {
            Token::Text(t) => {
                if !t.is_empty() {
                    sink(&mut root, &mut stack).push(Node::Text(t));
                }
            }
            Token::Comment => {}
            Token::Var(p) => sink(&mut root, &mut stack).push(Node::Var(p)),
            Token::Open(kind, path) => stack.push(OpenBlock {
                kind,
                path,
                body: Vec::new(),
                otherwise: None,
            }),
            Token::Else => match stack.last_mut() {
                Some(top) if top.otherwise.is_none() => top.otherwise = Some(Vec::new()),
                Some(top) => {
                    return Err(template_err(format!(
                        "duplicate {{{{else}}}} in {{{{#{}}}}}",
                        top.kind.name()
                    )))
                }
                None => return Err(template_err("{{else}} outside of a block")),
            },
            Token::Close(kind) => {
                let top = stack.pop().ok_or_else(|| {
                    template_err(format!("unexpected {{{{/{}}}}}", kind.name()))
                })?;
                if top.kind != kind {
                    return Err(template_err(format!(
                        "mismatched {{{{/{}}}}}, expected {{{{/{}}}}}",
                        kind.name(),
                        top.kind.name()
                    )));
                }
                sink(&mut root, &mut stack).push(Node::Block {
                    kind: top.kind,
                    path: top.path,
                    body: top.body,
                    otherwise: top.otherwise.unwrap_or_default(),
                });
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(template_err(format!(
            "unclosed {{{{#{}}}}}",
            open.kind.name()
        )));
    }
    Ok(root)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct Frame<'a> {
    value: &'a Value,
    /// (index, len) when this frame is an `#each` element.
    position: Option<(usize, usize)>,
}

fn resolve<'a>(path: &Path, frames: &[Frame<'a>]) -> Option<Cow<'a, Value>> {
    let depth = frames.len().checked_sub(1 + path.up)?;
    let frame = frames[depth];
    match &path.kind {
        PathKind::Field(segments) => {
            let mut cur = frame.value;
            for seg in segments {
                cur = match cur {
                    Value::Object(map) => map.get(seg)?,
                    Value::Array(arr) => arr.get(seg.parse::<usize>().ok()?)?,
                    _ => return None,
                };
            }
            Some(Cow::Borrowed(cur))
        }
        PathKind::Data(var) => {
            let (index, len) = frame.position?;
            let v = match var {
                DataVar::Index => Value::from(index),
                DataVar::First => Value::Bool(index == 0),
                DataVar::Last => Value::Bool(index + 1 == len),
            };
            Some(Cow::Owned(v))
        }
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

fn display(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

fn render_nodes(nodes: &[Node], frames: &[Frame<'_>], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Var(path) => {
                if let Some(v) = resolve(path, frames) {
                    display(&v, out);
                }
            }
            Node::Block {
                kind: BlockKind::If,
                path,
                body,
                otherwise,
            } => {
                let v = resolve(path, frames);
                let branch = if truthy(v.as_deref()) { body } else { otherwise };
                render_nodes(branch, frames, out);
            }
            Node::Block {
                kind: BlockKind::Unless,
                path,
                body,
                otherwise,
            } => {
                let v = resolve(path, frames);
                let branch = if truthy(v.as_deref()) { otherwise } else { body };
                render_nodes(branch, frames, out);
            }
            Node::Block {
                kind: BlockKind::Each,
                path,
                body,
                otherwise,
            } => {
                let list = resolve(path, frames);
                let items = match list.as_deref() {
                    Some(Value::Array(items)) if !items.is_empty() => items,
                    _ => {
                        render_nodes(otherwise, frames, out);
                        continue;
                    }
                };
                let len = items.len();
                let mut child = frames.to_vec();
                for (index, item) in items.iter().enumerate() {
                    child.push(Frame {
                        value: item,
                        position: Some((index, len)),
                    });
                    render_nodes(body, &child, out);
                    child.pop();
                }
            }
        }
    }
}

fn collect_root_fields(nodes: &[Node], depth: usize, out: &mut BTreeSet<String>) {
    let mut note = |path: &Path| {
        if path.up == depth {
            if let PathKind::Field(segments) = &path.kind {
                if let Some(first) = segments.first() {
                    out.insert(first.clone());
                }
            }
        }
    };
    let mut nested: Vec<(&[Node], usize)> = Vec::new();
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Var(path) => note(path),
            Node::Block {
                kind,
                path,
                body,
                otherwise,
            } => {
                note(path);
                let body_depth = if *kind == BlockKind::Each {
                    depth + 1
                } else {
                    depth
                };
                nested.push((body, body_depth));
                nested.push((otherwise, depth));
            }
        }
    }
    for (children, d) in nested {
        collect_root_fields(children, d, out);
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A parsed prompt template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut tokens = tokenize(source)?;
        strip_standalone(&mut tokens);
        let nodes = build(tokens)?;
        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// Render against `input`. Missing values render as empty text.
    pub fn render(&self, input: &Value) -> String {
        let mut out = String::with_capacity(self.source.len());
        let root = [Frame {
            value: input,
            position: None,
        }];
        render_nodes(&self.nodes, &root, &mut out);
        out
    }

    /// Top-level input fields this template reads.
    pub fn root_fields(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_root_fields(&self.nodes, 0, &mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(src: &str, input: Value) -> String {
        Template::parse(src).unwrap().render(&input)
    }

    #[test]
    fn interpolates_fields() {
        let out = render(
            "Objective: \"{{objective}}\" / {{{objective}}} / {{meta.owner}}",
            json!({ "objective": "a <b> & c", "meta": { "owner": "HR" } }),
        );
        assert_eq!(out, "Objective: \"a <b> & c\" / a <b> & c / HR");
    }

    #[test]
    fn non_string_values_and_missing_fields() {
        let out = render(
            "{{n}}|{{b}}|{{list}}|{{missing}}|{{nothing}}",
            json!({ "n": 3, "b": true, "list": [1, 2], "nothing": null }),
        );
        assert_eq!(out, "3|true|[1,2]||");
    }

    const TIP: &str = "**User Role:** {{{role}}}\n{{#if recentThemes}}\n**Recent Themes:** {{#each recentThemes}}{{{this}}}{{#unless @last}}, {{/unless}}{{/each}}\n{{/if}}\n\n**Examples:**";

    #[test]
    fn conditional_section_omitted_when_field_absent() {
        let out = render(TIP, json!({ "role": "Team Lead" }));
        assert_eq!(out, "**User Role:** Team Lead\n\n**Examples:**");
        assert!(!out.contains("Recent Themes"));
    }

    #[test]
    fn conditional_section_present_exactly_once() {
        let out = render(
            TIP,
            json!({ "role": "Team Lead", "recentThemes": ["Clarity", "Empathy"] }),
        );
        assert_eq!(
            out,
            "**User Role:** Team Lead\n**Recent Themes:** Clarity, Empathy\n\n**Examples:**"
        );
        assert_eq!(out.matches("Recent Themes").count(), 1);
    }

    #[test]
    fn empty_sequence_is_falsy() {
        let out = render(TIP, json!({ "role": "Employee", "recentThemes": [] }));
        assert!(!out.contains("Recent Themes"));
    }

    #[test]
    fn separator_between_elements_without_trailing() {
        let src = "{{#each xs}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}";
        for n in 0..5usize {
            let xs: Vec<String> = (0..n).map(|i| format!("e{i}")).collect();
            let out = render(src, json!({ "xs": xs }));
            assert_eq!(out, xs.join(", "));
            assert!(!out.ends_with(", "));
            if n > 0 {
                assert_eq!(out.split(", ").count(), n);
            }
        }
    }

    #[test]
    fn each_renders_one_line_per_element() {
        let src = "Responses:\n---\n{{#each anonymousResponses}}\n- \"{{this}}\"\n{{/each}}\n---\nDone";
        let out = render(src, json!({ "anonymousResponses": ["a", "b", "c"] }));
        assert_eq!(out, "Responses:\n---\n- \"a\"\n- \"b\"\n- \"c\"\n---\nDone");
    }

    #[test]
    fn loop_metadata_and_parent_access() {
        let src = "{{#each items}}{{@index}}:{{name}}@{{../team}}{{#if @first}}*{{/if}};{{/each}}";
        let out = render(
            src,
            json!({ "team": "core", "items": [{ "name": "a" }, { "name": "b" }] }),
        );
        assert_eq!(out, "0:a@core*;1:b@core;");
    }

    #[test]
    fn else_branches() {
        let src = "{{#if goals}}\n{{#each goals}}\n- {{this.area}}\n{{/each}}\n{{else}}\n- No active goals.\n{{/if}}\n";
        assert_eq!(render(src, json!({ "goals": [] })), "- No active goals.\n");
        assert_eq!(
            render(src, json!({ "goals": [{ "area": "Listening" }] })),
            "- Listening\n"
        );

        let each_else = "{{#each xs}}{{this}}{{else}}none{{/each}}";
        assert_eq!(render(each_else, json!({})), "none");
    }

    #[test]
    fn nested_blocks_with_indentation() {
        let src = "{{#each pastIssues}}\n  - With {{this.employeeName}}:\n    {{#if this.missedSignals}}\n    - Missed: {{#each this.missedSignals}}'{{this}}'{{#unless @last}}, {{/unless}}{{/each}}\n    {{/if}}\n{{/each}}\n";
        let out = render(
            src,
            json!({ "pastIssues": [
                { "employeeName": "Ann", "missedSignals": ["stress", "workload"] },
                { "employeeName": "Bo" }
            ] }),
        );
        assert_eq!(
            out,
            "  - With Ann:\n    - Missed: 'stress', 'workload'\n  - With Bo:\n"
        );
    }

    #[test]
    fn comments_vanish() {
        assert_eq!(render("a{{! note }}b", json!({})), "ab");
        assert_eq!(render("a\n{{! note }}\nb", json!({})), "a\nb");
    }

    #[test]
    fn parse_errors() {
        let cases = [
            ("{{#if x}}open", "unclosed"),
            ("{{#if x}}a{{/each}}", "mismatched"),
            ("a{{/if}}", "unexpected"),
            ("{{else}}", "outside"),
            ("{{#with x}}{{/with}}", "unknown helper"),
            ("{{}}", "empty tag"),
            ("{{name", "unterminated"),
            ("{{lookup a b}}", "helpers are not supported"),
            ("{{@key}}", "unknown data variable"),
            ("{{a..b}}", "malformed path"),
            ("{{#if}}{{/if}}", "needs an argument"),
        ];
        for (src, needle) in cases {
            let err = Template::parse(src).unwrap_err().to_string();
            assert!(err.contains(needle), "{src:?}: {err}");
        }
    }

    #[test]
    fn root_fields_skip_loop_locals() {
        let t = Template::parse(
            "{{userName}} {{#each pastIssues}}{{employeeName}} {{this.coachingRecs}} {{../userName}}{{/each}}{{#if goals}}{{goals.0}}{{/if}}{{@index}}",
        )
        .unwrap();
        let fields: Vec<_> = t.root_fields().into_iter().collect();
        assert_eq!(fields, vec!["goals", "pastIssues", "userName"]);
    }
}
