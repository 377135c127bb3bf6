//! The resource template language.
//!
//! Actions are delimited by `$(` and `)` so that manifests can keep using
//! `{{ }}` for anything downstream. Supported actions:
//!
//! - `$(name)` or `$(.name)` substitutes a value
//! - `$(if name)` / `$(if not name)` ... `$(else)` ... `$(end)` branches on truthiness
//! - `$(/* text */)` is a comment and produces no output
//!
//! Whitespace inside the delimiters is ignored. Actions may not span lines.

use kupak_schema::{Value, ValueMap};
use thiserror::Error;

const OPEN: &str = "$(";
const CLOSE: char = ')';
const COMMENT_OPEN: &str = "/*";
const COMMENT_CLOSE: &str = "*/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("line {line}: unterminated action")]
    UnterminatedAction { line: usize },
    #[error("line {line}: empty action")]
    EmptyAction { line: usize },
    #[error("line {line}: unterminated comment")]
    UnterminatedComment { line: usize },
    #[error("line {line}: invalid identifier '{ident}'")]
    InvalidIdentifier { line: usize, ident: String },
    #[error("line {line}: malformed action '{action}'")]
    MalformedAction { line: usize, action: String },
    #[error("line {line}: unexpected '{keyword}'")]
    Unexpected { line: usize, keyword: &'static str },
    #[error("line {line}: 'if' without matching 'end'")]
    MissingEnd { line: usize },
    #[error("line {line}: more than one 'else' in one 'if'")]
    DuplicateElse { line: usize },
    #[error("line {line}: no value named '{name}'")]
    Undefined { line: usize, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Var { name: String, line: usize },
    If { name: String, negate: bool, line: usize },
    Else { line: usize },
    End { line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Var {
        name: String,
        line: usize,
    },
    If {
        name: String,
        negate: bool,
        line: usize,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// A compiled template, ready to be executed any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let tokens = lex(source)?;
        let nodes = parse(tokens)?;
        Ok(Self { nodes })
    }

    /// Execute against `values`. Referencing a name that is not in the map
    /// is an error; an `Absent` value renders as nothing.
    pub fn render(&self, values: &ValueMap) -> Result<String, TemplateError> {
        let mut out = String::new();
        execute(&self.nodes, values, &mut out)?;
        Ok(out)
    }
}

fn lex(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line = 1;

    while let Some(start) = rest.find(OPEN) {
        let text = &rest[..start];
        if !text.is_empty() {
            tokens.push(Token::Text(text.to_owned()));
        }
        line += text.matches('\n').count();

        let body = &rest[start + OPEN.len()..];
        let trimmed = body.trim_start_matches([' ', '\t']);
        let consumed = if let Some(comment) = trimmed.strip_prefix(COMMENT_OPEN) {
            let end = comment
                .find(COMMENT_CLOSE)
                .ok_or(TemplateError::UnterminatedComment { line })?;
            let after = comment[end + COMMENT_CLOSE.len()..].trim_start_matches([' ', '\t']);
            if !after.starts_with(CLOSE) {
                return Err(TemplateError::UnterminatedAction { line });
            }
            let comment_lines = comment[..end].matches('\n').count();
            let used = body.len() - after.len() + CLOSE.len_utf8();
            line += comment_lines;
            used
        } else {
            let end = body
                .find([CLOSE, '\n'])
                .filter(|&i| body[i..].starts_with(CLOSE))
                .ok_or(TemplateError::UnterminatedAction { line })?;
            tokens.push(action(&body[..end], line)?);
            end + CLOSE.len_utf8()
        };

        rest = &body[consumed..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_owned()));
    }
    Ok(tokens)
}

fn action(content: &str, line: usize) -> Result<Token, TemplateError> {
    let words: Vec<&str> = content.split_whitespace().collect();
    match words.as_slice() {
        [] => Err(TemplateError::EmptyAction { line }),
        ["else"] => Ok(Token::Else { line }),
        ["end"] => Ok(Token::End { line }),
        ["if"] | ["if", "not"] => Err(TemplateError::MalformedAction {
            line,
            action: content.trim().to_owned(),
        }),
        ["if", "not", name] => Ok(Token::If {
            name: identifier(name, line)?,
            negate: true,
            line,
        }),
        ["if", name] => Ok(Token::If {
            name: identifier(name, line)?,
            negate: false,
            line,
        }),
        [name] => Ok(Token::Var {
            name: identifier(name, line)?,
            line,
        }),
        _ => Err(TemplateError::MalformedAction {
            line,
            action: content.trim().to_owned(),
        }),
    }
}

fn identifier(word: &str, line: usize) -> Result<String, TemplateError> {
    let name = word.strip_prefix('.').unwrap_or(word);
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name.to_owned())
    } else {
        Err(TemplateError::InvalidIdentifier {
            line,
            ident: word.to_owned(),
        })
    }
}

struct OpenIf {
    name: String,
    negate: bool,
    line: usize,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

fn sink<'a>(root: &'a mut Vec<Node>, open: &'a mut [OpenIf]) -> &'a mut Vec<Node> {
    match open.last_mut() {
        Some(frame) => match &mut frame.otherwise {
            Some(branch) => branch,
            None => &mut frame.then,
        },
        None => root,
    }
}

fn parse(tokens: Vec<Token>) -> Result<Vec<Node>, TemplateError> {
    let mut root = Vec::new();
    let mut open: Vec<OpenIf> = Vec::new();

    for token in tokens {
        match token {
            Token::Text(text) => sink(&mut root, &mut open).push(Node::Text(text)),
            Token::Var { name, line } => sink(&mut root, &mut open).push(Node::Var { name, line }),
            Token::If { name, negate, line } => open.push(OpenIf {
                name,
                negate,
                line,
                then: Vec::new(),
                otherwise: None,
            }),
            Token::Else { line } => {
                let frame = open.last_mut().ok_or(TemplateError::Unexpected {
                    line,
                    keyword: "else",
                })?;
                if frame.otherwise.is_some() {
                    return Err(TemplateError::DuplicateElse { line });
                }
                frame.otherwise = Some(Vec::new());
            }
            Token::End { line } => {
                let frame = open.pop().ok_or(TemplateError::Unexpected {
                    line,
                    keyword: "end",
                })?;
                let node = Node::If {
                    name: frame.name,
                    negate: frame.negate,
                    line: frame.line,
                    then: frame.then,
                    otherwise: frame.otherwise.unwrap_or_default(),
                };
                sink(&mut root, &mut open).push(node);
            }
        }
    }

    match open.pop() {
        Some(frame) => Err(TemplateError::MissingEnd { line: frame.line }),
        None => Ok(root),
    }
}

fn execute(nodes: &[Node], values: &ValueMap, out: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var { name, line } => {
                let value = lookup(values, name, *line)?;
                out.push_str(&value.as_text());
            }
            Node::If {
                name,
                negate,
                line,
                then,
                otherwise,
            } => {
                let truthy = lookup(values, name, *line)?.is_truthy();
                let branch = if truthy != *negate { then } else { otherwise };
                execute(branch, values, out)?;
            }
        }
    }
    Ok(())
}

fn lookup<'a>(
    values: &'a ValueMap,
    name: &str,
    line: usize,
) -> Result<&'a Value, TemplateError> {
    values.get(name).ok_or_else(|| TemplateError::Undefined {
        line,
        name: name.to_owned(),
    })
}
