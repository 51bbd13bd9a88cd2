//! Importer for Doxygen `search/*.js` symbol tables.
//!
//! Doxygen writes its client-side search index as JavaScript:
//!
//! ```text
//! var searchData=
//! [
//!   ['close',['close',['../class_aft_transport.html#a...',1,'AftTransport::close()']]],
//!   ['nodes',['Nodes',['../group___aft_nodes.html',1,'']]]
//! ];
//! ```
//!
//! Each item becomes one [`SymbolRecord`], each `[url, flag, scope]` triple a [`Hit`].

use crate::error::ImportError;
use crate::index::key;
use crate::types::{EntityKind, Hit, SymbolRecord};
use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+searchData\s*=\s*").unwrap());

/// File name prefix of Doxygen's "all" category, which lists every symbol.
const ALL_PREFIX: &str = "all_";

/// Group label for records whose hits are all group pages.
pub const GROUPS_LABEL: &str = "Groups";
/// Group label for records whose hits are all plain pages.
pub const PAGES_LABEL: &str = "Pages";
/// Group label for records whose hits are all file pages.
pub const FILES_LABEL: &str = "Files";

/// Imports a single `.js` file or the search data files under a directory.
pub async fn import_path(path: &Path) -> Result<Vec<SymbolRecord>, ImportError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.is_dir() {
        import_dir(path).await
    } else {
        import_file(path).await
    }
}

pub async fn import_file(path: &Path) -> Result<Vec<SymbolRecord>, ImportError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_search_data(&text, path)
}

/// Imports the `searchData` files under `dir` (gitignore aware), in path order.
///
/// Doxygen repeats every symbol of `all_*.js` in a category file such as
/// `functions_*.js`, so when `all_*.js` files are present only those are read.
/// Files without a `searchData` assignment (`search.js`, `searchdata.js`) are skipped.
pub async fn import_dir(dir: &Path) -> Result<Vec<SymbolRecord>, ImportError> {
    let files = select_search_files(find_js_files(dir).await?);
    tracing::debug!("Found {} search data files under {}", files.len(), dir.display());

    let mut records = Vec::new();
    let mut imported = 0;
    for file in &files {
        match import_file(file).await {
            Ok(file_records) => {
                records.extend(file_records);
                imported += 1;
            }
            Err(ImportError::MissingAssignment { path }) => {
                tracing::debug!("Skipping {}: no searchData table", path.display());
            }
            Err(e) => return Err(e),
        }
    }
    tracing::info!(
        "Imported {} records from {} files under {}",
        records.len(),
        imported,
        dir.display()
    );
    Ok(records)
}

/// Keeps only `all_*.js` files when any exist.
fn select_search_files(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let is_all = |path: &PathBuf| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(ALL_PREFIX))
    };
    if files.iter().any(is_all) {
        files.into_iter().filter(is_all).collect()
    } else {
        files
    }
}

/// Walks `dir` for `.js` files in sorted order, so imports are reproducible.
async fn find_js_files(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let root = dir.to_path_buf();
    let walk_root = root.clone();

    tokio::task::spawn_blocking(move || {
        let mut files: Vec<PathBuf> = WalkBuilder::new(&walk_root)
            .require_git(false)
            .build()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == "js")
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    })
    .await
    .map_err(|e| ImportError::Io {
        path: root,
        source: std::io::Error::other(e),
    })
}

/// Parses the text of one `searchData` file.
pub fn parse_search_data(text: &str, path: &Path) -> Result<Vec<SymbolRecord>, ImportError> {
    let start = ASSIGNMENT
        .find(text)
        .ok_or_else(|| ImportError::MissingAssignment {
            path: path.to_path_buf(),
        })?
        .end();

    let mut parser = Parser {
        text,
        pos: start,
        path,
    };
    let Value::List(items) = parser.value()? else {
        return Err(parser.syntax("expected `[` after `searchData =`"));
    };
    parser.skip_whitespace();
    if parser.peek() == Some(b';') {
        parser.pos += 1;
        parser.skip_whitespace();
    }
    if parser.pos < text.len() {
        return Err(parser.syntax("trailing content after the symbol table"));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| record_from(item).map_err(|message| ImportError::Shape {
            path: path.to_path_buf(),
            index,
            message,
        }))
        .collect()
}

/// Converts `['key', ['Display', [url, flag, scope], ...]]` into a record.
fn record_from(item: Value) -> Result<SymbolRecord, String> {
    let Value::List(parts) = item else {
        return Err("item is not a list".to_string());
    };
    let [Value::Str(raw_key), Value::List(body)] = <[Value; 2]>::try_from(parts)
        .map_err(|parts| format!("expected [key, [...]], got {} elements", parts.len()))?
    else {
        return Err("expected [key, [...]]".to_string());
    };

    let mut body = body.into_iter();
    let Some(Value::Str(display_name)) = body.next() else {
        return Err(format!("'{}' has no display name", raw_key));
    };
    let display_name = decode_entities(&display_name);

    let hits = body
        .map(hit_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|message| format!("'{}': {}", raw_key, message))?;
    if hits.is_empty() {
        return Err(format!("'{}' has no hits", raw_key));
    }

    // Doxygen keys are already normalized; fall back to the display name if not
    let search_key = if key::validate(&raw_key).is_ok() {
        raw_key
    } else {
        tracing::debug!("Re-normalizing invalid key '{}'", raw_key);
        key::normalize(&display_name)
    };

    let group_label = label_for(&hits);
    Ok(SymbolRecord {
        search_key,
        display_name,
        group_label: group_label.map(str::to_string),
        hits,
    })
}

fn hit_from(value: Value) -> Result<Hit, String> {
    let Value::List(parts) = value else {
        return Err("hit is not a list".to_string());
    };
    let mut parts = parts.into_iter();
    let Some(Value::Str(url)) = parts.next() else {
        return Err("hit has no url".to_string());
    };
    // The second element is Doxygen's link flag; not needed here
    let scope = match parts.nth(1) {
        Some(Value::Str(scope)) if !scope.is_empty() => Some(decode_entities(&scope)),
        Some(Value::Str(_)) | None => None,
        Some(_) => return Err(format!("hit '{}' has a non-string scope", url)),
    };

    let hit = Hit::new(url.as_str()).with_kind(hit_kind(&url));
    Ok(match scope {
        Some(scope) => hit.with_scope(scope),
        None => hit,
    })
}

/// Classifies a Doxygen URL by its page name and anchor.
pub fn hit_kind(url: &str) -> EntityKind {
    let (page, anchor) = match url.split_once('#') {
        Some((page, anchor)) => (page, Some(anchor)),
        None => (url, None),
    };
    if anchor.is_some_and(|anchor| !anchor.is_empty()) {
        return EntityKind::Member;
    }

    let page = page.rsplit('/').next().unwrap_or(page);
    if page.starts_with("group_") {
        EntityKind::Group
    } else if page.starts_with("namespace") {
        EntityKind::Namespace
    } else if ["class_", "struct_", "union_"]
        .iter()
        .any(|prefix| page.starts_with(prefix))
    {
        EntityKind::Class
    } else if page.contains("_8") {
        EntityKind::File
    } else {
        EntityKind::Page
    }
}

/// Label for a record whose hits all point at one kind of page.
fn label_for(hits: &[Hit]) -> Option<&'static str> {
    let first = hits.first()?.kind?;
    if hits.iter().any(|hit| hit.kind != Some(first)) {
        return None;
    }
    match first {
        EntityKind::Group => Some(GROUPS_LABEL),
        EntityKind::Page => Some(PAGES_LABEL),
        EntityKind::File => Some(FILES_LABEL),
        EntityKind::Member | EntityKind::Class | EntityKind::Namespace => None,
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// The JavaScript literal subset Doxygen emits.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    /// Numbers only appear as link flags, which the importer ignores.
    Int,
    List(Vec<Value>),
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    path: &'a Path,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn syntax(&self, message: impl Into<String>) -> ImportError {
        ImportError::Syntax {
            path: self.path.to_path_buf(),
            offset: self.pos,
            message: message.into(),
        }
    }

    fn value(&mut self) -> Result<Value, ImportError> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'[') => self.list(),
            Some(quote @ (b'\'' | b'"')) => self.string(quote).map(Value::Str),
            Some(b'-' | b'0'..=b'9') => self.int(),
            Some(other) => Err(self.syntax(format!("unexpected '{}'", other as char))),
            None => Err(self.syntax("unexpected end of input")),
        }
    }

    fn list(&mut self) -> Result<Value, ImportError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b']') {
                self.pos += 1;
                return Ok(Value::List(items));
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                Some(_) => return Err(self.syntax("expected ',' or ']'")),
                None => return Err(self.syntax("unterminated list")),
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<String, ImportError> {
        self.pos += 1;
        let text = self.text;
        let mut out = String::new();
        let mut chars = text[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                c if c as u32 == u32::from(quote) => {
                    self.pos += offset + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c => out.push(c),
            }
        }
        self.pos = self.text.len();
        Err(self.syntax("unterminated string"))
    }

    fn int(&mut self) -> Result<Value, ImportError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        self.text[start..self.pos]
            .parse::<i64>()
            .map(|_| Value::Int)
            .map_err(|e| self.syntax(format!("bad number: {}", e)))
    }
}
