//! Finds imports of old API versions in code that is going to survive the trim.
//!
//! The scan is static and one hop deep: only files under directories that are
//! already known to be retained are read, and versions rescued by a reference
//! are not scanned in turn.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::types::{ApiSurface, ReferenceEdge, Retention, TrimOptions, VersionEntry};

/// A module path named by an import statement.
///
/// `from ..v2020_01_01.models import Foo` gives `level: 2` and
/// `parts: ["v2020_01_01", "models"]` (plus `[.., "Foo"]`, since the imported
/// name may itself be a submodule).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPath {
    pub line: usize,
    /// Number of leading dots. Zero for absolute imports.
    pub level: usize,
    pub parts: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ReferenceScan {
    pub edges: Vec<ReferenceEdge>,
    pub files_scanned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Dot,
    Comma,
    LParen,
    RParen,
    /// Ends a compound statement header, as in `try:` or `if TYPE_CHECKING:`.
    Colon,
    /// End of a logical statement: newline outside brackets, or `;`.
    End,
    Other,
}

#[derive(Debug)]
struct Spanned {
    token: Token,
    line: usize,
}

fn tokenize(source: &str) -> Vec<Spanned> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        let start = line;
        let token = match c {
            '\n' => {
                line += 1;
                if depth > 0 {
                    continue;
                }
                Token::End
            }
            '#' => {
                while chars.next_if(|&n| n != '\n').is_some() {}
                continue;
            }
            '\\' => {
                if chars.next_if_eq(&'\n').is_some() {
                    line += 1;
                    continue;
                }
                Token::Other
            }
            '\'' | '"' => {
                line = skip_string(&mut chars, c, line);
                Token::Other
            }
            ';' => Token::End,
            ':' => Token::Colon,
            // byte order mark left in by some editors
            '\u{feff}' => continue,
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => {
                depth += 1;
                Token::LParen
            }
            ')' => {
                depth = depth.saturating_sub(1);
                Token::RParen
            }
            '[' | '{' => {
                depth += 1;
                Token::Other
            }
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                Token::Other
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut name = String::from(c);
                while let Some(n) = chars.next_if(|&n| n.is_alphanumeric() || n == '_') {
                    name.push(n);
                }
                Token::Name(name)
            }
            c if c.is_whitespace() => continue,
            _ => Token::Other,
        };
        tokens.push(Spanned { token, line: start });
    }
    tokens.push(Spanned {
        token: Token::End,
        line,
    });
    tokens
}

/// Consume a string literal whose opening quote was already read. Returns the
/// line number after the literal.
fn skip_string(chars: &mut Peekable<Chars<'_>>, quote: char, mut line: usize) -> usize {
    let triple = if chars.next_if_eq(&quote).is_some() {
        if chars.next_if_eq(&quote).is_none() {
            // empty literal
            return line;
        }
        true
    } else {
        false
    };

    if triple {
        let mut run = 0;
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    run = 0;
                    if chars.next() == Some('\n') {
                        line += 1;
                    }
                }
                '\n' => {
                    run = 0;
                    line += 1;
                }
                c if c == quote => {
                    run += 1;
                    if run == 3 {
                        break;
                    }
                }
                _ => run = 0,
            }
        }
    } else {
        // an unterminated literal stops at the end of the line
        while let Some(c) = chars.next_if(|&c| c != '\n') {
            if c == '\\' {
                if chars.next() == Some('\n') {
                    line += 1;
                }
            } else if c == quote {
                break;
            }
        }
    }
    line
}

fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Name(name) if name == keyword)
}

/// Read `name(.name)*`, stopping before an `import` keyword.
fn dotted_name<'a, I>(iter: &mut Peekable<I>) -> Vec<String>
where
    I: Iterator<Item = &'a Spanned>,
{
    let mut parts = Vec::new();
    while let Some(spanned) = iter.peek() {
        match &spanned.token {
            Token::Name(name) if name != "import" => {
                parts.push(name.clone());
                iter.next();
            }
            _ => break,
        }
        if iter.next_if(|t| t.token == Token::Dot).is_none() {
            break;
        }
    }
    parts
}

fn parse_from(statement: &[Spanned], line: usize, imports: &mut Vec<ImportPath>) {
    let mut iter = statement.iter().peekable();
    let mut level = 0;
    while iter.next_if(|t| t.token == Token::Dot).is_some() {
        level += 1;
    }
    let module = dotted_name(&mut iter);
    if !iter.next().is_some_and(|t| is_keyword(&t.token, "import")) {
        return;
    }
    if level == 0 && module.is_empty() {
        return;
    }

    if !module.is_empty() {
        imports.push(ImportPath {
            line,
            level,
            parts: module.clone(),
        });
    }

    while let Some(spanned) = iter.next() {
        match &spanned.token {
            Token::Name(name) if name == "as" => {
                iter.next();
            }
            Token::Name(name) => {
                let mut parts = module.clone();
                parts.push(name.clone());
                imports.push(ImportPath {
                    line: spanned.line,
                    level,
                    parts,
                });
            }
            Token::Comma
            | Token::LParen
            | Token::RParen
            | Token::Colon
            | Token::Other
            | Token::Dot => {}
            Token::End => break,
        }
    }
}

fn parse_import(statement: &[Spanned], imports: &mut Vec<ImportPath>) {
    let mut iter = statement.iter().peekable();
    loop {
        let line = iter.peek().map(|t| t.line);
        let parts = dotted_name(&mut iter);
        if let Some(line) = line
            && !parts.is_empty()
        {
            imports.push(ImportPath {
                line,
                level: 0,
                parts,
            });
        }
        // skip `as alias` and move on to the next module
        if !iter.by_ref().any(|t| t.token == Token::Comma) {
            break;
        }
    }
}

/// Extract every module path named by `from ... import ...` and `import ...`
/// statements in `source`.
///
/// An import may also follow the header of a one-line compound statement,
/// e.g. `try: from .v1 import models`.
pub fn parse_imports(source: &str) -> Vec<ImportPath> {
    let tokens = tokenize(source);
    let mut imports = Vec::new();
    for statement in tokens.split(|t| t.token == Token::End) {
        for (idx, spanned) in statement.iter().enumerate() {
            if idx > 0 && statement[idx - 1].token != Token::Colon {
                continue;
            }
            let rest = &statement[idx + 1..];
            if is_keyword(&spanned.token, "from") {
                parse_from(rest, spanned.line, &mut imports);
                break;
            } else if is_keyword(&spanned.token, "import") {
                parse_import(rest, &mut imports);
                break;
            }
        }
    }
    imports
}

/// Deletion candidates, indexed for import resolution.
struct CandidateIndex<'a> {
    by_path: HashMap<&'a Path, &'a VersionEntry>,
    by_name: HashMap<&'a str, Vec<&'a VersionEntry>>,
}

impl<'a> CandidateIndex<'a> {
    fn new(surfaces: &'a [ApiSurface]) -> Self {
        let mut by_path = HashMap::new();
        let mut by_name: HashMap<&str, Vec<&VersionEntry>> = HashMap::new();
        for entry in surfaces
            .iter()
            .flat_map(|s| s.versions.iter())
            .filter(|v| v.retention == Some(Retention::Delete))
        {
            by_path.insert(entry.path.as_path(), entry);
            by_name.entry(entry.name.as_str()).or_default().push(entry);
        }
        CandidateIndex { by_path, by_name }
    }

    fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Find the candidate directory an import points into, if any.
    fn resolve(&self, file: &Path, import: &ImportPath) -> Option<&'a VersionEntry> {
        if import.level > 0 {
            let mut base = file.parent()?;
            for _ in 1..import.level {
                base = base.parent()?;
            }
            let mut path = base.to_path_buf();
            for part in &import.parts {
                path.push(part);
                if let Some(entry) = self.by_path.get(path.as_path()) {
                    return Some(*entry);
                }
            }
            None
        } else {
            // absolute imports need at least `package.version` to be matched
            // against the tail of a directory path
            (1..import.parts.len()).find_map(|idx| {
                let candidates = self.by_name.get(import.parts[idx].as_str())?;
                let tail: PathBuf = import.parts[..=idx].iter().collect();
                candidates.iter().copied().find(|v| v.path.ends_with(&tail))
            })
        }
    }
}

/// Directories (and loose files) whose content is known to survive before any
/// reference is taken into account.
fn retained_roots(surfaces: &[ApiSurface], options: &TrimOptions) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut dirs: Vec<PathBuf> = surfaces
        .iter()
        .flat_map(|s| s.versions.iter())
        .filter(|v| matches!(v.retention, Some(Retention::Newest | Retention::Unparsed)))
        .map(|v| v.path.clone())
        .collect();

    let mut files = Vec::new();
    for surface in surfaces {
        match fs::read_dir(&surface.path) {
            Ok(read_dir) => files.extend(
                read_dir
                    .flatten()
                    .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
                    .map(|e| e.path()),
            ),
            Err(e) => warn!("cannot list {}: {}", surface.path.display(), e),
        }
    }

    if !options.keep.is_empty() {
        dirs.extend(kept_dirs(options));
    }
    (dirs, files)
}

/// Top-most directories under the root matched by the keep list.
fn kept_dirs(options: &TrimOptions) -> Vec<PathBuf> {
    let mut kept = Vec::new();
    let mut walker = WalkDir::new(&options.root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            continue;
        }
        if options.is_kept(entry.path()) {
            kept.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }
    kept
}

fn source_files(dir: &Path, options: &TrimOptions) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || !(name.starts_with('.') || name == "__pycache__")
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable path while scanning imports: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && options.is_source_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Scan retained code for imports of deletion candidates.
///
/// Surfaces must already be classified. Edges are returned sorted and
/// deduplicated, so the result only depends on filesystem content.
pub fn scan_references(surfaces: &[ApiSurface], options: &TrimOptions) -> ReferenceScan {
    let index = CandidateIndex::new(surfaces);
    if index.is_empty() {
        return ReferenceScan::default();
    }

    let (dirs, loose_files) = retained_roots(surfaces, options);
    let mut files: BTreeSet<PathBuf> = loose_files
        .into_iter()
        .filter(|f| options.is_source_file(f))
        .collect();
    for dir in &dirs {
        files.extend(source_files(dir, options));
    }

    let mut edges = BTreeSet::new();
    for file in &files {
        let source = match fs::read(file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!("cannot read {}: {}", file.display(), e);
                continue;
            }
        };
        for import in parse_imports(&source) {
            if let Some(entry) = index.resolve(file, &import) {
                trace!(
                    "{}:{} imports {}",
                    file.display(),
                    import.line,
                    entry.path.display()
                );
                edges.insert(ReferenceEdge {
                    from: file.clone(),
                    line: import.line,
                    version: entry.path.clone(),
                });
            }
        }
    }

    debug!(
        "scanned {} retained file(s), found {} reference(s) to old versions",
        files.len(),
        edges.len()
    );
    ReferenceScan {
        edges: edges.into_iter().collect(),
        files_scanned: files.len(),
    }
}
