//! File formats for config data.

use std::fmt;
use std::path::Path;

use super::source::{coerce_value, PropertySource};
use super::ConfigDataError;

/// Line that separates documents inside a single file.
const DOCUMENT_SEPARATOR: &str = "#---";

/// Parses the contents of one config file into property sources.
///
/// A file may hold several documents separated by `#---` lines. Each non-empty
/// document becomes its own source, in file order.
pub trait PropertySourceLoader: Send + Sync + fmt::Debug {
    /// Extensions handled by this loader, without the leading dot.
    fn file_extensions(&self) -> &[&'static str];

    fn load(
        &self,
        name: &str,
        path: &Path,
        contents: &str,
    ) -> Result<Vec<PropertySource>, ConfigDataError>;
}

/// Loads `.toml` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlPropertySourceLoader;

impl PropertySourceLoader for TomlPropertySourceLoader {
    fn file_extensions(&self) -> &[&'static str] {
        &["toml"]
    }

    fn load(
        &self,
        name: &str,
        path: &Path,
        contents: &str,
    ) -> Result<Vec<PropertySource>, ConfigDataError> {
        let documents = split_documents(contents);
        let multi = documents.len() > 1;
        let mut sources = Vec::with_capacity(documents.len());

        for (index, document) in documents.iter().enumerate() {
            let table: toml::Table =
                toml::from_str(document).map_err(|e| ConfigDataError::ParseError {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            if !table.is_empty() {
                sources.push(PropertySource::from_table(
                    document_name(name, index, multi),
                    table,
                ));
            }
        }

        Ok(sources)
    }
}

/// Loads Java-style `.properties` files.
///
/// Supports `key=value`, `key: value` and `key value` lines, `#` and `!`
/// comments, trailing-backslash continuations and the usual escapes. Values
/// are coerced to booleans and numbers where that is lossless.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesPropertySourceLoader;

impl PropertySourceLoader for PropertiesPropertySourceLoader {
    fn file_extensions(&self) -> &[&'static str] {
        &["properties"]
    }

    fn load(
        &self,
        name: &str,
        path: &Path,
        contents: &str,
    ) -> Result<Vec<PropertySource>, ConfigDataError> {
        let mut documents = Vec::new();
        let mut current = Vec::new();
        let mut document_start = 1;

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim() == DOCUMENT_SEPARATOR {
                documents.push((document_start, std::mem::take(&mut current)));
                document_start = line_no + 2;
                continue;
            }
            current.push(line);
        }
        documents.push((document_start, current));

        let multi = documents.len() > 1;
        let mut sources = Vec::with_capacity(documents.len());
        for (index, (start, lines)) in documents.into_iter().enumerate() {
            let mut source = PropertySource::new(document_name(name, index, multi));
            for (key, value) in parse_properties(path, start, &lines)? {
                source.insert(key, coerce_value(&value));
            }
            if !source.is_empty() {
                sources.push(source);
            }
        }

        Ok(sources)
    }
}

fn document_name(name: &str, index: usize, multi: bool) -> String {
    if multi {
        format!("{name} (document #{})", index + 1)
    } else {
        name.to_string()
    }
}

fn split_documents(contents: &str) -> Vec<String> {
    let mut documents = vec![String::new()];
    for line in contents.lines() {
        if line.trim() == DOCUMENT_SEPARATOR {
            documents.push(String::new());
            continue;
        }
        if let Some(current) = documents.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    documents
}

fn parse_properties(
    path: &Path,
    first_line: usize,
    lines: &[&str],
) -> Result<Vec<(String, String)>, ConfigDataError> {
    let mut entries = Vec::new();
    let mut logical = String::new();
    let mut logical_start = first_line;

    for (i, raw) in lines.iter().enumerate() {
        let line_no = first_line + i;
        let line = if logical.is_empty() {
            logical_start = line_no;
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            trimmed
        } else {
            raw.trim_start()
        };

        if ends_with_continuation(line) {
            logical.push_str(&line[..line.len() - 1]);
            continue;
        }
        logical.push_str(line);

        let entry = std::mem::take(&mut logical);
        let (key, value) = split_entry(&entry);
        let key = unescape(key, path, logical_start)?;
        if key.is_empty() {
            return Err(ConfigDataError::PropertiesSyntax {
                path: path.to_path_buf(),
                line: logical_start,
                message: "missing key".to_string(),
            });
        }
        entries.push((key, unescape(value, path, logical_start)?));
    }

    if !logical.is_empty() {
        let (key, value) = split_entry(&logical);
        entries.push((
            unescape(key, path, logical_start)?,
            unescape(value, path, logical_start)?,
        ));
    }

    Ok(entries)
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(entry: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in entry.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (entry[..i].trim_end(), entry[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = entry[i..].trim_start();
                let rest = rest
                    .strip_prefix(|c: char| c == '=' || c == ':')
                    .map(str::trim_start)
                    .unwrap_or(rest);
                return (&entry[..i], rest);
            }
            _ => {}
        }
    }
    (entry, "")
}

fn unescape(s: &str, path: &Path, line: usize) -> Result<String, ConfigDataError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| ConfigDataError::PropertiesSyntax {
                        path: path.to_path_buf(),
                        line,
                        message: format!("malformed \\u escape '\\u{hex}'"),
                    })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

/// Reads a config file.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub(crate) fn read_resource(path: &Path) -> Result<Option<String>, ConfigDataError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigDataError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use toml::Value;

    #[test]
    fn test_read_resource_loads_existing_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "key = \"value\"").unwrap();

        let contents = read_resource(file.path()).unwrap();
        assert_eq!(contents.as_deref(), Some("key = \"value\"\n"));
    }

    #[test]
    fn test_read_resource_missing() {
        let contents = read_resource(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert!(contents.is_none());
    }

    #[test]
    fn test_toml_single_document() {
        let sources = TomlPropertySourceLoader
            .load(
                "app",
                Path::new("app.toml"),
                "[server]\nport = 8080\nhost = \"localhost\"\n",
            )
            .unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "app");
        assert_eq!(sources[0].get("server.port"), Some(&Value::Integer(8080)));
    }

    #[test]
    fn test_toml_multi_document() {
        let contents = "greeting = \"hi\"\n#---\ngreeting = \"prod hi\"\n[config.activate]\non-profile = \"prod\"\n";
        let sources = TomlPropertySourceLoader
            .load("app", Path::new("app.toml"), contents)
            .unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name(), "app (document #1)");
        assert_eq!(sources[1].name(), "app (document #2)");
        assert_eq!(
            sources[1].get("config.activate.on-profile"),
            Some(&Value::String("prod".into()))
        );
    }

    #[test]
    fn test_toml_parse_error_reports_path() {
        let result = TomlPropertySourceLoader.load("bad", Path::new("bad.toml"), "key = ");
        assert!(matches!(result, Err(ConfigDataError::ParseError { .. })));
    }

    #[test]
    fn test_properties_syntax() {
        let contents = "\
# comment
! also a comment
greeting=hello
server.port: 8080
name   spaced value
escaped\\=key = a\\tb
long = first \\
       second
unicode = \\u0041
";
        let sources = PropertiesPropertySourceLoader
            .load("p", Path::new("p.properties"), contents)
            .unwrap();
        let source = &sources[0];

        assert_eq!(source.get("greeting"), Some(&Value::String("hello".into())));
        assert_eq!(source.get("server.port"), Some(&Value::Integer(8080)));
        assert_eq!(source.get("name"), Some(&Value::String("spaced value".into())));
        assert_eq!(source.get("escaped=key"), Some(&Value::String("a\tb".into())));
        assert_eq!(source.get("long"), Some(&Value::String("first second".into())));
        assert_eq!(source.get("unicode"), Some(&Value::String("A".into())));
    }

    #[test]
    fn test_properties_multi_document() {
        let contents = "a=1\n#---\nconfig.activate.on-profile=dev\na=2\n";
        let sources = PropertiesPropertySourceLoader
            .load("p", Path::new("p.properties"), contents)
            .unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_properties_bad_unicode_escape() {
        let result =
            PropertiesPropertySourceLoader.load("p", Path::new("p.properties"), "a=\\uZZ\n");
        assert!(matches!(
            result,
            Err(ConfigDataError::PropertiesSyntax { line: 1, .. })
        ));
    }
}
