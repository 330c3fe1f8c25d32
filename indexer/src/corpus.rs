//! Turns files on disk into `(identifier, content)` documents.

use anyhow::{Context, Result};
use owtsearch_core::Document;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use xz2::read::XzDecoder;

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(alias = "body")]
    content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Json,
    Jsonl,
    Text,
    /// xz-compressed tar archive, one document per regular member.
    Archive,
}

impl SourceKind {
    pub fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str())? {
            "json" => Some(Self::Json),
            "jsonl" => Some(Self::Jsonl),
            "txt" => Some(Self::Text),
            "xz" => Some(Self::Archive),
            _ => None,
        }
    }
}

/// All ingestible files under `input`, in a stable order.
pub fn discover(input: &Path) -> Vec<PathBuf> {
    if input.is_file() {
        return SourceKind::of(input).map(|_| vec![input.to_path_buf()]).unwrap_or_default();
    }
    WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && SourceKind::of(e.path()).is_some())
        .map(|e| e.into_path())
        .collect()
}

/// Feeds every document in `file` to `sink` and returns how many were read.
///
/// Errors coming out of `sink` are passed through unchanged so the caller can
/// tell a rejected document from an unreadable file.
pub fn read_source<F>(root: &Path, file: &Path, sink: &mut F) -> Result<usize>
where
    F: FnMut(Document) -> owtsearch_core::Result<()>,
{
    match SourceKind::of(file) {
        Some(SourceKind::Json) => read_json(file, sink),
        Some(SourceKind::Jsonl) => read_jsonl(file, sink),
        Some(SourceKind::Text) => read_text(root, file, sink),
        Some(SourceKind::Archive) => read_archive(file, sink),
        None => Ok(0),
    }
}

fn read_jsonl<F>(file: &Path, sink: &mut F) -> Result<usize>
where
    F: FnMut(Document) -> owtsearch_core::Result<()>,
{
    let reader = BufReader::new(File::open(file)?);
    let mut n = 0;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: InputDoc =
            serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        sink(Document::new(doc.id, doc.content))?;
        n += 1;
    }
    Ok(n)
}

fn read_json<F>(file: &Path, sink: &mut F) -> Result<usize>
where
    F: FnMut(Document) -> owtsearch_core::Result<()>,
{
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs: Vec<InputDoc> = match json {
        serde_json::Value::Array(arr) => arr.into_iter().map(serde_json::from_value).collect::<Result<_, _>>()?,
        obj @ serde_json::Value::Object(_) => vec![serde_json::from_value(obj)?],
        _ => Vec::new(),
    };
    let n = docs.len();
    for doc in docs {
        sink(Document::new(doc.id, doc.content))?;
    }
    Ok(n)
}

fn read_text<F>(root: &Path, file: &Path, sink: &mut F) -> Result<usize>
where
    F: FnMut(Document) -> owtsearch_core::Result<()>,
{
    let bytes = std::fs::read(file)?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    if content.is_empty() {
        return Ok(0);
    }
    let rel = match file.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => Path::new(file.file_name().unwrap_or(file.as_os_str())),
    };
    sink(Document::new(rel.to_string_lossy().replace('\\', "/"), content))?;
    Ok(1)
}

fn read_archive<F>(file: &Path, sink: &mut F) -> Result<usize>
where
    F: FnMut(Document) -> owtsearch_core::Result<()>,
{
    let archive_name = file.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let decoder = XzDecoder::new(BufReader::new(File::open(file)?));
    let mut archive = tar::Archive::new(decoder);
    let mut n = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let member = entry.path()?.to_string_lossy().into_owned();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        let content = String::from_utf8_lossy(&buf).into_owned();
        if content.is_empty() {
            continue;
        }
        sink(Document::new(format!("{archive_name}/{member}"), content))?;
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use xz2::write::XzEncoder;

    fn write_archive(path: &Path, members: &[(&str, &str)]) {
        let encoder = XzEncoder::new(File::create(path).unwrap(), 6);
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn collect(root: &Path, file: &Path) -> Vec<Document> {
        let mut docs = Vec::new();
        read_source(root, file, &mut |d| {
            docs.push(d);
            Ok(())
        })
        .unwrap();
        docs
    }

    #[test]
    fn archive_members_become_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("urlsf_subset00-1_data.xz");
        write_archive(&path, &[("0001.txt", "first page"), ("0002.txt", ""), ("0003.txt", "third page")]);
        let docs = collect(dir.path(), &path);
        assert_eq!(
            docs,
            vec![
                Document::new("urlsf_subset00-1_data.xz/0001.txt", "first page"),
                Document::new("urlsf_subset00-1_data.xz/0003.txt", "third page"),
            ]
        );
    }

    #[test]
    fn json_lines_accept_body_or_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");
        let mut f = File::create(&path).unwrap();
        writeln!(f, r#"{{"id": "a", "body": "alpha"}}"#).unwrap();
        writeln!(f).unwrap();
        writeln!(f, r#"{{"id": "b", "content": "beta", "title": "ignored"}}"#).unwrap();
        let docs = collect(dir.path(), &path);
        assert_eq!(docs, vec![Document::new("a", "alpha"), Document::new("b", "beta")]);
    }

    #[test]
    fn text_files_use_relative_path() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        let path = dir.path().join("sub/page.txt");
        fs::write(&path, "hello").unwrap();
        assert_eq!(discover(dir.path()), vec![path.clone()]);
        assert_eq!(collect(dir.path(), &path), vec![Document::new("sub/page.txt", "hello")]);
    }

    #[test]
    fn sink_errors_pass_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.json");
        fs::write(&path, r#"[{"id": "a", "body": "x"}, {"id": "a", "body": "y"}]"#).unwrap();
        let mut seen = std::collections::HashSet::new();
        let err = read_source(dir.path(), &path, &mut |d: Document| {
            if seen.insert(d.identifier.clone()) {
                Ok(())
            } else {
                Err(owtsearch_core::SearchError::DuplicateIdentifier(d.identifier))
            }
        })
        .unwrap_err();
        assert!(err.downcast_ref::<owtsearch_core::SearchError>().is_some());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xz");
        fs::write(&path, b"not xz at all").unwrap();
        assert!(read_source(dir.path(), &path, &mut |_| Ok(())).is_err());
    }
}
