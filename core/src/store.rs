//! Read-only access to a committed index.
//!
//! An [`IndexReader`] is opened once and then shared (`Arc`) between request
//! handlers. Nothing in it is mutated after `open`, so lookups need no locks.

use crate::analyzer::Analyzer;
use crate::error::{Result, SearchError};
use crate::index::{DocId, DocMeta, Posting, TermInfo};
use crate::persist::{check_stamp, load_bincode, load_meta, FileStamp, IndexPaths, MetaFile, FORMAT_VERSION};
use memmap2::Mmap;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::Path;

/// A memory-mapped data file. Empty files are not mapped.
struct Mapped {
    map: Option<Mmap>,
}

impl Mapped {
    fn open(path: &Path, expected: &FileStamp) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len != expected.len {
            return Err(SearchError::Corrupt(format!(
                "{}: expected {} bytes, found {}",
                path.display(),
                expected.len,
                len
            )));
        }
        if len == 0 {
            return Ok(Self { map: None });
        }
        // SAFETY: the index directory is immutable once committed; builders
        // only ever write to a separate staging directory.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map: Some(map) })
    }

    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    fn slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let start = usize::try_from(offset).map_err(|_| SearchError::Corrupt("offset overflow".into()))?;
        let end = start
            .checked_add(usize::try_from(len).map_err(|_| SearchError::Corrupt("length overflow".into()))?)
            .ok_or_else(|| SearchError::Corrupt("range overflow".into()))?;
        self.bytes()
            .get(start..end)
            .ok_or_else(|| SearchError::Corrupt(format!("range {start}..{end} outside data file")))
    }
}

pub struct IndexReader {
    paths: IndexPaths,
    meta: MetaFile,
    dictionary: HashMap<String, TermInfo>,
    docs: Vec<DocMeta>,
    ids: HashMap<String, DocId>,
    postings: Mapped,
    texts: Mapped,
    avg_doc_len: f32,
}

impl std::fmt::Debug for IndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexReader")
            .field("root", &self.paths.root)
            .field("documents", &self.docs.len())
            .field("terms", &self.dictionary.len())
            .finish()
    }
}

impl IndexReader {
    /// Opens the index at `root` for querying with `analyzer`.
    ///
    /// Every failure, including an analyzer that differs from the one the
    /// index was built with, is reported as [`SearchError::StartupFatal`].
    pub fn open<P: AsRef<Path>>(root: P, analyzer: &dyn Analyzer) -> Result<Self> {
        let paths = IndexPaths::new(root);
        let fatal = |reason: String| SearchError::startup_fatal(&paths.root, reason);

        if !paths.root.is_dir() {
            return Err(fatal("index directory does not exist".into()));
        }
        let meta = load_meta(&paths).map_err(|e| fatal(format!("unreadable meta.json: {e}")))?;
        if meta.version != FORMAT_VERSION {
            return Err(fatal(format!("unsupported index version {} (expected {FORMAT_VERSION})", meta.version)));
        }
        if meta.analyzer != analyzer.name() {
            return Err(fatal(format!(
                "index was built with analyzer `{}` but `{}` was supplied",
                meta.analyzer,
                analyzer.name()
            )));
        }

        let dictionary: HashMap<String, TermInfo> =
            load_bincode(&paths.dictionary(), &meta.dictionary).map_err(|e| fatal(format!("dictionary: {e}")))?;
        let docs: Vec<DocMeta> = load_bincode(&paths.docs(), &meta.docs).map_err(|e| fatal(format!("docs: {e}")))?;
        let postings = Mapped::open(&paths.postings(), &meta.postings).map_err(|e| fatal(format!("postings: {e}")))?;
        let texts = Mapped::open(&paths.texts(), &meta.texts).map_err(|e| fatal(format!("texts: {e}")))?;

        if docs.len() != meta.num_docs as usize || dictionary.len() != meta.num_terms as usize {
            return Err(fatal("document or term count disagrees with meta.json".into()));
        }
        let ids: HashMap<String, DocId> =
            docs.iter().enumerate().map(|(i, d)| (d.identifier.clone(), i as DocId)).collect();
        let avg_doc_len = if docs.is_empty() { 0.0 } else { meta.num_tokens as f32 / docs.len() as f32 };

        tracing::info!(
            root = %paths.root.display(),
            documents = docs.len(),
            terms = dictionary.len(),
            "index opened"
        );
        Ok(Self { paths, meta, dictionary, docs, ids, postings, texts, avg_doc_len })
    }

    /// Recomputes the checksums of the memory-mapped files. This reads the
    /// whole index, so it is meant for post-build verification only.
    pub fn verify_checksums(&self) -> Result<()> {
        check_stamp(&self.paths.postings(), self.postings.bytes(), &self.meta.postings)?;
        check_stamp(&self.paths.texts(), self.texts.bytes(), &self.meta.texts)?;
        Ok(())
    }

    pub fn root(&self) -> &Path { &self.paths.root }
    pub fn meta(&self) -> &MetaFile { &self.meta }
    pub fn document_count(&self) -> usize { self.docs.len() }
    pub fn term_count(&self) -> usize { self.dictionary.len() }
    pub fn average_doc_len(&self) -> f32 { self.avg_doc_len }

    pub fn doc_frequency(&self, token: &str) -> u32 {
        self.dictionary.get(token).map_or(0, |t| t.df)
    }

    /// Posting list for `token`, sorted by doc id. Unseen tokens yield an
    /// empty list.
    pub fn postings(&self, token: &str) -> Result<Vec<Posting>> {
        let Some(info) = self.dictionary.get(token) else {
            return Ok(Vec::new());
        };
        let bytes = self.postings.slice(info.offset, info.len)?;
        bincode::deserialize(bytes).map_err(|e| SearchError::Corrupt(format!("postings of {token:?}: {e}")))
    }

    /// Identifiers of all documents containing `token`.
    pub fn lookup(&self, token: &str) -> Result<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        for p in self.postings(token)? {
            out.insert(self.doc_meta(p.doc_id)?.identifier.clone());
        }
        Ok(out)
    }

    pub fn doc_meta(&self, doc_id: DocId) -> Result<&DocMeta> {
        self.docs.get(doc_id as usize).ok_or_else(|| SearchError::NotFound(format!("doc #{doc_id}")))
    }

    pub fn identifier(&self, doc_id: DocId) -> Result<&str> {
        Ok(self.doc_meta(doc_id)?.identifier.as_str())
    }

    pub fn doc_id(&self, identifier: &str) -> Option<DocId> {
        self.ids.get(identifier).copied()
    }

    /// Stored content of the document with the given identifier.
    pub fn content(&self, identifier: &str) -> Result<&str> {
        let doc_id = self.doc_id(identifier).ok_or_else(|| SearchError::NotFound(identifier.to_string()))?;
        self.content_of(doc_id)
    }

    pub fn content_of(&self, doc_id: DocId) -> Result<&str> {
        let meta = self.doc_meta(doc_id)?;
        let bytes = self.texts.slice(meta.offset, meta.len)?;
        std::str::from_utf8(bytes).map_err(|e| SearchError::Corrupt(format!("content of {}: {e}", meta.identifier)))
    }
}
