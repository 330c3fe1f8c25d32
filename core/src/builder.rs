//! One-shot index construction.
//!
//! A build writes into `<dest>.staging` while holding `<dest>.lock`, and only
//! on [`IndexBuilder::commit`] replaces whatever index lived at `<dest>`.
//! Until then nothing at `<dest>` changes, and a build that errors or is
//! dropped removes its staging directory.

use crate::analyzer::Analyzer;
use crate::error::{Result, SearchError};
use crate::index::{DocId, DocMeta, Document, Posting, TermId, TermInfo};
use crate::persist::{
    commit_staging, save_bincode, save_meta, BuildLock, IndexPaths, MetaFile, StampedWriter, FORMAT_VERSION,
};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub documents: u32,
    pub terms: u32,
    pub tokens: u64,
    /// Documents stored without postings because they produced no tokens.
    pub empty_documents: u32,
}

pub struct IndexBuilder {
    analyzer: Arc<dyn Analyzer>,
    target: IndexPaths,
    staging: IndexPaths,
    texts: Option<StampedWriter<BufWriter<File>>>,
    dictionary: HashMap<String, TermId>,
    postings: Vec<Vec<Posting>>,
    docs: Vec<DocMeta>,
    ids: HashMap<String, DocId>,
    num_tokens: u64,
    empty_documents: u32,
    committed: bool,
    _lock: BuildLock,
}

impl IndexBuilder {
    /// Starts a build for `target`. Fails with [`SearchError::BuildLocked`] if
    /// another build for the same destination is running.
    pub fn create<P: AsRef<Path>>(target: P, analyzer: Arc<dyn Analyzer>) -> Result<Self> {
        let target = IndexPaths::new(target);
        let lock = BuildLock::acquire(&target)?;
        let staging = target.staging();
        if staging.root.exists() {
            tracing::warn!(path = %staging.root.display(), "removing leftover staging directory");
            fs::remove_dir_all(&staging.root)?;
        }
        fs::create_dir_all(&staging.root)?;
        let texts = StampedWriter::new(BufWriter::new(File::create(staging.texts())?));
        tracing::info!(target = %target.root.display(), analyzer = %analyzer.name(), "index build started");

        Ok(Self {
            analyzer,
            target,
            staging,
            texts: Some(texts),
            dictionary: HashMap::new(),
            postings: Vec::new(),
            docs: Vec::new(),
            ids: HashMap::new(),
            num_tokens: 0,
            empty_documents: 0,
            committed: false,
            _lock: lock,
        })
    }

    pub fn document_count(&self) -> usize { self.docs.len() }

    pub fn add_document(&mut self, doc: Document) -> Result<DocId> {
        if self.ids.contains_key(&doc.identifier) {
            return Err(SearchError::DuplicateIdentifier(doc.identifier));
        }
        let doc_id = DocId::try_from(self.docs.len())
            .map_err(|_| SearchError::Corrupt("document count exceeds u32".into()))?;

        // Term ids are handed out in first-occurrence order so that identical
        // corpora produce identical files.
        let tokens = self.analyzer.analyze(&doc.content);
        let mut tf: Vec<(TermId, u32)> = Vec::new();
        let mut slot: HashMap<TermId, usize> = HashMap::new();
        for token in &tokens {
            let tid = match self.dictionary.get(&token.text) {
                Some(&tid) => tid,
                None => {
                    let tid = TermId::try_from(self.postings.len())
                        .map_err(|_| SearchError::Corrupt("term count exceeds u32".into()))?;
                    self.dictionary.insert(token.text.clone(), tid);
                    self.postings.push(Vec::new());
                    tid
                }
            };
            match slot.get(&tid) {
                Some(&i) => tf[i].1 += 1,
                None => {
                    slot.insert(tid, tf.len());
                    tf.push((tid, 1));
                }
            }
        }
        // doc ids only grow, so every posting list stays sorted by doc id
        for (tid, count) in tf {
            self.postings[tid as usize].push(Posting { doc_id, tf: count });
        }
        if tokens.is_empty() {
            self.empty_documents += 1;
            tracing::debug!(identifier = %doc.identifier, "document produced no tokens");
        }

        let texts = self.texts.as_mut().ok_or_else(|| SearchError::Corrupt("builder already committed".into()))?;
        let offset = texts.position();
        texts.write_all(doc.content.as_bytes())?;

        self.num_tokens += tokens.len() as u64;
        self.docs.push(DocMeta {
            identifier: doc.identifier.clone(),
            offset,
            len: doc.content.len() as u64,
            num_tokens: u32::try_from(tokens.len()).unwrap_or(u32::MAX),
        });
        self.ids.insert(doc.identifier, doc_id);
        Ok(doc_id)
    }

    /// Persists the index and atomically moves it to the target location,
    /// deleting any index previously stored there.
    pub fn commit(mut self) -> Result<BuildStats> {
        let texts = self.texts.take().ok_or_else(|| SearchError::Corrupt("builder already committed".into()))?;
        let (texts, texts_stamp) = texts.finish()?;
        texts.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        let mut infos: Vec<TermInfo> = Vec::with_capacity(self.postings.len());
        let mut writer = StampedWriter::new(BufWriter::new(File::create(self.staging.postings())?));
        for list in &self.postings {
            let bytes = bincode::serialize(list)?;
            infos.push(TermInfo {
                df: list.len() as u32,
                offset: writer.position(),
                len: bytes.len() as u64,
            });
            writer.write_all(&bytes)?;
        }
        let (postings, postings_stamp) = writer.finish()?;
        postings.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        let dictionary: HashMap<String, TermInfo> = self
            .dictionary
            .iter()
            .map(|(term, &tid)| (term.clone(), infos[tid as usize]))
            .collect();
        let dictionary_stamp = save_bincode(&self.staging.dictionary(), &dictionary)?;
        let docs_stamp = save_bincode(&self.staging.docs(), &self.docs)?;

        let stats = BuildStats {
            documents: self.docs.len() as u32,
            terms: self.dictionary.len() as u32,
            tokens: self.num_tokens,
            empty_documents: self.empty_documents,
        };
        let meta = MetaFile {
            version: FORMAT_VERSION,
            num_docs: stats.documents,
            num_terms: stats.terms,
            num_tokens: stats.tokens,
            analyzer: self.analyzer.name(),
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            dictionary: dictionary_stamp,
            docs: docs_stamp,
            postings: postings_stamp,
            texts: texts_stamp,
        };
        save_meta(&self.staging, &meta)?;

        commit_staging(&self.staging, &self.target)?;
        self.committed = true;
        tracing::info!(
            target = %self.target.root.display(),
            documents = stats.documents,
            terms = stats.terms,
            tokens = stats.tokens,
            "index build committed"
        );
        Ok(stats)
    }
}

impl Drop for IndexBuilder {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.staging.root) {
            tracing::warn!(path = %self.staging.root.display(), error = %e, "failed to clean up staging directory");
        }
    }
}

/// Builds a fresh index at `target` from `corpus`.
///
/// Destructive: an index already stored at `target` is deleted when the new
/// one is committed. Nothing is committed if any document fails.
pub fn build<P, I>(target: P, analyzer: Arc<dyn Analyzer>, corpus: I) -> Result<BuildStats>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Document>,
{
    let mut builder = IndexBuilder::create(target, analyzer)?;
    for doc in corpus {
        builder.add_document(doc)?;
    }
    builder.commit()
}
