use super::{FlatL2Index, Manifest, MetadataStore};
use crate::error::{Result, RetrieverError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the persisted index inside the artifact directory
pub const INDEX_FILE: &str = "index.bin";
/// File name of the persisted metadata inside the artifact directory
pub const METADATA_FILE: &str = "meta.json";
/// Lock file serializing writers against readers and each other
pub const LOCK_FILE: &str = ".kbase.lock";

/// A loaded, mutually consistent index and metadata pair.
///
/// Read-only once constructed; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    pub index: FlatL2Index,
    pub metadata: MetadataStore,
}

impl KnowledgeBase {
    pub fn new(index: FlatL2Index, metadata: MetadataStore) -> Result<Self> {
        check_consistent(&index, &metadata)?;
        Ok(Self { index, metadata })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.metadata.manifest
    }

    /// Number of chunks (and vectors)
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn check_consistent(index: &FlatL2Index, metadata: &MetadataStore) -> Result<()> {
    metadata.validate()?;
    if index.len() != metadata.len() {
        return Err(RetrieverError::integrity(format!(
            "index holds {} vectors but metadata holds {} chunks",
            index.len(),
            metadata.len()
        )));
    }
    if index.dimension() != metadata.manifest.embedding_model.dimension {
        return Err(RetrieverError::integrity(format!(
            "index dimension {} disagrees with manifest dimension {}",
            index.dimension(),
            metadata.manifest.embedding_model.dimension
        )));
    }
    if index.fingerprint() != &metadata.manifest.fingerprint_bytes()? {
        return Err(RetrieverError::integrity(
            "index and metadata fingerprints differ; they come from different ingestion runs",
        ));
    }
    Ok(())
}

/// Reads and writes knowledge base artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Whether both artifact files are present
    pub fn exists(&self) -> bool {
        self.index_path().is_file() && self.metadata_path().is_file()
    }

    /// Persists an index and its metadata, replacing any previous build.
    ///
    /// The pair is checked for consistency first. Each file is written to a
    /// temporary file in the artifact directory and renamed into place while an
    /// exclusive lock is held, so readers never observe a half-written file.
    pub async fn save(&self, index: &FlatL2Index, metadata: &MetadataStore) -> Result<()> {
        check_consistent(index, metadata)?;

        let index_bytes = index.to_bytes();
        let metadata_bytes =
            metadata
                .to_json_bytes()
                .map_err(|source| RetrieverError::Metadata {
                    path: self.metadata_path(),
                    source,
                })?;

        let store = self.clone();
        tokio::task::spawn_blocking(move || store.write_locked(&index_bytes, &metadata_bytes))
            .await??;

        info!(
            "Saved knowledge base ({} chunks) to {}",
            metadata.len(),
            self.dir.display()
        );
        Ok(())
    }

    fn write_locked(&self, index_bytes: &[u8], metadata_bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| RetrieverError::data_access(&self.dir, e))?;

        let lock = self.open_lock_file()?;
        lock.lock()
            .map_err(|e| RetrieverError::data_access(self.lock_path(), e))?;
        debug!("Acquired exclusive lock on {}", self.lock_path().display());

        write_atomically(&self.dir, &self.metadata_path(), metadata_bytes)?;
        write_atomically(&self.dir, &self.index_path(), index_bytes)?;

        // Lock is released when `lock` is dropped
        Ok(())
    }

    /// Loads and cross-checks the persisted index and metadata.
    ///
    /// # Errors
    /// - [`RetrieverError::MissingArtifact`] naming the first absent file
    /// - [`RetrieverError::Integrity`] if the files are malformed or disagree
    ///   in length or fingerprint
    pub async fn open(&self) -> Result<KnowledgeBase> {
        for path in [self.index_path(), self.metadata_path()] {
            if !path.is_file() {
                return Err(RetrieverError::MissingArtifact { path });
            }
        }

        let store = self.clone();
        let knowledge_base = tokio::task::spawn_blocking(move || store.read_locked()).await??;

        info!(
            "Opened knowledge base with {} chunks (dimension {}, {})",
            knowledge_base.len(),
            knowledge_base.index.dimension(),
            knowledge_base.manifest().chunking
        );
        Ok(knowledge_base)
    }

    fn read_locked(&self) -> Result<KnowledgeBase> {
        let lock = self.open_lock_file()?;
        lock.lock_shared()
            .map_err(|e| RetrieverError::data_access(self.lock_path(), e))?;
        debug!("Acquired shared lock on {}", self.lock_path().display());

        let index = FlatL2Index::load(&self.index_path())?;
        let metadata = MetadataStore::load(&self.metadata_path())?;
        KnowledgeBase::new(index, metadata)
    }

    fn open_lock_file(&self) -> Result<File> {
        let path = self.lock_path();
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| RetrieverError::data_access(&path, e))
    }
}

fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| RetrieverError::data_access(dir, e))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| RetrieverError::data_access(temp.path(), e))?;
    temp.persist(target)
        .map_err(|e| RetrieverError::data_access(target, e.error))?;
    debug!("Wrote {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EmbeddingModelMetadata, corpus_fingerprint};
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn build(docs: &[&str], sources: &[&str], vectors: Vec<Vec<f32>>) -> KnowledgeBase {
        let docs: Vec<String> = docs.iter().map(|s| s.to_string()).collect();
        let sources: Vec<String> = sources.iter().map(|s| s.to_string()).collect();
        let dimension = vectors[0].len();
        let model = EmbeddingModelMetadata::new("fake:model:raw", "fake", dimension);
        let fingerprint = corpus_fingerprint("words:150:30", &model.model_id, dimension, &docs, &sources);
        let index = FlatL2Index::build(vectors).unwrap().with_fingerprint(fingerprint);
        let manifest = Manifest::new(&fingerprint, "words:150:30", model, docs.len());
        KnowledgeBase::new(index, MetadataStore::new(manifest, docs, sources).unwrap()).unwrap()
    }

    fn sample() -> KnowledgeBase {
        build(
            &["refunds in 14 days", "20 days leave"],
            &["a.txt", "b.txt"],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
    }

    #[tokio::test]
    #[traced_test]
    async fn test_save_then_open() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("vector_db"));
        let kb = sample();

        store.save(&kb.index, &kb.metadata).await.unwrap();
        assert!(store.exists());
        assert!(store.lock_path().exists());

        let opened = store.open().await.unwrap();
        assert_eq!(opened, kb);
        assert!(logs_contain("Saved knowledge base (2 chunks)"));
    }

    #[tokio::test]
    async fn test_open_missing_artifacts_names_path() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        match store.open().await.unwrap_err() {
            RetrieverError::MissingArtifact { path } => assert_eq!(path, store.index_path()),
            other => panic!("expected missing artifact, got {other:?}"),
        }

        let kb = sample();
        store.save(&kb.index, &kb.metadata).await.unwrap();
        std::fs::remove_file(store.metadata_path()).unwrap();

        match store.open().await.unwrap_err() {
            RetrieverError::MissingArtifact { path } => assert_eq!(path, store.metadata_path()),
            other => panic!("expected missing artifact, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_rejects_mixed_builds() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let first = sample();
        let second = build(
            &["refunds in 30 days", "25 days leave"],
            &["a.txt", "b.txt"],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        );

        store.save(&first.index, &first.metadata).await.unwrap();
        second.index.save(&store.index_path()).unwrap();

        let err = store.open().await.unwrap_err();
        assert!(err.is_integrity_error(), "{err}");
    }

    #[tokio::test]
    async fn test_open_rejects_length_mismatch() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let kb = sample();
        store.save(&kb.index, &kb.metadata).await.unwrap();

        let three = FlatL2Index::build(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
            .unwrap()
            .with_fingerprint(*kb.index.fingerprint());
        three.save(&store.index_path()).unwrap();

        assert!(store.open().await.unwrap_err().is_integrity_error());
    }

    #[tokio::test]
    async fn test_save_rejects_inconsistent_pair() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let kb = sample();
        let unstamped = FlatL2Index::build(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();

        let err = store.save(&unstamped, &kb.metadata).await.unwrap_err();
        assert!(err.is_integrity_error());
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_resave_replaces_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let first = sample();
        let second = build(&["only chunk"], &["c.txt"], vec![vec![0.5, 0.5]]);

        store.save(&first.index, &first.metadata).await.unwrap();
        store.save(&second.index, &second.metadata).await.unwrap();

        assert_eq!(store.open().await.unwrap(), second);

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![LOCK_FILE, INDEX_FILE, METADATA_FILE]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_leave_one_consistent_build() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let builds = vec![
            sample(),
            build(&["only chunk"], &["c.txt"], vec![vec![0.5, 0.5]]),
            build(&["x", "y", "z"], &["d.txt", "d.txt", "e.txt"], vec![vec![1.0, 2.0]; 3]),
        ];

        let handles: Vec<_> = builds
            .iter()
            .cloned()
            .map(|kb| {
                let store = store.clone();
                tokio::spawn(async move { store.save(&kb.index, &kb.metadata).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let opened = store.open().await.unwrap();
        assert!(builds.contains(&opened));
    }
}
