//! GitObjects (spec §4.3): read/write/parse objects, resolve refs, index and
//! emit packfiles, walk the commit/tree graph. The primary new content of
//! this crate, composed from [`crate::store`], [`crate::objects`],
//! [`crate::pack`], and [`crate::refs`] in the teacher's error-handling and
//! async style (`Arc<dyn ObjectStore>` held by value, `thiserror`-typed
//! failures, `tracing` for the warn-and-continue walk policy of §9).

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::errors::GitError;
use crate::objects::{Commit, EntryKind, ObjectKind, RawObject, Signature, Tag, Tree, TreeEntryRaw};
use crate::oid::Oid;
use crate::pack;
use crate::refs::{self, HeadValue, RefListing};
use crate::store::ObjectStore;

#[derive(Clone)]
pub struct GitObjects {
    store: Arc<dyn ObjectStore>,
}

#[derive(Debug, Clone)]
pub struct RefCommand {
    pub name: String,
    pub old_oid: Oid,
    pub new_oid: Oid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdateResult {
    pub name: String,
    pub ok: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CommitInfo {
    pub oid: Oid,
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    pub old: Option<Oid>,
    pub new: Option<Oid>,
}

impl GitObjects {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        GitObjects { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Write the bare-repo skeleton if `HEAD` is absent. Idempotent.
    pub async fn init(&self) -> Result<(), GitError> {
        if self.store.stat("HEAD").await {
            return Ok(());
        }
        self.store.write("HEAD", b"ref: refs/heads/main\n").await.map_err(GitError::internal)
    }

    pub async fn resolve_ref(&self, name: &str) -> Result<Oid, GitError> {
        refs::resolve_ref(&*self.store, name).await
    }

    pub async fn list_refs(&self) -> Result<RefListing, GitError> {
        refs::list_refs(&*self.store).await
    }

    pub async fn symbolic_head(&self) -> Result<Option<String>, GitError> {
        match refs::read_head(&*self.store).await? {
            HeadValue::Symbolic(target) => Ok(Some(target)),
            _ => Ok(None),
        }
    }

    fn loose_path(oid: Oid) -> String {
        let hex = oid.to_hex();
        format!("objects/{}/{}", &hex[0..2], &hex[2..])
    }

    /// Write a loose object directly, bypassing packfile staging. Not on the
    /// hot path (objects normally arrive via `indexPack`) but used by tests
    /// and by any caller constructing synthetic history without a push.
    pub async fn write_loose_object(&self, obj: &RawObject) -> Result<Oid, GitError> {
        let oid = obj.oid();
        let compressed = deflate(&obj.to_loose_bytes())?;
        self.store.write(&Self::loose_path(oid), &compressed).await.map_err(GitError::internal)?;
        Ok(oid)
    }

    async fn read_loose(&self, oid: Oid) -> Result<Option<RawObject>, GitError> {
        match self.store.read(&Self::loose_path(oid)).await {
            Ok(bytes) => {
                let raw = inflate(&bytes)?;
                Ok(Some(RawObject::from_loose_bytes(&raw).map_err(|e| GitError::internal(e))?))
            }
            Err(crate::store::StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(GitError::internal(e)),
        }
    }

    async fn read_from_packs(&self, oid: Oid) -> Result<Option<RawObject>, GitError> {
        let idx_paths = self.store.list("objects/pack").await.map_err(GitError::internal)?;
        for path in idx_paths {
            if !path.ends_with(".idx") {
                continue;
            }
            let bytes = self.store.read(&path).await.map_err(GitError::internal)?;
            let objects = pack::idx::read_idx(&bytes)?;
            if let Some(obj) = objects.get(&oid) {
                return Ok(Some(RawObject { kind: obj.kind, content: obj.content.clone() }));
            }
        }
        Ok(None)
    }

    /// Looks in loose objects first, then pack indices (spec §4.3).
    pub async fn read_object(&self, oid: Oid) -> Result<RawObject, GitError> {
        if let Some(obj) = self.read_loose(oid).await? {
            return Ok(obj);
        }
        if let Some(obj) = self.read_from_packs(oid).await? {
            return Ok(obj);
        }
        Err(GitError::NotFound(format!("object {oid} not found")))
    }

    /// Verify, materialize, and stage an inbound packfile; write the `.idx`
    /// sibling before the pack becomes visible (spec §4.2, §4.3).
    pub async fn index_pack(&self, raw: &[u8]) -> Result<usize, GitError> {
        let nonce: u64 = rand::random();
        let tmp_path = format!("objects/pack/pack-{nonce:016x}.pack.tmp");
        let pack_path = format!("objects/pack/pack-{nonce:016x}.pack");
        let idx_path = format!("objects/pack/pack-{nonce:016x}.idx");

        self.store.write(&tmp_path, raw).await.map_err(GitError::internal)?;

        let indexed = pack::index_pack(raw)?;

        let idx_bytes = pack::idx::write_idx(&indexed.objects);
        self.store.write(&idx_path, &idx_bytes).await.map_err(GitError::internal)?;
        self.store.rename(&tmp_path, &pack_path).await.map_err(GitError::internal)?;

        Ok(indexed.object_count)
    }

    fn children_of(obj: &RawObject) -> Vec<Oid> {
        match obj.kind {
            ObjectKind::Commit => match Commit::parse(&obj.content) {
                Ok(c) => {
                    let mut children = vec![c.tree];
                    children.extend(c.parents);
                    children
                }
                Err(_) => Vec::new(),
            },
            ObjectKind::Tree => Tree::parse(&obj.content)
                .map(|t| t.entries.into_iter().map(|e| e.oid).collect())
                .unwrap_or_default(),
            ObjectKind::Tag => Tag::parse(&obj.content).map(|t| vec![t.object]).unwrap_or_default(),
            ObjectKind::Blob => Vec::new(),
        }
    }

    /// BFS from every `want`, stopping at any OID in `haves` (spec §4.3,
    /// §5 resource bound: each object visited at most once).
    pub async fn collect_objects_for_pack(&self, wants: &[Oid], haves: &[Oid]) -> Result<Vec<Oid>, GitError> {
        let have_set: HashSet<Oid> = haves.iter().copied().collect();
        let mut visited: HashSet<Oid> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<(Oid, bool)> = wants.iter().map(|&w| (w, true)).collect();

        while let Some((oid, is_want)) = queue.pop_front() {
            if have_set.contains(&oid) || visited.contains(&oid) {
                continue;
            }
            let obj = match self.read_object(oid).await {
                Ok(obj) => obj,
                Err(e) => {
                    if is_want {
                        return Err(GitError::NotFound(format!("want {oid} unreadable: {e}")));
                    }
                    tracing::warn!(%oid, %e, "skipping unreadable object during pack collection");
                    continue;
                }
            };
            visited.insert(oid);
            order.push(oid);
            for child in Self::children_of(&obj) {
                if !visited.contains(&child) && !have_set.contains(&child) {
                    queue.push_back((child, false));
                }
            }
        }

        Ok(order)
    }

    /// Emit a valid non-delta `PACK` v2 file for exactly these objects
    /// (spec §4.3, §9 thin-pack design note).
    pub async fn pack_objects(&self, oids: &[Oid]) -> Result<Vec<u8>, GitError> {
        let mut objects = Vec::with_capacity(oids.len());
        for &oid in oids {
            objects.push((oid, self.read_object(oid).await?));
        }
        pack::pack_objects(&objects)
    }

    pub async fn find_common_commits(&self, haves: &[Oid]) -> Vec<Oid> {
        let mut out = Vec::with_capacity(haves.len());
        for &oid in haves {
            if self.read_object(oid).await.is_ok() {
                out.push(oid);
            }
        }
        out
    }

    /// True iff `ancestor` is reachable by following parent links from `candidate`.
    pub async fn is_descendant(&self, candidate: Oid, ancestor: Oid) -> Result<bool, GitError> {
        if candidate == ancestor {
            return Ok(true);
        }
        let mut queue = VecDeque::from([candidate]);
        let mut visited = HashSet::new();
        while let Some(oid) = queue.pop_front() {
            if oid == ancestor {
                return Ok(true);
            }
            if !visited.insert(oid) {
                continue;
            }
            let obj = match self.read_object(oid).await {
                Ok(obj) => obj,
                Err(_) => continue,
            };
            if obj.kind != ObjectKind::Commit {
                continue;
            }
            let commit = Commit::parse(&obj.content).map_err(GitError::internal)?;
            queue.extend(commit.parents);
        }
        Ok(false)
    }

    async fn validate_command(&self, cmd: &RefCommand) -> RefUpdateResult {
        let current = refs::resolve_ref(&*self.store, &cmd.name).await.ok();
        let is_create = cmd.old_oid.is_zero() && !cmd.new_oid.is_zero();
        let is_delete = !cmd.old_oid.is_zero() && cmd.new_oid.is_zero();

        let (ok, reason) = if is_create {
            match current {
                Some(_) => (false, Some("ref already exists".to_string())),
                None => (true, None),
            }
        } else if is_delete {
            match current {
                None => (false, Some("ref doesn't exist".to_string())),
                Some(cur) if cur != cmd.old_oid => {
                    (false, Some("ref update rejected: old OID mismatch".to_string()))
                }
                Some(_) => (true, None),
            }
        } else if !cmd.old_oid.is_zero() && !cmd.new_oid.is_zero() {
            match current {
                None => (false, Some("ref doesn't exist".to_string())),
                Some(cur) if cur != cmd.old_oid => {
                    (false, Some("ref update rejected: old OID mismatch".to_string()))
                }
                Some(cur) => match self.is_descendant(cmd.new_oid, cur).await {
                    Ok(true) => (true, None),
                    Ok(false) => (false, Some("non-fast-forward update rejected".to_string())),
                    Err(e) => (false, Some(format!("failed to update: {e}"))),
                },
            }
        } else {
            (false, Some("failed to update: old and new OID both zero".to_string()))
        };

        RefUpdateResult { name: cmd.name.clone(), ok, reason }
    }

    /// Two-phase apply: validate every command, then, if atomic and any
    /// failed, roll every result back to a failure before touching any ref
    /// (spec §4.4.3).
    pub async fn apply_ref_updates(&self, commands: &[RefCommand], atomic: bool) -> Result<Vec<RefUpdateResult>, GitError> {
        let mut results = Vec::with_capacity(commands.len());
        for cmd in commands {
            results.push(self.validate_command(cmd).await);
        }

        if atomic && results.iter().any(|r| !r.ok) {
            for r in results.iter_mut() {
                r.ok = false;
                r.reason = Some("atomic transaction failed".to_string());
            }
            return Ok(results);
        }

        for (cmd, result) in commands.iter().zip(results.iter_mut()) {
            if !result.ok {
                continue;
            }
            let outcome = if cmd.new_oid.is_zero() {
                refs::delete_ref(&*self.store, &cmd.name).await
            } else {
                refs::write_ref(&*self.store, &cmd.name, cmd.new_oid).await
            };
            if let Err(e) = outcome {
                result.ok = false;
                result.reason = Some(format!("failed to update: {e}"));
            }
        }

        Ok(results)
    }

    /// The tree oid pointed to by a commit — the bridge ReadAPI uses to go
    /// from a resolved ref down to `tree`/`blob` (spec §4.7).
    pub async fn commit_tree_oid(&self, commit_oid: Oid) -> Result<Oid, GitError> {
        Ok(self.read_commit(commit_oid).await?.tree)
    }

    async fn read_commit(&self, oid: Oid) -> Result<CommitInfo, GitError> {
        let obj = self.read_object(oid).await?;
        if obj.kind != ObjectKind::Commit {
            return Err(GitError::NotFound(format!("{oid} is not a commit")));
        }
        let commit = Commit::parse(&obj.content).map_err(GitError::internal)?;
        Ok(CommitInfo {
            oid,
            tree: commit.tree,
            parents: commit.parents,
            author: commit.author,
            committer: commit.committer,
            message: commit.message,
        })
    }

    /// Commit walk, newest first, first-parent chain explored before
    /// secondary parents of merges (spec §4.3/§4.7 `log`). `path`, when
    /// given, keeps only commits that touch that path relative to their
    /// first parent (the empty tree for roots).
    pub async fn log(&self, start: Oid, depth: Option<usize>, path: Option<&str>) -> Result<Vec<CommitInfo>, GitError> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(oid) = stack.pop() {
            if !visited.insert(oid) {
                continue;
            }
            let commit = self.read_commit(oid).await?;
            let include = match path {
                None => true,
                Some(p) => self.commit_touches_path(&commit, p).await?,
            };
            if include {
                out.push(commit.clone());
                if let Some(d) = depth {
                    if out.len() >= d {
                        break;
                    }
                }
            }
            // push in reverse so the first parent is popped (and thus
            // explored) before the rest.
            for parent in commit.parents.iter().rev() {
                stack.push(*parent);
            }
        }

        Ok(out)
    }

    async fn commit_touches_path(&self, commit: &CommitInfo, path: &str) -> Result<bool, GitError> {
        let parent_tree = match commit.parents.first() {
            Some(&p) => self.read_commit(p).await.ok().map(|c| c.tree),
            None => None,
        };
        let here = self.lookup_path_oid(commit.tree, path).await?;
        let there = match parent_tree {
            Some(t) => self.lookup_path_oid(t, path).await?,
            None => None,
        };
        Ok(here != there)
    }

    async fn lookup_path_oid(&self, tree: Oid, path: &str) -> Result<Option<Oid>, GitError> {
        let mut current = tree;
        let mut result = None;
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        if components.is_empty() {
            return Ok(Some(tree));
        }
        for (i, component) in components.iter().enumerate() {
            let obj = match self.read_object(current).await {
                Ok(obj) => obj,
                Err(_) => return Ok(None),
            };
            let parsed = match Tree::parse(&obj.content) {
                Ok(t) => t,
                Err(_) => return Ok(None),
            };
            match parsed.entries.into_iter().find(|e| &e.name == component) {
                Some(entry) => {
                    current = entry.oid;
                    if i == components.len() - 1 {
                        result = Some(entry.oid);
                    }
                }
                None => return Ok(None),
            }
        }
        Ok(result)
    }

    /// Entries of the tree found by walking `path` from `tree_oid` (empty
    /// path returns the root tree itself).
    pub async fn tree(&self, tree_oid: Oid, path: Option<&str>) -> Result<Vec<TreeEntryRaw>, GitError> {
        let target = match path {
            None | Some("") => tree_oid,
            Some(p) => self
                .lookup_path_oid(tree_oid, p)
                .await?
                .ok_or_else(|| GitError::NotFound(format!("path {p} not found")))?,
        };
        let obj = self.read_object(target).await?;
        if obj.kind != ObjectKind::Tree {
            return Err(GitError::NotFound("path does not resolve to a tree".to_string()));
        }
        Ok(Tree::parse(&obj.content).map_err(GitError::internal)?.entries)
    }

    pub async fn blob(&self, tree_oid: Oid, path: &str) -> Result<RawObject, GitError> {
        let oid = self
            .lookup_path_oid(tree_oid, path)
            .await?
            .ok_or_else(|| GitError::NotFound(format!("path {path} not found")))?;
        let obj = self.read_object(oid).await?;
        if obj.kind != ObjectKind::Blob {
            return Err(GitError::NotFound("path does not resolve to a blob".to_string()));
        }
        Ok(obj)
    }

    /// Flatten a tree into `path -> blob oid` for diffing (trees recursed
    /// into, not themselves included).
    async fn flatten_tree(&self, tree_oid: Oid, prefix: &str, out: &mut Vec<(String, Oid)>) -> Result<(), GitError> {
        let obj = self.read_object(tree_oid).await?;
        let tree = Tree::parse(&obj.content).map_err(GitError::internal)?;
        for entry in tree.entries {
            let path = if prefix.is_empty() { entry.name.clone() } else { format!("{prefix}/{}", entry.name) };
            match entry.kind() {
                EntryKind::Blob => out.push((path, entry.oid)),
                EntryKind::Tree => Box::pin(self.flatten_tree(entry.oid, &path, out)).await?,
            }
        }
        Ok(())
    }

    /// Tree-vs-tree diff of `oid` against its single parent (or the empty
    /// tree if it has none) (spec §4.7 `commitWithChanges`).
    pub async fn commit_with_changes(&self, oid: Oid) -> Result<(CommitInfo, Vec<FileChange>), GitError> {
        let commit = self.read_commit(oid).await?;

        let mut new_files = Vec::new();
        self.flatten_tree(commit.tree, "", &mut new_files).await?;

        let mut old_files = Vec::new();
        if let Some(&parent) = commit.parents.first() {
            let parent_commit = self.read_commit(parent).await?;
            self.flatten_tree(parent_commit.tree, "", &mut old_files).await?;
        }

        let old_map: std::collections::HashMap<&str, Oid> =
            old_files.iter().map(|(p, o)| (p.as_str(), *o)).collect();
        let new_map: std::collections::HashMap<&str, Oid> =
            new_files.iter().map(|(p, o)| (p.as_str(), *o)).collect();

        let mut changes = Vec::new();
        for (path, &new_oid) in &new_map {
            match old_map.get(path) {
                None => changes.push(FileChange {
                    path: path.to_string(),
                    kind: ChangeKind::Add,
                    old: None,
                    new: Some(new_oid),
                }),
                Some(&old_oid) if old_oid != new_oid => changes.push(FileChange {
                    path: path.to_string(),
                    kind: ChangeKind::Modify,
                    old: Some(old_oid),
                    new: Some(new_oid),
                }),
                _ => {}
            }
        }
        for (path, &old_oid) in &old_map {
            if !new_map.contains_key(path) {
                changes.push(FileChange {
                    path: path.to_string(),
                    kind: ChangeKind::Remove,
                    old: Some(old_oid),
                    new: None,
                });
            }
        }
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        Ok((commit, changes))
    }
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, GitError> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).map_err(GitError::internal)?;
    encoder.finish().map_err(GitError::internal)
}

fn inflate(bytes: &[u8]) -> Result<Vec<u8>, GitError> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(GitError::internal)?;
    Ok(out)
}
