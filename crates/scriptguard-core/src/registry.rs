//! 脚本注册表：文件名 -> 脚本内容
//!
//! 读多写少：查询取共享锁，重新加载在锁外读完目录后取独占锁整体替换。
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use walkdir::WalkDir;

use crate::error::LoadError;

/// 脚本后缀
pub const SCRIPT_SUFFIX: &str = ".sh";

/// 已加载的脚本（加载后不可变，身份为 filename）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    pub name: String,
    pub filename: String,
    pub content: String,
}

/// 一次完整加载的快照
#[derive(Debug, Default)]
struct Snapshot {
    /// 按文件名排序
    scripts: Vec<Arc<Script>>,
    index: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct ScriptRegistry {
    dir: PathBuf,
    inner: RwLock<Snapshot>,
}

impl ScriptRegistry {
    /// 加载目录下所有 `.sh` 文件（不递归）；任何读取失败都返回错误
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        let dir = dir.as_ref().to_path_buf();
        let snapshot = read_dir_scripts(&dir)?;
        info!(dir = %dir.display(), scripts = snapshot.scripts.len(), "scripts loaded");
        Ok(Self { dir, inner: RwLock::new(snapshot) })
    }

    /// 由内存中的脚本构建（测试与嵌入场景）
    pub fn from_scripts(dir: impl AsRef<Path>, scripts: Vec<Script>) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), inner: RwLock::new(build_snapshot(scripts)) }
    }

    /// 重新读取目录并整体替换；失败时保留旧内容
    pub fn reload(&self) -> Result<usize, LoadError> {
        let snapshot = read_dir_scripts(&self.dir)?;
        let count = snapshot.scripts.len();
        *self.write() = snapshot;
        info!(dir = %self.dir.display(), scripts = count, "scripts reloaded");
        Ok(count)
    }

    pub fn lookup(&self, filename: &str) -> Option<Arc<Script>> {
        let snap = self.read();
        snap.index.get(filename).map(|&i| Arc::clone(&snap.scripts[i]))
    }

    /// 全部文件名（注册顺序，即文件名升序）
    pub fn list(&self) -> Vec<String> {
        self.read().scripts.iter().map(|s| s.filename.clone()).collect()
    }

    /// 当前全部脚本的快照
    pub fn scripts(&self) -> Vec<Arc<Script>> {
        self.read().scripts.clone()
    }

    pub fn len(&self) -> usize {
        self.read().scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().scripts.is_empty()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // 快照整体替换，不存在写到一半的状态，中毒后直接取内部值即可
    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn read_dir_scripts(dir: &Path) -> Result<Snapshot, LoadError> {
    if dir.exists() && !dir.is_dir() {
        return Err(LoadError::NotADirectory { path: dir.to_path_buf() });
    }
    let mut files: Vec<PathBuf> = Vec::new();
    // 单层目录，只收普通文件
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| LoadError::ReadDir { path: dir.to_path_buf(), source })?;
        if !entry.file_type().is_file() { continue; }
        let is_script = entry.file_name().to_str().is_some_and(|n| n.ends_with(SCRIPT_SUFFIX) && n.len() > SCRIPT_SUFFIX.len());
        if is_script { files.push(entry.into_path()); }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut scripts = Vec::with_capacity(files.len());
    for path in files {
        let bytes = std::fs::read(&path).map_err(|source| LoadError::ReadFile { path: path.clone(), source })?;
        let filename = match path.file_name().and_then(|s| s.to_str()) { Some(s) => s.to_string(), None => continue };
        let name = filename[..filename.len() - SCRIPT_SUFFIX.len()].to_string();
        let content = String::from_utf8_lossy(&bytes).into_owned();
        scripts.push(Script { name, filename, content });
    }
    Ok(build_snapshot(scripts))
}

fn build_snapshot(mut scripts: Vec<Script>) -> Snapshot {
    scripts.sort_by(|a, b| a.filename.cmp(&b.filename));
    scripts.dedup_by(|a, b| a.filename == b.filename);
    let index = scripts.iter().enumerate().map(|(i, s)| (s.filename.clone(), i)).collect();
    Snapshot { scripts: scripts.into_iter().map(Arc::new).collect(), index }
}
