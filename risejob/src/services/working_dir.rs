/*
    The renderer resolves relative asset paths (textures, meshes, includes) against the process
    working directory, so every engine call runs inside the scene's directory.
    The working directory is process wide. The guard holds a global lock for as long as it lives,
    which means two guards never overlap. Do not nest guards on one thread, the second would block forever.
*/
use std::{
    env, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, error};

static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Scoped switch of the process working directory. Dropping it restores the previous directory.
#[must_use = "the previous working directory is restored as soon as the guard drops"]
pub struct WorkingDir {
    saved: PathBuf,
    // declared last so the lock is released after Drop::drop restored the directory
    _lock: MutexGuard<'static, ()>,
}

impl WorkingDir {
    /// Switch into `dir` until the returned guard drops.
    pub fn enter(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let lock = CWD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let saved = env::current_dir()?;
        env::set_current_dir(dir)?;
        debug!("Working directory {:?} -> {:?}", &saved, dir);
        Ok(Self { saved, _lock: lock })
    }

    /// Enter `dir` when there is one, otherwise leave the working directory as it is.
    pub fn enter_optional(dir: Option<&Path>) -> io::Result<Option<Self>> {
        dir.map(Self::enter).transpose()
    }

    /// Directory a scene file lives in. A bare file name lives in the current directory.
    pub fn scene_dir(scene: &Path) -> PathBuf {
        match scene.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Directory that will be restored.
    pub fn saved(&self) -> &Path {
        &self.saved
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.saved) {
            error!(
                "Unable to restore working directory {:?}: {e}",
                &self.saved
            );
        }
    }
}
