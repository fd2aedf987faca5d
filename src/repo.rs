use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};

/// name of the metadata directory unless overridden by `SC_DIR`
pub const DEFAULT_DIR_NAME: &str = ".source";

/// environment variable overriding the metadata directory name
pub const DIR_ENV: &str = "SC_DIR";

/// options for repository creation
#[derive(Clone, Debug)]
pub struct InitOptions {
    /// create a bare repository (metadata at the path itself)
    pub bare: bool,
    /// branch HEAD points at initially
    pub default_branch: String,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            bare: false,
            default_branch: "main".to_string(),
        }
    }
}

/// a repository: a worktree root plus its metadata directory
///
/// the object store, refs, and index are addressed through the path
/// accessors here; the modules operating on them borrow the repository
/// rather than owning it.
pub struct Repository {
    root: PathBuf,
    git_dir: PathBuf,
    config: Config,
}

impl Repository {
    /// metadata directory name, honoring the `SC_DIR` override
    pub fn dir_name() -> PathBuf {
        env::var_os(DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR_NAME))
    }

    /// initialize a repository at the given path with default options
    pub fn init(path: &Path) -> Result<Self> {
        Self::init_with(path, &InitOptions::default())
    }

    /// initialize a repository; reinitializing is idempotent and never
    /// overwrites existing files
    pub fn init_with(path: &Path, opts: &InitOptions) -> Result<Self> {
        let git_dir = if opts.bare {
            path.to_path_buf()
        } else {
            path.join(Self::dir_name())
        };

        for sub in ["objects", "refs/heads", "refs/tags"] {
            let dir = git_dir.join(sub);
            fs::create_dir_all(&dir).with_path(&dir)?;
        }

        let head = git_dir.join("HEAD");
        if !head.exists() {
            fs::write(&head, format!("ref: refs/heads/{}\n", opts.default_branch))
                .with_path(&head)?;
        }

        let config_path = git_dir.join("config");
        let config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            let mut config = Config::new();
            config.set("core", "repositoryformatversion", "0");
            config.set("core", "filemode", "true");
            config.set("core", "bare", if opts.bare { "true" } else { "false" });
            config.save(&config_path)?;
            config
        };

        let description = git_dir.join("description");
        if !description.exists() {
            fs::write(
                &description,
                "Unnamed repository; edit this file to name it.\n",
            )
            .with_path(&description)?;
        }

        Ok(Self {
            root: path.to_path_buf(),
            git_dir,
            config,
        })
    }

    /// open an existing repository rooted at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let git_dir = path.join(Self::dir_name());
        if git_dir.is_dir() {
            let config = Config::load(&git_dir.join("config"))?;
            return Ok(Self {
                root: path.to_path_buf(),
                git_dir,
                config,
            });
        }

        // a bare repository is its own metadata directory
        if path.join("HEAD").is_file() && path.join("objects").is_dir() {
            let config = Config::load(&path.join("config"))?;
            return Ok(Self {
                root: path.to_path_buf(),
                git_dir: path.to_path_buf(),
                config,
            });
        }

        Err(Error::NoRepo(path.to_path_buf()))
    }

    /// locate a repository by ascending from `start` toward the
    /// filesystem root
    pub fn find(start: &Path) -> Result<Self> {
        for dir in start.ancestors() {
            if dir.join(Self::dir_name()).is_dir() {
                return Self::open(dir);
            }
        }
        Err(Error::NoRepo(start.to_path_buf()))
    }

    /// remove the metadata directory, destroying all history
    pub fn destroy(self) -> Result<()> {
        fs::remove_dir_all(&self.git_dir).with_path(&self.git_dir)
    }

    /// worktree root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// metadata directory path
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_bare(&self) -> bool {
        self.config.is_bare()
    }

    /// path to the object store
    pub fn objects_dir(&self) -> PathBuf {
        self.git_dir.join("objects")
    }

    pub fn refs_dir(&self) -> PathBuf {
        self.git_dir.join("refs")
    }

    pub fn heads_dir(&self) -> PathBuf {
        self.git_dir.join("refs/heads")
    }

    pub fn tags_dir(&self) -> PathBuf {
        self.git_dir.join("refs/tags")
    }

    pub fn head_path(&self) -> PathBuf {
        self.git_dir.join("HEAD")
    }

    pub fn index_path(&self) -> PathBuf {
        self.git_dir.join("index")
    }

    pub fn config_path(&self) -> PathBuf {
        self.git_dir.join("config")
    }
}
