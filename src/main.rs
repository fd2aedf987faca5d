//! sc - thin command line shell over the srcctl engine
//!
//! all semantics live in the library; this binary parses arguments,
//! renders the structured results, and maps failures to exit codes:
//! 0 success, 1 fatal error, 2 usage error (from clap).

use std::env;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};

use srcctl::ops::{
    self, AddOptions, CommitOptions, HideDotfiles, LsTreeOptions, StagedChange,
};
use srcctl::{
    CompareOptions, EntryDiff, Error, Head, Index, InitOptions, Object, ObjectKind, Repository,
};

#[derive(Parser)]
#[command(name = "sc")]
#[command(about = "git-compatible local version control")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new repository
    Init {
        /// directory to initialize
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// create a bare repository
        #[arg(long)]
        bare: bool,
    },

    /// compute object ids, optionally writing blobs to the store
    HashObject {
        /// write the objects into the object store
        #[arg(short = 'w')]
        write: bool,

        /// read the content from standard input
        #[arg(long)]
        stdin: bool,

        files: Vec<PathBuf>,
    },

    /// show object contents or metadata
    #[command(group(ArgGroup::new("mode").required(true)))]
    CatFile {
        /// pretty-print the object's content
        #[arg(short = 'p', group = "mode")]
        pretty: bool,

        /// show the object's type
        #[arg(short = 't', group = "mode")]
        kind: bool,

        /// show the object's size
        #[arg(short = 's', group = "mode")]
        size: bool,

        /// exit with status 0 when the object exists
        #[arg(short = 'e', group = "mode")]
        exists: bool,

        object: String,
    },

    /// stage file contents in the index
    Add {
        /// classify paths without staging anything
        #[arg(short = 'n')]
        dry_run: bool,

        /// stage ignored paths too
        #[arg(short = 'f')]
        force: bool,

        /// report each staged path
        #[arg(short = 'v')]
        verbose: bool,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// summarize staged, unstaged and untracked changes
    Status,

    /// write the index as a tree and print its id
    WriteTree,

    /// list the contents of a tree-ish
    LsTree {
        /// recurse into subtrees
        #[arg(short = 'r')]
        recursive: bool,

        /// print only entry paths
        #[arg(long)]
        name_only: bool,

        /// include blob sizes
        #[arg(short = 'l')]
        long: bool,

        /// list only trees
        #[arg(short = 'd')]
        dirs_only: bool,

        tree_ish: String,
    },

    /// record the staged snapshot on the current branch
    Commit {
        /// commit message
        #[arg(short = 'm')]
        message: String,

        /// replace the current HEAD commit
        #[arg(long)]
        amend: bool,

        /// allow a commit with no changes
        #[arg(long)]
        allow_empty: bool,
    },

    /// show commit history from HEAD
    Log,

    /// remove the repository's metadata directory
    Destroy {
        /// actually do it
        #[arg(short = 'f')]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> srcctl::Result<ExitCode> {
    match cli.command {
        Commands::Init { dir, bare } => {
            let opts = InitOptions {
                bare,
                ..Default::default()
            };
            let repo = Repository::init_with(&dir, &opts)?;
            println!(
                "Initialized empty repository in {}",
                repo.git_dir().display()
            );
        }

        Commands::HashObject {
            write,
            stdin,
            files,
        } => {
            // a repository is only needed when writing
            let repo = if write { Some(find_repo()?) } else { None };
            if stdin {
                let mut content = Vec::new();
                io::stdin()
                    .read_to_end(&mut content)
                    .map_err(|e| Error::Io {
                        path: PathBuf::from("<stdin>"),
                        source: e,
                    })?;
                println!("{}", hash_or_write(repo.as_ref(), &content)?);
            }
            for file in &files {
                let content = std::fs::read(file).map_err(|e| Error::Io {
                    path: file.clone(),
                    source: e,
                })?;
                println!("{}", hash_or_write(repo.as_ref(), &content)?);
            }
        }

        Commands::CatFile {
            pretty,
            kind,
            size,
            exists,
            object,
        } => {
            let repo = find_repo()?;
            let id = srcctl::resolve_revision(&repo, &object)?;

            if exists {
                return Ok(if srcctl::has_object(&repo, &id) {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                });
            }
            if kind {
                println!("{}", srcctl::read_object_header(&repo, &id)?.0);
            } else if size {
                println!("{}", srcctl::read_object_header(&repo, &id)?.1);
            } else if pretty {
                print_object(&repo, &srcctl::read_object(&repo, &id)?)?;
            }
        }

        Commands::Add {
            dry_run,
            force,
            verbose,
            paths,
        } => {
            let repo = find_repo()?;
            let mut index = Index::load(&repo)?;

            let opts = AddOptions {
                dry_run,
                force,
                cancel: None,
            };
            let result = ops::add(&repo, &mut index, &paths, &HideDotfiles, &opts)?;

            if !dry_run && result.staged_count() > 0 {
                index.save(&repo)?;
            }

            if verbose || dry_run {
                for path in result.added.iter().chain(&result.modified) {
                    println!("add '{}'", path);
                }
                for path in &result.ignored {
                    println!("ignore '{}'", path);
                }
            }
            for (path, reason) in &result.failed {
                eprintln!("error: {}: {}", path, reason);
            }

            if result.staged_count() == 0 && !result.failed.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Status => {
            let repo = find_repo()?;
            let index = Index::load(&repo)?;
            let report = ops::status(&repo, &index, &HideDotfiles, &CompareOptions::default())?;
            print_status(&report);
        }

        Commands::WriteTree => {
            let repo = find_repo()?;
            let index = Index::load(&repo)?;
            println!("{}", ops::write_tree_from_index(&repo, &index)?);
        }

        Commands::LsTree {
            recursive,
            name_only,
            long,
            dirs_only,
            tree_ish,
        } => {
            let repo = find_repo()?;
            let opts = LsTreeOptions {
                recursive,
                dirs_only,
                long,
            };
            for item in ops::ls_tree(&repo, &tree_ish, &opts)? {
                if name_only {
                    println!("{}", item.path);
                } else if long {
                    let size = item
                        .size
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{} {} {} {:>7}\t{}",
                        item.mode.as_display(),
                        item.kind,
                        item.id,
                        size,
                        item.path
                    );
                } else {
                    println!("{}", item);
                }
            }
        }

        Commands::Commit {
            message,
            amend,
            allow_empty,
        } => {
            let repo = find_repo()?;
            let index = Index::load(&repo)?;

            let opts = CommitOptions {
                message,
                allow_empty,
                amend,
                ..Default::default()
            };
            let result = ops::commit(&repo, &index, &opts)?;

            let head = match &result.branch {
                Some(branch) => branch.clone(),
                None => "detached HEAD".to_string(),
            };
            let root = if result.root { " (root-commit)" } else { "" };
            let subject = commit_subject(&repo, &result.id)?;
            println!("[{}{} {}] {}", head, root, &result.id.to_hex()[..7], subject);
        }

        Commands::Log => {
            let repo = find_repo()?;
            for entry in ops::log(&repo, None)? {
                println!("{}", entry);
            }
        }

        Commands::Destroy { force } => {
            let repo = find_repo()?;
            let git_dir = repo.git_dir().to_path_buf();
            if !force {
                eprintln!(
                    "fatal: refusing to destroy {} without -f",
                    git_dir.display()
                );
                return Ok(ExitCode::FAILURE);
            }
            repo.destroy()?;
            println!("Destroyed repository at {}", git_dir.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn find_repo() -> srcctl::Result<Repository> {
    let cwd = env::current_dir().map_err(|e| Error::Io {
        path: PathBuf::from("."),
        source: e,
    })?;
    Repository::find(&cwd)
}

fn hash_or_write(repo: Option<&Repository>, content: &[u8]) -> srcctl::Result<String> {
    let id = match repo {
        Some(repo) => srcctl::write_blob(repo, content)?,
        None => srcctl::compute_object_id(ObjectKind::Blob, content),
    };
    Ok(id.to_hex())
}

fn print_object(repo: &Repository, object: &Object) -> srcctl::Result<()> {
    match object {
        Object::Blob(bytes) | Object::Tag(bytes) => {
            let mut out = io::stdout();
            out.write_all(bytes).map_err(|e| Error::Io {
                path: PathBuf::from("<stdout>"),
                source: e,
            })?;
        }
        Object::Tree(tree) => {
            for entry in tree.entries() {
                println!(
                    "{} {} {}\t{}",
                    entry.mode.as_display(),
                    entry.mode.object_kind(),
                    entry.id,
                    entry.name
                );
            }
        }
        Object::Commit(commit) => {
            let mut out = io::stdout();
            out.write_all(&commit.serialize()).map_err(|e| Error::Io {
                path: PathBuf::from("<stdout>"),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// first line of the freshly created commit's message
fn commit_subject(repo: &Repository, id: &srcctl::ObjectId) -> srcctl::Result<String> {
    let commit = srcctl::read_commit(repo, id)?;
    Ok(commit.message.lines().next().unwrap_or("").to_string())
}

fn print_status(report: &ops::StatusReport) {
    match &report.head {
        Head::Detached(id) => println!("HEAD detached at {}", &id.to_hex()[..7]),
        head => {
            if let Some(branch) = head.branch_name() {
                println!("On branch {}", branch);
            }
        }
    }

    if !report.staged.is_empty() {
        println!();
        println!("Changes to be committed:");
        for (path, change) in &report.staged {
            let label = match change {
                StagedChange::Added => "new file",
                StagedChange::Modified => "modified",
                StagedChange::Deleted => "deleted",
            };
            println!("\t{}:   {}", label, path);
        }
    }

    if !report.unstaged.is_empty() {
        println!();
        println!("Changes not staged for commit:");
        for (path, diff) in &report.unstaged {
            let label = match diff {
                EntryDiff::FileMissing => "deleted",
                _ => "modified",
            };
            println!("\t{}:   {}", label, path);
        }
    }

    if !report.untracked.is_empty() {
        println!();
        println!("Untracked files:");
        for path in &report.untracked {
            println!("\t{}", path);
        }
    }

    if report.is_clean() {
        println!("nothing to commit, working tree clean");
    }
}
