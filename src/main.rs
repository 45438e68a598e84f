//! The command-line front end.
//!
//! A `clap`-derive `Command` enum with a `match`-based dispatch loop in
//! `main`, covering the full command surface below, plus a
//! `tracing-subscriber` subscriber initialized from `RUST_LOG`.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jiff::tz::{Offset, TimeZone};
use jiff::Timestamp;

use mingit::checkout::checkout_tree;
use mingit::hash::ObjectId;
use mingit::message::Identity;
use mingit::object::Kind;
use mingit::refs::{self, RefTarget};
use mingit::repo::Repository;
use mingit::store::{self, TypedObject};

const METADATA_DIR_NAME: &str = ".git";

/// How many commits `log` will walk before refusing to continue, guarding
/// against a corrupted or deliberately cyclic `parent` chain.
const MAX_LOG_DEPTH: u32 = 10_000;

#[derive(Parser)]
#[command(name = "mingit", version, about = "A minimal content-addressed object store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Creates a new repository at the given path (current directory if omitted).
    Init {
        path: Option<PathBuf>,
    },
    /// Hashes a file's content, optionally storing it.
    HashObject {
        path: PathBuf,
        #[arg(short = 't', long = "type", default_value = "blob")]
        kind: String,
        #[arg(short = 'w')]
        write: bool,
    },
    /// Prints the raw body of an object.
    CatFile {
        kind: String,
        object: String,
    },
    /// Lists a tree's entries.
    LsTree {
        object: String,
        #[arg(short = 'r')]
        recursive: bool,
    },
    /// Materializes a commit's tree onto the filesystem.
    Checkout {
        commit: String,
        path: Option<PathBuf>,
    },
    /// Walks first-parent history from a starting point.
    Log {
        #[arg(default_value = "HEAD")]
        start: String,
    },
    /// Lists every reference.
    ShowRef,
    /// Resolves a name to a full object hash.
    RevParse {
        name: String,
        #[arg(short = 't', long = "type")]
        kind: Option<String>,
    },
    /// Creates, lists, or deletes tags.
    Tag {
        name: Option<String>,
        object: Option<String>,
        #[arg(short = 'a')]
        annotate: bool,
        #[arg(short = 'm')]
        message: Option<String>,
        #[arg(short = 'd')]
        delete: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Init { path } => cmd_init(path),
        Command::HashObject { path, kind, write } => cmd_hash_object(path, kind, write),
        Command::CatFile { kind, object } => cmd_cat_file(kind, object),
        Command::LsTree { object, recursive } => cmd_ls_tree(object, recursive),
        Command::Checkout { commit, path } => cmd_checkout(commit, path),
        Command::Log { start } => cmd_log(start),
        Command::ShowRef => cmd_show_ref(),
        Command::RevParse { name, kind } => cmd_rev_parse(name, kind),
        Command::Tag {
            name,
            object,
            annotate,
            message,
            delete,
        } => cmd_tag(name, object, annotate, message, delete),
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("reading current directory")
}

fn discover() -> Result<Repository> {
    Repository::discover(&current_dir()?, METADATA_DIR_NAME).context("locating repository")
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let target = path.unwrap_or(current_dir()?);
    let repo = Repository::init(&target, METADATA_DIR_NAME)?;
    println!("Initialized empty repository in {}", repo.metadata_dir().display());
    Ok(())
}

fn cmd_hash_object(path: PathBuf, kind: String, write: bool) -> Result<()> {
    let kind: Kind = kind.parse()?;
    let repo = discover()?;
    let id = store::hash_file(&repo, &path, kind, write)?;
    println!("{id}");
    Ok(())
}

fn resolve(repo: &Repository, name: &str) -> Result<ObjectId> {
    refs::resolve_name(repo, name).with_context(|| format!("resolving {name:?}"))
}

fn cmd_cat_file(kind: String, object: String) -> Result<()> {
    let repo = discover()?;
    let wanted: Kind = kind.parse()?;
    let id = resolve(&repo, &object)?;
    let obj = store::read_object(&repo, &id)?;
    if obj.kind() != wanted {
        bail!("object {id} has type {}, expected {wanted}", obj.kind());
    }
    use std::io::Write;
    std::io::stdout().write_all(&obj.encode())?;
    Ok(())
}

fn cmd_ls_tree(object: String, recursive: bool) -> Result<()> {
    let repo = discover()?;
    let tree_id = refs::find(&repo, &object, Some(Kind::Tree), true)
        .with_context(|| format!("resolving {object:?} to a tree"))?;
    print_tree(&repo, &tree_id, "", recursive)
}

fn print_tree(repo: &Repository, tree_id: &ObjectId, prefix: &str, recursive: bool) -> Result<()> {
    let obj = store::read_object(repo, tree_id)?;
    let tree = obj.as_tree(tree_id)?;
    for entry in &tree.entries {
        let display_path = format!("{prefix}{}", entry.path);
        let kind = if entry.mode == mingit::tree::Mode::Tree {
            Kind::Tree
        } else if entry.mode == mingit::tree::Mode::Gitlink {
            Kind::Commit
        } else {
            Kind::Blob
        };
        if recursive && kind == Kind::Tree {
            print_tree(repo, &entry.id, &format!("{display_path}/"), recursive)?;
        } else {
            let mode = entry.mode.as_octal_str();
            let id = &entry.id;
            println!("{mode:0>6} {kind} {id}\t{display_path}");
        }
    }
    Ok(())
}

fn cmd_checkout(commit: String, path: Option<PathBuf>) -> Result<()> {
    let repo = discover()?;
    let path = path.unwrap_or(current_dir()?);
    let tree_id = refs::find(&repo, &commit, Some(Kind::Tree), true)
        .with_context(|| format!("resolving {commit:?} to a tree"))?;
    checkout_tree(&repo, &tree_id, &path)?;
    Ok(())
}

fn cmd_log(start: String) -> Result<()> {
    let repo = discover()?;
    let mut current = refs::find(&repo, &start, Some(Kind::Commit), true)
        .with_context(|| format!("resolving {start:?} to a commit"))?;

    let mut seen = HashSet::new();
    for _ in 0..MAX_LOG_DEPTH {
        if !seen.insert(current.clone()) {
            bail!("cyclic commit history detected at {current}");
        }

        let obj = store::read_object(&repo, &current)?;
        let commit = obj.as_commit(&current)?;

        println!("commit {current}");
        if let Some(author) = commit.header("author") {
            if let Ok(identity) = mingit::message::parse_identity(author) {
                println!("Author: {} <{}>", identity.name, identity.email);
                if let Some(date) = format_identity_time(&identity) {
                    println!("Date:   {date}");
                }
            }
        }
        println!();
        for line in commit.text().split(|&b| b == b'\n') {
            println!("    {}", String::from_utf8_lossy(line));
        }
        println!();

        match commit.header("parent") {
            Some(parent) => {
                let parent = std::str::from_utf8(parent)?;
                current = ObjectId::try_from(parent)?;
            }
            None => return Ok(()),
        }
    }
    bail!("commit history exceeds {MAX_LOG_DEPTH} commits without reaching a root");
}

fn cmd_show_ref() -> Result<()> {
    let repo = discover()?;
    for (name, id) in refs::list_refs(&repo)? {
        println!("{id} {name}");
    }
    Ok(())
}

fn cmd_rev_parse(name: String, kind: Option<String>) -> Result<()> {
    let repo = discover()?;
    let wanted = kind.map(|k| k.parse::<Kind>()).transpose()?;
    println!("{}", refs::find(&repo, &name, wanted, true)?);
    Ok(())
}

/// Parses a `+HHMM`/`-HHMM` timezone offset into a `jiff` fixed offset.
fn parse_tz_offset(tz: &str) -> Option<Offset> {
    if !tz.is_ascii() || tz.len() != 5 {
        return None;
    }
    let bytes = tz.as_bytes();
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = tz[1..3].parse().ok()?;
    let minutes: i32 = tz[3..5].parse().ok()?;
    Offset::from_seconds(sign * (hours * 3600 + minutes * 60)).ok()
}

/// Renders an identity's stored timestamp/offset as a human-readable date,
/// for `log`'s output. Returns `None` rather than failing `log` outright if
/// the offset is malformed.
fn format_identity_time(identity: &Identity) -> Option<String> {
    let offset = parse_tz_offset(&identity.tz_offset)?;
    let timestamp = Timestamp::from_second(identity.seconds).ok()?;
    let zoned = timestamp.to_zoned(TimeZone::fixed(offset));
    Some(zoned.strftime("%Y-%m-%d %H:%M:%S %z").to_string())
}

/// Builds the identity used for a newly created annotated tag, from the
/// system clock/timezone and the `GIT_AUTHOR_NAME`/`GIT_AUTHOR_EMAIL`
/// environment variables (falling back to placeholders if unset).
fn current_identity() -> Identity {
    let name = std::env::var("GIT_AUTHOR_NAME").unwrap_or_else(|_| "unknown".to_string());
    let email =
        std::env::var("GIT_AUTHOR_EMAIL").unwrap_or_else(|_| "unknown@localhost".to_string());
    let zoned = Timestamp::now().to_zoned(TimeZone::system());
    let offset_seconds = zoned.offset().seconds();
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let abs = offset_seconds.abs();
    let tz_offset = format!("{sign}{:02}{:02}", abs / 3600, (abs % 3600) / 60);
    Identity {
        name,
        email,
        seconds: zoned.timestamp().as_second(),
        tz_offset,
    }
}

fn cmd_tag(
    name: Option<String>,
    object: Option<String>,
    annotate: bool,
    message: Option<String>,
    delete: bool,
) -> Result<()> {
    let repo = discover()?;

    if delete {
        let name = name.context("-d requires a tag name")?;
        let was = refs::delete_ref(&repo, &format!("refs/tags/{name}"))?;
        println!("Deleted tag {name} (was {was})");
        return Ok(());
    }

    let Some(name) = name else {
        for (path, id) in refs::list_refs(&repo)? {
            if let Some(tag_name) = path.strip_prefix("refs/tags/") {
                println!("{tag_name}\t{id}");
            }
        }
        return Ok(());
    };

    let target = resolve(&repo, object.as_deref().unwrap_or("HEAD"))?;

    if annotate {
        let message = message.context("-a requires -m <message>")?;
        let mut tag_message = mingit::message::Message::new(format!("{message}\n"));
        tag_message.push_header("object", target.as_str());
        tag_message.push_header("type", store::read_object(&repo, &target)?.kind().as_str());
        tag_message.push_header("tag", name.as_str());
        tag_message.push_header(
            "tagger",
            mingit::message::emit_identity(&current_identity()),
        );
        let tag_id = store::write_object(&repo, &TypedObject::Tag(tag_message))?;
        refs::create_ref(
            &repo,
            &format!("refs/tags/{name}"),
            &RefTarget::Direct(tag_id),
            false,
        )?;
    } else {
        refs::create_ref(
            &repo,
            &format!("refs/tags/{name}"),
            &RefTarget::Direct(target),
            false,
        )?;
    }
    Ok(())
}
