//! Offline administration for a giftlist database: users, lists, items,
//! bulk loading and session cleanup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use giftlist_crypto::{Argon2Digest, PasswordDigest};
use giftlist_db::{Database, List, ListData, ListFilter, ListItem, ListItemData, NewUser, User};
use giftlist_types::clock::{Clock, SystemClock};

#[derive(Parser)]
#[command(name = "giftlist-admin", about = "Manage a giftlist database")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, env = "GIFTLIST_DB_PATH", default_value = "giftlist.db")]
    db: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database, or migrate it to the current schema
    Init,
    User {
        #[command(subcommand)]
        cmd: UserCmd,
    },
    List {
        #[command(subcommand)]
        cmd: ListCmd,
    },
    Item {
        #[command(subcommand)]
        cmd: ItemCmd,
    },
    /// Bulk-load users and lists from a TOML file
    Load { file: PathBuf },
    Sessions {
        #[command(subcommand)]
        cmd: SessionsCmd,
    },
    Secret {
        #[command(subcommand)]
        cmd: SecretCmd,
    },
}

#[derive(Subcommand)]
enum UserCmd {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        fullname: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        admin: bool,
    },
    List,
    /// Look a user up by username or numeric id
    Lookup { user: String },
}

#[derive(Subcommand)]
enum ListCmd {
    Create {
        /// Owner, by username or numeric id
        #[arg(long)]
        owner: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        beneficiary: String,
        /// YYYY-MM-DD
        #[arg(long)]
        event_date: String,
        #[arg(long)]
        inactive: bool,
    },
    List {
        #[arg(long)]
        include_inactive: bool,
        /// Show only this list, followed by its items
        #[arg(long, conflicts_with = "include_inactive")]
        list_id: Option<i64>,
    },
}

#[derive(Subcommand)]
enum ItemCmd {
    Create {
        #[arg(long)]
        list_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        desc: String,
        #[arg(long, default_value = "")]
        url: String,
    },
}

#[derive(Subcommand)]
enum SessionsCmd {
    /// Log everyone out
    Clear,
}

#[derive(Subcommand)]
enum SecretCmd {
    /// Print a fresh random session secret
    Generate,
}

// -- Load file --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoadFile {
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default)]
    lists: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserEntry {
    username: String,
    fullname: String,
    password: String,
    #[serde(default)]
    admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListEntry {
    owner: String,
    name: String,
    beneficiary: String,
    event_date: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    items: Vec<ItemEntry>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ItemEntry {
    name: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    url: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let open = || {
        Database::open(&cli.db)
            .with_context(|| format!("Failed to open database {}", cli.db.display()))
    };
    let passwords = Argon2Digest::default();
    let now = SystemClock::default().now();

    match cli.cmd {
        Command::Init => {
            open()?;
            println!("Database ready at {}", cli.db.display());
        }
        Command::User { cmd } => {
            let db = open()?;
            match cmd {
                UserCmd::Create {
                    username,
                    fullname,
                    password,
                    admin,
                } => {
                    let entry = UserEntry {
                        username,
                        fullname,
                        password,
                        admin,
                    };
                    let user = create_user(&db, &passwords, &entry)?;
                    println!("Created user {}", user.id);
                }
                UserCmd::List => {
                    for user in db.list_users()? {
                        print_user(&user);
                    }
                }
                UserCmd::Lookup { user } => print_user(&find_user(&db, &user)?),
            }
        }
        Command::List { cmd } => {
            let db = open()?;
            match cmd {
                ListCmd::Create {
                    owner,
                    name,
                    beneficiary,
                    event_date,
                    inactive,
                } => {
                    let entry = ListEntry {
                        owner,
                        name,
                        beneficiary,
                        event_date,
                        active: !inactive,
                        items: Vec::new(),
                    };
                    let list_id = create_list(&db, &entry, now)?;
                    println!("Created list {}", list_id);
                }
                ListCmd::List {
                    include_inactive,
                    list_id,
                } => {
                    let filter = match list_id {
                        Some(id) => ListFilter::Id(id),
                        None => ListFilter::include_inactive(include_inactive),
                    };
                    let lists = db.list_lists(filter)?;
                    if list_id.is_some() && lists.is_empty() {
                        bail!("No list {}", list_id.unwrap_or_default());
                    }
                    for list in &lists {
                        print_list(list);
                    }
                    if list_id.is_some() {
                        for list in &lists {
                            for item in db.list_list_items(list.id)? {
                                print_item(&item);
                            }
                        }
                    }
                }
            }
        }
        Command::Item {
            cmd:
                ItemCmd::Create {
                    list_id,
                    name,
                    desc,
                    url,
                },
        } => {
            let db = open()?;
            let list = db
                .get_list(list_id)?
                .with_context(|| format!("No list {}", list_id))?;
            // Added on the owner's behalf.
            let item = db.create_list_item(
                list.id,
                list.owner_id,
                &ListItemData { name, desc, url },
                now,
            )?;
            println!("Created item {} in list {}", item.id, list.id);
        }
        Command::Load { file } => {
            let contents = read_load_file(&file)?;
            let db = open()?;
            let (users, lists) = load(&db, &passwords, &contents, now)?;
            println!("Loaded {} users and {} lists", users, lists);
        }
        Command::Sessions {
            cmd: SessionsCmd::Clear,
        } => {
            let removed = open()?.delete_all_sessions()?;
            println!("Removed {} sessions", removed);
        }
        Command::Secret {
            cmd: SecretCmd::Generate,
        } => println!("{}", giftlist_crypto::secret::generate_secret()),
    }

    Ok(())
}

fn print_list(list: &List) {
    println!(
        "{}\tv{}\towner={}\t{}\tfor {}\t{}{}",
        list.id,
        list.version,
        list.owner_id,
        list.data.name,
        list.data.beneficiary,
        list.data.event_date.format("%Y-%m-%d"),
        if list.data.active { "" } else { "\t(inactive)" }
    );
}

fn print_item(item: &ListItem) {
    let claim = match item.claim.claimant() {
        Some(by) => format!("\tclaimed by {}", by),
        None => String::new(),
    };
    println!(
        "  {}\tv{}\t{}\t{}\t{}{}",
        item.id, item.version, item.data.name, item.data.desc, item.data.url, claim
    );
}

fn print_user(user: &User) {
    println!(
        "{}\t{}\t{}{}",
        user.id,
        user.username,
        user.fullname,
        if user.admin { "\t(admin)" } else { "" }
    );
}

/// Accepts a username, or a numeric user id.
fn find_user(db: &Database, key: &str) -> Result<User> {
    if let Some(user) = db.get_user_by_username(key)? {
        return Ok(user);
    }
    if let Ok(id) = key.parse::<i64>() {
        if let Some(user) = db.get_user(id)? {
            return Ok(user);
        }
    }
    bail!("No user {}", key)
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", s))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn create_user(db: &Database, passwords: &dyn PasswordDigest, entry: &UserEntry) -> Result<User> {
    if entry.password.is_empty() {
        bail!("Password for {} is empty", entry.username);
    }
    let digest = passwords.digest(&entry.password)?;
    let user = db.create_user(
        &NewUser {
            username: entry.username.clone(),
            fullname: entry.fullname.clone(),
            admin: entry.admin,
        },
        &digest,
    )?;
    Ok(user)
}

fn create_list(db: &Database, entry: &ListEntry, now: DateTime<Utc>) -> Result<i64> {
    let owner = find_user(db, &entry.owner)?;
    let data = ListData {
        name: entry.name.clone(),
        beneficiary: entry.beneficiary.clone(),
        event_date: parse_date(&entry.event_date)?,
        active: entry.active,
    };
    let list = db.create_list(owner.id, &data, now)?;

    for (idx, item) in entry.items.iter().enumerate() {
        let data = ListItemData {
            name: item.name.clone(),
            desc: item.desc.clone(),
            url: item.url.clone(),
        };
        db.create_list_item(list.id, owner.id, &data, now)
            .with_context(|| format!("Failed to create item {} of list {}", idx + 1, entry.name))?;
    }
    Ok(list.id)
}

fn read_load_file(path: &Path) -> Result<LoadFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Users first, so lists can name them as owners. Stops at the first failure.
fn load(
    db: &Database,
    passwords: &dyn PasswordDigest,
    contents: &LoadFile,
    now: DateTime<Utc>,
) -> Result<(usize, usize)> {
    for (idx, user) in contents.users.iter().enumerate() {
        create_user(db, passwords, user)
            .with_context(|| format!("Failed to create user {}", idx + 1))?;
    }
    for (idx, list) in contents.lists.iter().enumerate() {
        create_list(db, list, now).with_context(|| format!("Failed to create list {}", idx + 1))?;
    }
    Ok((contents.users.len(), contents.lists.len()))
}
