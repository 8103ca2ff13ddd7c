use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "liteorm.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Ddl,
    Init,
    Export,
    Import,
    Backup,
    Count,
    Select,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Ddl(CommonArgs),
    Init(CommonArgs),
    Export(ExportArgs),
    Import(ImportArgs),
    Backup(BackupArgs),
    Count(CountArgs),
    Select(SelectArgs),
}

#[derive(Debug, Clone)]
pub struct CommonArgs {
    pub config: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub config: PathBuf,
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ImportArgs {
    pub config: PathBuf,
    pub file: PathBuf,
    pub recreate: bool,
}

#[derive(Debug, Clone)]
pub struct BackupArgs {
    pub config: PathBuf,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CountArgs {
    pub config: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone)]
pub struct SelectArgs {
    pub config: PathBuf,
    pub table: String,
    pub limit: Option<u64>,
    pub json: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    let topic = match first.as_str() {
        "-h" | "--help" | "help" => return Ok(Command::Help(HelpTopic::Root)),
        "ddl" => HelpTopic::Ddl,
        "init" => HelpTopic::Init,
        "export" => HelpTopic::Export,
        "import" => HelpTopic::Import,
        "backup" => HelpTopic::Backup,
        "count" => HelpTopic::Count,
        "select" => HelpTopic::Select,
        _ => anyhow::bail!("unknown command: {first}"),
    };
    parse_command(topic, it.map(|s| s.as_str()))
}

/// Options shared by every command, collected before per-command checks.
#[derive(Default)]
struct RawOptions {
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    dir: Option<PathBuf>,
    limit: Option<u64>,
    recreate: bool,
    json: bool,
    positional: Vec<String>,
}

fn parse_command<'a>(
    topic: HelpTopic,
    mut it: impl Iterator<Item = &'a str>,
) -> anyhow::Result<Command> {
    let mut raw = RawOptions::default();

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(topic)),
            "--config" => raw.config = Some(PathBuf::from(value_of("--config", it.next())?)),
            _ if token.starts_with("--config=") => {
                raw.config = Some(PathBuf::from(token.trim_start_matches("--config=")));
            }
            "--out" if topic == HelpTopic::Export => {
                raw.out = Some(PathBuf::from(value_of("--out", it.next())?));
            }
            _ if topic == HelpTopic::Export && token.starts_with("--out=") => {
                raw.out = Some(PathBuf::from(token.trim_start_matches("--out=")));
            }
            "--dir" if topic == HelpTopic::Backup => {
                raw.dir = Some(PathBuf::from(value_of("--dir", it.next())?));
            }
            _ if topic == HelpTopic::Backup && token.starts_with("--dir=") => {
                raw.dir = Some(PathBuf::from(token.trim_start_matches("--dir=")));
            }
            "--limit" if topic == HelpTopic::Select => {
                raw.limit = Some(parse_limit(value_of("--limit", it.next())?)?);
            }
            _ if topic == HelpTopic::Select && token.starts_with("--limit=") => {
                raw.limit = Some(parse_limit(token.trim_start_matches("--limit="))?);
            }
            "--recreate" if topic == HelpTopic::Import => raw.recreate = true,
            "--json" if topic == HelpTopic::Select => raw.json = true,
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other => raw.positional.push(other.to_string()),
        }
    }

    let config = raw.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let cmd = match topic {
        HelpTopic::Root => return Ok(Command::Help(HelpTopic::Root)),
        HelpTopic::Ddl => {
            no_positional(&raw.positional)?;
            Command::Ddl(CommonArgs { config })
        }
        HelpTopic::Init => {
            no_positional(&raw.positional)?;
            Command::Init(CommonArgs { config })
        }
        HelpTopic::Export => {
            no_positional(&raw.positional)?;
            Command::Export(ExportArgs {
                config,
                out: raw.out,
            })
        }
        HelpTopic::Import => Command::Import(ImportArgs {
            config,
            file: PathBuf::from(one_positional("import", "FILE", raw.positional)?),
            recreate: raw.recreate,
        }),
        HelpTopic::Backup => {
            no_positional(&raw.positional)?;
            Command::Backup(BackupArgs {
                config,
                dir: raw.dir,
            })
        }
        HelpTopic::Count => Command::Count(CountArgs {
            config,
            table: one_positional("count", "TABLE", raw.positional)?,
        }),
        HelpTopic::Select => Command::Select(SelectArgs {
            config,
            table: one_positional("select", "TABLE", raw.positional)?,
            limit: raw.limit,
            json: raw.json,
        }),
    };
    Ok(cmd)
}

fn value_of<'a>(flag: &str, value: Option<&'a str>) -> anyhow::Result<&'a str> {
    match value {
        Some(v) => Ok(v),
        None => anyhow::bail!("{flag} requires a value"),
    }
}

fn parse_limit(v: &str) -> anyhow::Result<u64> {
    v.parse()
        .map_err(|_| anyhow::anyhow!("--limit must be a non-negative integer, got {v}"))
}

fn no_positional(positional: &[String]) -> anyhow::Result<()> {
    match positional.first() {
        Some(extra) => anyhow::bail!("unexpected argument: {extra}"),
        None => Ok(()),
    }
}

fn one_positional(cmd: &str, what: &str, positional: Vec<String>) -> anyhow::Result<String> {
    let mut positional = positional.into_iter();
    let Some(value) = positional.next() else {
        anyhow::bail!("missing {what}: expected `liteorm {cmd} {what}`");
    };
    if let Some(extra) = positional.next() {
        anyhow::bail!("unexpected argument: {extra}");
    }
    Ok(value)
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
liteorm - manage SQLite databases declared in a liteorm.toml

USAGE:
  liteorm <COMMAND> [OPTIONS]

COMMANDS:
  ddl       Print CREATE TABLE statements
  init      Create every declared table
  export    Write a text dump of all tables
  import    Replay a text dump
  backup    Copy the database file to a timestamped backup
  count     Print the row count of a table
  select    Print the rows of a table
  help      Print help

Run `liteorm <COMMAND> --help` for command options."
            );
        }
        HelpTopic::Ddl => {
            println!(
                "\
USAGE:
  liteorm ddl [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: liteorm.toml)
  -h, --help            Print help"
            );
        }
        HelpTopic::Init => {
            println!(
                "\
USAGE:
  liteorm init [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: liteorm.toml)
  -h, --help            Print help"
            );
        }
        HelpTopic::Export => {
            println!(
                "\
USAGE:
  liteorm export [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: liteorm.toml)
  --out <FILE>          Write the dump to a file (default: stdout)
  -h, --help            Print help"
            );
        }
        HelpTopic::Import => {
            println!(
                "\
USAGE:
  liteorm import <FILE> [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: liteorm.toml)
  --recreate            Drop and recreate every table before replaying
  -h, --help            Print help"
            );
        }
        HelpTopic::Backup => {
            println!(
                "\
USAGE:
  liteorm backup [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: liteorm.toml)
  --dir <DIR>           Destination directory (default: database.backup_dir)
  -h, --help            Print help"
            );
        }
        HelpTopic::Count => {
            println!(
                "\
USAGE:
  liteorm count <TABLE> [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: liteorm.toml)
  -h, --help            Print help"
            );
        }
        HelpTopic::Select => {
            println!(
                "\
USAGE:
  liteorm select <TABLE> [OPTIONS]

OPTIONS:
  --config <FILE>       Config file path (default: liteorm.toml)
  --limit <N>           Print at most N rows
  --json                Print rows as JSON instead of a table
  -h, --help            Print help"
            );
        }
    }
}
