//! Command line client
//!
//! Works on the database file directly, every command is one unit of work.

use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::database;
use crate::database::CreateNoteValues;
use crate::database::DatabaseConfig;
use crate::database::UpdateNoteValues;
use crate::database::format_timestamp;
use crate::database::notes;
use crate::database::open_transaction;
use crate::notes::Note;

/// Usage text, printed for `--help` and usage errors
pub const USAGE: &str = "\
Usage: hej [--database <path>] <command>

Commands:
  create <title> <text>      Create a note
  update <uuid> [--title <title>] [--text <text>] [--favorite <true|false>]
                             Change a note
  favorite <uuid> <true|false>
                             Mark or unmark a note as favorite
  list                       List all notes
  view <uuid>                Show a note
  delete <uuid>              Delete a note

Options:
  --database <path>          Database file, defaults to `HEJ_DB_PATH` or ~/.hej.sqlite
  -h, --help                 Show this help
";

/// CLI errors
#[derive(Debug, Error)]
pub enum Error {
    /// The arguments do not make sense
    #[error("{0}")]
    Usage(String),

    /// A single argument has an unusable value
    #[error("Invalid value for '{hint}': {message}")]
    BadParameter {
        /// Name of the argument
        hint: &'static str,

        /// What is wrong with it
        message: String,
    },

    /// The environment holds invalid settings
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Storage failed
    #[error(transparent)]
    Database(#[from] database::Error),

    /// Output could not be written
    #[error("Could not write output: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit code for the process, 2 for mistakes of the user
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) | Self::BadParameter { .. } => 2,
            Self::Config(_) | Self::Database(_) | Self::Io(_) => 1,
        }
    }

    /// Should the usage text be shown with this error?
    pub fn show_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    fn unknown_note(id: &Uuid) -> Self {
        Self::BadParameter {
            hint: "uuid",
            message: format!("unknown note '{id}'"),
        }
    }
}

/// What to do
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Create {
        title: String,
        text: String,
    },
    Update {
        id: Uuid,
        title: Option<String>,
        text: Option<String>,
        favorite: Option<bool>,
    },
    Favorite {
        id: Uuid,
        favorite: bool,
    },
    List,
    View {
        id: Uuid,
    },
    Delete {
        id: Uuid,
    },
    Help,
}

/// Parsed command line
#[derive(Debug, PartialEq, Eq)]
pub struct Args {
    /// Database file from `--database`
    pub database: Option<PathBuf>,

    pub command: Command,
}

/// Parse the arguments, without the program name
///
/// # Errors
///
/// Will return `Err` for missing, unknown or invalid arguments
pub fn parse_args(args: &[String]) -> Result<Args, Error> {
    let mut database = None;
    let mut rest = args;

    while let Some((first, tail)) = rest.split_first() {
        match first.as_str() {
            "--database" => {
                let (path, tail) = tail
                    .split_first()
                    .ok_or_else(|| usage("Option '--database' requires a value"))?;

                database = Some(PathBuf::from(path));
                rest = tail;
            }
            "-h" | "--help" | "help" => {
                return Ok(Args {
                    database,
                    command: Command::Help,
                });
            }
            _ => break,
        }
    }

    let (name, rest) = rest
        .split_first()
        .ok_or_else(|| usage("Missing command"))?;

    let command = match name.as_str() {
        "create" => {
            let [title, text] = positional(name, rest, ["title", "text"])?;

            Command::Create { title, text }
        }
        "update" => parse_update(rest)?,
        "favorite" => {
            let [id, favorite] = positional(name, rest, ["uuid", "favorite"])?;

            Command::Favorite {
                id: parse_uuid(&id)?,
                favorite: parse_bool("favorite", &favorite)?,
            }
        }
        "list" => {
            positional(name, rest, [])?;

            Command::List
        }
        "view" => {
            let [id] = positional(name, rest, ["uuid"])?;

            Command::View {
                id: parse_uuid(&id)?,
            }
        }
        "delete" => {
            let [id] = positional(name, rest, ["uuid"])?;

            Command::Delete {
                id: parse_uuid(&id)?,
            }
        }
        "-h" | "--help" | "help" => Command::Help,
        unknown => return Err(usage(format!("No such command '{unknown}'"))),
    };

    Ok(Args { database, command })
}

fn usage<M>(message: M) -> Error
where
    M: ToString,
{
    Error::Usage(message.to_string())
}

/// Exactly `N` positional arguments, named for the error messages
fn positional<const N: usize>(
    command: &str,
    args: &[String],
    names: [&'static str; N],
) -> Result<[String; N], Error> {
    if let Some(name) = names.get(args.len()) {
        return Err(usage(format!("Missing argument '{name}' for '{command}'")));
    }

    if let Some(extra) = args.get(N) {
        return Err(usage(format!("Unexpected argument '{extra}' for '{command}'")));
    }

    Ok(std::array::from_fn(|index| args[index].clone()))
}

fn parse_update(args: &[String]) -> Result<Command, Error> {
    let mut id = None;
    let mut title = None;
    let mut text = None;
    let mut favorite = None;

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            option @ ("--title" | "--text" | "--favorite") => {
                let value = args
                    .next()
                    .ok_or_else(|| usage(format!("Option '{option}' requires a value")))?;

                match option {
                    "--title" => title = Some(value.clone()),
                    "--text" => text = Some(value.clone()),
                    _ => favorite = Some(parse_bool("favorite", value)?),
                }
            }
            option if option.starts_with("--") => {
                return Err(usage(format!("No such option '{option}' for 'update'")));
            }
            value if id.is_none() => id = Some(parse_uuid(value)?),
            extra => return Err(usage(format!("Unexpected argument '{extra}' for 'update'"))),
        }
    }

    let id = id.ok_or_else(|| usage("Missing argument 'uuid' for 'update'"))?;

    Ok(Command::Update {
        id,
        title,
        text,
        favorite,
    })
}

fn parse_uuid(value: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|_| Error::BadParameter {
        hint: "uuid",
        message: format!("'{value}' is not a valid UUID"),
    })
}

fn parse_bool(hint: &'static str, value: &str) -> Result<bool, Error> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(Error::BadParameter {
            hint,
            message: format!("'{value}' is not a valid boolean"),
        }),
    }
}

/// Turn a missing note into a parameter error for its UUID
fn known<T>(id: &Uuid, result: database::Result<T>) -> Result<T, Error> {
    result.map_err(|err| {
        if err.is_unknown_item() {
            Error::unknown_note(id)
        } else {
            Error::Database(err)
        }
    })
}

/// Run a command against the database, output goes to `out`
///
/// # Errors
///
/// Will return `Err` when a note does not exist, storage fails or output can not be written
pub async fn run<W>(command: Command, config: &DatabaseConfig, out: &mut W) -> Result<(), Error>
where
    W: Write,
{
    match command {
        Command::Create { title, text } => {
            let note = open_transaction(config, move |transaction| {
                Box::pin(async move {
                    let values = CreateNoteValues {
                        title: &title,
                        text: &text,
                    };

                    notes::insert(transaction, &values).await
                })
            })
            .await?;

            writeln!(out, "Note created with UUID {}", note.id)?;
        }
        Command::Update {
            id,
            title,
            text,
            favorite,
        } => {
            let result = open_transaction(config, move |transaction| {
                Box::pin(async move {
                    let values = UpdateNoteValues {
                        title: title.as_deref(),
                        text: text.as_deref(),
                        favorite,
                    };

                    notes::update(transaction, &id, &values).await
                })
            })
            .await;

            known(&id, result)?;
        }
        Command::Favorite { id, favorite } => {
            let result = open_transaction(config, move |transaction| {
                Box::pin(async move { notes::mark_favorite(transaction, &id, favorite).await })
            })
            .await;

            known(&id, result)?;
        }
        Command::List => {
            let notes = open_transaction(config, |transaction| {
                Box::pin(async move { notes::select_all(transaction).await })
            })
            .await?;

            write_list(out, &notes)?;
        }
        Command::View { id } => {
            let result = open_transaction(config, move |transaction| {
                Box::pin(async move { notes::select_one(transaction, &id).await })
            })
            .await;

            write_note(out, &known(&id, result)?)?;
        }
        Command::Delete { id } => {
            let result = open_transaction(config, move |transaction| {
                Box::pin(async move { notes::delete(transaction, &id).await })
            })
            .await;

            known(&id, result)?;
        }
        Command::Help => write!(out, "{USAGE}")?,
    }

    Ok(())
}

fn write_list<W>(out: &mut W, notes: &[Note]) -> std::io::Result<()>
where
    W: Write,
{
    for note in notes {
        writeln!(out, "{} {}", note.id, note.title)?;
    }

    if !notes.is_empty() {
        writeln!(out)?;
    }

    writeln!(out, "Total {} notes", notes.len())
}

fn write_note<W>(out: &mut W, note: &Note) -> std::io::Result<()>
where
    W: Write,
{
    writeln!(out, "{}", note.title)?;
    writeln!(out)?;
    writeln!(out, "{}", note.text)?;
    writeln!(out)?;
    writeln!(out, "Last changed: {}", format_timestamp(&note.last_changed))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    fn parse(input: &[&str]) -> Result<Args, Error> {
        parse_args(&args(input))
    }

    fn command(input: &[&str]) -> Command {
        parse(input).unwrap().command
    }

    async fn run_to_string(command: Command, config: &DatabaseConfig) -> Result<String, Error> {
        let mut out = Vec::new();
        run(command, config, &mut out).await?;

        Ok(String::from_utf8(out).unwrap())
    }

    /// Create a note through the CLI, returns its ID
    async fn create(config: &DatabaseConfig, title: &str, text: &str) -> Uuid {
        let output = run_to_string(
            Command::Create {
                title: title.to_string(),
                text: text.to_string(),
            },
            config,
        )
        .await
        .unwrap();

        let id = output
            .trim()
            .strip_prefix("Note created with UUID ")
            .unwrap();

        Uuid::parse_str(id).unwrap()
    }

    #[test]
    fn test_parse_create() {
        let parsed = parse(&["--database", "/tmp/notes.sqlite", "create", "Title", "Text"]).unwrap();

        assert_eq!(Some(PathBuf::from("/tmp/notes.sqlite")), parsed.database);
        assert_eq!(
            Command::Create {
                title: "Title".to_string(),
                text: "Text".to_string()
            },
            parsed.command
        );
    }

    #[test]
    fn test_parse_update() {
        let id = Uuid::new_v4();

        assert_eq!(
            Command::Update {
                id,
                title: Some("Title".to_string()),
                text: None,
                favorite: Some(true),
            },
            command(&["update", &id.to_string(), "--title", "Title", "--favorite", "yes"])
        );

        assert_eq!(
            Command::Update {
                id,
                title: None,
                text: Some("Text".to_string()),
                favorite: None,
            },
            command(&["update", "--text", "Text", &id.to_string()])
        );
    }

    #[test]
    fn test_parse_other_commands() {
        let id = Uuid::new_v4();
        let id_string = id.to_string();

        assert_eq!(Command::List, command(&["list"]));
        assert_eq!(Command::View { id }, command(&["view", &id_string]));
        assert_eq!(Command::Delete { id }, command(&["delete", &id_string]));
        assert_eq!(
            Command::Favorite {
                id,
                favorite: false
            },
            command(&["favorite", &id_string, "false"])
        );
        assert_eq!(Command::Help, command(&["--help"]));
        assert_eq!(Command::Help, command(&["help"]));
    }

    #[test]
    fn test_parse_usage_errors() {
        for input in [
            &[][..],
            &["--database"][..],
            &["frobnicate"][..],
            &["create", "Title"][..],
            &["list", "extra"][..],
            &["view"][..],
            &["update"][..],
            &["update", "--title"][..],
            &["update", "--color", "red"][..],
        ] {
            let err = parse(input).unwrap_err();

            assert!(matches!(err, Error::Usage(_)), "{input:?} gave {err:?}");
            assert_eq!(2, err.exit_code());
            assert!(err.show_usage());
        }
    }

    #[test]
    fn test_parse_bad_parameters() {
        let err = parse(&["view", "not-a-uuid"]).unwrap_err();
        assert_eq!(
            "Invalid value for 'uuid': 'not-a-uuid' is not a valid UUID",
            err.to_string()
        );
        assert_eq!(2, err.exit_code());
        assert!(!err.show_usage());

        let id = Uuid::new_v4().to_string();
        let err = parse(&["favorite", &id, "maybe"]).unwrap_err();
        assert_eq!(
            "Invalid value for 'favorite': 'maybe' is not a valid boolean",
            err.to_string()
        );
    }

    #[tokio::test]
    async fn test_create_list_and_view() {
        let directory = TempDir::new().unwrap();
        let config = DatabaseConfig::file(directory.path().join("hej.sqlite"));

        let output = run_to_string(Command::List, &config).await.unwrap();
        assert_eq!("Total 0 notes\n", output);

        let id = create(&config, "Groceries", "Milk").await;

        let output = run_to_string(Command::List, &config).await.unwrap();
        assert_eq!(format!("{id} Groceries\n\nTotal 1 notes\n"), output);

        let output = run_to_string(Command::View { id }, &config).await.unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!("Groceries", lines[0]);
        assert_eq!("", lines[1]);
        assert_eq!("Milk", lines[2]);
        assert_eq!("", lines[3]);
        assert!(lines[4].starts_with("Last changed: "));
        assert!(lines[4].ends_with('Z'));
        assert_eq!(5, lines.len());
    }

    #[tokio::test]
    async fn test_update_favorite_and_delete() {
        let directory = TempDir::new().unwrap();
        let config = DatabaseConfig::file(directory.path().join("hej.sqlite"));

        let id = create(&config, "Groceries", "Milk").await;

        let output = run_to_string(
            Command::Update {
                id,
                title: None,
                text: Some("Milk\nEggs".to_string()),
                favorite: None,
            },
            &config,
        )
        .await
        .unwrap();
        assert_eq!("", output);

        run_to_string(
            Command::Favorite {
                id,
                favorite: true,
            },
            &config,
        )
        .await
        .unwrap();

        let output = run_to_string(Command::View { id }, &config).await.unwrap();
        assert!(output.starts_with("Groceries\n\nMilk\nEggs\n\n"));

        run_to_string(Command::Delete { id }, &config).await.unwrap();

        let output = run_to_string(Command::List, &config).await.unwrap();
        assert_eq!("Total 0 notes\n", output);
    }

    #[tokio::test]
    async fn test_unknown_note() {
        let directory = TempDir::new().unwrap();
        let config = DatabaseConfig::file(directory.path().join("hej.sqlite"));
        let id = Uuid::new_v4();

        for command in [
            Command::View { id },
            Command::Delete { id },
            Command::Favorite { id, favorite: true },
            Command::Update {
                id,
                title: Some("Title".to_string()),
                text: None,
                favorite: None,
            },
        ] {
            let err = run_to_string(command, &config).await.unwrap_err();

            assert_eq!(
                format!("Invalid value for 'uuid': unknown note '{id}'"),
                err.to_string()
            );
            assert_eq!(2, err.exit_code());
        }
    }

    #[tokio::test]
    async fn test_outdated_database() {
        let directory = TempDir::new().unwrap();
        let config = DatabaseConfig::file(directory.path().join("hej.sqlite"));

        // a database written before notes could be favorites
        let scripts = directory.path().join("scripts");
        std::fs::create_dir(&scripts).unwrap();
        std::fs::copy(
            concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/0001_create_notes.sql"),
            scripts.join("0001_create_notes.sql"),
        )
        .unwrap();
        database::migrate(&config.clone().with_migrations_path(Some(scripts)))
            .await
            .unwrap();

        let err = run_to_string(Command::List, &config).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Database(database::Error::SchemaOutdated {
                current: 1,
                supported: 2
            })
        ));
        assert_eq!(1, err.exit_code());
    }

    #[tokio::test]
    async fn test_help() {
        let output = run_to_string(Command::Help, &DatabaseConfig::memory())
            .await
            .unwrap();

        assert_eq!(USAGE, output);
    }
}
