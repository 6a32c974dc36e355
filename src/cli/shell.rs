//! Line-oriented interactive session.
//!
//! Unlike one-shot commands, the shell keeps one [`Session`] for its whole
//! lifetime: a successful `login` unlocks the administrative commands until
//! `logout` or exit, and a duplicate `submit` leaves the existing record
//! ready for a bare `amend`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};

use crate::application::{AuthOutcome, LedgerService};
use crate::domain::{RecordField, Session};

use super::{
    AdminCommands, ExportArgs, FilterArgs, SubmitArgs, parse_record_id,
    print_record_detail, run_admin_command, run_amend, run_query, run_submit,
};

#[derive(Parser)]
#[command(name = "ledger", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand)]
enum ShellCommand {
    /// Unlock administrative commands for this session
    Login {
        /// Administrative secret
        secret: String,
    },

    /// Lock administrative commands again
    Logout,

    /// Show whether this session is authenticated
    Status,

    /// Record a payment
    Submit(SubmitArgs),

    /// Amend a record (defaults to the duplicate found by the last submit)
    Amend {
        /// Record ID
        id: Option<String>,

        /// New amount
        #[arg(short, long)]
        amount: String,

        /// Note appended to the remarks
        #[arg(short, long, default_value = "")]
        remarks: String,
    },

    /// Look up all records for a student
    Query {
        /// Student name
        student: String,
    },

    /// Show a single record
    Show {
        /// Record ID
        id: String,
    },

    /// List every record (admin)
    List,

    /// List records matching a field value (admin)
    Filter(FilterArgs),

    /// Show the distinct values of a field (admin)
    Values {
        /// Field: operation, course, student
        field: RecordField,
    },

    /// Delete a record (admin)
    Delete {
        /// Record ID
        id: String,
    },

    /// Export records to a file (admin)
    Export(ExportArgs),

    /// Change the administrative secret until the shell exits
    ChangeSecret {
        old: String,
        new: String,
        confirm: String,
    },

    /// Leave the shell
    #[command(alias = "quit")]
    Exit,
}

enum Flow {
    Continue,
    Exit,
}

pub(super) async fn run_shell(mut service: LedgerService) -> Result<()> {
    let mut session = Session::new();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    println!("Tuition ledger shell. Type `help` for commands, `exit` to leave.");

    loop {
        print!("{}", if session.is_authenticated() { "ledger# " } else { "ledger> " });
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;

        let tokens = match split_line(&line) {
            Ok(tokens) if tokens.is_empty() => continue,
            Ok(tokens) => tokens,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        let parsed = match ShellLine::try_parse_from(tokens) {
            Ok(parsed) => parsed,
            Err(e) => {
                write_parse_error(
                    &e,
                    &mut std::io::stdout().lock(),
                    &mut std::io::stderr().lock(),
                )?;
                continue;
            }
        };

        match execute(&mut service, &mut session, parsed.command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    Ok(())
}

async fn execute(
    service: &mut LedgerService,
    session: &mut Session,
    command: ShellCommand,
) -> Result<Flow> {
    match command {
        ShellCommand::Login { secret } => match service.authenticate(session, &secret) {
            AuthOutcome::Authenticated => println!("Authenticated."),
            AuthOutcome::Denied => println!("Incorrect secret, access denied."),
        },

        ShellCommand::Logout => {
            session.logout();
            println!("Logged out.");
        }

        ShellCommand::Status => {
            println!(
                "Session: {}",
                if session.is_authenticated() {
                    "authenticated"
                } else {
                    "not authenticated"
                }
            );
            if let Some(id) = session.pending_amendment {
                println!("Pending amendment: {}", id);
            }
        }

        ShellCommand::Submit(args) => {
            session.pending_amendment = None;
            run_submit(service, session, args).await?;
        }

        ShellCommand::Amend {
            id,
            amount,
            remarks,
        } => {
            let id = match id {
                Some(id) => parse_record_id(&id)?,
                None => session.pending_amendment.ok_or_else(|| {
                    anyhow::anyhow!("No record to amend; pass a record ID")
                })?,
            };
            run_amend(service, id, &amount, &remarks).await?;
            if session.pending_amendment == Some(id) {
                session.take_pending_amendment();
            }
        }

        ShellCommand::Query { student } => run_query(service, &student).await?,

        ShellCommand::Show { id } => {
            let record = service.get_record(parse_record_id(&id)?).await?;
            print_record_detail(&record);
        }

        ShellCommand::List => run_admin_command(service, session, AdminCommands::List).await?,

        ShellCommand::Filter(args) => {
            run_admin_command(service, session, AdminCommands::Filter(args)).await?
        }

        ShellCommand::Values { field } => {
            run_admin_command(service, session, AdminCommands::Values { field }).await?
        }

        ShellCommand::Delete { id } => {
            run_admin_command(service, session, AdminCommands::Delete { id }).await?
        }

        ShellCommand::Export(args) => {
            run_admin_command(service, session, AdminCommands::Export(args)).await?
        }

        ShellCommand::ChangeSecret { old, new, confirm } => {
            service.change_secret(&old, &new, &confirm)?;
            println!("Secret changed until the shell exits.");
        }

        ShellCommand::Exit => return Ok(Flow::Exit),
    }

    Ok(Flow::Continue)
}

/// Split a shell line into words. Single and double quotes group words,
/// and a backslash outside single quotes escapes the next character.
pub fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => match chars.next() {
                Some(escaped) => {
                    current.push(escaped);
                    in_word = true;
                }
                None => return Err("trailing backslash".to_string()),
            },
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Render a clap parse failure: help and version text go to `out`, usage
/// errors to `err`.
fn write_parse_error<O: Write, E: Write>(
    e: &clap::Error,
    out: &mut O,
    err: &mut E,
) -> std::io::Result<()> {
    let rendered = e.render().to_string();
    if e.use_stderr() {
        err.write_all(rendered.as_bytes())?;
        err.flush()
    } else {
        out.write_all(rendered.as_bytes())?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_words() {
        assert_eq!(split_line("  list  ").unwrap(), vec!["list"]);
        assert_eq!(
            split_line("query Li").unwrap(),
            vec!["query".to_string(), "Li".to_string()]
        );
        assert!(split_line("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_quotes() {
        assert_eq!(
            split_line(r#"submit "Li Wei" -c 'Piano Basics' -r """#).unwrap(),
            vec!["submit", "Li Wei", "-c", "Piano Basics", "-r", ""]
        );
        assert_eq!(split_line(r#"a\ b 'c\d'"#).unwrap(), vec!["a b", r"c\d"]);
    }

    #[test]
    fn test_split_errors() {
        assert!(split_line("login \"abc").is_err());
        assert!(split_line("login abc\\").is_err());
    }

    #[test]
    fn test_shell_line_parses_commands() {
        let parsed = ShellLine::try_parse_from(split_line("login s3cret").unwrap()).unwrap();
        assert!(matches!(parsed.command, ShellCommand::Login { secret } if secret == "s3cret"));

        let parsed = ShellLine::try_parse_from(split_line("amend -a 12.50").unwrap()).unwrap();
        assert!(matches!(parsed.command, ShellCommand::Amend { id: None, .. }));

        let parsed = ShellLine::try_parse_from(split_line("quit").unwrap()).unwrap();
        assert!(matches!(parsed.command, ShellCommand::Exit));

        assert!(ShellLine::try_parse_from(split_line("frobnicate").unwrap()).is_err());
    }

    #[test]
    fn test_help_is_written_to_stdout() {
        let e = match ShellLine::try_parse_from(split_line("help").unwrap()) {
            Ok(_) => panic!("help should not parse into a command"),
            Err(e) => e,
        };
        assert!(!e.use_stderr());

        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_parse_error(&e, &mut out, &mut err).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("change-secret"));
        assert!(text.contains("login"));
        assert!(err.is_empty());
    }

    #[test]
    fn test_usage_error_is_written_to_stderr() {
        let e = match ShellLine::try_parse_from(split_line("frobnicate").unwrap()) {
            Ok(_) => panic!("unknown command should not parse"),
            Err(e) => e,
        };

        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_parse_error(&e, &mut out, &mut err).unwrap();
        assert!(out.is_empty());
        assert!(String::from_utf8(err).unwrap().contains("frobnicate"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_parse_error_write_failure_is_reported() {
        let e = match ShellLine::try_parse_from(split_line("help").unwrap()) {
            Ok(_) => panic!("help should not parse into a command"),
            Err(e) => e,
        };
        let result = write_parse_error(&e, &mut BrokenPipe, &mut Vec::new());
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::BrokenPipe);
    }
}
