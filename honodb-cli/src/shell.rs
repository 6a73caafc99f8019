// honodb-cli/src/shell.rs
// Interactive session: selected database + statement execution

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use honodb_core::{Catalog, CommandExecutor, Database, FileBackend, VerbResult};
use tracing::debug;

use crate::parser::{parse_statement, Statement, HELP};

const BANNER: &str = r"
    __  __                  ____  ____
   / / / /___  ____  ____  / __ \/ __ )
  / /_/ / __ \/ __ \/ __ \/ / / / __  |
 / __  / /_/ / / / / /_/ / /_/ / /_/ /
/_/ /_/\____/_/ /_/\____/_____/_____/
";

/// What a statement produced
#[derive(Debug)]
pub enum Reply {
    Verb(VerbResult),
    Message(String),
    Names(Vec<String>),
    Exit,
}

/// A catalog plus the database chosen with `use`
pub struct Session {
    catalog: Catalog<FileBackend>,
    current: Option<Database<FileBackend>>,
}

impl Session {
    pub fn new(catalog: Catalog<FileBackend>) -> Self {
        Session {
            catalog,
            current: None,
        }
    }

    pub fn current_database(&self) -> Option<&str> {
        self.current.as_ref().map(|db| db.name())
    }

    pub fn use_database(&mut self, name: &str) -> Result<()> {
        let db = self
            .catalog
            .open_database(name)
            .with_context(|| format!("Failed to open database '{}'", name))?;
        let skipped = db.skipped_records();
        if skipped > 0 {
            eprintln!("warning: {} undecodable record(s) skipped in '{}'", skipped, name);
        }
        self.current = Some(db);
        Ok(())
    }

    fn database(&self) -> Result<&Database<FileBackend>> {
        self.current
            .as_ref()
            .ok_or_else(|| anyhow!("No database selected. Use 'use <database>' first"))
    }

    /// Parse and run one line
    pub fn execute_line(&mut self, line: &str) -> Result<Reply> {
        let statement = parse_statement(line)?;
        self.execute(statement)
    }

    pub fn execute(&mut self, statement: Statement) -> Result<Reply> {
        debug!(?statement, "shell statement");
        match statement {
            Statement::Verb(command) => {
                let db = self.database()?;
                Ok(Reply::Verb(CommandExecutor::new(db).execute(command)))
            }
            Statement::Use(name) => {
                self.use_database(&name)?;
                Ok(Reply::Message(format!("Selected database: {}", name)))
            }
            Statement::CreateDatabase(name) => {
                self.catalog.create_database(&name)?;
                Ok(Reply::Message(format!("Database '{}' created", name)))
            }
            Statement::CreateCollection(name) => {
                self.database()?.create_collection(&name)?;
                Ok(Reply::Message(format!("Collection '{}' created", name)))
            }
            Statement::DropDatabase(name) => {
                let dropped = self.catalog.drop_database(&name);
                // keep the selection unless the database is really gone
                if self.current_database() == Some(name.as_str()) && !self.catalog.has_database(&name)
                {
                    self.current = None;
                }
                dropped?;
                Ok(Reply::Message(format!("Database '{}' dropped", name)))
            }
            Statement::DropCollection(name) => {
                self.database()?.drop_collection(&name)?;
                Ok(Reply::Message(format!("Collection '{}' dropped", name)))
            }
            Statement::ListDatabases => Ok(Reply::Names(self.catalog.list_databases())),
            Statement::ListCollections => Ok(Reply::Names(self.database()?.list_collections())),
            Statement::Help => Ok(Reply::Message(HELP.to_string())),
            Statement::Exit => Ok(Reply::Exit),
        }
    }
}

/// Read-eval-print loop over stdin
pub fn run(mut session: Session) -> Result<()> {
    println!("{}", BANNER);
    println!("Welcome to HonoDB!");
    println!("Type 'help' for a list of commands.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        match session.current_database() {
            Some(db) => print!("HonoDB:{}> ", db),
            None => print!("HonoDB> "),
        }
        io::stdout().flush().context("Failed to flush stdout")?;

        let line = match lines.next() {
            Some(line) => line.context("Failed to read from stdin")?,
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let statement = match parse_statement(line) {
            Ok(statement) => statement,
            Err(e) => {
                println!("Error: {}", e);
                continue;
            }
        };

        if let Statement::DropDatabase(name) | Statement::DropCollection(name) = &statement {
            if !confirm(&mut lines, name)? {
                println!("Drop of '{}' canceled.", name);
                continue;
            }
        }

        match session.execute(statement) {
            Ok(Reply::Exit) => break,
            Ok(reply) => print_reply(&reply, true)?,
            Err(e) => println!("Error: {:#}", e),
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn confirm<I>(lines: &mut I, name: &str) -> Result<bool>
where
    I: Iterator<Item = io::Result<String>>,
{
    print!("Are you sure you want to drop '{}'? (yes/no): ", name);
    io::stdout().flush().context("Failed to flush stdout")?;
    match lines.next() {
        Some(answer) => Ok(answer.context("Failed to read from stdin")?.trim() == "yes"),
        None => Ok(false),
    }
}

pub fn print_reply(reply: &Reply, pretty: bool) -> Result<()> {
    match reply {
        Reply::Verb(result) => {
            let encoded = if pretty {
                serde_json::to_string_pretty(result)
            } else {
                serde_json::to_string(result)
            };
            let json = encoded.context("Failed to serialize result")?;
            println!("{}", json);
        }
        Reply::Message(message) => println!("{}", message),
        Reply::Names(names) if names.is_empty() => println!("(none)"),
        Reply::Names(names) => {
            for name in names {
                println!("{}", name);
            }
        }
        Reply::Exit => {}
    }
    Ok(())
}

/// Run one line non-interactively; a failed verb is an error exit
pub fn exec_once(mut session: Session, line: &str) -> Result<()> {
    let reply = session.execute_line(line)?;
    print_reply(&reply, false)?;
    if let Reply::Verb(result) = &reply {
        if !result.ok {
            bail!(
                "{}",
                result
                    .message
                    .clone()
                    .unwrap_or_else(|| "command failed".to_string())
            );
        }
    }
    Ok(())
}
