// honodb-cli/src/parser.rs
// Query-language front end: text line -> Statement

use honodb_core::{Command, FindOptions, HonoError, Result};
use serde_json::{json, Value};

/// One parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Verb(Command),
    Use(String),
    CreateDatabase(String),
    CreateCollection(String),
    DropDatabase(String),
    DropCollection(String),
    ListDatabases,
    ListCollections,
    Help,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Quoted(_) => "a quoted argument".to_string(),
        }
    }
}

pub const HELP: &str = "\
Verbs (arguments in single quotes, payloads are JSON):
  insertOne  '<collection>' '<document>'
  insertMany '<collection>' '<documentArray>'
  find       ['<collection>'] '<condition>' [project '<fields>'] [sort '<fields>'] [skip N] [limit N]
  updateOne  '<collection>' '<condition>' set '<newData>'
  updateMany '<collection>' '<condition>' set '<newData>'
  deleteOne  '<collection>' '<condition>'
  deleteMany '<collection>' '<condition>'
Shell:
  use <db> | create db <name> | create collection <name>
  drop db <name> | drop collection <name>
  list db | list collection | help | exit
Find clauses take JSON objects: project '{\"name\":1}', sort '{\"age\":-1}'.
Inside quotes, \\' is a quote and \\\\ a backslash.";

/// Parse one line of input
pub fn parse_statement(line: &str) -> Result<Statement> {
    let tokens = tokenize(line)?;
    let mut rest = tokens.into_iter();
    let head = match rest.next() {
        Some(Token::Word(w)) => w,
        Some(other) => {
            return Err(parse_error(format!(
                "expected a command, found {}",
                other.describe()
            )))
        }
        None => return Err(parse_error("empty command")),
    };
    let args: Vec<Token> = rest.collect();

    match head.as_str() {
        "insertOne" => {
            let [collection, document] = quoted::<2>(&head, args)?;
            Ok(Statement::Verb(Command::InsertOne {
                collection,
                document: decode_json("document", &document)?,
            }))
        }
        "insertMany" => {
            let [collection, documents] = quoted::<2>(&head, args)?;
            Ok(Statement::Verb(Command::InsertMany {
                collection,
                documents: decode_json("document array", &documents)?,
            }))
        }
        "find" => find_args(&head, args),
        "updateOne" | "updateMany" => {
            let (collection, condition, data) = update_args(&head, args)?;
            let condition = decode_json("condition", &condition)?;
            let data = decode_json("update data", &data)?;
            Ok(Statement::Verb(if head == "updateOne" {
                Command::UpdateOne {
                    collection,
                    condition,
                    data,
                }
            } else {
                Command::UpdateMany {
                    collection,
                    condition,
                    data,
                }
            }))
        }
        "deleteOne" | "deleteMany" => {
            let [collection, condition] = quoted::<2>(&head, args)?;
            let condition = decode_json("condition", &condition)?;
            Ok(Statement::Verb(if head == "deleteOne" {
                Command::DeleteOne {
                    collection,
                    condition,
                }
            } else {
                Command::DeleteMany {
                    collection,
                    condition,
                }
            }))
        }
        "use" => Ok(Statement::Use(single_name(&head, args)?)),
        "create" | "drop" | "list" => shell_command(&head, args),
        "help" if args.is_empty() => Ok(Statement::Help),
        "exit" | "quit" if args.is_empty() => Ok(Statement::Exit),
        other => Err(parse_error(format!(
            "unknown command '{}' (type 'help')",
            other
        ))),
    }
}

fn shell_command(head: &str, args: Vec<Token>) -> Result<Statement> {
    let words: Vec<String> = args
        .into_iter()
        .map(|t| match t {
            Token::Word(w) | Token::Quoted(w) => w,
        })
        .collect();

    match (head, words.as_slice()) {
        ("create", [kind, name]) if kind == "db" => Ok(Statement::CreateDatabase(name.clone())),
        ("create", [kind, name]) if kind == "collection" => {
            Ok(Statement::CreateCollection(name.clone()))
        }
        ("drop", [kind, name]) if kind == "db" => Ok(Statement::DropDatabase(name.clone())),
        ("drop", [kind, name]) if kind == "collection" => {
            Ok(Statement::DropCollection(name.clone()))
        }
        ("list", [kind]) if kind == "db" => Ok(Statement::ListDatabases),
        ("list", [kind]) if kind == "collection" => Ok(Statement::ListCollections),
        ("list", _) => Err(parse_error("usage: list db | list collection")),
        _ => Err(parse_error(format!(
            "usage: {} db <name> | {} collection <name>",
            head, head
        ))),
    }
}

fn single_name(head: &str, args: Vec<Token>) -> Result<String> {
    match <[Token; 1]>::try_from(args) {
        Ok([Token::Word(name)]) | Ok([Token::Quoted(name)]) => Ok(name),
        Err(_) => Err(parse_error(format!("usage: {} <name>", head))),
    }
}

/// Exactly N single-quoted arguments
fn quoted<const N: usize>(verb: &str, args: Vec<Token>) -> Result<[String; N]> {
    if args.len() != N {
        return Err(parse_error(format!(
            "{} takes {} quoted argument(s), got {}",
            verb,
            N,
            args.len()
        )));
    }
    let strings = args
        .into_iter()
        .map(|t| match t {
            Token::Quoted(s) => Ok(s),
            other => Err(parse_error(format!(
                "{}: expected a quoted argument, found {}",
                verb,
                other.describe()
            ))),
        })
        .collect::<Result<Vec<String>>>()?;
    <[String; N]>::try_from(strings)
        .map_err(|_| parse_error(format!("{}: wrong number of arguments", verb)))
}

/// `['<collection>'] '<condition>'` followed by optional clauses in any order
fn find_args(verb: &str, args: Vec<Token>) -> Result<Statement> {
    let split = args
        .iter()
        .position(|t| matches!(t, Token::Word(_)))
        .unwrap_or(args.len());
    let mut args = args;
    let clauses = args.split_off(split);

    let (collection, condition) = match args.len() {
        1 => {
            let [condition] = quoted::<1>(verb, args)?;
            (None, condition)
        }
        _ => {
            let [collection, condition] = quoted::<2>(verb, args)?;
            (Some(collection), condition)
        }
    };

    let mut options = FindOptions::new();
    let mut clauses = clauses.into_iter();
    while let Some(keyword) = clauses.next() {
        let keyword = match keyword {
            Token::Word(w) => w,
            other => {
                return Err(parse_error(format!(
                    "find: expected a clause keyword, found {}",
                    other.describe()
                )))
            }
        };
        let value = match clauses.next() {
            Some(Token::Word(v)) | Some(Token::Quoted(v)) => v,
            None => return Err(parse_error(format!("find: '{}' needs a value", keyword))),
        };
        let clause = match keyword.as_str() {
            "project" => json!({ "projection": decode_json("projection", &value)? }),
            "sort" => json!({ "sort": decode_json("sort", &value)? }),
            "limit" => json!({ "limit": parse_count(&keyword, &value)? }),
            "skip" => json!({ "skip": parse_count(&keyword, &value)? }),
            other => {
                return Err(parse_error(format!(
                    "find: unknown clause '{}' (project, sort, skip, limit)",
                    other
                )))
            }
        };
        let parsed: FindOptions = serde_json::from_value(clause)
            .map_err(|e| parse_error(format!("find: invalid {}: {}", keyword, e)))?;
        options = merge_options(options, parsed);
    }

    Ok(Statement::Verb(Command::Find {
        collection,
        condition: decode_json("condition", &condition)?,
        options,
    }))
}

fn merge_options(base: FindOptions, clause: FindOptions) -> FindOptions {
    FindOptions {
        projection: clause.projection.or(base.projection),
        sort: clause.sort.or(base.sort),
        limit: clause.limit.or(base.limit),
        skip: clause.skip.or(base.skip),
    }
}

fn parse_count(keyword: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| {
        parse_error(format!(
            "find: {} needs a non-negative integer, got '{}'",
            keyword, value
        ))
    })
}

/// `'<collection>' '<condition>' set '<newData>'`
fn update_args(verb: &str, args: Vec<Token>) -> Result<(String, String, String)> {
    match <[Token; 4]>::try_from(args) {
        Ok([Token::Quoted(collection), Token::Quoted(condition), Token::Word(kw), Token::Quoted(data)])
            if kw == "set" =>
        {
            Ok((collection, condition, data))
        }
        _ => Err(parse_error(format!(
            "usage: {} '<collection>' '<condition>' set '<newData>'",
            verb
        ))),
    }
}

fn decode_json(what: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| parse_error(format!("invalid {} JSON: {}", what, e)))
}

fn parse_error(message: impl Into<String>) -> HonoError {
    HonoError::Parse(message.into())
}

fn tokenize(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\'' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.peek() {
                        Some('\'') | Some('\\') => {
                            text.push(chars.next().unwrap_or('\\'));
                        }
                        // other escapes belong to the JSON payload
                        _ => text.push('\\'),
                    },
                    other => text.push(other),
                }
            }
            if !closed {
                return Err(parse_error("unterminated quoted argument"));
            }
            tokens.push(Token::Quoted(text));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '\'' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    Ok(tokens)
}
