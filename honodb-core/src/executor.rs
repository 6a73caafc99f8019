// honodb-core/src/executor.rs
// Verb dispatch: one decoded command in, one structured result out

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::database::Database;
use crate::document::Document;
use crate::error::{ErrorKind, HonoError, Result};
use crate::find_options::FindOptions;
use crate::query::Condition;
use crate::storage::ChunkBackend;

/// A verb with its arguments already decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "camelCase")]
pub enum Command {
    InsertOne {
        collection: String,
        document: Value,
    },
    /// `documents` must decode to an array; anything else is a parse error
    InsertMany {
        collection: String,
        documents: Value,
    },
    /// No collection: search the whole database
    Find {
        #[serde(default)]
        collection: Option<String>,
        condition: Value,
        #[serde(default, skip_serializing_if = "FindOptions::is_empty")]
        options: FindOptions,
    },
    UpdateOne {
        collection: String,
        condition: Value,
        data: Value,
    },
    UpdateMany {
        collection: String,
        condition: Value,
        data: Value,
    },
    DeleteOne {
        collection: String,
        condition: Value,
    },
    DeleteMany {
        collection: String,
        condition: Value,
    },
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::InsertOne { .. } => "insertOne",
            Command::InsertMany { .. } => "insertMany",
            Command::Find { .. } => "find",
            Command::UpdateOne { .. } => "updateOne",
            Command::UpdateMany { .. } => "updateMany",
            Command::DeleteOne { .. } => "deleteOne",
            Command::DeleteMany { .. } => "deleteMany",
        }
    }
}

/// Outcome of one insertMany item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub index: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Structured result of a verb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerbResult {
    pub ok: bool,
    pub affected: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemResult>>,
}

impl VerbResult {
    pub fn affected(affected: u64) -> Self {
        VerbResult {
            ok: true,
            affected,
            error: None,
            message: None,
            data: None,
            items: None,
        }
    }

    pub fn documents(docs: Vec<Value>) -> Self {
        VerbResult {
            affected: docs.len() as u64,
            data: Some(docs),
            ..VerbResult::affected(0)
        }
    }

    pub fn failure(err: &HonoError) -> Self {
        VerbResult {
            ok: false,
            affected: 0,
            error: Some(err.kind()),
            message: Some(err.to_string()),
            data: None,
            items: None,
        }
    }
}

/// Runs verbs against one database
pub struct CommandExecutor<'a, B: ChunkBackend> {
    database: &'a Database<B>,
}

impl<'a, B: ChunkBackend> CommandExecutor<'a, B> {
    pub fn new(database: &'a Database<B>) -> Self {
        CommandExecutor { database }
    }

    pub fn database(&self) -> &Database<B> {
        self.database
    }

    /// Run one verb. Errors come back inside the result, never as a panic.
    pub fn execute(&self, command: Command) -> VerbResult {
        let verb = command.verb();
        debug!(database = %self.database.name(), verb, "execute");
        let result = match command {
            Command::InsertOne {
                collection,
                document,
            } => self.insert_one(&collection, document),
            Command::InsertMany {
                collection,
                documents,
            } => self.insert_many(&collection, documents),
            Command::Find {
                collection,
                condition,
                options,
            } => self.find(collection.as_deref(), &condition, &options),
            Command::UpdateOne {
                collection,
                condition,
                data,
            } => self
                .database
                .collection(&collection)
                .and_then(|c| c.update_one(&condition, &data))
                .map(|(matched, _)| VerbResult::affected(matched)),
            Command::UpdateMany {
                collection,
                condition,
                data,
            } => self
                .database
                .collection(&collection)
                .and_then(|c| c.update_many(&condition, &data))
                .map(|(matched, _)| VerbResult::affected(matched)),
            Command::DeleteOne {
                collection,
                condition,
            } => self
                .database
                .collection(&collection)
                .and_then(|c| c.delete_one(&condition))
                .map(VerbResult::affected),
            Command::DeleteMany {
                collection,
                condition,
            } => self
                .database
                .collection(&collection)
                .and_then(|c| c.delete_many(&condition))
                .map(VerbResult::affected),
        };

        result.unwrap_or_else(|e| {
            match e.kind() {
                ErrorKind::IoError | ErrorKind::CorruptionError | ErrorKind::CorruptRecordError => {
                    warn!(verb, error = %e, "verb failed in storage")
                }
                _ => debug!(verb, error = %e, "verb failed"),
            }
            VerbResult::failure(&e)
        })
    }

    fn insert_one(&self, collection: &str, document: Value) -> Result<VerbResult> {
        self.database.collection(collection)?.insert_one(document)?;
        Ok(VerbResult::affected(1))
    }

    /// Per-item best effort; `ok` only if every item went in
    fn insert_many(&self, collection: &str, documents: Value) -> Result<VerbResult> {
        let documents = match documents {
            Value::Array(items) => items,
            other => {
                return Err(HonoError::Parse(format!(
                    "insertMany expects an array of documents, got {}",
                    crate::document::type_name(&other)
                )))
            }
        };
        let collection = self.database.collection(collection)?;
        let outcome = collection.insert_many(documents);

        let mut ids = outcome.inserted_ids.iter();
        let items: Vec<ItemResult> = outcome
            .results
            .iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(_) => ItemResult {
                    index,
                    ok: true,
                    id: ids.next().map(|id| id.to_value()),
                    error: None,
                    message: None,
                },
                Err(e) => ItemResult {
                    index,
                    ok: false,
                    id: None,
                    error: Some(e.kind()),
                    message: Some(e.to_string()),
                },
            })
            .collect();

        let failed = items.len() - outcome.inserted_count;
        Ok(VerbResult {
            ok: failed == 0,
            affected: outcome.inserted_count as u64,
            error: None,
            message: (failed > 0)
                .then(|| format!("{} of {} documents were not inserted", failed, items.len())),
            data: None,
            items: Some(items),
        })
    }

    /// Options apply to the combined result when no collection is named
    fn find(
        &self,
        collection: Option<&str>,
        condition: &Value,
        options: &FindOptions,
    ) -> Result<VerbResult> {
        match collection {
            Some(name) => {
                let collection = self.database.collection(name)?;
                let docs = collection.find_with_options(condition, options)?;
                Ok(VerbResult::documents(docs))
            }
            None => {
                // rejected even when the database has no collections
                Condition::parse(condition)?;
                options.validate()?;
                let mut docs = Vec::new();
                for name in self.database.list_collections() {
                    let collection = self.database.collection(&name)?;
                    let found = collection.find(condition)?.to_vec()?;
                    docs.extend(found.into_iter().map(Document::into_value));
                }
                Ok(VerbResult::documents(options.apply(docs)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::DatabaseConfig;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn school() -> Database<MemoryBackend> {
        let catalog =
            Catalog::open(Arc::new(MemoryBackend::new()), DatabaseConfig::default()).unwrap();
        catalog.create_database("school").unwrap();
        let db = catalog.open_database("school").unwrap();
        db.create_collection("students").unwrap();
        db
    }

    fn find(collection: &str, condition: Value) -> Command {
        Command::Find {
            collection: Some(collection.to_string()),
            condition,
            options: FindOptions::default(),
        }
    }

    #[test]
    fn test_students_scenario() {
        let db = school();
        let exec = CommandExecutor::new(&db);

        let r = exec.execute(Command::InsertOne {
            collection: "students".into(),
            document: json!({"id": "s100", "name": "foo"}),
        });
        assert!(r.ok);
        assert_eq!(r.affected, 1);

        let r = exec.execute(find("students", json!({"id": "s100"})));
        assert_eq!(r.data, Some(vec![json!({"id": "s100", "name": "foo"})]));

        let r = exec.execute(Command::UpdateOne {
            collection: "students".into(),
            condition: json!({"id": "s100"}),
            data: json!({"age": 21}),
        });
        assert_eq!(r.affected, 1);
        let r = exec.execute(find("students", json!({"id": "s100"})));
        assert_eq!(
            r.data,
            Some(vec![json!({"id": "s100", "name": "foo", "age": 21})])
        );

        let r = exec.execute(Command::DeleteOne {
            collection: "students".into(),
            condition: json!({"id": "s100"}),
        });
        assert!(r.ok);
        assert_eq!(r.affected, 1);
        let r = exec.execute(find("students", json!({"id": "s100"})));
        assert_eq!(r.data, Some(vec![]));
    }

    #[test]
    fn test_errors_are_structured() {
        let db = school();
        let exec = CommandExecutor::new(&db);

        let r = exec.execute(find("courses", json!({})));
        assert!(!r.ok);
        assert_eq!(r.error, Some(ErrorKind::UnknownCollectionError));

        let r = exec.execute(Command::DeleteOne {
            collection: "students".into(),
            condition: json!({"id": "nobody"}),
        });
        assert_eq!(r.error, Some(ErrorKind::NotFoundError));

        let r = exec.execute(Command::DeleteMany {
            collection: "students".into(),
            condition: json!({"id": "nobody"}),
        });
        assert!(r.ok);
        assert_eq!(r.affected, 0);

        let r = exec.execute(Command::InsertMany {
            collection: "students".into(),
            documents: json!({"id": 1}),
        });
        assert_eq!(r.error, Some(ErrorKind::ParseError));

        let r = exec.execute(find("students", json!({"age": {"$between": 1}})));
        assert_eq!(r.error, Some(ErrorKind::ParseError));
        assert!(r.message.is_some());
    }

    #[test]
    fn test_insert_many_items() {
        let db = school();
        let exec = CommandExecutor::new(&db);
        let r = exec.execute(Command::InsertMany {
            collection: "students".into(),
            documents: json!([{"id": 1}, {"id": 1}, {"id": 2}]),
        });
        assert!(!r.ok);
        assert_eq!(r.affected, 2);
        let items = r.items.unwrap();
        assert_eq!(items[0].id, Some(json!(1)));
        assert_eq!(items[1].error, Some(ErrorKind::DuplicateIdError));
        assert_eq!(items[2].id, Some(json!(2)));
    }

    #[test]
    fn test_find_whole_database_in_collection_order() {
        let db = school();
        db.create_collection("alumni").unwrap();
        let exec = CommandExecutor::new(&db);
        exec.execute(Command::InsertOne {
            collection: "students".into(),
            document: json!({"id": 1, "year": 2024}),
        });
        exec.execute(Command::InsertOne {
            collection: "alumni".into(),
            document: json!({"id": 9, "year": 2024}),
        });

        let r = exec.execute(Command::Find {
            collection: None,
            condition: json!({"year": 2024}),
            options: FindOptions::default(),
        });
        assert_eq!(r.affected, 2);
        assert_eq!(
            r.data,
            Some(vec![json!({"id": 9, "year": 2024}), json!({"id": 1, "year": 2024})])
        );
    }

    #[test]
    fn test_find_options_per_collection_and_whole_database() {
        let db = school();
        db.create_collection("alumni").unwrap();
        let exec = CommandExecutor::new(&db);
        for (coll, id, year) in [("students", 1, 2024), ("students", 2, 2023), ("alumni", 3, 2019)] {
            exec.execute(Command::InsertOne {
                collection: coll.into(),
                document: json!({"id": id, "year": year, "name": "x"}),
            });
        }

        let options: FindOptions =
            serde_json::from_value(json!({"sort": {"year": 1}, "projection": {"year": 1}}))
                .unwrap();
        let r = exec.execute(Command::Find {
            collection: Some("students".into()),
            condition: json!({}),
            options: options.clone(),
        });
        assert_eq!(
            r.data,
            Some(vec![json!({"id": 2, "year": 2023}), json!({"id": 1, "year": 2024})])
        );

        // sorted across collections, then limited
        let r = exec.execute(Command::Find {
            collection: None,
            condition: json!({}),
            options: options.with_limit(2),
        });
        assert_eq!(r.affected, 2);
        assert_eq!(
            r.data,
            Some(vec![json!({"id": 3, "year": 2019}), json!({"id": 2, "year": 2023})])
        );

        let r = exec.execute(Command::Find {
            collection: None,
            condition: json!({}),
            options: FindOptions::new().with_projection(vec![("a".into(), 1), ("b".into(), 0)]),
        });
        assert_eq!(r.error, Some(ErrorKind::ParseError));
    }

    #[test]
    fn test_result_serialization_omits_absent_fields() {
        let json = serde_json::to_value(VerbResult::affected(3)).unwrap();
        assert_eq!(json, json!({"ok": true, "affected": 3}));

        let err = HonoError::NotFound("x".into());
        let json = serde_json::to_value(VerbResult::failure(&err)).unwrap();
        assert_eq!(json["error"], json!("NotFoundError"));
    }

    #[test]
    fn test_command_from_json() {
        let cmd: Command = serde_json::from_value(json!({
            "verb": "updateMany",
            "collection": "students",
            "condition": {"age": {"$gt": 20}},
            "data": {"senior": true}
        }))
        .unwrap();
        assert_eq!(cmd.verb(), "updateMany");

        let cmd: Command = serde_json::from_value(json!({
            "verb": "find",
            "collection": "students",
            "condition": {},
            "options": {"limit": 1}
        }))
        .unwrap();
        match cmd {
            Command::Find { options, .. } => assert_eq!(options.limit, Some(1)),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
