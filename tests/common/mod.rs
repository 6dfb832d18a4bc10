//! Library fixture shared by the integration tests: the demo models.json seeded into a
//! `MemoryStore`.

#![allow(dead_code)]

use ext_store_api::config::FullConfig;
use ext_store_api::options::{from_value, Options};
use ext_store_api::record::Record;
use ext_store_api::{resolve, ExtApi, MemoryStore, Schema, Store};
use serde_json::{json, Value};
use std::sync::Arc;

pub const MODELS: &str = include_str!("../../demos/library/models.json");

pub struct Library {
    pub store: Arc<MemoryStore>,
    pub schema: Arc<Schema>,
}

impl Library {
    pub fn api(&self, model: &str) -> ExtApi {
        let store: Arc<dyn Store> = self.store.clone();
        ExtApi::new(store, Arc::clone(&self.schema), model).unwrap()
    }

    pub fn rows(&self, model: &str) -> Vec<Value> {
        self.store.rows(model).into_iter().map(Value::Object).collect()
    }

    /// Row with `id`, or None.
    pub fn row(&self, model: &str, id: i64) -> Option<Value> {
        self.rows(model).into_iter().find(|r| r["id"] == json!(id))
    }
}

pub fn schema() -> Schema {
    let config: FullConfig = serde_json::from_str(MODELS).unwrap();
    resolve(&config).unwrap()
}

pub fn opts(v: Value) -> Options {
    from_value(v)
}

async fn seed(store: &MemoryStore, schema: &Schema, model: &str, rows: Value) {
    let model = schema.get(model).unwrap();
    for row in rows.as_array().unwrap() {
        let mut record = Record::new(model.name.clone());
        for (k, v) in row.as_object().unwrap() {
            record.set(k.clone(), v.clone());
        }
        store.save(model, record).await.unwrap();
    }
}

/// Books 2, 3 and 4 form a series (3 follows 2, 4 follows 3).
pub async fn library() -> Library {
    let schema = schema();
    let store = MemoryStore::new();
    seed(&store, &schema, "User", json!([
        {"id": 1, "login": "ada"},
        {"id": 2, "login": "brian"},
        {"id": 3, "login": "claire"}
    ]))
    .await;
    seed(&store, &schema, "Publisher", json!([
        {"id": 1, "name": "Hetzel"},
        {"id": 2, "name": "Lacroix"},
        {"id": 3, "name": "Allen & Unwin"}
    ]))
    .await;
    seed(&store, &schema, "Author", json!([
        {"id": 1, "name": "Jules Verne"},
        {"id": 2, "name": "Victor Hugo"},
        {"id": 3, "name": "J.R.R. Tolkien"},
        {"id": 4, "name": "Isaac Asimov"},
        {"id": 5, "name": "Ursula K. Le Guin"},
        {"id": 6, "name": "Terry Pratchett"},
        {"id": 7, "name": "Hakon Wium Lie"}
    ]))
    .await;
    seed(&store, &schema, "Book", json!([
        {"id": 1, "title": "Notre-Dame de Paris", "author_id": 2, "publisher_id": 2, "pages": 940},
        {"id": 2, "title": "The Hobbit", "author_id": 3, "publisher_id": 3, "pages": 310},
        {"id": 3, "title": "The Fellowship of the Ring", "author_id": 3, "publisher_id": 3, "parent_book_id": 2, "pages": 423},
        {"id": 4, "title": "The Two Towers", "author_id": 3, "publisher_id": 3, "parent_book_id": 3, "pages": 352},
        {"id": 5, "title": "Around the World in Eighty Days", "author_id": 1, "publisher_id": 1, "pages": 250}
    ]))
    .await;
    seed(&store, &schema, "Loan", json!([
        {"id": 1, "book_id": 2, "user_id": 1},
        {"id": 2, "book_id": 3, "user_id": 1},
        {"id": 3, "book_id": 5, "user_id": 2},
        {"id": 4, "book_id": 1, "user_id": 3}
    ]))
    .await;
    Library {
        store: Arc::new(store),
        schema: Arc::new(schema),
    }
}
