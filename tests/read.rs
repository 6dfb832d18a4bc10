mod common;

use common::{library, opts};
use ext_store_api::ErrorKind;
use serde_json::{json, Value};

fn ids(data: &Value) -> Vec<i64> {
    data.as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn reads_everything_without_limit() {
    let lib = library().await;
    let out = lib.api("Book").read(opts(json!({}))).await.unwrap().to_value();
    assert_eq!(out["success"], json!(true));
    assert_eq!(out["total"], json!(5));
    assert_eq!(out["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn limit_one_collapses_data_and_counts_all_rows() {
    let lib = library().await;
    let out = lib.api("Book").read(opts(json!({"limit": 1}))).await.unwrap().to_value();
    assert!(out["data"].is_object());
    assert_eq!(out["total"], json!(5));
}

#[tokio::test]
async fn start_pages_through_sorted_rows() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .read(opts(json!({"limit": 2, "start": 2, "offset": 0, "sort": "title"})))
        .await
        .unwrap()
        .to_value();
    let titles: Vec<&str> = out["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["The Fellowship of the Ring", "The Hobbit"]);
    assert_eq!(out["total"], json!(5));
}

#[tokio::test]
async fn start_without_limit_is_ignored() {
    let lib = library().await;
    let out = lib.api("Book").read(opts(json!({"start": 3}))).await.unwrap().to_value();
    assert_eq!(out["total"], json!(5));
}

#[tokio::test]
async fn sorts_on_an_associated_table() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .read(opts(json!({"sort": [
            {"sort": "author.name", "dir": "DESC"},
            {"sort": "title", "dir": "ASC"}
        ]})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(ids(&out["data"]), vec![1, 5, 3, 2, 4]);
}

#[tokio::test]
async fn filters_by_conditions() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .read(opts(json!({"conditions": {"author_id": 3}, "sort": "id"})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(ids(&out["data"]), vec![2, 3, 4]);
    assert_eq!(out["total"], json!(3));
}

#[tokio::test]
async fn empty_result_is_a_successful_empty_list() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .read(opts(json!({"conditions": {"author_id": 7}, "limit": 10})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(out["success"], json!(true));
    assert_eq!(out["data"], json!([]));
    assert_eq!(out["total"], json!(0));
}

#[tokio::test]
async fn includes_collections_and_single_associations() {
    let lib = library().await;
    let out = lib
        .api("Author")
        .read(opts(json!({"conditions": {"id": 3}, "include": ["books"]})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(out["data"]["name"], json!("J.R.R. Tolkien"));
    assert_eq!(ids(&out["data"]["books"]), vec![2, 3, 4]);
    assert_eq!(out["data"]["books"][0]["title"], json!("The Hobbit"));

    let out = lib
        .api("Book")
        .read(opts(json!({"conditions": {"id": 3}, "include": "author,parent_book"})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(out["data"]["author"]["name"], json!("J.R.R. Tolkien"));
    assert_eq!(out["data"]["parent_book"]["title"], json!("The Hobbit"));
}

#[tokio::test]
async fn empty_single_association_is_null() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .read(opts(json!({"conditions": {"id": 2}, "include": ["parent_book"]})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(out["data"]["parent_book"], Value::Null);
}

#[tokio::test]
async fn unknown_include_is_not_masked() {
    let lib = library().await;
    let err = lib
        .api("Book")
        .read(opts(json!({"include": ["reviews"]})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invocation);
}

#[tokio::test]
async fn raw_sql_options_are_refused() {
    let lib = library().await;
    let err = lib
        .api("Book")
        .read(opts(json!({"group": "author_id"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn unknown_options_are_dropped() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .read(opts(json!({"data": {"title": "x"}, "destroy": true, "limit": 2})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(out["data"].as_array().unwrap().len(), 2);
    assert_eq!(lib.rows("Book").len(), 5);
}

#[tokio::test]
async fn non_ascii_sort_field_is_a_bad_request() {
    let lib = library().await;
    let err = lib
        .api("Book")
        .read(opts(json!({"sort": "ȺȺ_by.name"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}
