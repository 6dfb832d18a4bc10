mod common;

use common::{library, opts};
use serde_json::json;

#[tokio::test]
async fn loads_a_record_with_includes() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .form_load(json!(2), opts(json!({"include": ["author"], "data": "dropped"})))
        .await
        .to_value();
    assert_eq!(out["success"], json!(true));
    assert_eq!(out["data"]["title"], json!("The Hobbit"));
    assert_eq!(out["data"]["author"]["name"], json!("J.R.R. Tolkien"));
}

#[tokio::test]
async fn string_ids_are_accepted() {
    let lib = library().await;
    let out = lib.api("User").form_load(json!("3"), opts(json!({}))).await.to_value();
    assert_eq!(out["data"]["login"], json!("claire"));
}

#[tokio::test]
async fn failures_come_back_in_the_envelope() {
    let lib = library().await;
    let out = lib.api("Book").form_load(json!(null), opts(json!({}))).await.to_value();
    assert_eq!(out["success"], json!(false));
    assert!(out["errorMessage"].as_str().unwrap().contains("An ID is required !"));

    let out = lib.api("Book").form_load(json!(77), opts(json!({}))).await.to_value();
    assert_eq!(out["success"], json!(false));
    assert!(out["errorMessage"].as_str().unwrap().contains("Couldn't find Book with id=77"));
}

#[tokio::test]
async fn submit_is_not_implemented() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .form_submit(opts(json!({"id": "5", "title": "Book 5 Title"})))
        .to_value();
    assert_eq!(out["success"], json!(false));
    assert_eq!(out["errorMessage"], json!("Not Implemented"));
    assert_eq!(lib.row("Book", 5).unwrap()["title"], json!("Around the World in Eighty Days"));
}
