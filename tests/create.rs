mod common;

use common::{library, opts};
use ext_store_api::ErrorKind;
use serde_json::json;

#[tokio::test]
async fn creates_one_record_ignoring_client_id() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .create(opts(json!({"data": {"id": 99, "title": "Foundation", "author_id": 4}})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(out["success"], json!(true));
    assert_eq!(out["data"]["id"], json!(6));
    assert_eq!(out["data"]["title"], json!("Foundation"));
    assert_eq!(out["data"]["pages"], json!(0));
    assert_eq!(out["message"], json!("Successfully created 1 records with id : 6"));
    assert!(lib.row("Book", 99).is_none());
    assert_eq!(lib.row("Book", 6).unwrap()["author_id"], json!(4));
}

#[tokio::test]
async fn failures_in_a_batch_are_reported_and_skipped() {
    let lib = library().await;
    let batch = json!([
        {"title": "Earthsea"},
        {"pages": 12},
        {"title": "Mort", "colour": "octarine"},
        {"title": "Guards! Guards!", "author_id": 6}
    ]);
    let env = lib.api("Book").create(opts(json!({"data": batch}))).await.unwrap();
    assert!(env.success);
    assert_eq!(env.data.len(), 2);
    let warnings: Vec<&String> = env.messages.iter().filter(|m| m.starts_with("Warning")).collect();
    assert_eq!(env.data.len() + warnings.len(), 4);
    assert!(warnings[1].contains("colour"), "{}", warnings[1]);
    assert!(env.messages.last().unwrap().starts_with("Successfully created 2 records with id : "));
    assert_eq!(lib.rows("Book").len(), 7);
}

#[tokio::test]
async fn nothing_created_is_unsuccessful() {
    let lib = library().await;
    let out = lib
        .api("Book")
        .create(opts(json!({"data": [{"pages": 1}]})))
        .await
        .unwrap()
        .to_value();
    assert_eq!(out["success"], json!(false));
    assert!(out["message"].as_str().unwrap().ends_with("\r\nNo record created."));
    assert_eq!(out["data"], json!([]));
}

#[tokio::test]
async fn data_is_required() {
    let lib = library().await;
    let err = lib.api("Book").create(opts(json!({"title": "x"}))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("No data arguments in request"));
}
