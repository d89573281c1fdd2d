//! Integration tests for the library import route.

mod common;

use axum::http::StatusCode;
use pikfic_test_support::closing_episode_json;
use serde_json::json;
use uuid::Uuid;

const IMPORT: &str = "/api/v1/library/import";

#[tokio::test]
async fn test_import_copies_local_stories_once() {
    // Arrange
    let test_app = common::build_test_app([closing_episode_json("It ends at once.")]);
    common::post_json(
        test_app.app(),
        "/api/v1/stories",
        None,
        &common::setup_json(1),
    )
    .await;
    assert_eq!(test_app.local.stored().len(), 1);

    // Act
    let (first_status, first) =
        common::post_json(test_app.app(), IMPORT, Some("reader"), &json!({})).await;
    let (second_status, second) =
        common::post_json(test_app.app(), IMPORT, Some("reader"), &json!({})).await;

    // Assert
    let story_id = Uuid::from_u128(1).to_string();
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(first["imported"], json!([story_id]));
    assert_eq!(first["skipped"], json!([]));
    assert_eq!(first["failed"], json!([]));
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(second["imported"], json!([]));
    assert_eq!(second["skipped"], json!([story_id]));

    let remote = test_app.remote_library("reader").stored();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].owner().map(|owner| owner.as_str()), Some("reader"));
}

#[tokio::test]
async fn test_import_requires_identity() {
    let test_app = common::build_test_app(Vec::<String>::new());

    let (status, json) = common::post_json(test_app.app(), IMPORT, None, &json!({})).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "identity_required");
}
