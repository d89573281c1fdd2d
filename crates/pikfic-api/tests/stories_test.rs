//! Integration tests for the story routes.

mod common;

use axum::http::StatusCode;
use pikfic_core::error::GenerationError;
use pikfic_core::identity::OwnerId;
use pikfic_story::domain::aggregates::Story;
use pikfic_story::domain::repository::StoryRepository;
use pikfic_test_support::{
    ScriptedTextService, closing_episode_json, episode_json, opening_episode_json, sample_setup,
};
use serde_json::json;
use uuid::Uuid;

const STORIES: &str = "/api/v1/stories";

fn first_story_id() -> Uuid {
    Uuid::from_u128(1)
}

#[tokio::test]
async fn test_create_story_generates_first_episode() {
    // Arrange
    let test_app = common::build_test_app([opening_episode_json(
        "Rain on the carrel window.",
        "Finals Week",
    )]);

    // Act
    let (status, json) =
        common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    let story = &json["story"];
    assert_eq!(story["id"], first_story_id().to_string());
    assert_eq!(story["title"], "Finals Week");
    assert_eq!(story["episodes"].as_array().unwrap().len(), 1);
    assert_eq!(story["episodes"][0]["content"], "Rain on the carrel window.");
    assert_eq!(story["episodes"][0]["suggestions"].as_array().unwrap().len(), 3);
    assert_eq!(story["is_completed"], false);
    assert!(json.get("autosave").is_none());
}

#[tokio::test]
async fn test_created_story_is_readable_while_live() {
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;

    let (status, json) = common::get_json(
        test_app.app(),
        &format!("{STORIES}/{}", first_story_id()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Finals Week");
}

#[tokio::test]
async fn test_create_story_with_blank_premise_returns_400() {
    let test_app = common::build_test_app(Vec::<String>::new());
    let mut setup = common::setup_json(3);
    setup["premise"] = json!("   ");

    let (status, json) = common::post_json(test_app.app(), STORIES, None, &setup).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert!(test_app.service.requests().is_empty());
}

#[tokio::test]
async fn test_failed_first_episode_discards_the_draft() {
    // Arrange
    let test_app = common::build_test_app_with(
        ScriptedTextService::new(vec![Err(GenerationError::Service {
            status: 503,
            message: "overloaded".to_owned(),
        })]),
        true,
    );

    // Act
    let (status, json) =
        common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;
    let (get_status, _) = common::get_json(
        test_app.app(),
        &format!("{STORIES}/{}", first_story_id()),
        None,
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "generation_failed");
    assert_eq!(
        json["message"],
        "Failed to generate the next episode. Please try again."
    );
    assert_eq!(get_status, StatusCode::NOT_FOUND);
    assert!(test_app.local.stored().is_empty());
}

#[tokio::test]
async fn test_continue_to_completion_autosaves_locally() {
    // Arrange
    let test_app = common::build_test_app([
        opening_episode_json("They meet.", "Finals Week"),
        closing_episode_json("They study together."),
    ]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(2)).await;

    // Act
    let (status, json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/continue", first_story_id()),
        None,
        &json!({ "choice": "Leave a note" }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let story = &json["story"];
    assert_eq!(story["is_completed"], true);
    assert_eq!(story["episodes"][1]["provenance"], "Leave a note");
    assert_eq!(story["hashtags"], json!(["finals", "rain", "carrel"]));
    assert_eq!(json["autosave"]["status"], "inserted");
    assert_eq!(test_app.local.stored().len(), 1);
}

#[tokio::test]
async fn test_continue_sends_previous_context_and_choice() {
    let test_app = common::build_test_app([
        opening_episode_json("They meet at the carrel.", "Finals Week"),
        episode_json("A note appears."),
    ]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;

    common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/continue", first_story_id()),
        None,
        &json!({ "choice": "Leave a note" }),
    )
    .await;

    let requests = test_app.service.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].episode_number, 2);
    assert!(requests[1].user_prompt.contains("They meet at the carrel."));
    assert!(requests[1].user_prompt.contains("Leave a note"));
}

#[tokio::test]
async fn test_continue_with_blank_choice_returns_400() {
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;

    let (status, json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/continue", first_story_id()),
        None,
        &json!({ "choice": "  " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_continue_unknown_story_returns_404() {
    let test_app = common::build_test_app(Vec::<String>::new());

    let (status, json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/continue", Uuid::new_v4()),
        None,
        &json!({ "choice": "Leave a note" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "story_not_found");
}

#[tokio::test]
async fn test_continue_completed_story_returns_409() {
    let test_app = common::build_test_app([closing_episode_json("It ends at once.")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(1)).await;

    let (status, json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/continue", first_story_id()),
        None,
        &json!({ "choice": "Leave a note" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "invalid_transition");
    assert_eq!(test_app.service.requests().len(), 1);
}

#[tokio::test]
async fn test_failed_continue_leaves_story_unchanged() {
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;

    let (status, _) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/continue", first_story_id()),
        None,
        &json!({ "choice": "Leave a note" }),
    )
    .await;
    let (_, story) = common::get_json(
        test_app.app(),
        &format!("{STORIES}/{}", first_story_id()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(story["episodes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_save_then_list_library() {
    // Arrange
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;

    // Act
    let (save_status, save_json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/save", first_story_id()),
        None,
        &json!({}),
    )
    .await;
    let (list_status, list_json) = common::get_json(test_app.app(), STORIES, None).await;

    // Assert
    assert_eq!(save_status, StatusCode::OK);
    assert_eq!(save_json["outcome"], "inserted");
    assert_eq!(list_status, StatusCode::OK);
    let summaries = list_json.as_array().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["title"], "Finals Week");
    assert_eq!(summaries[0]["cast_line"], "Min X Jae");
    assert_eq!(summaries[0]["episode_count"], 1);
}

#[tokio::test]
async fn test_completed_story_leaves_session_registry() {
    // Arrange
    let test_app = common::build_test_app([
        opening_episode_json("They meet.", "Finals Week"),
        closing_episode_json("They study together."),
    ]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(2)).await;
    let live_after_create = test_app.state.live_session_count().await;

    // Act
    common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/continue", first_story_id()),
        None,
        &json!({ "choice": "Leave a note" }),
    )
    .await;
    let (get_status, get_json) = common::get_json(
        test_app.app(),
        &format!("{STORIES}/{}", first_story_id()),
        None,
    )
    .await;

    // Assert
    assert_eq!(live_after_create, 1);
    assert_eq!(test_app.state.live_session_count().await, 0);
    assert_eq!(get_status, StatusCode::OK);
    assert_eq!(get_json["is_completed"], true);
}

#[tokio::test]
async fn test_saved_story_is_resumed_from_storage() {
    // Arrange
    let test_app = common::build_test_app([
        opening_episode_json("Rain.", "Finals Week"),
        episode_json("Thunder."),
    ]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;
    common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/save", first_story_id()),
        None,
        &json!({}),
    )
    .await;
    let live_after_save = test_app.state.live_session_count().await;

    // Act
    let (status, json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/continue", first_story_id()),
        None,
        &json!({ "choice": "Leave a note" }),
    )
    .await;

    // Assert
    assert_eq!(live_after_save, 0);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["story"]["episodes"].as_array().unwrap().len(), 2);
    assert_eq!(test_app.state.live_session_count().await, 1);
}

#[tokio::test]
async fn test_delete_requires_confirmation() {
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;
    common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/save", first_story_id()),
        None,
        &json!({}),
    )
    .await;

    let (status, json) = common::delete(
        test_app.app(),
        &format!("{STORIES}/{}", first_story_id()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "deletion_unconfirmed");
    assert_eq!(test_app.local.stored().len(), 1);
}

#[tokio::test]
async fn test_confirmed_delete_removes_story() {
    // Arrange
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;
    common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/save", first_story_id()),
        None,
        &json!({}),
    )
    .await;

    // Act
    let (status, _) = common::delete(
        test_app.app(),
        &format!("{STORIES}/{}?confirm=true", first_story_id()),
        None,
    )
    .await;
    let (get_status, _) = common::get_json(
        test_app.app(),
        &format!("{STORIES}/{}", first_story_id()),
        None,
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(get_status, StatusCode::NOT_FOUND);
    assert!(test_app.local.stored().is_empty());
}

#[tokio::test]
async fn test_share_incomplete_story_returns_412() {
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(
        test_app.app(),
        STORIES,
        Some("reader"),
        &common::setup_json(3),
    )
    .await;

    let (status, json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/share", first_story_id()),
        Some("reader"),
        &json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(json["error"], "story_not_completed");
}

#[tokio::test]
async fn test_share_without_identity_returns_401() {
    let test_app = common::build_test_app([closing_episode_json("It ends at once.")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(1)).await;

    let (status, json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/share", first_story_id()),
        None,
        &json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "identity_required");
}

#[tokio::test]
async fn test_share_credits_display_name_or_anonymous() {
    // Arrange
    let test_app = common::build_test_app([
        closing_episode_json("It ends at once."),
        closing_episode_json("Another ending."),
    ]);
    common::post_json(
        test_app.app(),
        STORIES,
        Some("reader"),
        &common::setup_json(1),
    )
    .await;
    common::post_json(
        test_app.app(),
        STORIES,
        Some("reader"),
        &common::setup_json(1),
    )
    .await;

    // Act
    let (named_status, named) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/share", Uuid::from_u128(1)),
        Some("reader"),
        &json!({ "anonymous": false }),
    )
    .await;
    let (anonymous_status, anonymous) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/share", Uuid::from_u128(2)),
        Some("reader"),
        &json!({ "anonymous": true }),
    )
    .await;

    // Assert
    assert_eq!(named_status, StatusCode::OK);
    assert_eq!(named["sharing"]["shared"], true);
    assert_eq!(named["sharing"]["attribution"], "reader-name");
    assert_eq!(anonymous_status, StatusCode::OK);
    assert_eq!(anonymous["sharing"]["attribution"], "Anonymous");
    let stored = test_app.remote_library("reader").stored();
    assert!(stored.iter().all(|story| story.sharing().shared));
}

#[tokio::test]
async fn test_remote_quota_is_reported_on_autosave_and_save() {
    // Arrange
    let test_app = common::build_test_app([closing_episode_json("It ends at once.")]);
    let library = test_app.remote_library("reader");
    for n in 0..10 {
        let story = Story::draft(
            &sample_setup(3),
            Uuid::from_u128(1000 + n),
            chrono::Utc::now(),
            Some(OwnerId::new("reader")),
        )
        .unwrap();
        library.upsert(&story).await.unwrap();
    }

    // Act
    let (status, json) = common::post_json(
        test_app.app(),
        STORIES,
        Some("reader"),
        &common::setup_json(1),
    )
    .await;
    let (save_status, save_json) = common::post_json(
        test_app.app(),
        &format!("{STORIES}/{}/save", first_story_id()),
        Some("reader"),
        &json!({}),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["story"]["is_completed"], true);
    assert_eq!(json["autosave"]["status"], "failed");
    assert!(
        json["autosave"]["message"]
            .as_str()
            .unwrap()
            .contains("10")
    );
    assert_eq!(save_status, StatusCode::CONFLICT);
    assert_eq!(save_json["error"], "quota_exceeded");
    assert_eq!(library.stored().len(), 10);
}

#[tokio::test]
async fn test_sessions_are_scoped_to_identity() {
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(
        test_app.app(),
        STORIES,
        Some("reader-a"),
        &common::setup_json(3),
    )
    .await;

    let (status, json) = common::get_json(
        test_app.app(),
        &format!("{STORIES}/{}", first_story_id()),
        Some("reader-b"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "story_not_found");
}

#[tokio::test]
async fn test_signed_in_without_remote_backend_returns_503() {
    let test_app = common::build_test_app_with(ScriptedTextService::new(Vec::new()), false);

    let (status, json) = common::get_json(test_app.app(), STORIES, Some("reader")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "storage_unavailable");
}

#[tokio::test]
async fn test_korean_story_errors_are_localized() {
    let test_app = common::build_test_app(Vec::<String>::new());
    let mut setup = common::setup_json(3);
    setup["language"] = json!("kr");

    let (status, json) = common::post_json(test_app.app(), STORIES, None, &setup).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        json["message"],
        "다음 회차 생성에 실패했습니다. 잠시 후 다시 시도해주세요."
    );
}

#[tokio::test]
async fn test_streaming_create_sends_deltas_then_episode() {
    // Arrange
    let test_app = common::build_test_app([opening_episode_json(
        "Rain taps against the carrel window all night.",
        "Finals Week",
    )]);

    // Act
    let (status, text) = common::post_sse(
        test_app.app(),
        &format!("{STORIES}/stream"),
        None,
        &common::setup_json(3),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let events = common::sse_events(&text);
    let (last_name, last_data) = events.last().unwrap();
    assert_eq!(last_name, "episode");
    assert_eq!(last_data["story"]["title"], "Finals Week");
    let deltas: Vec<&str> = events
        .iter()
        .filter(|(name, _)| name == "delta")
        .map(|(_, data)| data["text"].as_str().unwrap())
        .collect();
    assert!(!deltas.is_empty());
    assert!(
        "Rain taps against the carrel window all night."
            .starts_with(deltas[0])
    );
    assert_eq!(
        *deltas.last().unwrap(),
        "Rain taps against the carrel window all night."
    );

    let (get_status, _) = common::get_json(
        test_app.app(),
        &format!("{STORIES}/{}", first_story_id()),
        None,
    )
    .await;
    assert_eq!(get_status, StatusCode::OK);
}

#[tokio::test]
async fn test_streaming_continue_reports_failure_as_error_event() {
    let test_app = common::build_test_app([opening_episode_json("Rain.", "Finals Week")]);
    common::post_json(test_app.app(), STORIES, None, &common::setup_json(3)).await;

    let (status, text) = common::post_sse(
        test_app.app(),
        &format!("{STORIES}/{}/continue/stream", first_story_id()),
        None,
        &json!({ "choice": "Leave a note" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let events = common::sse_events(&text);
    let (name, data) = events.last().unwrap();
    assert_eq!(name, "error");
    assert_eq!(data["error"], "generation_failed");
}
