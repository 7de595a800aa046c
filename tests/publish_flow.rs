// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-crate publisher scenarios, including the reply-once invariant:
//! publishing the same output directory twice never replies to the same
//! review comment twice.

use holon_core::ActionType;
use holon_publish::{PublishRequest, PublisherConfig, PublisherRegistry};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(server: &MockServer, output: &TempDir) -> PublishRequest {
    PublishRequest {
        target: "o/r/pr/3".to_string(),
        output_dir: output.path().to_path_buf(),
        input_dir: None,
        repo_dir: None,
        config: PublisherConfig {
            api_base_url: server.uri(),
            ..PublisherConfig::new("tok")
        },
    }
}

fn output_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("summary.md"), "# Review fixes\n").unwrap();
    std::fs::write(
        dir.path().join("pr-fix.json"),
        r#"{
            "review_replies": [
                {"comment_id": 100, "status": "fixed", "message": "Addressed."}
            ],
            "follow_up_issues": [],
            "checks": []
        }"#,
    )
    .unwrap();
    dir
}

async fn mount_static_endpoints(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"login": "holon-bot"}"#))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/issues/3/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/o/r/issues/3/comments"))
        .respond_with(ResponseTemplate::new(201).set_body_string(
            r#"{"id": 900, "body": "x", "user": {"login": "holon-bot"}}"#,
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn same_comment_is_never_replied_to_twice_across_publishes() {
    let server = MockServer::start().await;
    mount_static_endpoints(&server).await;

    // First publish sees a bare thread; the reply endpoint accepts exactly
    // one POST over the whole test.
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls/3/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"id": 100, "body": "please fix", "user": {"login": "reviewer"}}]"#,
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // Second publish sees our reply as the last word in the thread.
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls/3/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"id": 100, "body": "please fix", "user": {"login": "reviewer"}},
                {"id": 101, "body": "Addressed.", "user": {"login": "holon-bot"}, "in_reply_to_id": 100}
            ]"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/o/r/pulls/3/comments/100/replies"))
        .respond_with(ResponseTemplate::new(201).set_body_string(
            r#"{"id": 101, "body": "Addressed.", "user": {"login": "holon-bot"}, "in_reply_to_id": 100}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let registry = PublisherRegistry::with_defaults();
    let publisher = registry.get("github").expect("github provider registered");
    let output = output_fixture();

    let first = publisher.publish(&request(&server, &output)).await.unwrap();
    assert!(first.action_types().contains(&ActionType::RepliedReview));

    let second = publisher.publish(&request(&server, &output)).await.unwrap();
    assert!(second.success);
    assert!(!second.action_types().contains(&ActionType::RepliedReview));
    // The wiremock expectation (exactly one reply POST) verifies on drop.
}

#[tokio::test]
async fn registry_rejects_unknown_provider_names() {
    let registry = PublisherRegistry::with_defaults();
    assert!(registry.get("gitlab").is_none());
    assert_eq!(registry.names(), vec!["github", "github-pr"]);
}

#[tokio::test]
async fn publish_result_lands_in_the_output_directory() {
    let server = MockServer::start().await;
    mount_static_endpoints(&server).await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls/3/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/o/r/pulls/3/comments/100/replies"))
        .respond_with(ResponseTemplate::new(201).set_body_string(
            r#"{"id": 101, "body": "Addressed.", "user": {"login": "holon-bot"}, "in_reply_to_id": 100}"#,
        ))
        .mount(&server)
        .await;

    let registry = PublisherRegistry::with_defaults();
    let publisher = registry.get("github").unwrap();
    let output = output_fixture();

    publisher.publish(&request(&server, &output)).await.unwrap();

    let record: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output.path().join("publish-result.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(record["provider"], serde_json::json!("github"));
    assert_eq!(record["success"], serde_json::json!(true));
    assert!(record["actions"].as_array().unwrap().len() >= 1);
}
