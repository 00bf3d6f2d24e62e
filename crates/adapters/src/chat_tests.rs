// SPDX-License-Identifier: MIT

use super::*;
use httpmock::prelude::*;

#[tokio::test]
async fn send_posts_to_bot_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/botTOKEN/sendMessage").json_body(serde_json::json!({
                "chat_id": "-100200300",
                "text": "hello",
                "parse_mode": "HTML",
            }));
            then.status(200).json_body(serde_json::json!({"ok": true}));
        })
        .await;

    let chat = HttpChatTransport::with_base(server.base_url(), "TOKEN");
    chat.send("-100200300", "hello").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/botTOKEN/sendMessage");
            then.status(403);
        })
        .await;

    let chat = HttpChatTransport::with_base(server.base_url(), "TOKEN");
    assert!(chat.send("-1", "hello").await.is_err());
}

#[tokio::test]
async fn fake_records_per_chat() {
    let chat = FakeChatTransport::new();
    chat.send("group", "one").await.unwrap();
    chat.send("dm", "two").await.unwrap();
    chat.send("group", "three").await.unwrap();

    assert_eq!(chat.sent_to("group"), vec!["one".to_string(), "three".to_string()]);
    assert_eq!(chat.sent_to("dm"), vec!["two".to_string()]);
}

#[tokio::test]
async fn fake_failure_injection() {
    let chat = FakeChatTransport::new();
    chat.set_failing(true);
    assert!(chat.send("group", "lost").await.is_err());
    assert!(chat.sent().is_empty());
}
