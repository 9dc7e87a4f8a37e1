mod common;

use common::ws_helpers::*;
use serde_json::json;

async fn send_and_get_id(ws: &mut TestSocket, body: &str) -> String {
    send_json(ws, &json!({"type": "send_message", "body": body})).await;
    let msg = recv_type(ws, "receive_message").await.unwrap();
    msg["message"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn delete_is_broadcast_and_removed_from_history() {
    let (base, pool) = start_server().await;
    let (mut alice, _) = connect_and_join(&base, "Alice", "alice").await;
    let (mut bob, _) = connect_and_join(&base, "Bob", "bob").await;
    drain_messages(&mut alice).await;

    let id = send_and_get_id(&mut alice, "oops").await;
    drain_messages(&mut bob).await;

    send_json(&mut bob, &json!({"type": "delete_message", "id": id})).await;

    let to_alice = recv_type(&mut alice, "message_deleted").await.unwrap();
    let to_bob = recv_type(&mut bob, "message_deleted").await.unwrap();
    assert_eq!(to_alice["id"], id.as_str());
    assert_eq!(to_bob["id"], id.as_str());
    assert_eq!(common::count_messages(&pool).await, 0);

    let (_carol, history) = connect_and_join(&base, "Carol", "carol").await;
    assert!(history.is_empty());
}

#[tokio::test]
async fn second_delete_errors_only_to_requester() {
    let (base, _pool) = start_server().await;
    let (mut alice, _) = connect_and_join(&base, "Alice", "alice").await;
    let (mut bob, _) = connect_and_join(&base, "Bob", "bob").await;
    drain_messages(&mut alice).await;

    let id = send_and_get_id(&mut alice, "once").await;
    send_json(&mut alice, &json!({"type": "delete_message", "id": id})).await;
    recv_type(&mut alice, "message_deleted").await.unwrap();
    drain_messages(&mut bob).await;

    send_json(&mut alice, &json!({"type": "delete_message", "id": id})).await;

    let err = recv_json(&mut alice).await.unwrap();
    assert_eq!(err["type"], "delete_message_error");
    assert_eq!(err["id"], id.as_str());
    assert_eq!(err["reason"], "Message not found");
    assert!(drain_messages(&mut bob).await.is_empty());
}

#[tokio::test]
async fn delete_with_malformed_or_missing_id_errors() {
    let (base, _pool) = start_server().await;
    let (mut alice, _) = connect_and_join(&base, "Alice", "alice").await;

    send_json(&mut alice, &json!({"type": "delete_message", "id": "not-a-uuid"})).await;
    let err = recv_json(&mut alice).await.unwrap();
    assert_eq!(err["type"], "delete_message_error");
    assert_eq!(err["id"], "not-a-uuid");

    send_json(&mut alice, &json!({"type": "delete_message", "id": "  "})).await;
    let err = recv_json(&mut alice).await.unwrap();
    assert_eq!(err["type"], "delete_message_error");
    assert!(err.get("id").is_none());
}

#[tokio::test]
async fn delete_with_store_down_errors_without_broadcast() {
    let (base, pool) = start_server().await;
    let (mut alice, _) = connect_and_join(&base, "Alice", "alice").await;
    let (mut bob, _) = connect_and_join(&base, "Bob", "bob").await;
    drain_messages(&mut alice).await;

    let id = send_and_get_id(&mut alice, "kept").await;
    drain_messages(&mut bob).await;
    pool.close().await;

    send_json(&mut alice, &json!({"type": "delete_message", "id": id})).await;

    let err = recv_json(&mut alice).await.unwrap();
    assert_eq!(err["type"], "delete_message_error");
    assert!(drain_messages(&mut bob).await.is_empty());
}

#[tokio::test]
async fn author_can_edit_own_message() {
    let (base, pool) = start_server().await;
    let (mut alice, _) = connect_and_join(&base, "Alice", "alice").await;
    let (mut bob, _) = connect_and_join(&base, "Bob", "bob").await;
    drain_messages(&mut alice).await;

    let id = send_and_get_id(&mut alice, "helo").await;
    send_json(
        &mut alice,
        &json!({"type": "edit_message", "id": id, "newBody": "hello"}),
    )
    .await;

    let edited = recv_type(&mut bob, "message_edited").await.unwrap();
    assert_eq!(edited["id"], id.as_str());
    assert_eq!(edited["newBody"], "hello");

    let (body, flag): (String, bool) =
        sqlx::query_as("SELECT body, edited FROM messages WHERE id = ?")
            .bind(&id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(body, "hello");
    assert!(flag);
}

#[tokio::test]
async fn non_author_cannot_edit() {
    let (base, _pool) = start_server().await;
    let (mut alice, _) = connect_and_join(&base, "Alice", "alice").await;
    let (mut bob, _) = connect_and_join(&base, "Bob", "bob").await;
    drain_messages(&mut alice).await;

    let id = send_and_get_id(&mut alice, "mine").await;
    drain_messages(&mut bob).await;

    send_json(
        &mut bob,
        &json!({"type": "edit_message", "id": id, "newBody": "yours now"}),
    )
    .await;

    let err = recv_json(&mut bob).await.unwrap();
    assert_eq!(err["type"], "error");
    assert_eq!(err["message"], "Not your message");
    assert!(drain_messages(&mut alice).await.is_empty());
}
