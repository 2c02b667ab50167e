mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn send_read_reply_delete() -> Result<()> {
    let t = TestApp::new();
    let teacher = t.teacher_token("t1");
    let student = t.student_token("s1");

    let sent = t
        .post(
            "/api/messages/send",
            Some(&teacher),
            json!({"receivercode": "s1", "title": "Homework", "message": "Page 12", "isRead": true}),
        )
        .await?;
    assert_eq!(sent.status, StatusCode::CREATED, "{}", sent.body);
    assert_eq!(sent.data()["data"]["sendercode"], "t1");
    assert_eq!(sent.data()["data"]["isRead"], false);
    let id = sent.data()["_id"].as_str().unwrap_or_default().to_string();

    let inbox = t.get("/api/messages/inbox?read=unread", Some(&student)).await?;
    assert_eq!(inbox.status, StatusCode::OK);
    assert_eq!(inbox.data()["pagination"]["total"], 1);
    assert_eq!(inbox.data()["messages"][0]["data"]["title"], "Homework");

    // Only the receiver can mark it read
    let not_mine = t.put(&format!("/api/messages/{}/read", id), Some(&teacher), json!({})).await?;
    assert_eq!(not_mine.status, StatusCode::NOT_FOUND);

    let reply = t
        .post(
            "/api/messages/reply",
            Some(&student),
            json!({"message": {"receivercode": "t1", "title": "Re: Homework", "message": "Done",
                               "originalMessageId": id}}),
        )
        .await?;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);

    let unread = t.get("/api/messages/inbox?read=unread", Some(&student)).await?;
    assert_eq!(unread.data()["pagination"]["total"], 0);
    let teacher_inbox = t.get("/api/messages/inbox", Some(&teacher)).await?;
    assert_eq!(teacher_inbox.data()["messages"][0]["data"]["sendercode"], "s1");

    let stranger = t.delete(&format!("/api/messages/{}", id), Some(&t.student_token("s9")), None).await?;
    assert_eq!(stranger.status, StatusCode::NOT_FOUND);
    let deleted = t.delete(&format!("/api/messages/{}", id), Some(&student), None).await?;
    assert_eq!(deleted.data()["deletedCount"], 1);
    Ok(())
}

#[tokio::test]
async fn message_validation() -> Result<()> {
    let t = TestApp::new();
    let teacher = t.teacher_token("t1");

    let no_receiver = t
        .post("/api/messages/send", Some(&teacher), json!({"title": "x", "message": "y"}))
        .await?;
    assert_eq!(no_receiver.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_receiver.error(), "Receiver code is required");

    let no_message = t.post("/api/messages/reply", Some(&teacher), json!({})).await?;
    assert_eq!(no_message.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_message.error(), "message is required");

    let bad_read = t.get("/api/messages/inbox?read=maybe", Some(&teacher)).await?;
    assert_eq!(bad_read.status, StatusCode::BAD_REQUEST);

    assert_eq!(t.connector.connect_count(), 0);

    let bad_id = t.put("/api/messages/not-an-id/read", Some(&teacher), json!({})).await?;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.error(), "Invalid ID format");
    Ok(())
}

#[tokio::test]
async fn starred_and_search_filters() -> Result<()> {
    let t = TestApp::new();
    let school = t.school_token();
    for title in ["Trip notice", "Exam schedule"] {
        t.post(
            "/api/messages/send",
            Some(&school),
            json!({"receivercode": "t1", "title": title, "message": "Details inside"}),
        )
        .await?;
    }
    let store = t.store(common::ALBORZ);
    use school_api_rust::database::{DataMap, DocumentStore};
    use school_api_rust::filter::Filter;
    let mut star = DataMap::new();
    star.insert("isFavorite".into(), json!(true));
    store.merge("messagelist", &Filter::eq("title", "Trip notice"), star).await?;

    let teacher = t.teacher_token("t1");
    let starred = t.get("/api/messages/inbox?starred=true", Some(&teacher)).await?;
    assert_eq!(starred.data()["pagination"]["total"], 1);
    assert_eq!(starred.data()["messages"][0]["data"]["title"], "Trip notice");

    let search = t.get("/api/messages/inbox?search=exam", Some(&teacher)).await?;
    assert_eq!(search.data()["pagination"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn students_cannot_send_even_during_outage() -> Result<()> {
    let t = TestApp::new();
    t.connector.set_fail_connects(true);

    let res = t
        .post(
            "/api/messages/send",
            Some(&t.student_token("s1")),
            json!({"receivercode": "t1", "title": "Hi", "message": "hello"}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error(), "Only school and teacher users can send messages");
    assert_eq!(t.connector.connect_count(), 0);
    Ok(())
}
