//! Group lifecycle and membership rules against a real database.

mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn create_enrolls_creator_and_known_members() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.register("Owner").await?;
    let friend = app.register("Friend").await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/groups/",
            Some(&owner.access),
            Some(json!({
                "name": "Lisbon trip",
                "description": "Flights and food",
                "member_ids": [friend.id, owner.id, friend.id, i64::MAX],
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["created_by"], owner.id);
    assert_eq!(body["created_by_email"], owner.email.as_str());
    assert_eq!(body["created_by_name"], "Owner");
    assert_eq!(body["member_count"], 2);
    let mut member_ids: Vec<i64> = body["members"]
        .as_array()
        .map(|members| {
            members
                .iter()
                .filter_map(|member| member["user_id"].as_i64())
                .collect()
        })
        .unwrap_or_default();
    member_ids.sort_unstable();
    let mut expected = vec![owner.id, friend.id];
    expected.sort_unstable();
    assert_eq!(member_ids, expected);

    let (status, body) = app
        .call(Method::GET, "/groups/", Some(&friend.access), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body
        .as_array()
        .is_some_and(|groups| groups.iter().any(|group| group["name"] == "Lisbon trip")));

    Ok(())
}

#[tokio::test]
async fn non_members_get_404_everywhere() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.register("Owner").await?;
    let stranger = app.register("Stranger").await?;

    let (_, group) = app
        .call(
            Method::POST,
            "/groups/",
            Some(&owner.access),
            Some(json!({ "name": "Flat" })),
        )
        .await?;
    let id = group["id"].as_i64().unwrap_or_default();

    let not_found = json!({ "detail": "Not found." });
    for (method, uri, body) in [
        (Method::GET, format!("/groups/{id}/"), None),
        (Method::PATCH, format!("/groups/{id}/"), Some(json!({ "name": "Mine" }))),
        (Method::DELETE, format!("/groups/{id}/"), None),
        (
            Method::POST,
            format!("/groups/{id}/add_member/"),
            Some(json!({ "user_id": stranger.id })),
        ),
        (
            Method::DELETE,
            format!("/groups/{id}/remove_member/?user_id={}", owner.id),
            None,
        ),
        (Method::GET, "/groups/999999999/".to_string(), None),
        (Method::GET, "/groups/abc/".to_string(), None),
    ] {
        let (status, response) = app.call(method, &uri, Some(&stranger.access), body).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(response, not_found, "{uri}");
    }

    let (_, listed) = app
        .call(Method::GET, "/groups/", Some(&stranger.access), None)
        .await?;
    assert_eq!(listed, json!([]));

    Ok(())
}

#[tokio::test]
async fn add_member_is_idempotent() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.register("Owner").await?;
    let friend = app.register("Friend").await?;

    let (_, group) = app
        .call(
            Method::POST,
            "/groups/",
            Some(&owner.access),
            Some(json!({ "name": "Dinner club" })),
        )
        .await?;
    let uri = format!("/groups/{}/add_member/", group["id"]);

    let (status, body) = app
        .call(
            Method::POST,
            &uri,
            Some(&owner.access),
            Some(json!({ "user_id": friend.id.to_string() })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(
        body["message"],
        format!("{} added to group successfully", friend.email)
    );
    assert_eq!(body["member"]["user_id"], friend.id);

    let (status, body) = app
        .call(
            Method::POST,
            &uri,
            Some(&owner.access),
            Some(json!({ "user_id": friend.id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "message": format!("{} is already a member of this group", friend.email) })
    );

    let (_, detail) = app
        .call(
            Method::GET,
            &format!("/groups/{}/", group["id"]),
            Some(&friend.access),
            None,
        )
        .await?;
    assert_eq!(detail["member_count"], 2);

    for (payload, status, expected) in [
        (json!({}), StatusCode::BAD_REQUEST, json!({ "error": "user_id is required" })),
        (
            json!({ "user_id": "abc" }),
            StatusCode::BAD_REQUEST,
            json!({ "error": "user_id must be a valid integer" }),
        ),
        (
            json!({ "user_id": i64::MAX }),
            StatusCode::NOT_FOUND,
            json!({ "error": "User not found" }),
        ),
    ] {
        let (actual_status, body) = app
            .call(Method::POST, &uri, Some(&owner.access), Some(payload))
            .await?;
        assert_eq!(actual_status, status);
        assert_eq!(body, expected);
    }

    Ok(())
}

#[tokio::test]
async fn remove_member_protects_the_creator() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.register("Owner").await?;
    let friend = app.register("Friend").await?;
    let outsider = app.register("Outsider").await?;

    let (_, group) = app
        .call(
            Method::POST,
            "/groups/",
            Some(&owner.access),
            Some(json!({ "name": "Rent", "member_ids": [friend.id] })),
        )
        .await?;
    let uri = format!("/groups/{}/remove_member/", group["id"]);

    let (status, body) = app
        .call(
            Method::DELETE,
            &uri,
            Some(&friend.access),
            Some(json!({ "user_id": owner.id })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Cannot remove group creator" }));

    let (status, body) = app
        .call(
            Method::DELETE,
            &format!("{uri}?user_id={}", outsider.id),
            Some(&owner.access),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "User is not a member of this group" }));

    let (status, body) = app
        .call(
            Method::DELETE,
            &uri,
            Some(&owner.access),
            Some(json!({ "user_id": friend.id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "message": format!("{} removed from group successfully", friend.email) })
    );

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/groups/{}/", group["id"]),
            Some(&friend.access),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn update_and_delete_by_a_member() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.register("Owner").await?;
    let friend = app.register("Friend").await?;

    let (_, group) = app
        .call(
            Method::POST,
            "/groups/",
            Some(&owner.access),
            Some(json!({ "name": "Band", "description": "Gear", "member_ids": [friend.id] })),
        )
        .await?;
    let uri = format!("/groups/{}/", group["id"]);

    let (status, body) = app
        .call(Method::PUT, &uri, Some(&friend.access), Some(json!({ "description": "Vans" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "name": ["This field is required."] }));

    let (status, body) = app
        .call(Method::PATCH, &uri, Some(&friend.access), Some(json!({ "name": "Tour" })))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "Tour");
    assert_eq!(body["description"], "Gear");

    let (status, _) = app.call(Method::DELETE, &uri, Some(&friend.access), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &uri, Some(&owner.access), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn concurrent_adds_create_one_membership() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.register("Owner").await?;
    let friend = app.register("Friend").await?;

    let (_, group) = app
        .call(
            Method::POST,
            "/groups/",
            Some(&owner.access),
            Some(json!({ "name": "Ski week" })),
        )
        .await?;
    let id = group["id"].as_i64().unwrap_or_default();
    let uri = format!("/groups/{id}/add_member/");
    let payload = json!({ "user_id": friend.id });

    let (first, second) = tokio::join!(
        app.call(Method::POST, &uri, Some(&owner.access), Some(payload.clone())),
        app.call(Method::POST, &uri, Some(&owner.access), Some(payload.clone())),
    );
    let mut statuses = [first?.0, second?.0];
    statuses.sort_unstable();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CREATED]);

    let (status, body) = app
        .call(Method::GET, &format!("/groups/{id}/"), Some(&owner.access), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member_count"], 2);
    let friend_rows = body["members"]
        .as_array()
        .map(|members| {
            members
                .iter()
                .filter(|member| member["user_id"] == friend.id)
                .count()
        })
        .unwrap_or_default();
    assert_eq!(friend_rows, 1);

    Ok(())
}

#[tokio::test]
async fn group_text_is_trimmed() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.register("Owner").await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/groups/",
            Some(&owner.access),
            Some(json!({ "name": "  Trip  ", "description": " Beach " })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["name"], "Trip");
    assert_eq!(body["description"], "Beach");

    let (status, body) = app
        .call(
            Method::POST,
            "/groups/",
            Some(&owner.access),
            Some(json!({ "name": "   " })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "name": ["This field may not be blank."] }));

    Ok(())
}
