//! Live API tests against a running server
//!
//! Start the server backed by Postgres, then run with:
//! `cargo test --test live_api -- --ignored`

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080";

fn unique_email(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Clock before epoch")
        .as_nanos();
    format!("{}-{}@example.com", prefix, nanos)
}

/// Register an account and return its token
async fn register(client: &Client, role: &str) -> String {
    let response = client
        .post(format!("{}/api/auth/register/{}", BASE_URL, role))
        .json(&json!({
            "name": "Live Test",
            "email": unique_email(role),
            "password": "password"
        }))
        .send()
        .await
        .expect("Failed to send register request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse register response");
    body["token"].as_str().expect("No token in response").to_string()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_ready_reaches_database() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    let email = unique_email("login");

    client
        .post(format!("{}/api/auth/register/student", BASE_URL))
        .json(&json!({"name": "Live Test", "email": email, "password": "password"}))
        .send()
        .await
        .expect("Failed to send request");

    let response = client
        .post(format!("{}/api/auth/login", BASE_URL))
        .json(&json!({"role": "student", "email": email, "password": "wrong"}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_borrow_return_cycle() {
    let client = Client::new();
    let librarian = register(&client, "librarian").await;
    let student = register(&client, "student").await;

    let response = client
        .post(format!("{}/api/books/add", BASE_URL))
        .bearer_auth(&librarian)
        .json(&json!({"title": "Live Book", "author": "Live Author", "quantity": 1}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let book: Value = response.json().await.expect("Failed to parse response");

    let response = client
        .post(format!("{}/api/borrow/borrow", BASE_URL))
        .bearer_auth(&student)
        .json(&json!({"bookId": book["id"]}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse response");
    assert!(loan["dueDate"].is_string());

    let response = client
        .post(format!("{}/api/borrow/borrow", BASE_URL))
        .bearer_auth(&student)
        .json(&json!({"bookId": book["id"]}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let response = client
        .put(format!("{}/api/borrow/return/{}", BASE_URL, loan["loanId"]))
        .bearer_auth(&librarian)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["fine"], 0);

    let response = client
        .delete(format!("{}/api/books/{}", BASE_URL, book["id"]))
        .bearer_auth(&librarian)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_single_copy() {
    let client = Client::new();
    let librarian = register(&client, "librarian").await;

    let response = client
        .post(format!("{}/api/books/add", BASE_URL))
        .bearer_auth(&librarian)
        .json(&json!({"title": "Contended", "author": "Live Author", "quantity": 1}))
        .send()
        .await
        .expect("Failed to send request");
    let book: Value = response.json().await.expect("Failed to parse response");

    let mut students = Vec::new();
    for _ in 0..8 {
        students.push(register(&client, "student").await);
    }

    let handles: Vec<_> = students
        .into_iter()
        .map(|token| {
            let client = client.clone();
            let book_id = book["id"].clone();
            tokio::spawn(async move {
                client
                    .post(format!("{}/api/borrow/borrow", BASE_URL))
                    .bearer_auth(token)
                    .json(&json!({"bookId": book_id}))
                    .send()
                    .await
                    .expect("Failed to send request")
                    .status()
            })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        if handle.await.expect("Task panicked") == 201 {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
}
