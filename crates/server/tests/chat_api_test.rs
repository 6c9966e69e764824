// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{sync::Arc, time::Duration};

use parley_chat::{BusConfig, DeliveryMode, Message, NotificationBus, Pipeline, UserDirectory};
use parley_common_telemetry::init_default_ut_logging;
use parley_server::{
    ServiceHandler,
    http::{RestServerConfig, RouteHandler, health_routes, start_rest_server},
    routes::{ChatState, chat_routes, metrics_routes},
};
use parley_storage::StorageConfig;
use serde_json::Value;

struct TestServer {
    handler: ServiceHandler,
    bus:     Arc<NotificationBus>,
    base:    String,
    client:  reqwest::Client,
}

impl TestServer {
    async fn start(mode: DeliveryMode) -> Self {
        init_default_ut_logging();
        let storage = StorageConfig::builder()
            .in_memory(true)
            .build()
            .open()
            .unwrap();
        let bus = Arc::new(NotificationBus::new(&BusConfig::builder().mode(mode).build()));
        let state = ChatState {
            pipeline: Pipeline::new(&storage, Arc::clone(&bus)),
            users:    UserDirectory::new(Arc::clone(&storage.users)),
        };
        let handlers: Vec<RouteHandler> = vec![
            Box::new(chat_routes(state)),
            Box::new(health_routes),
            Box::new(metrics_routes),
        ];
        let config = RestServerConfig::builder()
            .bind_address("127.0.0.1:0")
            .build();
        let mut handler = start_rest_server(config, handlers).await.unwrap();
        handler.wait_for_start().await;
        let base = format!("http://{}", handler.local_addr());
        Self {
            handler,
            bus,
            base,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String { format!("{}{path}", self.base) }

    async fn post_message(&self, content: &str) -> reqwest::Response {
        self.client
            .post(self.url("/message/post/"))
            .body(format!(r#"{{"Content": "{content}", "Address": "127.0.0.1"}}"#))
            .send()
            .await
            .unwrap()
    }

    async fn list(&self) -> Vec<Message> {
        self.client
            .get(self.url("/message/all/"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn stop(self) {
        self.bus.close();
        self.handler.shutdown();
        tokio::time::timeout(Duration::from_secs(5), self.handler.wait_for_stop())
            .await
            .expect("server did not stop");
    }
}

/// Reads the event stream until `needle` shows up.
async fn read_until(stream: &mut reqwest::Response, seen: &mut String, needle: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !seen.contains(needle) {
            let chunk = stream.chunk().await.unwrap().expect("stream ended early");
            seen.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never saw {needle:?} in {seen:?}"));
}

#[tokio::test]
async fn root_turns_callers_away() {
    let server = TestServer::start(DeliveryMode::Compete).await;
    for method in [reqwest::Method::GET, reqwest::Method::POST] {
        let response = server
            .client
            .request(method, server.url("/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "Go away");
    }
    server.stop().await;
}

#[tokio::test]
async fn post_list_get_delete() {
    let server = TestServer::start(DeliveryMode::Compete).await;

    let response = server.post_message("hi").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Message posted");

    let listed = server.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "hi");
    let id = listed[0].id;

    let response = server
        .client
        .get(server.url(&format!("/message/get/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let stored: Value = response.json().await.unwrap();
    assert_eq!(stored["Content"], "hi");
    assert_eq!(stored["UserIP"], "127.0.0.1");
    assert_eq!(stored["ID"], id);

    let response = server
        .client
        .delete(server.url(&format!("/message/delete/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "Message deleted");

    let response = server
        .client
        .get(server.url(&format!("/message/get/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert!(server.list().await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let server = TestServer::start(DeliveryMode::Compete).await;

    let garbage = server
        .client
        .post(server.url("/message/post"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), 400);
    let body: Value = garbage.json().await.unwrap();
    assert_eq!(body["code"], "invalid_argument");
    assert_eq!(body["message"], "Could not parse request body");

    let empty = server.post_message("").await;
    assert_eq!(empty.status(), 400);
    let body: Value = empty.json().await.unwrap();
    assert_eq!(
        body["message"],
        "body must include a valid content and address field"
    );

    for path in ["/message/get/abc", "/message/get/-1"] {
        let response = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 400, "{path}");
    }
    let response = server
        .client
        .delete(server.url("/message/delete/1.5"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    assert!(server.list().await.is_empty());
    server.stop().await;
}

#[tokio::test]
async fn usernames_round_trip() {
    let server = TestServer::start(DeliveryMode::Compete).await;

    let response = server
        .client
        .post(server.url("/user/set/?address=192.168.1.20&username=ada"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "Username set to ada");

    let name = server
        .client
        .get(server.url("/user/get/192.168.1.20"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(name, "ada");

    let missing = server
        .client
        .post(server.url("/user/set?address=192.168.1.20"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);
    let unparsable = server
        .client
        .post(server.url("/user/set?address=somewhere&username=ada"))
        .send()
        .await
        .unwrap();
    assert_eq!(unparsable.status(), 400);
    let unknown = server
        .client
        .get(server.url("/user/get/10.0.0.99"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn fan_out_stream_sees_posts_and_deletes() {
    let server = TestServer::start(DeliveryMode::FanOut).await;
    let mut stream = server
        .client
        .get(server.url("/events/"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        stream.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    server.post_message("live").await;
    let id = server.list().await[0].id;

    let mut seen = String::new();
    read_until(&mut stream, &mut seen, "\n\n").await;
    assert!(seen.contains("event: message\n"), "{seen}");
    assert!(seen.contains(&format!("id: {id}\n")), "{seen}");
    assert!(seen.contains(r#""Content":"live""#), "{seen}");

    server
        .client
        .delete(server.url("/message/delete/987"))
        .send()
        .await
        .unwrap();
    read_until(&mut stream, &mut seen, "data: 987\n").await;
    assert!(seen.contains("event: message_deleted\n"), "{seen}");

    drop(stream);
    server.stop().await;
}

#[tokio::test]
async fn competing_stream_gets_event_while_waiting() {
    let server = TestServer::start(DeliveryMode::Compete).await;
    let mut stream = server
        .client
        .get(server.url("/events"))
        .send()
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while server.bus.waiting_readers() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("stream never started waiting");

    server
        .client
        .delete(server.url("/message/delete/3"))
        .send()
        .await
        .unwrap();
    let mut seen = String::new();
    read_until(&mut stream, &mut seen, "data: 3\n").await;
    assert!(seen.contains("event: message_deleted\n"));

    server.stop().await;
    // the stream ends once the bus closes
    let rest = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
        .await
        .unwrap();
    assert!(!matches!(rest, Ok(Some(_))));
}

#[tokio::test]
async fn metrics_are_exposed() {
    let server = TestServer::start(DeliveryMode::Compete).await;
    server.post_message("counted").await;

    let text = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("parley_messages_posted_total"), "{text}");

    server.stop().await;
}
