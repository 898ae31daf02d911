use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use stockline_api::app::{self, AppServices};

struct TestServer {
    base_url: String,
    actor: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores with the starter catalog,
        // bound to an ephemeral port.
        let services = AppServices::in_memory();
        services.registry.seed_defaults().await.unwrap();
        let router = app::build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url,
            actor: Uuid::now_v7().to_string(),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let res = req.header("x-actor-id", &self.actor).send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(self.client.get(self.url(path))).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.post(self.url(path)).json(&body)).await
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.put(self.url(path)).json(&body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.patch(self.url(path)).json(&body)).await
    }

    async fn delete(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.delete(self.url(path)).json(&body)).await
    }

    async fn submit(&self, warehouse: &str, technician: &str, quantity: i64) -> String {
        let (status, body) = self
            .post(
                "/transfer",
                json!({
                    "warehouseId": warehouse,
                    "technicianId": technician,
                    "itemTypeId": "n950",
                    "packagingType": "box",
                    "quantity": quantity,
                    "notes": ""
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "submit failed: {body}");
        assert_eq!(body["status"], "pending");
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn new_id() -> String {
    Uuid::now_v7().to_string()
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_an_actor() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/transfers")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = srv
        .client
        .get(srv.url("/itemTypes"))
        .header("x-actor-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn accept_moves_boxes_from_warehouse_to_moving_stock() {
    let srv = TestServer::spawn().await;
    let (warehouse, technician) = (new_id(), new_id());

    let (status, _) = srv
        .put(
            &format!("/inventory/warehouse/{warehouse}/n950"),
            json!({ "boxes": 10, "units": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let id = srv.submit(&warehouse, &technician, 3).await;
    let (status, body) = srv.post(&format!("/transfer/{id}/accept"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "accept failed: {body}");
    assert_eq!(body["status"], "accepted");
    assert!(body["respondedAt"].is_string());

    let (_, stock) = srv.get(&format!("/inventory/warehouse/{warehouse}/n950")).await;
    assert_eq!(stock["record"]["boxes"], 7);

    let (_, snapshot) = srv.get(&format!("/inventory/technicianMoving/{technician}")).await;
    assert_eq!(snapshot["lines"][0]["itemTypeId"], "n950");
    assert_eq!(snapshot["lines"][0]["boxes"], 3);
    assert_eq!(snapshot["lines"][0]["displayTotal"], 30);

    // Second accept is refused and changes nothing.
    let (status, body) = srv.post(&format!("/transfer/{id}/accept"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_processed");
    let (_, stock) = srv.get(&format!("/inventory/warehouse/{warehouse}/n950")).await;
    assert_eq!(stock["record"]["boxes"], 7);
}

#[tokio::test]
async fn insufficient_stock_is_unprocessable_and_request_stays_pending() {
    let srv = TestServer::spawn().await;
    let (warehouse, technician) = (new_id(), new_id());
    srv.put(
        &format!("/inventory/warehouse/{warehouse}/n950"),
        json!({ "boxes": 3, "units": 0 }),
    )
    .await;

    let id = srv.submit(&warehouse, &technician, 5).await;
    let (status, body) = srv.post(&format!("/transfer/{id}/accept"), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_stock");

    let (_, row) = srv.get(&format!("/transfer/{id}")).await;
    assert_eq!(row["status"], "pending");
    let (_, stock) = srv.get(&format!("/inventory/warehouse/{warehouse}/n950")).await;
    assert_eq!(stock["record"]["boxes"], 3);
}

#[tokio::test]
async fn submit_validation_errors_are_bad_requests() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post(
            "/transfer",
            json!({
                "warehouseId": new_id(),
                "technicianId": new_id(),
                "itemTypeId": "n950",
                "packagingType": "box",
                "quantity": 0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv
        .post(
            "/transfer",
            json!({
                "warehouseId": "w-1",
                "technicianId": new_id(),
                "itemTypeId": "n950",
                "packagingType": "box",
                "quantity": 1
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, _) = srv.post(&format!("/transfer/{}/accept", new_id()), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reject_then_bulk_delete_and_operations() {
    let srv = TestServer::spawn().await;
    let (warehouse, technician) = (new_id(), new_id());

    let mut ids = Vec::new();
    for _ in 0..3 {
        let id = srv.submit(&warehouse, &technician, 1).await;
        let (status, body) = srv
            .post(&format!("/transfer/{id}/reject"), json!({ "reason": "duplicate" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rejectionReason"], "duplicate");
        ids.push(id);
    }
    let pending = srv.submit(&warehouse, &technician, 1).await;

    let (_, ops) = srv.get(&format!("/operations?technicianId={technician}")).await;
    let ops = ops.as_array().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["items"].as_array().unwrap().len(), 3);
    assert_eq!(ops[0]["totalQuantity"], 3);
    assert_eq!(ops[0]["status"], "rejected");

    let (_, rows) = srv.get(&format!("/transfers?technicianId={technician}")).await;
    assert_eq!(rows.as_array().unwrap().len(), 4);

    let mut with_pending = ids.clone();
    with_pending.push(pending.clone());
    let (status, body) = srv.delete("/transfers", json!({ "ids": with_pending })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains(&pending));

    let (status, body) = srv.delete("/transfers", json!({ "ids": ids })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 3);

    let (_, rows) = srv.get(&format!("/transfers?technicianId={technician}")).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reject_body_is_optional_but_must_be_valid_json() {
    let srv = TestServer::spawn().await;
    let (warehouse, technician) = (new_id(), new_id());

    let id = srv.submit(&warehouse, &technician, 1).await;
    let req = srv
        .client
        .post(srv.url(&format!("/transfer/{id}/reject")))
        .header("content-type", "application/json")
        .body("{\"reason\": ");
    let (status, body) = srv.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    let (_, row) = srv.get(&format!("/transfer/{id}")).await;
    assert_eq!(row["status"], "pending");

    let (status, row) = srv
        .send(srv.client.post(srv.url(&format!("/transfer/{id}/reject"))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["status"], "rejected");
    assert!(row["rejectionReason"].is_null());
}

#[tokio::test]
async fn item_type_registry_endpoints() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post("/itemTypes/seed", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_seeded");

    let (status, created) = srv
        .post(
            "/itemTypes",
            json!({
                "id": "cableKit",
                "nameLocal": "طقم كابلات",
                "nameAlt": "Cable Kit",
                "category": "accessories",
                "packagingRule": "unit_only"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {created}");

    let (status, body) = srv
        .post("/itemTypes", json!({ "id": "cableKit", "nameLocal": "x", "nameAlt": "y" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv.patch("/itemTypes/cableKit", json!({ "id": "renamed" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "id must not be patchable: {body}");

    let (status, body) = srv
        .patch("/itemTypes/cableKit/toggle-active", json!({ "isActive": false }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], false);

    let (_, active) = srv.get("/itemTypes?activeOnly=true").await;
    assert!(active.as_array().unwrap().iter().all(|i| i["id"] != "cableKit"));
    let (_, all) = srv.get("/itemTypes").await;
    assert!(all.as_array().unwrap().iter().any(|i| i["id"] == "cableKit"));
}

#[tokio::test]
async fn legacy_fields_are_read_until_a_dynamic_record_exists() {
    let srv = TestServer::spawn().await;
    let technician = new_id();

    let (status, body) = srv
        .post(
            &format!("/inventory/technicianFixed/{technician}/legacy"),
            json!({ "stcSimUnits": 40, "n950Boxes": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"], 2);

    let (_, stock) = srv.get(&format!("/inventory/technicianFixed/{technician}/stcSim")).await;
    assert_eq!(stock["source"], "legacy");
    assert_eq!(stock["record"]["units"], 40);

    srv.put(
        &format!("/inventory/technicianFixed/{technician}/stcSim"),
        json!({ "boxes": 0, "units": 5 }),
    )
    .await;
    let (_, stock) = srv.get(&format!("/inventory/technicianFixed/{technician}/stcSim")).await;
    assert_eq!(stock["source"], "dynamic");
    assert_eq!(stock["record"]["units"], 5);

    let (status, body) = srv.get(&format!("/inventory/depot/{technician}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}
