use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use bizadmin::api::{ApiClient, CollectionService, DeleteOptions, RestCollection};
use bizadmin::error::{CollectionError, FetchError};
use bizadmin::model::{Entity, EntityId, Record, Tenant};
use bizadmin::notify::{AlwaysConfirm, TracingNotifier};
use bizadmin::query::{FilterSpec, Filters, ListQuery};
use bizadmin::session::{CurrencyFormat, CurrentUser, Role, SessionContext};
use bizadmin::viewmodel::{CollectionViewModel, LoadOutcome, ViewOptions};
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Seen {
    queries: Mutex<Vec<HashMap<String, String>>>,
    headers: Mutex<Vec<(Option<String>, Option<String>)>>,
    deletes: Mutex<Vec<(String, Option<Value>)>>,
    updates: Mutex<Vec<(String, Value)>>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn list_tenants(
    State(seen): State<Arc<Seen>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    seen.headers.lock().unwrap().push((
        header(&headers, "authorization"),
        header(&headers, "x-tenant-id"),
    ));
    seen.queries.lock().unwrap().push(params.clone());

    let all = vec![
        json!({"id": 1, "name": "Acme", "isActive": true}),
        json!({"id": 2, "name": "Acme Labs", "isActive": false}),
        json!({"id": 3, "name": "Globex", "isActive": true}),
    ];
    let search = params.get("search").cloned().unwrap_or_default().to_lowercase();
    let matching: Vec<Value> = all
        .into_iter()
        .filter(|t| {
            t["name"]
                .as_str()
                .map(|n| n.to_lowercase().contains(&search))
                .unwrap_or(false)
        })
        .collect();
    let total = matching.len();
    let skip: usize = params.get("skip").and_then(|s| s.parse().ok()).unwrap_or(0);
    let limit: usize = params.get("limit").and_then(|s| s.parse().ok()).unwrap_or(20);
    let items: Vec<Value> = matching.into_iter().skip(skip).take(limit).collect();
    Json(json!({ "items": items, "total": total }))
}

async fn create_tenant(Json(payload): Json<Value>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if payload.get("name").and_then(Value::as_str).is_none() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "detail": [{"loc": ["body", "name"], "msg": "field required", "type": "missing"}]
            })),
        ));
    }
    let mut created = payload.clone();
    created["id"] = json!(4);
    Ok(Json(created))
}

async fn update_tenant(
    State(seen): State<Arc<Seen>>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    seen.updates.lock().unwrap().push((id.clone(), payload.clone()));
    let mut updated = json!({"id": id, "name": "Acme", "isActive": true});
    if let (Some(target), Some(patch)) = (updated.as_object_mut(), payload.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
    Json(updated)
}

async fn delete_tenant(
    State(seen): State<Arc<Seen>>,
    Path(id): Path<String>,
    body: Bytes,
) -> StatusCode {
    let parsed = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };
    seen.deletes.lock().unwrap().push((id, parsed));
    StatusCode::NO_CONTENT
}

async fn tenant_stats() -> Json<Value> {
    Json(json!({"totalTenants": 3, "activeTenants": 2, "inactiveTenants": 1}))
}

async fn bare_products() -> Json<Value> {
    Json(json!([{"id": "p-1", "name": "Widget", "price": 9.5}]))
}

async fn broken() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"detail": "database unavailable"})),
    )
}

async fn odd_shape() -> Json<Value> {
    Json(json!({"data": []}))
}

fn app(seen: Arc<Seen>) -> Router {
    Router::new()
        .route("/api/v1/tenants", get(list_tenants).post(create_tenant))
        .route("/api/v1/tenants/stats", get(tenant_stats))
        .route(
            "/api/v1/tenants/{id}",
            axum::routing::put(update_tenant).delete(delete_tenant),
        )
        .route("/api/v1/inventory/products", get(bare_products))
        .route("/api/v1/broken", get(broken))
        .route("/api/v1/odd", get(odd_shape))
        .with_state(seen)
}

async fn spawn_server(seen: Arc<Seen>) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(seen)).await.unwrap();
    });
    Url::parse(&format!("http://{}/api/v1/", addr)).unwrap()
}

fn client(base: Url) -> ApiClient {
    let http = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    ApiClient::with_http(http, base, "test-token".into()).with_tenant(Some("t-42".into()))
}

fn session() -> SessionContext {
    SessionContext {
        user: CurrentUser {
            id: "1".into(),
            name: "root".into(),
            role: Role::SuperAdmin,
        },
        tenant_id: Some("t-42".into()),
        currency: CurrencyFormat::default(),
    }
}

fn tenant_view(collection: RestCollection<Tenant>) -> CollectionViewModel<Tenant> {
    CollectionViewModel::new(
        Arc::new(collection),
        session(),
        Arc::new(TracingNotifier),
        ViewOptions {
            page_size: 2,
            debounce: Duration::from_millis(10),
            filters: FilterSpec::default().with("status", &["active", "inactive"]),
            required_role: Some(Role::SuperAdmin),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn view_model_pages_through_rest_collection() {
    let seen = Arc::new(Seen::default());
    let base = spawn_server(seen.clone()).await;
    let vm = tenant_view(client(base).collection("tenants"));

    let mut filters = Filters::new();
    filters.insert("status".into(), "active".into());
    let outcome = vm.load(1, filters, "acme").await.unwrap();
    assert_eq!(outcome, LoadOutcome::Applied);
    let names: Vec<String> = vm.items().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["Acme", "Acme Labs"]);
    assert_eq!(vm.total_pages(), 1);

    {
        let queries = seen.queries.lock().unwrap();
        let q = &queries[0];
        assert_eq!(q.get("skip").map(String::as_str), Some("0"));
        assert_eq!(q.get("limit").map(String::as_str), Some("2"));
        assert_eq!(q.get("search").map(String::as_str), Some("acme"));
        assert_eq!(q.get("status").map(String::as_str), Some("active"));
        let headers = seen.headers.lock().unwrap();
        assert_eq!(
            headers[0],
            (Some("Bearer test-token".into()), Some("t-42".into()))
        );
    }

    vm.change_filter("status", None).await.unwrap();
    vm.search("").await.unwrap();
    assert_eq!(vm.total_pages(), 2);
    assert_eq!(vm.load_more().await.unwrap(), Some(LoadOutcome::Applied));
    assert_eq!(vm.items().len(), 3);
    assert_eq!(vm.load_more().await.unwrap(), None);
}

#[tokio::test]
async fn mutations_round_trip_through_http() {
    let seen = Arc::new(Seen::default());
    let base = spawn_server(seen.clone()).await;
    let vm = tenant_view(client(base).collection("tenants"));

    vm.load(1, Filters::new(), "").await.unwrap();
    let counters = vm.refresh_stats().await.unwrap();
    assert_eq!((counters.total, counters.active, counters.inactive), (3, 2, 1));

    let created = vm
        .create(&json!({"name": "Initech", "isActive": true}))
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "4");
    assert!(vm.items().iter().any(|t| t.id == created.id));
    assert_eq!(vm.counters().total, 4);

    let updated = vm
        .update(&EntityId::from("1"), &json!({"name": "Acme Corp"}))
        .await
        .unwrap();
    assert_eq!(updated.name, "Acme Corp");
    assert_eq!(vm.items()[0].name, "Acme Corp");
    assert_eq!(
        seen.updates.lock().unwrap()[0],
        ("1".to_string(), json!({"name": "Acme Corp"}))
    );

    vm.remove(
        &EntityId::from("2"),
        Some(DeleteOptions {
            delete_all_data: true,
        }),
        &AlwaysConfirm,
    )
    .await
    .unwrap();
    assert!(vm.items().iter().all(|t| t.id.as_str() != "2"));
    assert_eq!(
        seen.deletes.lock().unwrap()[0],
        ("2".to_string(), Some(json!({"deleteAllData": true})))
    );
    let c = vm.counters();
    // stats said 3/2/1, +1 active from the create, -1 inactive from the delete
    assert_eq!((c.total, c.active, c.inactive), (3, 3, 0));
}

#[tokio::test]
async fn create_rejection_surfaces_field_errors() {
    let seen = Arc::new(Seen::default());
    let base = spawn_server(seen).await;
    let vm = tenant_view(client(base).collection("tenants"));

    let err = vm.create(&json!({"slug": "nameless"})).await.unwrap_err();
    let CollectionError::Validation(v) = &err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(v.field("name"), Some(&["field required".to_string()][..]));
    assert_eq!(err.user_message(), "name: field required");
    assert!(vm.items().is_empty());
}

#[tokio::test]
async fn bare_array_and_bad_responses() {
    let seen = Arc::new(Seen::default());
    let base = spawn_server(seen).await;
    let api = client(base);

    let products = api.collection::<Record>("inventory/products");
    let page = products.list(&ListQuery::new(1, 20)).await.unwrap();
    assert_eq!(page.total, None);
    assert_eq!(page.items[0].id.as_str(), "p-1");
    assert_eq!(page.items[0].is_active(), None);

    let broken = api.collection::<Record>("broken");
    match broken.list(&ListQuery::new(1, 20)).await.unwrap_err() {
        CollectionError::Fetch(FetchError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message.as_deref(), Some("database unavailable"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let odd = api.collection::<Record>("odd");
    let err = odd.list(&ListQuery::new(1, 20)).await.unwrap_err();
    assert!(matches!(err, CollectionError::Fetch(FetchError::Decode(_))));

    let missing = api.collection::<Record>("nowhere");
    let err = missing.stats().await.unwrap_err();
    assert!(matches!(
        err,
        CollectionError::Fetch(FetchError::Status { status: 404, .. })
    ));
}
