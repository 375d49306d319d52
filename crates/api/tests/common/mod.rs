//! Shared helpers for the HTTP integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{Rgb, RgbImage};
use jsonwebtoken::{encode, EncodingKey, Header};
use kiosk_api::auth::jwt::{Claims, JwtConfig};
use kiosk_api::config::ServerConfig;
use kiosk_api::router::build_app_router;
use kiosk_api::state::AppState;
use kiosk_core::photo::PhotoType;
use kiosk_core::types::DbId;
use kiosk_db::models::equipment::CreateEquipment;
use kiosk_db::models::inventory::CreateInventory;
use kiosk_db::models::transaction::CreateTransaction;
use kiosk_db::repositories::{EquipmentRepo, InventoryRepo, PhotoRepo, TransactionRepo};
use kiosk_pipeline::{Pipeline, PipelineConfig};
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        allowed_origins: vec![HeaderValue::from_static("http://localhost:5173")],
        request_timeout: Duration::from_secs(30),
        db_pool_size: 5,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
        },
    }
}

/// The application router plus the photo root it reads from.
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub root: TempDir,
}

impl TestApp {
    pub fn new(pool: PgPool) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = test_config();
        let pipeline = Pipeline::new(
            pool.clone(),
            PipelineConfig {
                photo_root: root.path().to_path_buf(),
                ..PipelineConfig::default()
            },
        );
        let state = AppState {
            pool: pool.clone(),
            config: Arc::new(config),
            pipeline,
        };
        Self {
            router: build_app_router(state),
            pool,
            root,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub fn write_photo(&self, relative: &str) -> String {
        let path = self.root.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        scene().save(&path).unwrap();
        relative.to_string()
    }

    /// A small-item borrow with a reference photo, and its equipment id.
    pub async fn seed_borrow(&self, tag: &str) -> (DbId, DbId) {
        let equipment_id = EquipmentRepo::create(
            &self.pool,
            &CreateEquipment {
                rfid_tag: tag.to_string(),
                name: format!("Beaker set {tag}"),
                image_path: None,
            },
        )
        .await
        .unwrap()
        .id;
        InventoryRepo::create(
            &self.pool,
            &CreateInventory {
                equipment_id,
                quantity: 3,
                borrowed_quantity: 1,
                damaged_quantity: 0,
                maintenance_quantity: 0,
                minimum_stock_level: Some(1),
            },
        )
        .await
        .unwrap();
        let transaction = TransactionRepo::create(
            &self.pool,
            &CreateTransaction {
                equipment_id,
                user_id: 2024017,
                transaction_type: "Borrow".to_string(),
                quantity: None,
                item_size: Some("small".to_string()),
                expected_return_date: None,
                notes: None,
            },
        )
        .await
        .unwrap();
        let path = self.write_photo(&format!("uploads/borrow_{tag}.png"));
        PhotoRepo::create(&self.pool, transaction.id, PhotoType::Borrow, &path)
            .await
            .unwrap();
        (transaction.id, equipment_id)
    }
}

pub fn token(role: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: 11,
        name: "Mr. Okafor".to_string(),
        role: role.to_string(),
        exp: now + 900,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn scene() -> RgbImage {
    RgbImage::from_fn(128, 96, |x, y| {
        if (30..90).contains(&x) && (20..70).contains(&y) {
            Rgb([35, 50, 70])
        } else {
            let v = (x + 2 * y) as u8;
            Rgb([110 + v / 4, 120 + v / 5, 150 + v / 8])
        }
    })
}
