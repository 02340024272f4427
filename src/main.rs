use std::sync::Arc;

use arkiv::auth;
use arkiv::config::{Cli, Config, StorageKind, default_config_dir, default_config_path};
use arkiv::handler::AppState;
use arkiv::model::{NewUser, Role};
use arkiv::routes;
use arkiv::session::SessionManager;
use arkiv::store::{LibsqlStore, MemoryStore, Store};
use arkiv::uploads::ImageStore;
use arkiv::workflow::Catalog;
use axum::http::Method;
use clap::Parser;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use uuid::Uuid;

/// Without at least one admin the add-user gate can never be satisfied, so
/// an empty credential store gets a bootstrap account with a generated
/// password, logged once at startup.
async fn ensure_default_admin(store: &dyn Store) -> anyhow::Result<()> {
    if !store.list_users().await?.is_empty() {
        return Ok(());
    }

    let password = Uuid::new_v4().simple().to_string();
    let password_hash = auth::hash_password(&password)?;
    store
        .insert_user(NewUser {
            username: "admin".to_string(),
            email: "admin@localhost".to_string(),
            role: Role::Admin,
            password_hash,
        })
        .await?;
    tracing::warn!(username = "admin", password = %password, "seeded bootstrap admin account, change its password");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    dotenvy::dotenv().ok();

    // Determine config path and data directory. If --config is provided,
    // its parent directory holds the data (database, uploads); otherwise
    // both live under ~/.arkiv/.
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => {
            let dir = default_config_dir();
            (default_config_path(), dir)
        }
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt().json().init();
    tracing::info!("arkiv.svc starting");

    let cfg = Config::new(config_path.to_str().unwrap()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    if cfg.app.uses_dev_secret() {
        tracing::warn!("SESSION_SECRET not set, using the insecure development fallback");
    }

    // Storage backend is an explicit configuration choice. A libsql
    // connection failure is fatal; it never degrades to the in-memory store.
    let store: Arc<dyn Store> = match cfg.app.storage {
        StorageKind::Libsql => {
            let path = data_dir.join(cfg.app.get_db());
            Arc::new(LibsqlStore::new(&path).await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to setup database");
                std::process::exit(1);
            }))
        }
        StorageKind::Memory => {
            tracing::warn!("running against the in-memory store, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    if let Err(e) = ensure_default_admin(store.as_ref()).await {
        tracing::error!(error = %e, "failed to seed bootstrap admin");
        std::process::exit(1);
    }

    let upload_dir = data_dir.join(cfg.app.get_upload_dir());
    let images = Arc::new(ImageStore::new(&upload_dir).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup upload directory");
        std::process::exit(1);
    }));

    let state = AppState {
        catalog: Arc::new(Catalog::new(store)),
        sessions: Arc::new(SessionManager::new(cfg.app.get_session_secret())),
        images: images.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = routes::routes()
        .nest_service("/static/uploads", ServeDir::new(images.dir()))
        .layer(cors)
        .with_state(state);

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("arkiv.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, shutting down");
        }
    }

    tracing::info!("arkiv.svc going off");
}
