// SKU Reconciliation Engine - Upload Server
// Upload a Flipkart and an Amazon export, download the reconciled MSKU table

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::Serialize;
use sku_reconcile::{
    config::DEFAULT_CONFIG_FILE, resolver_from_config, AmazonAdapter, Config, FlipkartAdapter,
    MappingResolver, MarketplaceAdapter, RawTable, ReconcileError, ReconciliationPipeline,
    RunSummary,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "sku-server")]
#[command(about = "Upload/download server for the SKU reconciliation pipeline")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "SKU_RECONCILE_CONFIG")]
    config: PathBuf,

    /// Listen address (overrides config file)
    #[arg(short, long, env = "SKU_RECONCILE_BIND")]
    bind: Option<String>,
}

/// Shared application state
struct AppState {
    resolver: MappingResolver,
    output: PathBuf,
    split_quantity: bool,
    /// Held for the whole run, so uploads are processed one at a time
    last_run: Mutex<Option<RunSummary>>,
}

type SharedState = Arc<AppState>;

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::err(message))).into_response()
}

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    download: &'static str,
    summary: RunSummary,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/summary - Summary of the most recent upload run
async fn last_summary(State(state): State<SharedState>) -> Response {
    match state.last_run.lock().await.clone() {
        Some(summary) => Json(ApiResponse::ok(summary)).into_response(),
        None => failure(StatusCode::NOT_FOUND, "No data processed yet"),
    }
}

/// POST /upload - Reconcile a Flipkart and an Amazon export
async fn upload(State(state): State<SharedState>, mut multipart: Multipart) -> Response {
    let mut flipkart: Option<(String, Vec<u8>)> = None;
    let mut amazon: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return failure(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)),
        };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return failure(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e)),
        };

        match name.as_str() {
            "flipkart_file" => flipkart = Some((file_name, bytes)),
            "amazon_file" => amazon = Some((file_name, bytes)),
            other => warn!(field = other, "ignoring unexpected upload field"),
        }
    }

    let (Some(flipkart), Some(amazon)) = (flipkart, amazon) else {
        return failure(
            StatusCode::BAD_REQUEST,
            "Please upload both Flipkart and Amazon CSV files",
        );
    };
    if [&flipkart, &amazon]
        .iter()
        .any(|(file_name, bytes)| file_name.is_empty() || bytes.is_empty())
    {
        return failure(StatusCode::BAD_REQUEST, "One or both files are missing");
    }

    let mut last_run = state.last_run.lock().await;

    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || reconcile_upload(&worker, flipkart, amazon)).await;

    match result {
        Ok(Ok(summary)) => {
            info!(run_id = summary.run_id.as_str(), "Data processed successfully");
            *last_run = Some(summary.clone());
            Json(ApiResponse::ok(UploadResponse {
                message: "Data processed successfully!",
                download: "/download",
                summary,
            }))
            .into_response()
        }
        Ok(Err(e)) => {
            warn!(error = %e, "upload rejected");
            let status = match e {
                ReconcileError::Schema(_) | ReconcileError::Csv { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            failure(status, format!("Error processing data: {}", e))
        }
        Err(e) => {
            error!(error = %e, "reconciliation task failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Error processing data")
        }
    }
}

fn reconcile_upload(
    state: &AppState,
    flipkart: (String, Vec<u8>),
    amazon: (String, Vec<u8>),
) -> sku_reconcile::Result<RunSummary> {
    let flipkart_table = RawTable::from_reader(flipkart.0, flipkart.1.as_slice())?;
    let amazon_table = RawTable::from_reader(amazon.0, amazon.1.as_slice())?;

    let flipkart_adapter = FlipkartAdapter::new();
    let amazon_adapter = AmazonAdapter::new();
    let sources: Vec<(&dyn MarketplaceAdapter, &RawTable)> = vec![
        (&flipkart_adapter, &flipkart_table),
        (&amazon_adapter, &amazon_table),
    ];

    let report = ReconciliationPipeline::new(&state.resolver)
        .with_split_quantity(state.split_quantity)
        .run(&sources)?;
    report.write_csv(&state.output)?;
    report.summary()
}

/// GET /download - Most recent output table as an attachment
async fn download(State(state): State<SharedState>) -> Response {
    let bytes = match tokio::fs::read(&state.output).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return failure(StatusCode::NOT_FOUND, "No output available, upload files first");
        }
        Err(e) => {
            error!(path = %state.output.display(), error = %e, "failed to read output");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read output file");
        }
    };

    let file_name = state
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cleaned_sales_data.csv".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        file_name.replace('"', ""),
        urlencoding::encode(&file_name)
    );

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

/// GET / - Serve the upload form
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

fn app(state: SharedState, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/summary", get(last_summary));

    Router::new()
        .route("/", get(serve_index))
        .route("/upload", post(upload))
        .route("/download", get(download))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sku_reconcile=info".parse()?)
                .add_directive("sku_server=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config: {}", args.config.display()))?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let resolver = resolver_from_config(&config).context("Failed to load catalogs")?;
    info!(
        combos = resolver.combos().len(),
        singles = resolver.singles().map_or(0, |s| s.len()),
        "catalogs loaded"
    );

    let state = Arc::new(AppState {
        resolver,
        output: config.pipeline.output.clone(),
        split_quantity: config.pipeline.split_quantity,
        last_run: Mutex::new(None),
    });

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;

    info!(%bind, "🚀 server running (UI: /, API: /api/summary)");

    axum::serve(listener, app(state, config.server.max_upload_bytes))
        .await
        .context("Server error")?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use sku_reconcile::CatalogLoader;
    use tower::ServiceExt;

    const BOUNDARY: &str = "sku-test-boundary";

    const COMBOS: &str = "Combo,SKU1,SKU2,SKU3,Status\nBUNDLE1,A,A,B,Combo\n";
    const SINGLES: &str = "sku,msku,panels\nFK-RED,MSKU-RED,CSTE FK\n";
    const FLIPKART: &str = "SKU,Quantity,Ordered On,Order State\n\
                            BUNDLE1,2,2024-02-05,Delivered\n\
                            FK-RED,1,2024-02-06,Cancelled\n";
    const AMAZON: &str = "MSKU,Quantity,Date,Event Type\nMSKU-Z,-3,2024-02-07,Shipments\n";

    fn state(dir: &tempfile::TempDir) -> SharedState {
        let combos = RawTable::from_reader("combos.csv", COMBOS.as_bytes()).unwrap();
        let singles = RawTable::from_reader("singles.csv", SINGLES.as_bytes()).unwrap();
        let (combos, singles) = CatalogLoader::default().load(&combos, Some(&singles)).unwrap();

        Arc::new(AppState {
            resolver: MappingResolver::new(combos, singles),
            output: dir.path().join("cleaned_sales_data.csv"),
            split_quantity: false,
            last_run: Mutex::new(None),
        })
    }

    fn upload_request(parts: &[(&str, &str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state(&dir), 1024 * 1024).oneshot(get_request("/api/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"], "OK");
    }

    #[tokio::test]
    async fn test_upload_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let request = upload_request(&[("flipkart_file", "fk.csv", FLIPKART)]);

        let response = app(state(&dir), 1024 * 1024).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Please upload both Flipkart and Amazon CSV files");
        assert!(!dir.path().join("cleaned_sales_data.csv").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let request = upload_request(&[
            ("flipkart_file", "fk.csv", FLIPKART),
            ("amazon_file", "", AMAZON),
        ]);

        let response = app(state(&dir), 1024 * 1024).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "One or both files are missing");
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);

        let request = upload_request(&[
            ("flipkart_file", "fk.csv", FLIPKART),
            ("amazon_file", "amz.csv", AMAZON),
        ]);
        let response = app(state.clone(), 1024 * 1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["message"], "Data processed successfully!");
        assert_eq!(json["data"]["summary"]["counts"]["input_rows"], 2);
        assert_eq!(json["data"]["summary"]["counts"]["output_rows"], 4);

        let response = app(state.clone(), 1024 * 1024).oneshot(get_request("/download")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"cleaned_sales_data.csv\""));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            String::from_utf8(bytes.to_vec()).unwrap(),
            "SKU,Quantity,Date,Marketplace\n\
             A,2,2024-02-05,Flipkart\n\
             A,2,2024-02-05,Flipkart\n\
             B,2,2024-02-05,Flipkart\n\
             MSKU-Z,3,2024-02-07,Amazon\n"
        );

        let response = app(state, 1024 * 1024).oneshot(get_request("/api/summary")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["counts"]["combo"], 1);
        println!("✅ Upload → download round trip");
    }

    #[tokio::test]
    async fn test_schema_error_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let request = upload_request(&[
            ("flipkart_file", "fk.csv", "SKU,Quantity\nA,1\n"),
            ("amazon_file", "amz.csv", AMAZON),
        ]);

        let response = app(state(&dir), 1024 * 1024).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Ordered On"));
        assert!(!dir.path().join("cleaned_sales_data.csv").exists());
    }

    #[tokio::test]
    async fn test_download_before_any_run() {
        let dir = tempfile::tempdir().unwrap();

        let response = app(state(&dir), 1024 * 1024).oneshot(get_request("/download")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app(state(&dir), 1024 * 1024).oneshot(get_request("/api/summary")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
