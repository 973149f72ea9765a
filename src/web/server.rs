use axum::http::header;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use crate::acquire::session::{acquire_window_id, Credentials};
use crate::cli::ServeArgs;
use crate::core::config::{ContextColumns, IdColumns, ReconConfig};
use crate::core::rule::{ComparisonRule, RuleSet};
use crate::export::links::DEFAULT_WINDOW_ID;
use crate::export::{write_table_bytes, CountyLinks};
use crate::parsing::load_dataset_bytes;
use crate::recon::report::{reconcile, ReconReport, ResultSet};
use crate::utils::validation::validate_upload;

/// Security configuration constants to prevent `DoS` attacks
pub const MAX_MULTIPART_FIELDS: usize = 12;
pub const MAX_FILE_FIELD_SIZE: usize = 16 * 1024 * 1024; // 16MB
pub const MAX_TEXT_FIELD_SIZE: usize = 1024 * 1024; // 1MB

/// Shared application state
pub struct AppState {
    pub default_rules: RuleSet,
}

/// Enhanced error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub details: Option<String>,
}

/// Create a safe error response that prevents information disclosure
/// while logging detailed errors server-side for debugging
pub fn create_safe_error_response(
    error_type: &str,
    user_message: &str,
    internal_error: Option<&str>,
) -> ErrorResponse {
    if let Some(internal_msg) = internal_error {
        tracing::error!("Internal error ({}): {}", error_type, internal_msg);
    }

    ErrorResponse {
        error: user_message.to_string(),
        error_type: error_type.to_string(),
        details: None, // Never expose internal details to clients
    }
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the tokio runtime cannot be created or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(args).await })
}

/// Create the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns an error if the rate limiter configuration is invalid.
pub fn create_router() -> anyhow::Result<Router> {
    let state = Arc::new(AppState {
        default_rules: RuleSet::default_property_rules(),
    });

    // Configure IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10) // 10 requests per second per IP
        .burst_size(50) // Allow bursts of 50 requests
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?;

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/compare", post(compare_handler))
        .route("/api/export", post(export_handler))
        .route("/api/session-id", post(session_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // Security headers for browser protection
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ))
                // IP-based rate limiting to prevent abuse
                .layer(GovernorLayer {
                    config: Arc::new(governor_conf),
                })
                // Request timeout; comparisons are fast but uploads may not be
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(60),
                ))
                // Limit concurrent requests to prevent DOS
                .layer(ConcurrencyLimitLayer::new(100))
                // Two files plus multipart overhead
                .layer(DefaultBodyLimit::max(40 * 1024 * 1024)),
        );

    Ok(app)
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let app = create_router()?;

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting parcel-recon web server at http://{addr}");

    if args.open {
        let _ = open::that(format!("http://{addr}"));
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Main page handler
async fn index_handler() -> Html<&'static str> {
    Html(include_str!("templates/index.html"))
}

/// One uploaded spreadsheet
struct UploadedFile {
    bytes: Vec<u8>,
    filename: Option<String>,
}

/// Everything extracted from the compare/export multipart form
struct CompareRequest {
    mls: UploadedFile,
    cama: UploadedFile,
    ids: IdColumns,
    config: ReconConfig,
    rules: Option<RuleSet>,
    window_id: String,
}

/// Query parameters for the export endpoint
#[derive(Deserialize)]
struct ExportParams {
    /// Which result set to download
    set: String,
}

/// API endpoint: run one reconciliation and return all four result sets
async fn compare_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let start_time = std::time::Instant::now();

    let request = match extract_compare_request(&mut multipart).await {
        Ok(request) => request,
        Err(error_response) => return error_response,
    };

    let report = match run_comparison(&state, &request) {
        Ok(report) => report,
        Err(error_response) => return *error_response,
    };

    #[allow(clippy::cast_possible_truncation)] // Processing time won't exceed u64
    let processing_time = start_time.elapsed().as_millis() as u64;

    Json(serde_json::json!({
        "summary": {
            "missing_in_cama": report.missing_in_cama.len(),
            "missing_in_mls": report.missing_in_mls.len(),
            "mismatches": report.mismatches.len(),
            "perfect_matches": report.perfect_matches.len(),
        },
        "stats": report.stats,
        "results": {
            "missing_in_cama": report.missing_in_cama,
            "missing_in_mls": report.missing_in_mls,
            "mismatches": report.mismatches,
            "perfect_matches": report.perfect_matches,
        },
        "processing_info": {
            "processing_time_ms": processing_time,
            "configuration": {
                "tolerance": request.config.tolerance,
                "skip_zeros": request.config.skip_zeros,
                "mls_id": request.ids.mls,
                "cama_id": request.ids.cama,
            }
        }
    }))
    .into_response()
}

/// API endpoint: re-run the comparison and download one result set as xlsx.
///
/// The server keeps no state between requests (a comparison run has no
/// persistence), so the client re-posts the same form for each download.
async fn export_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
    mut multipart: Multipart,
) -> Response {
    let Ok(set) = params.set.parse::<ResultSet>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(create_safe_error_response(
                "invalid_result_set",
                "Unknown result set requested",
                Some(&params.set),
            )),
        )
            .into_response();
    };

    let request = match extract_compare_request(&mut multipart).await {
        Ok(request) => request,
        Err(error_response) => return error_response,
    };

    let report = match run_comparison(&state, &request) {
        Ok(report) => report,
        Err(error_response) => return *error_response,
    };

    let table = report.table(set);
    let links = CountyLinks::new(&request.window_id);
    let bytes = match write_table_bytes(&table, set.title(), Some(&links)) {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(create_safe_error_response(
                    "export_failed",
                    "Could not generate the Excel report",
                    Some(&e.to_string()),
                )),
            )
                .into_response();
        }
    };

    (
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.xlsx\"", set.file_stem()),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[derive(Deserialize)]
struct SessionRequest {
    username: Option<String>,
    password: Option<String>,
    fallback: Option<String>,
}

/// API endpoint: acquire a county windowId.
///
/// The extraction is blocking network I/O, so it runs on the blocking pool,
/// never on the async workers serving comparisons.
async fn session_handler(Json(request): Json<SessionRequest>) -> Response {
    let credentials = match (request.username, request.password) {
        (Some(username), Some(password)) if !username.trim().is_empty() => {
            Some(Credentials { username, password })
        }
        _ => None,
    };
    let fallback = request.fallback;

    let result = tokio::task::spawn_blocking(move || {
        acquire_window_id(credentials.as_ref(), fallback.as_deref())
    })
    .await;

    match result {
        Ok(Some(window_id)) => Json(serde_json::json!({ "window_id": window_id })).into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "window_id": null,
                "error": "Extraction failed; copy a windowId from a county property page URL",
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(create_safe_error_response(
                "session_task_failed",
                "windowId extraction did not complete",
                Some(&e.to_string()),
            )),
        )
            .into_response(),
    }
}

/// Parse both uploads and run the reconciliation for one request.
fn run_comparison(
    state: &AppState,
    request: &CompareRequest,
) -> Result<ReconReport, Box<Response>> {
    let mls = load_dataset_bytes(&request.mls.bytes, request.mls.filename.as_deref())
        .map_err(|e| upload_error("mls_parse_failed", "Could not parse the MLS file", &e))?;
    let cama = load_dataset_bytes(&request.cama.bytes, request.cama.filename.as_deref())
        .map_err(|e| upload_error("cama_parse_failed", "Could not parse the CAMA file", &e))?;

    let rules = request.rules.as_ref().unwrap_or(&state.default_rules);

    reconcile(
        &mls,
        &cama,
        &request.ids,
        rules,
        &ContextColumns::default(),
        &request.config,
    )
    .map_err(|e| {
        Box::new(
            (
                StatusCode::BAD_REQUEST,
                Json(create_safe_error_response(
                    "configuration_error",
                    &e.to_string(),
                    None,
                )),
            )
                .into_response(),
        )
    })
}

fn upload_error(
    error_type: &str,
    message: &str,
    error: &crate::parsing::ParseError,
) -> Box<Response> {
    Box::new(
        (
            StatusCode::BAD_REQUEST,
            Json(create_safe_error_response(
                error_type,
                message,
                Some(&error.to_string()),
            )),
        )
            .into_response(),
    )
}

/// Extract both uploads and all settings from the multipart form
async fn extract_compare_request(
    multipart: &mut Multipart,
) -> Result<CompareRequest, Response> {
    let mut mls: Option<UploadedFile> = None;
    let mut cama: Option<UploadedFile> = None;
    let mut ids = IdColumns::default();
    let mut config = ReconConfig::default();
    let mut rules: Option<RuleSet> = None;
    let mut window_id = DEFAULT_WINDOW_ID.to_string();

    let mut fields_received = 0usize;

    loop {
        if fields_received >= MAX_MULTIPART_FIELDS {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Too many form fields".to_string(),
                    error_type: "field_limit_exceeded".to_string(),
                    details: None,
                }),
            )
                .into_response());
        }

        match multipart.next_field().await {
            Ok(Some(field)) => {
                fields_received += 1;
                let name = field.name().unwrap_or_default().to_string();

                match name.as_str() {
                    "mls_file" | "cama_file" => {
                        let filename = field.file_name().map(std::string::ToString::to_string);
                        let bytes = match field.bytes().await {
                            Ok(bytes) => bytes,
                            Err(_) => {
                                return Err(bad_upload("upload_read_failed", &name));
                            }
                        };
                        if bytes.len() > MAX_FILE_FIELD_SIZE {
                            return Err((
                                StatusCode::PAYLOAD_TOO_LARGE,
                                Json(ErrorResponse {
                                    error: "File size exceeds limit".to_string(),
                                    error_type: "file_too_large".to_string(),
                                    details: None,
                                }),
                            )
                                .into_response());
                        }

                        let validated = match validate_upload(filename.as_deref(), &bytes) {
                            Ok(validated) => validated,
                            Err(e) => {
                                return Err((
                                    StatusCode::BAD_REQUEST,
                                    Json(create_safe_error_response(
                                        "upload_validation_failed",
                                        &e.to_string(),
                                        None,
                                    )),
                                )
                                    .into_response());
                            }
                        };

                        let upload = UploadedFile {
                            bytes: bytes.to_vec(),
                            filename: validated,
                        };
                        if name == "mls_file" {
                            mls = Some(upload);
                        } else {
                            cama = Some(upload);
                        }
                    }
                    "mls_id" => {
                        if let Some(text) = read_text_field(field).await {
                            if !text.trim().is_empty() {
                                ids.mls = text.trim().to_string();
                            }
                        }
                    }
                    "cama_id" => {
                        if let Some(text) = read_text_field(field).await {
                            if !text.trim().is_empty() {
                                ids.cama = text.trim().to_string();
                            }
                        }
                    }
                    "tolerance" => {
                        if let Some(text) = read_text_field(field).await {
                            if let Ok(tolerance) = text.trim().parse::<f64>() {
                                config.tolerance = tolerance.max(0.0);
                            }
                        }
                    }
                    "skip_zeros" => {
                        if let Some(text) = read_text_field(field).await {
                            config.skip_zeros =
                                matches!(text.trim(), "true" | "on" | "1" | "yes");
                        }
                    }
                    "rules" => {
                        if let Some(text) = read_text_field(field).await {
                            match serde_json::from_str::<Vec<ComparisonRule>>(&text) {
                                Ok(parsed) if !parsed.is_empty() => {
                                    rules = Some(RuleSet::new(parsed));
                                }
                                Ok(_) => {}
                                Err(_) => {
                                    return Err((
                                        StatusCode::BAD_REQUEST,
                                        Json(create_safe_error_response(
                                            "invalid_rules",
                                            "Could not parse the comparison rules JSON",
                                            None,
                                        )),
                                    )
                                        .into_response());
                                }
                            }
                        }
                    }
                    "window_id" => {
                        if let Some(text) = read_text_field(field).await {
                            if !text.trim().is_empty() {
                                window_id = text.trim().to_string();
                            }
                        }
                    }
                    _ => {} // Ignore unknown fields
                }
            }
            Ok(None) => break,
            Err(_) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(create_safe_error_response(
                        "multipart_parse_failed",
                        "Failed to parse upload. Please check the form data.",
                        None,
                    )),
                )
                    .into_response());
            }
        }
    }

    let (Some(mls), Some(cama)) = (mls, cama) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(create_safe_error_response(
                "missing_input",
                "Both an MLS file and a CAMA file are required.",
                None,
            )),
        )
            .into_response());
    };

    Ok(CompareRequest {
        mls,
        cama,
        ids,
        config,
        rules,
        window_id,
    })
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Option<String> {
    match field.text().await {
        Ok(text) if text.len() <= MAX_TEXT_FIELD_SIZE => Some(text),
        _ => None,
    }
}

fn bad_upload(error_type: &str, field: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(create_safe_error_response(
            error_type,
            "Failed to read the uploaded file",
            Some(field),
        )),
    )
        .into_response()
}
