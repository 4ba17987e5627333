//! Request handlers

use super::identity::Identity;
use super::AppState;
use crate::credentials::{kubeconfig_path, CredentialRetriever};
use crate::endpoint::{EndpointResolver, ResolveMode};
use crate::error::ProvisionError;
use crate::inventory::InventoryBuilder;
use crate::orchestrator::{Orchestrator, ProvisioningRequest};
use crate::poll::PollPolicy;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use vcluster_types::{namespace_for, validate_cluster_name, VirtualClusterSpec};

/// Cookie carrying the id of the caller's last creation request.
pub const REQUEST_ID_COOKIE: &str = "reqid";

const OCTET_STREAM: &str = "application/octet-stream";

/// Form fields of a creation request.
#[derive(Debug, Default)]
struct CreateForm {
    cluster_name: String,
    high_availability: bool,
    load_balancer: bool,
    kubeconfig_file: Option<Vec<u8>>,
}

impl CreateForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ProvisionError> {
        let malformed = |e: axum::extract::multipart::MultipartError| {
            ProvisionError::Input(format!("Error parsing multipart form: {e}"))
        };

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "clusterName" => form.cluster_name = field.text().await.map_err(malformed)?.trim().to_string(),
                "ha" => form.high_availability = field.text().await.map_err(malformed)? == "on",
                "loadbalancer" => form.load_balancer = field.text().await.map_err(malformed)? == "on",
                "kubeconfigFile" => {
                    let bytes = field.bytes().await.map_err(malformed)?;
                    form.kubeconfig_file = (!bytes.is_empty()).then(|| bytes.to_vec());
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

/// `POST /api/vcluster`
pub async fn create_cluster(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<Response, ProvisionError> {
    let form = CreateForm::read(multipart).await?;
    validate_cluster_name(&form.cluster_name)?;

    let request_id = new_request_id();
    let mut request = ProvisioningRequest::new(&request_id, state.config.request_dir(&request_id));
    tokio::fs::create_dir_all(&request.working_dir).await?;
    if let Some(upload) = &form.kubeconfig_file {
        request.save_upload(upload).await?;
    }
    let credentials = state.config.create_credentials(request.uploaded_credentials.clone());

    info!(
        request_id = %request_id,
        user = %identity.as_str(),
        cluster = %form.cluster_name,
        ha = form.high_availability,
        load_balancer = form.load_balancer,
        credentials = ?credentials,
        "create requested"
    );

    let spec = VirtualClusterSpec::new(&form.cluster_name, form.high_availability, form.load_balancer);
    let host = state.connector.connect(credentials.as_deref());
    let kubeconfig = Orchestrator::new(host, state.config.policy)
        .provision(&request, &spec, identity.as_str(), &state.shutdown.child_token())
        .await?;

    let cookie = format!("{REQUEST_ID_COOKIE}={request_id}; Path=/");
    let body = json!({ "kubeconfig": String::from_utf8_lossy(&kubeconfig) });
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// `GET /api/vcluster/{name}/kubeconfig`
pub async fn get_kubeconfig(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ProvisionError> {
    validate_cluster_name(&name)?;
    let doc = CredentialRetriever::new(state.read_host(), state.config.policy)
        .fetch_live(&name, &namespace_for(&name))
        .await?;
    Ok(attachment(&format!("kubeconfig-{name}.yaml"), doc))
}

/// `GET /api/vcluster/{name}/endpoint`
pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ProvisionError> {
    validate_cluster_name(&name)?;
    let namespace = namespace_for(&name);
    let resolver = EndpointResolver::new(state.read_host(), PollPolicy::once());

    let mode = resolver.detect_mode(&name, &namespace).await?;
    let endpoint = resolver
        .resolve(&name, &namespace, mode, &state.shutdown.child_token())
        .await
        .map_err(|e| match e {
            ProvisionError::Timeout { what, .. } => ProvisionError::Unavailable(what),
            other => other,
        })?;

    Ok(Json(json!({
        "endpoint": endpoint.uri(),
        "external": mode == ResolveMode::External,
    })))
}

/// `DELETE /api/vcluster/{name}`
pub async fn delete_cluster(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ProvisionError> {
    validate_cluster_name(&name)?;
    Orchestrator::new(state.read_host(), state.config.policy)
        .delete(&name)
        .await?;
    Ok(Json(json!({ "message": "Cluster deleted successfully" })))
}

/// `GET /api/vclusters`
///
/// Never fails: any error yields an empty list.
pub async fn list_clusters(State(state): State<AppState>, identity: Identity) -> Response {
    match InventoryBuilder::new(state.read_host()).list(identity.as_str()).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            warn!(user = %identity.as_str(), error = %e, "listing failed, returning empty list");
            Json(Vec::<serde_json::Value>::new()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(rename = "clusterName")]
    cluster_name: Option<String>,
}

/// `GET /download?clusterName=X`
///
/// Serves the kubeconfig stored by the caller's last creation request.
pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ProvisionError> {
    let request_id = cookie(&headers, REQUEST_ID_COOKIE)
        .ok_or_else(|| ProvisionError::Input("Request ID not set".to_string()))?;
    if !request_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProvisionError::Input(format!("invalid request id '{request_id}'")));
    }
    let name = query
        .cluster_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ProvisionError::Input("clusterName query parameter required".to_string()))?;
    validate_cluster_name(&name)?;

    let path = kubeconfig_path(&state.config.request_dir(&request_id), &name);
    let doc = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ProvisionError::Unavailable(format!("kubeconfig of {name}")),
        _ => ProvisionError::Io(e),
    })?;
    Ok(attachment("kubeconfig.yaml", doc))
}

fn attachment(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, OCTET_STREAM.to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={filename}")),
        ],
        body,
    )
        .into_response()
}

/// Value of cookie `name`, if sent.
fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Nanoseconds since the epoch.
fn new_request_id() -> String {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000))
        .to_string()
}
