use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::clients::builder::BuildOutcome;
use crate::error::{AppError, Result};
use crate::services::housekeeping::{discard, staging_path};
use crate::services::placement::{file_name_from_url, locate_existing, place_upload, Placement};
use crate::services::sanitize::make_safe_filename;
use crate::state::AppState;
use crate::web::dto::{DeleteRequest, DeleteResponse, PageFields, PublishResponse};

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

struct StagedFile {
    path: PathBuf,
    original_name: String,
}

#[derive(Default)]
struct UploadForm {
    fields: PageFields,
    file: Option<StagedFile>,
}

/// Multipart upload. Without a `file` part the page must already sit in
/// the pages directory under the name derived from `slug`.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<PublishResponse>> {
    let cfg = &state.config;
    let form = read_upload_form(&cfg.pages_dir, &mut multipart).await?;
    let fields = form.fields.trimmed();
    let original_name = form.file.as_ref().map_or("", |f| f.original_name.as_str());
    let desired = make_safe_filename(&fields.slug, original_name);

    let placement = {
        let _guard = state.placement.lock().await;
        match &form.file {
            Some(staged) => {
                info!(path = %staged.path.display(), original = %staged.original_name, "received upload");
                match place_upload(&cfg.pages_dir, &desired, &staged.path, &cfg.base_url).await {
                    Ok(placed) => placed,
                    Err(e) => {
                        discard(&staged.path).await;
                        return Err(e);
                    }
                }
            }
            None => locate_existing(&cfg.pages_dir, &desired, &cfg.base_url).await?,
        }
    };
    publish(&state, placement, &fields).await
}

/// JSON variant for pages copied into place out of band.
pub async fn upload_local(State(state): State<AppState>, Json(fields): Json<PageFields>) -> Result<Json<PublishResponse>> {
    let fields = fields.trimmed();
    if fields.slug.is_empty() {
        return Err(AppError::Validation("missing slug".into()));
    }
    let cfg = &state.config;
    let desired = make_safe_filename(&fields.slug, "");
    let placement = locate_existing(&cfg.pages_dir, &desired, &cfg.base_url).await?;
    publish(&state, placement, &fields).await
}

pub async fn delete(State(state): State<AppState>, Json(req): Json<DeleteRequest>) -> Result<Json<DeleteResponse>> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(AppError::Validation("missing url".into()));
    }
    let name = file_name_from_url(url)
        .ok_or_else(|| AppError::Validation("cannot resolve a file name from url".into()))?;

    let path = state.config.pages_dir.join(&name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => info!(path = %path.display(), "removed page file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "page file not found");
        }
        Err(source) => return Err(AppError::Removal { path, source }),
    }

    let remaining = state.index.delete(url).await?;
    let build = state.builder.trigger().await;
    ensure_built(&build)?;
    Ok(Json(DeleteResponse { ok: true, url: url.to_string(), remaining, build_ok: build.ok }))
}

pub async fn rebuild(State(state): State<AppState>) -> (StatusCode, Json<BuildOutcome>) {
    let outcome = state.builder.trigger().await;
    let status = if outcome.ok { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    (status, Json(outcome))
}

async fn publish(state: &AppState, placement: Placement, fields: &PageFields) -> Result<Json<PublishResponse>> {
    let record = placement
        .to_record(&fields.title, &fields.description, &fields.image)
        .await?;
    let count = state.index.upsert(record).await?;
    info!(file = %placement.file_name, url = %placement.url, records = count, "published page");

    let build = state.builder.trigger().await;
    ensure_built(&build)?;
    Ok(Json(PublishResponse {
        ok: true,
        file: placement.file_name,
        url: placement.url,
        build_ok: build.ok,
    }))
}

fn ensure_built(build: &BuildOutcome) -> Result<()> {
    if build.ok { Ok(()) } else { Err(AppError::Build(build.describe())) }
}

async fn read_upload_form(dir: &Path, multipart: &mut Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();
    let read = async {
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" if form.file.is_none() => {
                    let original_name = field.file_name().unwrap_or_default().to_string();
                    let path = staging_path(dir);
                    form.file = Some(StagedFile { path: path.clone(), original_name });
                    let written = stream_to(&path, field).await?;
                    // Browsers send an empty, unnamed part when no file was picked.
                    if written == 0 && form.file.as_ref().is_some_and(|f| f.original_name.is_empty()) {
                        discard(&path).await;
                        form.file = None;
                    }
                }
                "slug" => form.fields.slug = field.text().await?,
                "title" => form.fields.title = field.text().await?,
                "description" => form.fields.description = field.text().await?,
                "image" => form.fields.image = field.text().await?,
                _ => {}
            }
        }
        Ok::<(), AppError>(())
    }
    .await;

    if let Err(e) = read {
        if let Some(staged) = &form.file {
            discard(&staged.path).await;
        }
        return Err(e);
    }
    Ok(form)
}

async fn stream_to(path: &Path, mut field: Field<'_>) -> Result<u64> {
    let mut out = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("create {}", path.display()))?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        out.write_all(&chunk)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        written += chunk.len() as u64;
    }
    out.flush().await.with_context(|| format!("flush {}", path.display()))?;
    Ok(written)
}
