// HTTP request handlers
use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue, CONTENT_TYPE,
};
use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info};

use crate::api::models::{DeleteResponse, ErrorBody, FileListResponse, FileRecord, FilenameQuery, UploadResponse};
use crate::app_state::AppState;
use crate::error::ApiError;
use crate::service::parse_multipart;
use crate::storage::naming::guess_mime_type;

/// Tag log lines of the current request with an id and the operation name.
///
/// The tags are thread-local and are restored when the returned guard drops.
fn begin_request(req: &HttpRequest, op: &str) -> log_mdc::ExtendGuard {
    let request_id = format!("{:08x}", rand::random::<u32>());
    let guard = log_mdc::extend_scoped(vec![("request_id", request_id), ("op", op.to_string())]);
    debug!("{} {}", req.method(), req.uri());
    guard
}

fn required_filename(query: &FilenameQuery) -> Result<&str, ApiError> {
    match query.filename.as_deref() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(ApiError::InvalidRequest("Filename is required".to_string())),
    }
}

fn attachment(original_name: &str) -> ContentDisposition {
    let mut parameters = vec![DispositionParam::Filename(original_name.to_string())];
    if !original_name.is_ascii() {
        parameters.push(DispositionParam::FilenameExt(ExtendedValue {
            charset: Charset::Ext("UTF-8".to_string()),
            language_tag: None,
            value: original_name.as_bytes().to_vec(),
        }));
    }
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters,
    }
}

/// POST /upload
pub async fn upload_files(
    req: HttpRequest,
    payload: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let _mdc = begin_request(&req, "upload");
    let limits = app_state.config.upload_limits();
    let content_type = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    let files = parse_multipart(content_type, payload, &limits).await?;
    if files.is_empty() {
        return Err(ApiError::InvalidRequest("No files uploaded".to_string()));
    }

    let stored = app_state.storage_service.store_files(files).await?;
    let files: Vec<FileRecord> = stored.iter().map(FileRecord::from).collect();
    info!("Uploaded {} file(s)", files.len());
    Ok(HttpResponse::Ok().json(UploadResponse {
        success: true,
        count: files.len(),
        message: format!("{} file(s) uploaded successfully", files.len()),
        files,
    }))
}

/// GET /files
pub async fn list_files(req: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let _mdc = begin_request(&req, "list");
    let stored = app_state.storage_service.list_files().await?;
    let files: Vec<FileRecord> = stored.iter().map(FileRecord::from).collect();
    debug!("Listing {} file(s)", files.len());
    Ok(HttpResponse::Ok().json(FileListResponse {
        success: true,
        count: files.len(),
        files,
    }))
}

async fn download(name: &str, app_state: &AppState) -> Result<HttpResponse, ApiError> {
    let (original_name, data) = app_state.storage_service.fetch_file(name).await?;
    info!("Serving {} ({} bytes)", name, data.len());
    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .insert_header(attachment(&original_name))
        .body(data))
}

/// GET /download?filename=X
pub async fn download_by_query(
    req: HttpRequest,
    query: web::Query<FilenameQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let _mdc = begin_request(&req, "download");
    download(required_filename(&query)?, &app_state).await
}

/// GET /files/{filename}
pub async fn download_by_path(
    req: HttpRequest,
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let _mdc = begin_request(&req, "download");
    download(&path.into_inner(), &app_state).await
}

/// GET /uploads/{filename}: the file itself, rendered inline
pub async fn serve_upload(
    req: HttpRequest,
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let _mdc = begin_request(&req, "serve");
    let name = path.into_inner();
    let (_, data) = app_state.storage_service.fetch_file(&name).await?;
    Ok(HttpResponse::Ok()
        .content_type(guess_mime_type(&name))
        .body(data))
}

async fn delete_one(name: &str, app_state: &AppState) -> Result<HttpResponse, ApiError> {
    app_state.storage_service.remove_file(name).await?;
    info!("Deleted {}", name);
    Ok(HttpResponse::Ok().json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
        deleted: 1,
    }))
}

/// DELETE /files, or DELETE /files?filename=X for a single entry
pub async fn delete_files(
    req: HttpRequest,
    query: web::Query<FilenameQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    if query.filename.is_some() {
        let _mdc = begin_request(&req, "delete");
        return delete_one(required_filename(&query)?, &app_state).await;
    }

    let _mdc = begin_request(&req, "clear");
    let deleted = app_state.storage_service.clear_files().await?;
    info!("Cleared {} file(s)", deleted);
    Ok(HttpResponse::Ok().json(DeleteResponse {
        success: true,
        message: format!("{} file(s) cleared", deleted),
        deleted,
    }))
}

/// DELETE /files/{filename}
pub async fn delete_by_path(
    req: HttpRequest,
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let _mdc = begin_request(&req, "delete");
    delete_one(&path.into_inner(), &app_state).await
}

/// DELETE /delete?filename=X
pub async fn delete_by_query(
    req: HttpRequest,
    query: web::Query<FilenameQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let _mdc = begin_request(&req, "delete");
    delete_one(required_filename(&query)?, &app_state).await
}

/// Known path, unsupported method. Answers CORS preflight requests.
pub async fn method_fallback(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    if req.method() == Method::OPTIONS {
        return Ok(HttpResponse::Ok().finish());
    }
    Err(ApiError::MethodNotAllowed)
}

/// Unknown path. Answers CORS preflight requests.
pub async fn route_fallback(req: HttpRequest) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        return HttpResponse::Ok().finish();
    }
    HttpResponse::NotFound().json(ErrorBody {
        error: "Route not found".to_string(),
        details: Some(req.path().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_filename() {
        let missing = FilenameQuery { filename: None };
        let empty = FilenameQuery {
            filename: Some(String::new()),
        };
        let present = FilenameQuery {
            filename: Some("1-1-a.txt".to_string()),
        };
        assert!(matches!(required_filename(&missing), Err(ApiError::InvalidRequest(_))));
        assert!(matches!(required_filename(&empty), Err(ApiError::InvalidRequest(_))));
        assert_eq!(required_filename(&present).unwrap(), "1-1-a.txt");
    }

    #[test]
    fn test_request_tags_are_cleared_after_handler() {
        let req = actix_web::test::TestRequest::get().uri("/files").to_http_request();
        {
            let _mdc = begin_request(&req, "list");
            assert_eq!(log_mdc::get("op", |v| v.map(str::to_string)), Some("list".to_string()));
            assert!(log_mdc::get("request_id", |v| v.is_some()));
        }
        assert!(log_mdc::get("op", |v| v.is_none()));
        assert!(log_mdc::get("request_id", |v| v.is_none()));
    }

    #[test]
    fn test_attachment_header() {
        let header = attachment("report.pdf");
        assert!(header.is_attachment());
        assert_eq!(header.get_filename(), Some("report.pdf"));

        let header = attachment("résumé.pdf");
        assert!(header.get_filename_ext().is_some());
    }
}
