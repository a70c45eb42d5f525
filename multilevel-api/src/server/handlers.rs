use std::path::PathBuf;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Multipart, Path, State, multipart::MultipartRejection, rejection::JsonRejection,
    },
    http::header,
    response::IntoResponse,
};
use multilevel_core::{
    GeneratedImageRecord, ImageFormat, ImageGenerationRequest, WeatherQuery, WeatherRecord,
    image::DEFAULT_VARIATION_PROMPT, model::default_size,
};
use serde::Serialize;
use serde_json::{Value, json};

use super::{AppState, error::ApiError};

/// Success body shared by the image endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub message: String,
    pub prompt: String,
    pub image_url: String,
    pub filename: String,
}

impl ImageResponse {
    fn new(message: &str, prompt: String, record: GeneratedImageRecord) -> Self {
        Self {
            message: message.to_string(),
            prompt,
            image_url: record.remote_url,
            filename: record.local_filename,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageList {
    pub total: usize,
    pub filenames: Vec<String>,
}

/// Service metadata and the endpoints of each level.
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Multi-Level API",
        "version": env!("CARGO_PKG_VERSION"),
        "levels": [
            {
                "level": 1,
                "name": "Weather and local time",
                "endpoint": "POST /weather",
                "description": "Current weather and local time for a city"
            },
            {
                "level": 2,
                "name": "Generate image",
                "endpoint": "POST /images/generate",
                "description": "Generates an image from a text prompt"
            },
            {
                "level": 3,
                "name": "Edit image",
                "endpoint": "POST /images/edit",
                "description": "Regenerates an uploaded PNG from a prompt; the uploaded pixels are not used"
            }
        ],
        "utilities": [
            { "endpoint": "POST /images/variations", "description": "Creates a seeded variation from a prompt" },
            { "endpoint": "GET /images", "description": "Lists stored images" },
            { "endpoint": "GET /images/generated/{filename}", "description": "Serves a generated image" },
            { "endpoint": "GET /images/edited/{filename}", "description": "Serves an edited image" }
        ]
    }))
}

pub async fn weather(
    State(state): State<AppState>,
    payload: Result<Json<WeatherQuery>, JsonRejection>,
) -> Result<Json<WeatherRecord>, ApiError> {
    let Json(query) = payload?;
    let weather = state.weather.clone();

    let record = detached(async move { weather.get_weather(&query).await }).await?;
    Ok(Json(record))
}

pub async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageGenerationRequest>, JsonRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let Json(request) = payload?;
    let images = state.images.clone();
    let prompt = request.prompt.clone();

    let record = detached(async move {
        images.generate_image(&request.prompt, &request.size, request.quality).await
    })
    .await?;

    Ok(Json(ImageResponse::new("Image generated successfully", prompt, record)))
}

pub async fn edit_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let form = UploadForm::read(multipart?).await?;

    let upload = form
        .image
        .ok_or_else(|| ApiError::BadRequest("an image file is required".to_string()))?;
    upload.require_png()?;

    let prompt = form
        .prompt
        .ok_or_else(|| ApiError::BadRequest("prompt is required".to_string()))?;
    let size = form.size.unwrap_or_else(default_size);
    let images = state.images.clone();
    let edit_prompt = prompt.clone();

    let record = detached(async move {
        let path = stash_upload(&upload.data).await?;
        images.edit_image(Some(path), &edit_prompt, &size).await
    })
    .await?;

    Ok(Json(ImageResponse::new("Image edited successfully", prompt, record)))
}

pub async fn create_variation(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let form = UploadForm::read(multipart?).await?;

    let image = form.image;
    if let Some(upload) = &image {
        upload.require_png()?;
    }

    let prompt = form
        .prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VARIATION_PROMPT.to_string());
    let images = state.images.clone();
    let variation_prompt = prompt.clone();

    let record = detached(async move {
        let path = match image {
            Some(upload) => Some(stash_upload(&upload.data).await?),
            None => None,
        };
        images.create_variation(path, Some(&variation_prompt)).await
    })
    .await?;

    Ok(Json(ImageResponse::new("Image variation created successfully", prompt, record)))
}

pub async fn list_images(State(state): State<AppState>) -> Result<Json<ImageList>, ApiError> {
    let filenames = state.images.store().list().await?;
    Ok(Json(ImageList { total: filenames.len(), filenames }))
}

pub async fn serve_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let not_found = || ApiError::NotFound("image not found".to_string());

    let path = state.images.store().resolve(&filename).await.ok_or_else(not_found)?;
    let data = tokio::fs::read(&path).await?;

    let content_type = ImageFormat::from_filename(&filename)
        .map(|f| f.mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

struct UploadedFile {
    file_name: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    fn require_png(&self) -> Result<(), ApiError> {
        let is_png = self
            .file_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().ends_with(".png"));

        if is_png {
            Ok(())
        } else {
            Err(ApiError::BadRequest("the image must be a PNG file".to_string()))
        }
    }
}

#[derive(Default)]
struct UploadForm {
    image: Option<UploadedFile>,
    prompt: Option<String>,
    size: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("image") => {
                    let file_name = field.file_name().map(str::to_owned);
                    let data = field.bytes().await?;
                    form.image = Some(UploadedFile { file_name, data });
                }
                Some("prompt") => form.prompt = Some(field.text().await?),
                Some("size") => form.size = Some(field.text().await?),
                _ => {}
            }
        }

        Ok(form)
    }
}

/// Runs a client call on its own task and waits for it.
///
/// A client that disconnects drops the handler future, not the task, so the
/// outbound call and the file write still run to completion.
async fn detached<T, F>(call: F) -> Result<T, ApiError>
where
    F: Future<Output = multilevel_core::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::spawn(call).await??)
}

/// Writes the upload to a temporary file that the image client removes.
///
/// The temp path stays armed until the bytes are written, so a failed or
/// interrupted write deletes it.
async fn stash_upload(data: &[u8]) -> multilevel_core::Result<PathBuf> {
    let temp = tempfile::Builder::new()
        .prefix("upload_")
        .suffix(".png")
        .tempfile()?
        .into_temp_path();

    tokio::fs::write(&temp, data).await?;

    Ok(temp.keep().map_err(std::io::Error::from)?)
}
