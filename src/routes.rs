use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::document::{LearningRecord, UploadedImage, DOCX_MIME};
use crate::error::AppError;
use crate::gemini::{render_generation, GeminiClient, ImageInput};

pub const DOWNLOAD_FILENAME: &str = "learning.docx";

pub struct AppState {
    pub gemini: GeminiClient,
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index).post(generate_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Parsed form: all image parts in order plus the trimmed text field.
#[derive(Debug, Default)]
struct UploadForm {
    images: Vec<UploadedImage>,
    user_input: String,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("images") => {
                    let filename = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?.to_vec();
                    form.images.push(UploadedImage {
                        filename,
                        content_type,
                        bytes,
                    });
                }
                Some("user_input") => {
                    form.user_input = field.text().await?.trim().to_string();
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// The first upload, if named and non-empty, is what Gemini gets to see.
    fn representative_image(&self) -> Option<ImageInput> {
        let first = self.images.first().filter(|first| !first.bytes.is_empty())?;
        let name = first.name()?;
        Some(ImageInput {
            bytes: first.bytes.clone(),
            filename: Some(name.to_string()),
            content_type: first.content_type.clone(),
        })
    }
}

async fn generate_document(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = UploadForm::read(multipart).await?;
    tracing::info!(
        images = form.images.len(),
        input_chars = form.user_input.chars().count(),
        "Received learning record request"
    );

    let image = form.representative_image();
    let generated = render_generation(state.gemini.generate(image.as_ref(), &form.user_input).await);

    let record = LearningRecord::assemble(&generated, &form.images);
    tracing::info!(
        paragraphs = record.paragraphs.len(),
        embedded = record.embedded_count(),
        placeholders = record.placeholder_count(),
        "Assembled learning record"
    );
    let bytes = record.to_docx()?;

    Ok((
        [
            (header::CONTENT_TYPE, DOCX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
            ),
        ],
        bytes,
    ))
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
<!DOCTYPE html>
<html lang="zh-Hant">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>學習歷程紀錄產生器</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Noto Sans TC', sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .container {
            background: white;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
            max-width: 800px;
            width: 100%;
            padding: 40px;
        }

        h1 {
            color: #333;
            margin-bottom: 10px;
            font-size: 2em;
        }

        .subtitle {
            color: #666;
            margin-bottom: 30px;
            font-size: 0.9em;
        }

        label {
            display: block;
            color: #667eea;
            font-weight: 600;
            margin: 20px 0 10px;
        }

        textarea {
            width: 100%;
            min-height: 160px;
            border: 2px solid #e0e0e0;
            border-radius: 10px;
            padding: 12px;
            font-size: 1em;
            resize: vertical;
        }

        .upload-area {
            border: 3px dashed #667eea;
            border-radius: 15px;
            padding: 30px 20px;
            text-align: center;
            background: #f8f9ff;
        }

        .upload-hint {
            color: #999;
            font-size: 0.9em;
            margin-top: 10px;
        }

        #fileList {
            margin-top: 10px;
            color: #333;
            font-size: 0.9em;
        }

        button {
            margin-top: 30px;
            width: 100%;
            padding: 14px;
            border: none;
            border-radius: 10px;
            background: #667eea;
            color: white;
            font-size: 1.1em;
            font-weight: 600;
            cursor: pointer;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>📝 學習歷程紀錄產生器</h1>
        <p class="subtitle">輸入活動資訊並上傳照片，下載自動產生的 Word 文件</p>

        <form id="uploadForm" method="post" action="/" enctype="multipart/form-data">
            <label for="userInput">活動資訊</label>
            <textarea id="userInput" name="user_input" placeholder="例如：參加校園淨灘活動，負責分類垃圾……"></textarea>

            <label for="images">活動照片</label>
            <div class="upload-area">
                <input type="file" id="images" name="images" accept="image/*" multiple>
                <div class="upload-hint">可選擇多張照片，第一張會提供給 AI 參考</div>
                <div id="fileList"></div>
            </div>

            <button type="submit" id="submitButton">產生 Word 文件</button>
        </form>
    </div>

    <script>
        const images = document.getElementById('images');
        const fileList = document.getElementById('fileList');
        const form = document.getElementById('uploadForm');
        const submitButton = document.getElementById('submitButton');

        images.addEventListener('change', () => {
            fileList.textContent = Array.from(images.files).map(f => f.name).join('、');
        });

        form.addEventListener('submit', () => {
            submitButton.textContent = '產生中，請稍候……';
            setTimeout(() => {
                submitButton.textContent = '產生 Word 文件';
            }, 5000);
        });
    </script>
</body>
</html>
        "#,
    )
}
