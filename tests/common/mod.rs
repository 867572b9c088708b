//! Shared fixtures: a minimal completion server and synthetic CAPTCHA images.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{Rgb, RgbImage};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the mock server sends back for one request.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn content(text: &str) -> Self {
        Self {
            status: 200,
            body: serde_json::json!({ "content": text, "stop": true }).to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: r#"{"error":"server error"}"#.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = dyn Fn(&serde_json::Value) -> MockResponse + Send + Sync;

/// In-process HTTP/1.1 server answering every POST with the responder's output.
pub struct MockServer {
    pub url: String,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MockServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&serde_json::Value) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond: Arc<Responder> = Arc::new(respond);

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let recorded = Arc::clone(&recorded);
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let _ = handle_connection(stream, recorded, respond).await;
                });
            }
        });

        Self {
            url: format!("http://{}/completion", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    recorded: Arc<Mutex<Vec<serde_json::Value>>>,
    respond: Arc<Responder>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = &buf[header_end..(header_end + content_length).min(buf.len())];
    let request: serde_json::Value = serde_json::from_slice(body).unwrap_or(serde_json::Value::Null);
    let response = respond(&request);
    recorded.lock().unwrap().push(request);

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let head = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(response.body.as_bytes()).await?;
    stream.shutdown().await
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Red channel painted into tile `index` of a synthetic CAPTCHA.
fn tile_red(index: usize) -> u8 {
    10 + index as u8 * 25
}

/// A square image whose 9 tiles are flat colours that encode their index.
pub fn indexed_captcha(side: u32) -> RgbImage {
    let tile = side / 3;
    RgbImage::from_fn(side, side, |x, y| {
        let col = (x / tile).min(2);
        let row = (y / tile).min(2);
        let index = (row * 3 + col) as usize;
        Rgb([tile_red(index), 60, 60])
    })
}

pub fn write_captcha(dir: &TempDir, side: u32) -> PathBuf {
    let path = dir.path().join("captcha.png");
    indexed_captcha(side).save(&path).unwrap();
    path
}

pub fn write_image(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join(name);
    RgbImage::from_pixel(width, height, Rgb([90, 90, 90]))
        .save(&path)
        .unwrap();
    path
}

/// Recover the tile index from the image a request carries.
pub fn tile_index(request: &serde_json::Value) -> Option<usize> {
    let data = request["image_data"][0]["data"].as_str()?;
    let bytes = STANDARD.decode(data).ok()?;
    let image = image::load_from_memory(&bytes).ok()?.to_rgb8();
    let (w, h) = image.dimensions();
    let red = image.get_pixel(w / 2, h / 2)[0] as f32;
    let index = ((red - 10.0) / 25.0).round();
    (0.0..=8.0).contains(&index).then_some(index as usize)
}

/// Answer "1" for the given tiles and "0" for the rest.
pub fn select_tiles(selected: &'static [usize]) -> impl Fn(&serde_json::Value) -> MockResponse + Send + Sync {
    move |request| match tile_index(request) {
        Some(i) if selected.contains(&i) => MockResponse::content("1"),
        _ => MockResponse::content("0"),
    }
}
