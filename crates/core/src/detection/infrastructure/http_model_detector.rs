use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::detection::domain::fish_detector::{DetectionError, FishDetector};
use crate::detection::domain::model_output::{NormalizedDetection, DEFAULT_MODEL_SCORE};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{BACKEND_DETECT_TIMEOUT_SECS, BACKEND_HEALTH_TIMEOUT_SECS};
use crate::shared::frame::Frame;

const JPEG_QUALITY: u8 = 80;

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    model_loaded: bool,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    detections: Vec<WireDetection>,
    image_size: Option<WireSize>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct WireDetection {
    /// `[y1, x1, y2, x2]`, normalized.
    bbox: [f64; 4],
    score: Option<f64>,
}

#[derive(Deserialize)]
struct WireSize {
    width: u32,
    height: u32,
}

/// Detector backed by a remote inference service.
///
/// `GET {base}/health` must report `model_loaded: true` before the detector
/// is handed out; each `detect` posts `{"imageData": <base64 JPEG>}` to
/// `{base}/detect`.
pub struct HttpModelDetector {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpModelDetector {
    /// Connects and health-checks the service.
    pub fn connect(base_url: &str) -> Result<Self, DetectionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(BACKEND_DETECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DetectionError::BackendUnavailable(e.to_string()))?;
        let detector = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        };
        detector.health_check()?;
        Ok(detector)
    }

    pub fn health_check(&self) -> Result<(), DetectionError> {
        let body = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(BACKEND_HEALTH_TIMEOUT_SECS))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(unavailable)?;
        let health: HealthResponse = serde_json::from_str(&body)
            .map_err(|e| DetectionError::BackendUnavailable(format!("bad health response: {e}")))?;
        if !health.model_loaded {
            return Err(DetectionError::BackendUnavailable(
                "model not loaded".to_string(),
            ));
        }
        Ok(())
    }
}

impl FishDetector for HttpModelDetector {
    fn name(&self) -> &str {
        "http-model"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError> {
        let body = detect_request_body(frame)?;
        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(unavailable)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(DetectionError::BackendUnavailable(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(DetectionError::Inference(format!("status {status}")));
        }
        let body = response.text().map_err(unavailable)?;
        parse_detect_response(&body, frame.width(), frame.height())
    }
}

fn unavailable(e: reqwest::Error) -> DetectionError {
    DetectionError::BackendUnavailable(e.to_string())
}

pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, DetectionError> {
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder
        .encode(
            frame.data(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(DetectionError::Encode)?;
    Ok(buf)
}

/// JSON payload for `/detect`: the frame as base64 JPEG under `imageData`.
pub fn detect_request_body(frame: &Frame) -> Result<String, DetectionError> {
    let jpeg = encode_jpeg(frame)?;
    Ok(serde_json::json!({ "imageData": BASE64.encode(jpeg) }).to_string())
}

/// Parses a `/detect` body into boxes in the `frame_w` x `frame_h` space.
pub fn parse_detect_response(
    body: &str,
    frame_w: u32,
    frame_h: u32,
) -> Result<Vec<BoundingBox>, DetectionError> {
    let response: DetectResponse = serde_json::from_str(body)
        .map_err(|e| DetectionError::Inference(format!("malformed response: {e}")))?;
    if !response.success {
        return Err(DetectionError::Inference(
            response
                .error
                .unwrap_or_else(|| "backend reported failure".to_string()),
        ));
    }

    let (iw, ih) = response
        .image_size
        .map(|s| (s.width, s.height))
        .unwrap_or((frame_w, frame_h));

    Ok(response
        .detections
        .iter()
        .map(|d| {
            NormalizedDetection::from_yxyx(d.bbox, d.score.unwrap_or(DEFAULT_MODEL_SCORE))
                .to_bounding_box(iw, ih, frame_w, frame_h)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_parse_rescales_from_reported_image_size() {
        let body = r#"{
            "success": true,
            "detections": [{"bbox": [0.25, 0.25, 0.75, 0.75], "score": 0.91, "class": 1}],
            "image_size": {"width": 640, "height": 480}
        }"#;
        let boxes = parse_detect_response(body, 320, 240).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert_eq!((b.x, b.y, b.width, b.height), (80, 60, 160, 120));
        assert_relative_eq!(b.confidence, 0.91);
    }

    #[test]
    fn test_parse_defaults_missing_score_and_size() {
        let body = r#"{"success": true, "detections": [{"bbox": [0.0, 0.0, 0.5, 0.5]}]}"#;
        let boxes = parse_detect_response(body, 200, 100).unwrap();
        assert_eq!((boxes[0].width, boxes[0].height), (100, 50));
        assert_relative_eq!(boxes[0].confidence, 0.5);
    }

    #[test]
    fn test_parse_failure_flag_is_inference_error() {
        let body = r#"{"success": false, "error": "CUDA out of memory"}"#;
        match parse_detect_response(body, 10, 10) {
            Err(DetectionError::Inference(msg)) => assert!(msg.contains("CUDA")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_garbage_is_inference_error() {
        assert!(matches!(
            parse_detect_response("<html>", 10, 10),
            Err(DetectionError::Inference(_))
        ));
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_magic() {
        let frame = Frame::new(vec![100u8; 16 * 8 * 3], 16, 8, 0, 0);
        let jpeg = encode_jpeg(&frame).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_request_body_carries_base64_jpeg() {
        let frame = Frame::new(vec![100u8; 16 * 8 * 3], 16, 8, 0, 0);
        let body: serde_json::Value =
            serde_json::from_str(&detect_request_body(&frame).unwrap()).unwrap();
        let encoded = body["imageData"].as_str().unwrap();
        let jpeg = BASE64.decode(encoded).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(body.as_object().unwrap().len(), 1);
    }

    /// Reads one HTTP request and answers it with `reply` as JSON.
    fn serve_once(listener: &TcpListener, reply: &str) -> (String, String) {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut head = String::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = v.trim().parse().unwrap();
            }
            head.push_str(&line);
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).unwrap();
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.len(),
            reply
        )
        .unwrap();
        (head, String::from_utf8(body).unwrap())
    }

    #[test]
    fn test_detect_posts_json_to_service() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = std::thread::spawn(move || {
            serve_once(&listener, r#"{"model_loaded": true}"#);
            serve_once(
                &listener,
                r#"{"success": true, "detections": [{"bbox": [0.0, 0.0, 0.5, 0.5], "score": 0.8}],
                    "image_size": {"width": 16, "height": 8}}"#,
            )
        });

        let mut detector = HttpModelDetector::connect(&url).unwrap();
        let frame = Frame::new(vec![100u8; 16 * 8 * 3], 16, 8, 0, 0);
        let boxes = detector.detect(&frame).unwrap();
        let (head, body) = server.join().unwrap();

        assert!(head.starts_with("POST /detect HTTP/1.1"), "{head}");
        assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["imageData"].is_string());
        assert_eq!(boxes.len(), 1);
        assert_eq!((boxes[0].width, boxes[0].height), (8, 4));
    }

    #[test]
    fn test_connect_to_closed_port_is_unavailable() {
        // Port 9 (discard) is essentially never served locally.
        match HttpModelDetector::connect("http://127.0.0.1:9") {
            Err(DetectionError::BackendUnavailable(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected connection failure"),
        }
    }
}
