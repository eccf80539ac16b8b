//! `multipart/form-data` envelope for image uploads.
//!
//! # Wire Layout
//! ```text
//! head:  --<b>\r\n  mac field  \r\n
//!        --<b>\r\n  battery field  \r\n
//!        --<b>\r\n  image part headers  \r\n\r\n
//! body:  raw JPEG bytes (never scanned or escaped)
//! tail:  \r\n--<b>--\r\n
//! ```
//!
//! # Design Decisions
//! - The image is streamed separately, so `Content-Length` is computed from
//!   the three pieces up front
//! - Boundaries combine a time-derived suffix with random bits

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::upload::UploadPayload;

const BOUNDARY_PREFIX: &str = "------------------------camnode";

/// A multipart boundary token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(String);

impl Boundary {
    /// Fresh boundary: fixed prefix, millisecond timestamp and 64 random bits.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let salt: u64 = rand::thread_rng().gen();
        Self(format!("{}{:x}{:016x}", BOUNDARY_PREFIX, millis, salt))
    }

    /// Boundary with a caller-chosen token.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Head, image bytes and tail of one upload body.
#[derive(Debug)]
pub struct MultipartEnvelope<'a> {
    boundary: Boundary,
    head: String,
    image: &'a [u8],
    tail: String,
}

impl<'a> MultipartEnvelope<'a> {
    /// Lay out the `mac`, `battery` and `image` parts for a payload.
    pub fn for_upload(payload: &'a UploadPayload, boundary: Boundary) -> Self {
        let b = boundary.as_str();
        let head = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"mac\"\r\n\r\n\
             {mac}\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"battery\"\r\n\r\n\
             {battery}\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n\
             Content-Type: image/jpeg\r\n\r\n",
            mac = payload.device_id,
            battery = payload.battery_field(),
            filename = payload.filename,
        );
        let tail = format!("\r\n--{b}--\r\n");

        Self {
            boundary,
            head,
            image: payload.image.bytes(),
            tail,
        }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Value of the `Content-Type` request header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary.as_str())
    }

    /// Exact number of body bytes: head + image + tail.
    pub fn content_length(&self) -> usize {
        self.head.len() + self.image.len() + self.tail.len()
    }

    pub fn head(&self) -> &[u8] {
        self.head.as_bytes()
    }

    pub fn image(&self) -> &'a [u8] {
        self.image
    }

    pub fn tail(&self) -> &[u8] {
        self.tail.as_bytes()
    }
}
