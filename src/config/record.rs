//! Persisted device record and its in-memory form.
//!
//! The record is the JSON document written by the portal and read at boot:
//!
//! ```text
//! {"NETWORK": {"MODULE_NAME", "SSID", "PASSWORD", "UPLOAD_URL", "INIT_URL"},
//!  "CAMERA":  {"CAPTURE_INTERVAL_IN_MS", "RESOLUTION", "VERTICAL_FLIP",
//!              "BRIGHTNESS", "SATURATION"}}
//! ```
//!
//! [`DeviceConfig`] is the flat value the portal edits. Conversions in both
//! directions are pure; storage is handled by [`crate::config::store`].

use serde::{Deserialize, Serialize};

/// On-disk layout of the device record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConfigRecord {
    #[serde(rename = "NETWORK")]
    pub network: NetworkSection,

    #[serde(rename = "CAMERA")]
    pub camera: CameraSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct NetworkSection {
    pub module_name: String,
    pub ssid: String,
    pub password: String,
    pub upload_url: String,
    pub init_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CameraSection {
    pub capture_interval_in_ms: i32,
    pub resolution: String,
    pub vertical_flip: i32,
    pub brightness: i32,
    pub saturation: i32,
}

impl Default for CameraSection {
    fn default() -> Self {
        let defaults = DeviceConfig::default();
        Self {
            capture_interval_in_ms: defaults.capture_interval_ms,
            resolution: defaults.resolution,
            vertical_flip: defaults.vertical_flip,
            brightness: defaults.brightness,
            saturation: defaults.saturation,
        }
    }
}

/// Frame sizes understood by the camera driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Qvga,
    Vga,
    Svga,
    Sxga,
    Uxga,
}

impl Resolution {
    pub const ALL: [Resolution; 5] = [Self::Qvga, Self::Vga, Self::Svga, Self::Sxga, Self::Uxga];

    /// Lowercase name used in forms and the stored record.
    pub fn name(self) -> &'static str {
        match self {
            Self::Qvga => "qvga",
            Self::Vga => "vga",
            Self::Svga => "svga",
            Self::Sxga => "sxga",
            Self::Uxga => "uxga",
        }
    }

    /// Case-insensitive lookup of a resolution name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "qvga" => Some(Self::Qvga),
            "vga" => Some(Self::Vga),
            "svga" => Some(Self::Svga),
            "sxga" => Some(Self::Sxga),
            "uxga" => Some(Self::Uxga),
            _ => None,
        }
    }

    /// Pixel dimensions (width, height).
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Qvga => (320, 240),
            Self::Vga => (640, 480),
            Self::Svga => (800, 600),
            Self::Sxga => (1280, 1024),
            Self::Uxga => (1600, 1200),
        }
    }
}

/// Settings edited through the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub module_name: String,
    pub ssid: String,
    pub password: String,
    pub upload_url: String,
    pub init_url: String,
    pub capture_interval_ms: i32,
    /// Resolution name exactly as submitted; see [`DeviceConfig::resolution`].
    pub resolution: String,
    pub vertical_flip: i32,
    pub brightness: i32,
    pub saturation: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            module_name: String::new(),
            ssid: String::new(),
            password: String::new(),
            upload_url: String::new(),
            init_url: String::new(),
            capture_interval_ms: 300,
            resolution: "VGA".to_string(),
            vertical_flip: 0,
            brightness: 0,
            saturation: 0,
        }
    }
}

impl DeviceConfig {
    pub fn from_record(record: &ConfigRecord) -> Self {
        Self {
            module_name: record.network.module_name.clone(),
            ssid: record.network.ssid.clone(),
            password: record.network.password.clone(),
            upload_url: record.network.upload_url.clone(),
            init_url: record.network.init_url.clone(),
            capture_interval_ms: record.camera.capture_interval_in_ms,
            resolution: record.camera.resolution.clone(),
            vertical_flip: record.camera.vertical_flip,
            brightness: record.camera.brightness,
            saturation: record.camera.saturation,
        }
    }

    pub fn to_record(&self) -> ConfigRecord {
        ConfigRecord {
            network: NetworkSection {
                module_name: self.module_name.clone(),
                ssid: self.ssid.clone(),
                password: self.password.clone(),
                upload_url: self.upload_url.clone(),
                init_url: self.init_url.clone(),
            },
            camera: CameraSection {
                capture_interval_in_ms: self.capture_interval_ms,
                resolution: self.resolution.clone(),
                vertical_flip: self.vertical_flip,
                brightness: self.brightness,
                saturation: self.saturation,
            },
        }
    }

    /// Parsed resolution; unknown names fall back to VGA.
    pub fn resolution(&self) -> Resolution {
        Resolution::from_name(&self.resolution).unwrap_or_else(|| {
            tracing::warn!(resolution = %self.resolution, "Unsupported resolution, using VGA");
            Resolution::Vga
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD_JSON: &str = r#"{
        "NETWORK": {
            "MODULE_NAME": "hive-3",
            "SSID": "field-ap",
            "PASSWORD": "secret",
            "UPLOAD_URL": "http://10.0.0.2:5000/upload",
            "INIT_URL": "http://10.0.0.2:8002/new_module"
        },
        "CAMERA": {
            "CAPTURE_INTERVAL_IN_MS": 60000,
            "RESOLUTION": "uxga",
            "VERTICAL_FLIP": 1,
            "BRIGHTNESS": 1,
            "SATURATION": -1
        }
    }"#;

    #[test]
    fn test_from_record() {
        let record: ConfigRecord = serde_json::from_str(RECORD_JSON).unwrap();
        let config = DeviceConfig::from_record(&record);
        assert_eq!(config.module_name, "hive-3");
        assert_eq!(config.upload_url, "http://10.0.0.2:5000/upload");
        assert_eq!(config.capture_interval_ms, 60000);
        assert_eq!(config.saturation, -1);
        assert_eq!(config.resolution(), Resolution::Uxga);
    }

    #[test]
    fn test_record_keys() {
        let record = DeviceConfig::default().to_record();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["NETWORK"]["MODULE_NAME"], "");
        assert_eq!(value["CAMERA"]["CAPTURE_INTERVAL_IN_MS"], 300);
        assert_eq!(value["CAMERA"]["RESOLUTION"], "VGA");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let record: ConfigRecord =
            serde_json::from_str(r#"{"NETWORK": {"SSID": "only"}}"#).unwrap();
        let config = DeviceConfig::from_record(&record);
        assert_eq!(config.ssid, "only");
        assert_eq!(config.capture_interval_ms, 300);
        assert_eq!(config.resolution, "VGA");
    }

    #[test]
    fn test_unknown_resolution_falls_back() {
        let config = DeviceConfig {
            resolution: "8k".to_string(),
            ..DeviceConfig::default()
        };
        assert_eq!(config.resolution(), Resolution::Vga);
        assert_eq!(Resolution::from_name(" SXGA "), Some(Resolution::Sxga));
    }
}
