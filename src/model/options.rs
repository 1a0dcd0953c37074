//! Per-request options (§4.6 `request_stream` options).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub enable_highpass: bool,
    pub highpass_corner_hz: Option<f64>,
    #[serde(default = "default_true")]
    pub normalize: bool,
    pub codec_hint: Option<String>,
    /// Overrides the station-derived storage grouping tag (Open Question O1).
    pub grouping: Option<String>,
}

fn default_true() -> bool {
    true
}
