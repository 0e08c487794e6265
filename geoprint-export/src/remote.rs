/*!
# Remote Map Services

GetLegendGraphic and GetFeatureInfo requests against the WMS endpoint that
serves the raster layers. Both live behind traits so the compositor can be
driven without a network.
*/

use geoprint_core::legend::ContentCheck;
use geoprint_core::tree::Layer;
use geoprint_core::{Extent, PrintError, PrintResult, PrintSettings};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

const LEGEND_OPTIONS: &str = "fontAntiAliasing:true;fontSize:10;forceLabels:on";
const MAX_LEGEND_BYTES: u64 = 8 * 1024 * 1024;
pub const PROBE_IMAGE_SIZE: u32 = 101;
/// How often a waiting request looks at the abort flag.
const ABORT_POLL: Duration = Duration::from_millis(20);

/// Shared cancellation flag for one print.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> PrintResult<()> {
        if self.is_aborted() {
            Err(PrintError::Aborted)
        } else {
            Ok(())
        }
    }
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request aborted")]
    Aborted,

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of legend images for server-rendered layers.
pub trait LegendGraphicSource: Send + Sync {
    /// Raw image bytes (PNG) for `layer`.
    fn fetch_legend(&self, base_url: &str, layer: &Layer, abort: &AbortSignal) -> Result<Vec<u8>, RemoteError>;
}

/// One GetFeatureInfo sample against a synthetic probe image.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub layer: String,
    pub bbox: Extent,
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    pub content_type: String,
    pub body: String,
}

pub trait FeatureInfoProbe: Send + Sync {
    fn probe(&self, base_url: &str, request: &ProbeRequest, abort: &AbortSignal) -> Result<ProbeResponse, RemoteError>;
}

/// What one feature-info sample says about the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Features,
    Empty,
    Ambiguous,
}

pub fn classify_feature_info(response: &ProbeResponse) -> ProbeOutcome {
    let body = response.body.trim_start();
    let looks_json = response.content_type.contains("json") || body.starts_with('{');
    if looks_json {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            return match value.get("features").and_then(|f| f.as_array()) {
                Some(features) if !features.is_empty() => ProbeOutcome::Features,
                Some(_) => ProbeOutcome::Empty,
                None => ProbeOutcome::Ambiguous,
            };
        }
    }
    if body.contains("ServiceException") || body.contains("ExceptionReport") {
        return ProbeOutcome::Ambiguous;
    }
    if body.contains("FeatureCollection") || body.contains("featureMember") || body.contains("Results for FeatureType") {
        return ProbeOutcome::Features;
    }
    ProbeOutcome::Ambiguous
}

/// Any hit keeps the layer; a clean sweep of empty answers drops it;
/// anything else is undecided.
pub fn combine_probe_outcomes<I: IntoIterator<Item = ProbeOutcome>>(outcomes: I) -> ContentCheck {
    let mut seen_any = false;
    let mut all_empty = true;
    for outcome in outcomes {
        seen_any = true;
        match outcome {
            ProbeOutcome::Features => return ContentCheck::Included,
            ProbeOutcome::Empty => {}
            ProbeOutcome::Ambiguous => all_empty = false,
        }
    }
    if seen_any && all_empty {
        ContentCheck::Excluded
    } else {
        ContentCheck::Unknown
    }
}

/// Sample pixels in the probe image: centre first, then the quarter points.
pub fn probe_points(samples: usize, width: u32, height: u32) -> Vec<(u32, u32)> {
    let at = |fx: f64, fy: f64| ((width as f64 * fx).floor() as u32, (height as f64 * fy).floor() as u32);
    let candidates = [at(0.5, 0.5), at(0.25, 0.25), at(0.75, 0.25), at(0.25, 0.75), at(0.75, 0.75)];
    candidates.into_iter().take(samples.clamp(1, candidates.len())).collect()
}

pub fn probe_requests(layer: &Layer, bbox: &Extent, samples: usize) -> Vec<ProbeRequest> {
    probe_points(samples, PROBE_IMAGE_SIZE, PROBE_IMAGE_SIZE)
        .into_iter()
        .map(|(x, y)| ProbeRequest {
            layer: layer.qualified_name(),
            bbox: bbox.normalized(),
            width: PROBE_IMAGE_SIZE,
            height: PROBE_IMAGE_SIZE,
            x,
            y,
        })
        .collect()
}

fn wms_endpoint(base_url: &str) -> String {
    format!("{}/wms", base_url.trim_end_matches('/'))
}

pub fn legend_url(base_url: &str, layer: &Layer) -> String {
    format!(
        "{}?REQUEST=GetLegendGraphic&VERSION=1.0.0&FORMAT=image/png&WIDTH=20&HEIGHT=20&LAYER={}&LEGEND_OPTIONS={}",
        wms_endpoint(base_url),
        urlencoding::encode(&layer.qualified_name()),
        urlencoding::encode(LEGEND_OPTIONS),
    )
}

pub fn feature_info_url(base_url: &str, request: &ProbeRequest) -> String {
    let b = &request.bbox;
    let layer = urlencoding::encode(&request.layer);
    format!(
        "{}?SERVICE=WMS&VERSION=1.1.1&REQUEST=GetFeatureInfo&LAYERS={layer}&QUERY_LAYERS={layer}&STYLES=&SRS=EPSG:3857\
         &BBOX={},{},{},{}&WIDTH={}&HEIGHT={}&X={}&Y={}&INFO_FORMAT=application/json&FEATURE_COUNT=1",
        wms_endpoint(base_url),
        b.min_x,
        b.min_y,
        b.max_x,
        b.max_y,
        request.width,
        request.height,
        request.x,
        request.y,
        layer = layer,
    )
}

/// Blocking WMS client with separate timeouts for legends and probes.
#[derive(Clone)]
pub struct WmsClient {
    legend_agent: ureq::Agent,
    probe_agent: ureq::Agent,
}

impl WmsClient {
    pub fn new(legend_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            legend_agent: ureq::AgentBuilder::new().timeout(legend_timeout).build(),
            probe_agent: ureq::AgentBuilder::new().timeout(probe_timeout).build(),
        }
    }

    pub fn from_settings(settings: &PrintSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.legend_timeout_ms),
            Duration::from_millis(settings.probe_timeout_ms),
        )
    }

    /// Run the request and the body read on a worker thread so an abort
    /// returns at once. An abandoned worker ends at the agent timeout and
    /// its result is dropped.
    fn get<T, F>(agent: &ureq::Agent, url: String, abort: &AbortSignal, read: F) -> Result<T, RemoteError>
    where
        T: Send + 'static,
        F: FnOnce(ureq::Response) -> Result<T, RemoteError> + Send + 'static,
    {
        if abort.is_aborted() {
            return Err(RemoteError::Aborted);
        }
        log::debug!("GET {}", url);
        let agent = agent.clone();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new().name("wms-request".into()).spawn(move || {
            let response = agent.get(&url).call();
            let result = match response {
                Ok(response) => read(response),
                Err(ureq::Error::Status(status, _)) => Err(RemoteError::Http { status, url }),
                Err(ureq::Error::Transport(t)) => Err(RemoteError::Transport(t.to_string())),
            };
            let _ = tx.send(result);
        })?;

        loop {
            match rx.recv_timeout(ABORT_POLL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) if abort.is_aborted() => {
                    log::debug!("request abandoned after abort");
                    return Err(RemoteError::Aborted);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RemoteError::Transport("request worker exited without a result".into()));
                }
            }
        }
    }
}

impl LegendGraphicSource for WmsClient {
    fn fetch_legend(&self, base_url: &str, layer: &Layer, abort: &AbortSignal) -> Result<Vec<u8>, RemoteError> {
        Self::get(&self.legend_agent, legend_url(base_url, layer), abort, |response| {
            let content_type = response.content_type().to_string();
            if !content_type.starts_with("image/") {
                return Err(RemoteError::Decode(format!("expected an image, got {}", content_type)));
            }
            let mut bytes = Vec::new();
            response.into_reader().take(MAX_LEGEND_BYTES).read_to_end(&mut bytes)?;
            Ok(bytes)
        })
    }
}

impl FeatureInfoProbe for WmsClient {
    fn probe(&self, base_url: &str, request: &ProbeRequest, abort: &AbortSignal) -> Result<ProbeResponse, RemoteError> {
        Self::get(&self.probe_agent, feature_info_url(base_url, request), abort, |response| {
            let content_type = response.content_type().to_string();
            let body = response.into_string()?;
            Ok(ProbeResponse { content_type, body })
        })
    }
}
