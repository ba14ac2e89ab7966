use serde::Deserialize;

/// Query string of the realtime endpoint: `?filter=column=eq.value`.
#[derive(Debug, Default, Deserialize)]
pub struct RealtimeQuery {
    #[serde(default)]
    pub filter: Option<String>,
}
