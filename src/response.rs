use crate::state::VideoState;
use serde::Serialize;

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum Payload {
    Code {
        code: String,
    },
    ReconnectKey {
        key: String,
    },
    #[serde(rename_all = "camelCase")]
    Sync {
        path: String,
        time: f64,
        rate: f32,
        is_paused: bool,
    },
    HostDisconnected,
    HostReconnected,
    Close,
}

impl Payload {
    pub(crate) fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

impl From<&VideoState> for Payload {
    fn from(state: &VideoState) -> Self {
        Payload::Sync {
            path: state.path.clone(),
            time: state.time,
            rate: state.rate,
            is_paused: state.is_paused,
        }
    }
}
