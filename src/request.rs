use serde::Deserialize;

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum Payload {
    #[serde(rename_all = "camelCase")]
    Sync {
        path: String,
        time: f64,
        rate: f32,
        is_paused: bool,
    },
    StartPlaying {
        time: f64,
    },
    Pause {
        time: f64,
    },
    PathChange {
        path: String,
    },
    RateChange {
        rate: f32,
    },
    RemoveRoom,
}
