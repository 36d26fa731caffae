use crate::registry::Registry;
use crate::response;
use crate::room::Room;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::sleep;

pub(crate) const RECONNECTION_GRACE: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Error)]
pub(crate) enum ReconnectError {
    #[error("no reconnection key")]
    MissingKey,
    #[error("invalid or expired reconnection key")]
    InvalidToken,
    #[error("room already has a connected host")]
    HostConnected,
}

#[derive(Debug, PartialEq)]
pub(crate) enum WaitOutcome {
    Reconnected,
    Expired,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    room: String,
    exp: u64,
}

pub(crate) struct Reconnect {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    registry: Arc<Registry>,
    grace: Duration,
}

impl Reconnect {
    pub(crate) fn new(secret: &str, registry: Arc<Registry>, grace: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Reconnect {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            registry,
            grace,
        }
    }

    // A token outlives its room by at most the grace period.
    pub(crate) fn issue(&self, code: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        let claims = Claims {
            room: code.to_owned(),
            exp: now.as_secs() + self.grace.as_secs(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    fn resolve(&self, token: &str) -> Option<String> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.room)
            .ok()
    }

    pub(crate) fn attempt(&self, key: Option<&str>) -> Result<(String, Arc<Room>), ReconnectError> {
        let key = key
            .filter(|key| !key.is_empty())
            .ok_or(ReconnectError::MissingKey)?;
        let code = self.resolve(key).ok_or(ReconnectError::InvalidToken)?;
        match self.registry.get(&code) {
            // The code was evicted but the token is still valid: revive it as
            // a brand-new empty room rather than failing.
            None => {
                let room = Arc::new(Room::new());
                self.registry.register(&code, room.clone());
                Ok((code, room))
            }
            Some(room) => {
                room.claim_host()
                    .map_err(|_| ReconnectError::HostConnected)?;
                room.broadcast(&response::Payload::HostReconnected.to_json());
                Ok((code, room))
            }
        }
    }

    // Races the grace-period timer against the reconnection signal. If both
    // fire, an accepted reconnection wins: expire_if_waiting refuses to
    // destroy a room that is connected again.
    pub(crate) async fn wait(
        &self,
        code: &str,
        room: &Arc<Room>,
        pending: oneshot::Receiver<()>,
    ) -> WaitOutcome {
        tokio::select! {
            _ = pending => WaitOutcome::Reconnected,
            _ = sleep(self.grace) => {
                if room.expire_if_waiting() {
                    self.registry.remove(code);
                    info!("Removed room {}", code);
                    WaitOutcome::Expired
                } else {
                    WaitOutcome::Reconnected
                }
            }
        }
    }
}
