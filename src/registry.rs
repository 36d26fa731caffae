use crate::code;
use crate::room::Room;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Serialize, Debug)]
pub(crate) struct Stats {
    pub rooms: usize,
    pub viewers: usize,
}

#[derive(Default)]
pub(crate) struct Registry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry::default()
    }

    // Generation, collision check and insertion happen under a single write
    // lock: the code is unique among live rooms by construction.
    pub(crate) fn create(&self) -> (String, Arc<Room>) {
        let mut rooms = self.rooms.write().unwrap();
        let code = loop {
            let code = code::generate();
            if !rooms.contains_key(&code) {
                break code;
            }
        };
        let room = Arc::new(Room::new());
        rooms.insert(code.clone(), room.clone());
        (code, room)
    }

    pub(crate) fn register(&self, code: &str, room: Arc<Room>) {
        self.rooms.write().unwrap().insert(code.to_owned(), room);
    }

    pub(crate) fn remove(&self, code: &str) {
        self.rooms.write().unwrap().remove(code);
    }

    pub(crate) fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.read().unwrap().get(code).cloned()
    }

    pub(crate) fn stats(&self) -> Stats {
        let rooms = self.rooms.read().unwrap();
        Stats {
            rooms: rooms.len(),
            viewers: rooms.values().map(|room| room.subscriber_count()).sum(),
        }
    }
}
