use std::time::Instant;

#[derive(Clone, Debug)]
pub(crate) struct VideoState {
    pub path: String,
    pub time: f64,
    pub rate: f32,
    pub is_paused: bool,
    last_update: Instant,
}

impl VideoState {
    pub(crate) fn new() -> Self {
        VideoState {
            path: String::new(),
            time: 0.0,
            rate: 1.0,
            is_paused: false,
            last_update: Instant::now(),
        }
    }

    fn elapsed(&self) -> f64 {
        self.last_update.elapsed().as_secs_f64()
    }

    // The stored snapshot is only exact at `last_update`; anything newer is
    // extrapolated along `rate`. The snapshot itself is left untouched.
    pub(crate) fn predicted(&self) -> VideoState {
        let mut state = self.clone();
        if !state.is_paused {
            state.time += state.elapsed() * f64::from(state.rate);
        }
        state
    }

    pub(crate) fn update_path(&mut self, new_path: &str) {
        if self.path != new_path {
            self.time = 0.0;
            self.last_update = Instant::now();
        }
        self.path = new_path.to_owned();
    }

    pub(crate) fn update_rate(&mut self, new_rate: f32) {
        self.rate = new_rate;
    }

    pub(crate) fn update_is_paused(&mut self, is_paused: bool) {
        // Pausing freezes the snapshot at "now"; unpausing just restarts the
        // extrapolation clock from here.
        if is_paused && !self.is_paused {
            self.time += self.elapsed() * f64::from(self.rate);
        }
        self.is_paused = is_paused;
        self.last_update = Instant::now();
    }

    pub(crate) fn update_time(&mut self, new_time: f64) {
        self.time = new_time;
        self.last_update = Instant::now();
    }

    #[cfg(test)]
    pub(crate) fn rewind(&mut self, duration: std::time::Duration) {
        self.last_update -= duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TOLERANCE: f64 = 0.25;

    fn playing_at(time: f64, rate: f32, seconds_ago: u64) -> VideoState {
        let mut state = VideoState::new();
        state.path = "video".to_owned();
        state.time = time;
        state.rate = rate;
        state.rewind(Duration::from_secs(seconds_ago));
        state
    }

    #[test]
    fn new_state_defaults() {
        let state = VideoState::new();
        assert_eq!(state.path, "");
        assert_eq!(state.time, 0.0);
        assert_eq!(state.rate, 1.0);
        assert!(!state.is_paused);
    }

    #[test]
    fn predicted_extrapolates_along_rate() {
        let state = playing_at(10.0, 2.0, 5);
        let predicted = state.predicted();
        assert!((predicted.time - 20.0).abs() < TOLERANCE);
        assert_eq!(state.time, 10.0);
    }

    #[test]
    fn predicted_is_identity_while_paused() {
        let mut state = playing_at(10.0, 1.0, 5);
        state.is_paused = true;
        assert_eq!(state.predicted().time, 10.0);
        assert_eq!(state.predicted().time, 10.0);
    }

    #[test]
    fn negative_rate_extrapolates_backward() {
        let state = playing_at(10.0, -1.0, 5);
        assert!((state.predicted().time - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn path_change_resets_position() {
        let mut state = playing_at(10.0, 1.0, 5);
        state.update_path("other");
        assert_eq!(state.path, "other");
        assert!(state.predicted().time < TOLERANCE);
    }

    #[test]
    fn same_path_keeps_position() {
        let mut state = playing_at(10.0, 1.0, 5);
        state.update_path("video");
        assert_eq!(state.time, 10.0);
        assert!((state.predicted().time - 15.0).abs() < TOLERANCE);
    }

    #[test]
    fn pause_folds_elapsed_into_snapshot() {
        let mut state = playing_at(10.0, 1.0, 5);
        state.update_is_paused(true);
        assert!((state.time - 15.0).abs() < TOLERANCE);
        assert_eq!(state.predicted().time, state.time);
    }

    #[test]
    fn pause_unpause_pause_round_trip_keeps_time() {
        let mut state = playing_at(10.0, 1.0, 0);
        state.update_is_paused(true);
        state.update_is_paused(false);
        state.update_is_paused(true);
        assert!((state.time - 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn rate_change_leaves_snapshot_alone() {
        let mut state = playing_at(0.0, 1.0, 4);
        state.update_rate(2.0);
        assert_eq!(state.time, 0.0);
        assert!((state.predicted().time - 8.0).abs() < TOLERANCE);
    }

    #[test]
    fn rate_change_while_paused_is_invisible() {
        let mut state = playing_at(10.0, 1.0, 5);
        state.is_paused = true;
        state.update_rate(4.0);
        assert_eq!(state.predicted().time, 10.0);
    }

    #[test]
    fn seek_refreshes_the_origin() {
        let mut state = playing_at(10.0, 1.0, 5);
        state.update_time(42.0);
        assert!((state.predicted().time - 42.0).abs() < TOLERANCE);
    }
}
