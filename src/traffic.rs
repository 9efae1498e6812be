//! Synthetic viewer traffic
//!
//! Each viewer picks a title (weighted by rating), then emits playback events
//! until it stops or reaches the end of the title, and picks another.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;

/// Event names and their relative weights
pub const EVENT_WEIGHTS: [(&str, u32); 5] = [
    ("play", 50),
    ("pause", 10),
    ("seek", 20),
    ("buffering", 10),
    ("stop", 10),
];

/// Largest jump a single seek makes, in seconds
const MAX_SEEK_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct Title {
    pub id: &'static str,
    pub title: &'static str,
    pub runtime_secs: u64,
    pub rating: f64,
}

pub const CATALOG: &[Title] = &[
    Title { id: "tm84618", title: "Taxi Driver", runtime_secs: 6780, rating: 8.2 },
    Title { id: "tm154986", title: "Deliverance", runtime_secs: 6540, rating: 7.7 },
    Title { id: "tm127384", title: "Monty Python and the Holy Grail", runtime_secs: 5460, rating: 8.2 },
    Title { id: "tm120801", title: "The Dirty Dozen", runtime_secs: 9000, rating: 7.7 },
    Title { id: "ts22164", title: "Monty Python's Flying Circus", runtime_secs: 1800, rating: 8.8 },
    Title { id: "tm70993", title: "Life of Brian", runtime_secs: 5640, rating: 8.0 },
    Title { id: "tm14873", title: "Dirty Harry", runtime_secs: 6120, rating: 7.7 },
    Title { id: "tm119281", title: "Bonnie and Clyde", runtime_secs: 6600, rating: 7.7 },
    Title { id: "tm98978", title: "The Blue Lagoon", runtime_secs: 6240, rating: 5.8 },
    Title { id: "tm44204", title: "The Guns of Navarone", runtime_secs: 9480, rating: 7.5 },
];

/// Wire payload published to the broker topic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackEvent {
    pub user_id: String,
    pub video_id: String,
    pub video_title: String,
    pub event: String,
    pub time_seconds: u64,
}

struct Session {
    title: &'static Title,
    watched_secs: u64,
}

pub struct Viewer {
    user_id: String,
    catalog: &'static [Title],
    title_weights: WeightedIndex<f64>,
    event_weights: WeightedIndex<u32>,
    session: Option<Session>,
}

impl Viewer {
    /// `None` if the catalog is empty or has no positive rating
    pub fn new(number: usize, catalog: &'static [Title]) -> Option<Self> {
        let title_weights = WeightedIndex::new(catalog.iter().map(|t| t.rating)).ok()?;
        let event_weights = WeightedIndex::new(EVENT_WEIGHTS.iter().map(|(_, w)| *w)).ok()?;

        Some(Self {
            user_id: format!("User-{}", number),
            catalog,
            title_weights,
            event_weights,
            session: None,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Produce the next playback event, starting a new title when needed
    pub fn next_event<R: Rng>(&mut self, rng: &mut R) -> PlaybackEvent {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let catalog: &'static [Title] = self.catalog;
                let title = &catalog[self.title_weights.sample(rng)];
                log::debug!("🎬 {} started {}", self.user_id, title.title);
                Session { title, watched_secs: 0 }
            }
        };
        let Session { title, mut watched_secs } = session;

        let event = EVENT_WEIGHTS[self.event_weights.sample(rng)].0;

        if event == "seek" {
            let jump = rng.gen_range(-MAX_SEEK_SECS..=MAX_SEEK_SECS);
            let target = (watched_secs as i64 + jump).clamp(0, title.runtime_secs as i64);
            watched_secs = target as u64;
        }

        let payload = PlaybackEvent {
            user_id: self.user_id.clone(),
            video_id: title.id.to_string(),
            video_title: title.title.to_string(),
            event: event.to_string(),
            time_seconds: watched_secs,
        };

        if event != "stop" {
            watched_secs += rng.gen_range(10..=60);
            if watched_secs < title.runtime_secs {
                self.session = Some(Session { title, watched_secs });
            }
        }

        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_events_follow_catalog() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut viewer = Viewer::new(2, CATALOG).unwrap();

        for _ in 0..500 {
            let event = viewer.next_event(&mut rng);
            assert_eq!(event.user_id, "User-2");
            assert!(EVENT_WEIGHTS.iter().any(|(name, _)| *name == event.event));

            let title = CATALOG.iter().find(|t| t.id == event.video_id).unwrap();
            assert_eq!(title.title, event.video_title);
            assert!(event.time_seconds <= title.runtime_secs);
        }
    }

    #[test]
    fn test_play_dominates() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut viewer = Viewer::new(1, CATALOG).unwrap();

        let events: Vec<String> = (0..2000).map(|_| viewer.next_event(&mut rng).event).collect();
        let plays = events.iter().filter(|e| *e == "play").count();
        let pauses = events.iter().filter(|e| *e == "pause").count();
        assert!(plays > pauses * 3);
    }

    #[test]
    fn test_stop_starts_new_session() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut viewer = Viewer::new(1, CATALOG).unwrap();

        let mut saw_restart = false;
        let mut after_stop = false;
        for _ in 0..1000 {
            let event = viewer.next_event(&mut rng);
            if after_stop && event.event != "seek" {
                assert!(event.time_seconds == 0);
                saw_restart = true;
            }
            after_stop = event.event == "stop";
        }
        assert!(saw_restart);
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(Viewer::new(1, &[]).is_none());
    }

    #[test]
    fn test_payload_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut viewer = Viewer::new(5, CATALOG).unwrap();
        let json = serde_json::to_value(viewer.next_event(&mut rng)).unwrap();

        for key in ["user_id", "video_id", "video_title", "event", "time_seconds"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
