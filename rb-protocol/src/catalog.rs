//! Stations, genre tree, playlist, history, search results: the session's
//! mutable program state, mutated transactionally by RPC responses.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Unknown,
    AacPlus,
    Mp3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    None,
    Love,
    Ban,
    Tired,
}

#[derive(Debug, Clone)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub is_creator: bool,
    pub is_quick_mix: bool,
    pub use_quick_mix: bool,
    pub seed_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Song {
    pub track_token: String,
    pub station_id: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub audio_url: String,
    pub audio_format: AudioFormat,
    pub cover_art: Option<String>,
    pub detail_url: Option<String>,
    pub file_gain_db: f64,
    pub length_seconds: u32,
    pub rating: Rating,
    pub music_id: Option<String>,
    pub seed_id: Option<String>,
    pub feedback_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Genre {
    pub name: String,
    pub music_token: String,
}

#[derive(Debug, Clone)]
pub struct GenreCategory {
    pub category: String,
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub artists: Vec<(String, String)>, // (name, music_id)
    pub songs: Vec<(String, String)>,   // (title, music_id)
}

#[derive(Debug, Clone, Default)]
pub struct StationInfo {
    pub artist_seeds: Vec<(String, String)>,  // (name, seed_id)
    pub song_seeds: Vec<(String, String)>,    // (title, seed_id)
    pub station_seeds: Vec<(String, String)>, // (name, station_id)
    pub feedback: Vec<Song>,
}

/// Total orders over the station list, per spec.md §4.5: six orderings
/// combining quick-mix placement with name direction, plus two plain
/// name-only orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NameAsc,
    NameDesc,
    QuickMixFirstNameAsc,
    QuickMixFirstNameDesc,
    QuickMixLastNameAsc,
    QuickMixLastNameDesc,
}

#[derive(Default)]
pub struct Catalog {
    pub stations: Vec<Station>,
    pub playlist: VecDeque<Song>,
    pub history: VecDeque<Song>,
    pub history_cap: usize,
    pub genres: Vec<GenreCategory>,
}

impl Catalog {
    pub fn new(history_cap: usize) -> Self {
        Self {
            history_cap,
            ..Default::default()
        }
    }

    pub fn find_station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn find_station_mut(&mut self, id: &str) -> Option<&mut Station> {
        self.stations.iter_mut().find(|s| s.id == id)
    }

    /// Appends the station; if a station with the same id already exists it
    /// is removed first so the new value wins.
    pub fn create_station(&mut self, station: Station) {
        self.stations.retain(|s| s.id != station.id);
        self.stations.push(station);
    }

    pub fn delete_station(&mut self, id: &str) -> bool {
        let before = self.stations.len();
        self.stations.retain(|s| s.id != id);
        if self.stations.len() != before {
            self.playlist.clear();
            true
        } else {
            false
        }
    }

    /// On song-finished, detach the head into history, then truncate
    /// history to its configured cap, evicting the oldest entries.
    pub fn finish_current_song(&mut self) -> Option<Song> {
        let song = self.playlist.pop_front()?;
        self.history.push_front(song.clone());
        self.history.truncate(self.history_cap);
        Some(song)
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.playlist.front()
    }

    pub fn set_playlist(&mut self, songs: Vec<Song>) {
        self.playlist = songs.into();
    }

    /// Station ids contributing to the quick-mix, per SetQuickMix (§4.5):
    /// every non-quickmix station with `use_quick_mix` set.
    pub fn quick_mix_member_ids(&self) -> Vec<String> {
        self.stations
            .iter()
            .filter(|s| !s.is_quick_mix && s.use_quick_mix)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Applies the server's authoritative quick-mix membership after a
    /// successful SetQuickMix call.
    pub fn apply_quick_mix_membership(&mut self, member_ids: &[String]) {
        for station in &mut self.stations {
            if !station.is_quick_mix {
                station.use_quick_mix = member_ids.iter().any(|id| id == &station.id);
            }
        }
    }

    pub fn sorted_stations(&self, order: SortOrder) -> Vec<Station> {
        let mut stations = self.stations.clone();
        stations.sort_by(|a, b| compare_stations(a, b, order));
        stations
    }
}

fn compare_stations(a: &Station, b: &Station, order: SortOrder) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let name_cmp = |a: &Station, b: &Station, desc: bool| {
        let cmp = a.name.to_lowercase().cmp(&b.name.to_lowercase());
        let cmp = if desc { cmp.reverse() } else { cmp };
        // Tie broken by is_quick_mix, per spec.md §4.5.
        cmp.then_with(|| a.is_quick_mix.cmp(&b.is_quick_mix))
    };

    match order {
        SortOrder::NameAsc => name_cmp(a, b, false),
        SortOrder::NameDesc => name_cmp(a, b, true),
        SortOrder::QuickMixFirstNameAsc => match (a.is_quick_mix, b.is_quick_mix) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => name_cmp(a, b, false),
        },
        SortOrder::QuickMixFirstNameDesc => match (a.is_quick_mix, b.is_quick_mix) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => name_cmp(a, b, true),
        },
        SortOrder::QuickMixLastNameAsc => match (a.is_quick_mix, b.is_quick_mix) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => name_cmp(a, b, false),
        },
        SortOrder::QuickMixLastNameDesc => match (a.is_quick_mix, b.is_quick_mix) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => name_cmp(a, b, true),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, name: &str, is_qm: bool, use_qm: bool) -> Station {
        Station {
            id: id.into(),
            name: name.into(),
            is_creator: false,
            is_quick_mix: is_qm,
            use_quick_mix: use_qm,
            seed_id: None,
        }
    }

    #[test]
    fn create_station_replaces_existing_id() {
        let mut c = Catalog::new(10);
        c.create_station(station("1", "Old Name", false, false));
        c.create_station(station("1", "New Name", false, false));
        assert_eq!(c.stations.len(), 1);
        assert_eq!(c.stations[0].name, "New Name");
    }

    #[test]
    fn delete_station_drains_playlist_when_current() {
        let mut c = Catalog::new(10);
        c.create_station(station("1", "A", false, false));
        c.set_playlist(vec![song("t1", "1")]);
        assert!(c.delete_station("1"));
        assert!(c.find_station("1").is_none());
        assert!(c.playlist.is_empty());
    }

    #[test]
    fn delete_station_missing_id_returns_false() {
        let mut c = Catalog::new(10);
        assert!(!c.delete_station("nope"));
    }

    fn song(token: &str, station_id: &str) -> Song {
        Song {
            track_token: token.into(),
            station_id: station_id.into(),
            artist: "A".into(),
            album: "Al".into(),
            title: "T".into(),
            audio_url: "http://x".into(),
            audio_format: AudioFormat::Mp3,
            cover_art: None,
            detail_url: None,
            file_gain_db: 0.0,
            length_seconds: 180,
            rating: Rating::None,
            music_id: None,
            seed_id: None,
            feedback_id: None,
        }
    }

    #[test]
    fn history_is_bounded_fifo_most_recent_first() {
        let mut c = Catalog::new(2);
        c.set_playlist(vec![song("a", "s"), song("b", "s"), song("c", "s")]);
        c.finish_current_song();
        c.finish_current_song();
        c.finish_current_song();
        assert_eq!(c.history.len(), 2);
        assert_eq!(c.history[0].track_token, "c");
        assert_eq!(c.history[1].track_token, "b");
    }

    #[test]
    fn quick_mix_toggle_round_trip_is_idempotent() {
        let mut c = Catalog::new(10);
        c.create_station(station("s1", "S1", false, true));
        c.create_station(station("s2", "S2", false, true));
        c.create_station(station("qm", "QuickMix", true, false));

        // Toggle S2 off and back on is observationally equivalent to
        // leaving it untouched, once SetQuickMix re-applies server state.
        let mut ids = c.quick_mix_member_ids();
        ids.sort();
        c.find_station_mut("s2").unwrap().use_quick_mix = false;
        c.find_station_mut("s2").unwrap().use_quick_mix = true;
        let mut ids_after = c.quick_mix_member_ids();
        ids_after.sort();
        assert_eq!(ids, ids_after);

        c.apply_quick_mix_membership(&ids_after);
        assert!(c.find_station("s1").unwrap().use_quick_mix);
        assert!(c.find_station("s2").unwrap().use_quick_mix);
    }

    #[test]
    fn quick_mix_reconfigure_scenario() {
        // spec.md end-to-end scenario 4.
        let mut c = Catalog::new(10);
        c.create_station(station("s1", "S1", false, true));
        c.create_station(station("s2", "S2", false, true));
        c.create_station(station("s3", "S3", false, false));
        c.create_station(station("s4", "S4", true, false));

        c.find_station_mut("s2").unwrap().use_quick_mix = false;
        c.find_station_mut("s3").unwrap().use_quick_mix = true;

        let mut sent = c.quick_mix_member_ids();
        sent.sort();
        assert_eq!(sent, vec!["s1".to_string(), "s3".to_string()]);

        c.apply_quick_mix_membership(&sent);
        assert!(!c.find_station("s2").unwrap().use_quick_mix);
        assert!(c.find_station("s3").unwrap().use_quick_mix);
    }

    #[test]
    fn all_six_sortings_are_permutations_and_idempotent() {
        let mut c = Catalog::new(10);
        c.create_station(station("1", "banana", false, false));
        c.create_station(station("2", "Apple", false, false));
        c.create_station(station("3", "QuickMix", true, false));

        let orders = [
            SortOrder::NameAsc,
            SortOrder::NameDesc,
            SortOrder::QuickMixFirstNameAsc,
            SortOrder::QuickMixFirstNameDesc,
            SortOrder::QuickMixLastNameAsc,
            SortOrder::QuickMixLastNameDesc,
        ];

        for order in orders {
            let sorted = c.sorted_stations(order);
            assert_eq!(sorted.len(), c.stations.len());
            let mut ids: Vec<_> = sorted.iter().map(|s| s.id.clone()).collect();
            ids.sort();
            let mut expected: Vec<_> = c.stations.iter().map(|s| s.id.clone()).collect();
            expected.sort();
            assert_eq!(ids, expected);

            let sorted_twice = {
                let mut v = sorted.clone();
                v.sort_by(|a, b| compare_stations(a, b, order));
                v
            };
            let ids1: Vec<_> = sorted.iter().map(|s| s.id.clone()).collect();
            let ids2: Vec<_> = sorted_twice.iter().map(|s| s.id.clone()).collect();
            assert_eq!(ids1, ids2);
        }
    }
}
