//! Typed request builder + response applier over `Session`/`Catalog`.
//!
//! One operation per spec.md §4.6 action. Shaped after
//! `pmoqobuz::client::QobuzClient`: a thin, typed, high-level surface over a
//! lower-level transport, with the transport itself kept swappable (a fake
//! in tests, `rb-http::HttpClient` in production) the way `QobuzApi` is kept
//! separate from `QobuzClient`.

use crate::catalog::{AudioFormat, Catalog, GenreCategory, Genre, Rating, SearchResult, Song, Station, StationInfo};
use crate::codec::{self, Quality};
use crate::error::{Error, Result, ServerError};
use crate::session::Session;
use rb_http::InterruptFlag;
use serde_json::{json, Value};

/// Abstracts the blocking HTTP transport so `RpcEngine` can be exercised
/// against a fake in unit tests without a live server.
pub trait Transport: Send + Sync {
    fn post(&self, url: &str, body: Vec<u8>, content_type: &str, interrupted: &InterruptFlag) -> rb_http::Outcome;
}

impl Transport for rb_http::HttpClient {
    fn post(&self, url: &str, body: Vec<u8>, content_type: &str, interrupted: &InterruptFlag) -> rb_http::Outcome {
        rb_http::HttpClient::post(self, url, body, content_type, interrupted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationSeedType {
    Music,
    Song,
    Artist,
}

#[derive(Debug, Clone)]
pub enum DeleteSeedTarget {
    Song(String),
    Artist(String),
    Station(String),
}

pub struct RpcEngine<T: Transport> {
    pub session: Session,
    pub catalog: Catalog,
    transport: T,
    interrupted: InterruptFlag,
}

impl<T: Transport> RpcEngine<T> {
    pub fn new(session: Session, catalog: Catalog, transport: T, interrupted: InterruptFlag) -> Self {
        Self {
            session,
            catalog,
            transport,
            interrupted,
        }
    }

    fn url(&self, method: &str, authed: bool) -> String {
        let query = codec::build_query(method, &self.session, authed);
        format!(
            "https://{}:{}{}?{}",
            self.session.rpc_host, self.session.tls_port, self.session.rpc_path, query
        )
    }

    /// The user-login step carries the *partner* auth token as `auth_token`,
    /// not the (not-yet-issued) user token that `build_query`'s authed
    /// branch assumes for every later call.
    fn partner_authed_url(&self, method: &str) -> String {
        let encoded = urlencoding::encode(self.session.partner.auth_token.as_str());
        format!(
            "https://{}:{}{}?method={method}&partner_id={}&auth_token={encoded}",
            self.session.rpc_host, self.session.tls_port, self.session.rpc_path, self.session.partner.id
        )
    }

    fn send_plaintext(&self, method: &str, authed: bool, body: &Value, is_user_login_step: bool) -> Result<Value> {
        let url = self.url(method, authed);
        let payload = serde_json::to_vec(body).map_err(|e| Error::Decoding(e.to_string()))?;
        let outcome = self.transport.post(&url, payload, "text/plain", &self.interrupted);
        self.finish(outcome, is_user_login_step)
    }

    fn send_encrypted(&self, method: &str, body: &Value) -> Result<Value> {
        let url = self.url(method, true);
        let plaintext = serde_json::to_vec(body).map_err(|e| Error::Decoding(e.to_string()))?;
        let cipher = self
            .session
            .cipher_out
            .as_ref()
            .ok_or(Error::Precondition("out-cipher must be keyed"))?;
        let hex = cipher.encrypt_to_hex(&plaintext)?;
        let outcome = self
            .transport
            .post(&url, hex.into_bytes(), "text/plain", &self.interrupted);
        self.finish(outcome, false)
    }

    fn finish(&self, outcome: rb_http::Outcome, is_user_login_step: bool) -> Result<Value> {
        match outcome {
            rb_http::Outcome::Ok(bytes) => codec::parse_envelope(&bytes, is_user_login_step),
            other => Err(other.into()),
        }
    }

    /// Every authenticated call that returns `InvalidAuthToken` triggers one
    /// silent partner-login + user-login sequence, then retries the
    /// original call exactly once (spec.md §4.4/§7).
    fn call_authed(&mut self, method: &str, body_fn: impl Fn(&Session) -> Result<Value>) -> Result<Value> {
        self.session.require_user_auth()?;
        let body = body_fn(&self.session)?;
        match self.send_encrypted(method, &body) {
            Err(Error::Server(e)) if e.is_invalid_auth_token() => {
                tracing::info!("auth token expired, re-authenticating");
                let username = self.session.partner.user.clone();
                let password = self.session.partner.password.as_str().to_string();
                self.session.invalidate();
                self.partner_login()?;
                self.user_login(&username, &password)?;
                let retried_body = body_fn(&self.session)?;
                self.send_encrypted(method, &retried_body).map_err(|e| match e {
                    Error::Server(se) if se.is_invalid_auth_token() => Error::Server(ServerError::InvalidAuthToken),
                    other => other,
                })
            }
            other => other,
        }
    }

    // ---- Login (§4.4) ----

    /// Plaintext partner login over TLS; decrypts the returned syncTime and
    /// derives the clock-skew offset.
    pub fn partner_login(&mut self) -> Result<()> {
        let body = json!({
            "username": self.session.partner.user,
            "password": self.session.partner.password.as_str(),
            "deviceModel": self.session.partner.device,
            "version": "5",
            "includeUrls": true,
        });
        let result = self.send_plaintext("auth.partnerLogin", false, &body, false)?;

        let auth_token = result
            .get("partnerAuthToken")
            .and_then(Value::as_str)
            .ok_or(Error::MissingField("partnerAuthToken"))?
            .to_string();
        let partner_id: i64 = result
            .get("partnerId")
            .and_then(Value::as_i64)
            .ok_or(Error::MissingField("partnerId"))?;
        let sync_time = result
            .get("syncTime")
            .and_then(Value::as_str)
            .ok_or(Error::MissingField("syncTime"))?;

        self.session.apply_sync_time(sync_time)?;
        self.session.complete_partner_login(auth_token, partner_id);
        Ok(())
    }

    /// Encrypted user login carrying username/password/partnerAuthToken
    /// and syncTime.
    pub fn user_login(&mut self, username: &str, password: &str) -> Result<()> {
        self.session.require_partner_auth()?;
        self.session.partner.user = username.to_string();
        self.session.partner.password = crate::session::Secret::new(password.to_string());

        let body = json!({
            "username": username,
            "password": password,
            "partnerAuthToken": self.session.partner.auth_token.as_str(),
            "syncTime": self.session.now_corrected(),
        });
        let url = self.partner_authed_url("auth.userLogin");
        let plaintext = serde_json::to_vec(&body).map_err(|e| Error::Decoding(e.to_string()))?;
        let cipher = self
            .session
            .cipher_out
            .as_ref()
            .ok_or(Error::Precondition("out-cipher must be keyed"))?;
        let hex = cipher.encrypt_to_hex(&plaintext)?;
        let outcome = self
            .transport
            .post(&url, hex.into_bytes(), "text/plain", &self.interrupted);
        let result = self.finish(outcome, true)?;

        let auth_token = result
            .get("userAuthToken")
            .and_then(Value::as_str)
            .ok_or(Error::MissingField("userAuthToken"))?
            .to_string();
        let listener_id = result
            .get("userId")
            .and_then(Value::as_str)
            .ok_or(Error::MissingField("userId"))?
            .to_string();

        self.session.complete_user_login(auth_token, listener_id);
        Ok(())
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.partner_login()?;
        self.user_login(username, password)
    }

    // ---- Stations / playlist ----

    pub fn get_stations(&mut self) -> Result<()> {
        let result = self.call_authed("user.getStationList", |_| Ok(json!({})))?;
        let stations = result
            .get("stations")
            .and_then(Value::as_array)
            .ok_or(Error::MissingField("stations"))?;

        self.catalog.stations.clear();
        for s in stations {
            self.catalog.stations.push(Station {
                id: field_str(s, "stationId")?,
                name: field_str(s, "stationName")?,
                is_creator: s.get("isCreator").and_then(Value::as_bool).unwrap_or(false),
                is_quick_mix: s.get("isQuickMix").and_then(Value::as_bool).unwrap_or(false),
                use_quick_mix: s.get("useQuickMix").and_then(Value::as_bool).unwrap_or(false),
                seed_id: s.get("seedId").and_then(Value::as_str).map(str::to_string),
            });
        }
        Ok(())
    }

    pub fn get_playlist(&mut self, station_id: &str, quality: Quality) -> Result<()> {
        let sid = station_id.to_string();
        let result = self.call_authed("station.getPlaylist", move |_| {
            Ok(json!({ "stationToken": sid }))
        })?;

        let items = result
            .get("items")
            .and_then(Value::as_array)
            .ok_or(Error::MissingField("items"))?;

        let mut songs = Vec::with_capacity(items.len());
        for item in items {
            let audio_url_map = item.get("audioUrlMap");
            let (audio_url, audio_format) = match audio_url_map {
                Some(map) => codec::select_quality(map, quality)?,
                None => (
                    item.get("audioUrl").and_then(Value::as_str).unwrap_or_default().to_string(),
                    AudioFormat::Unknown,
                ),
            };

            songs.push(Song {
                track_token: field_str(item, "trackToken")?,
                station_id: station_id.to_string(),
                artist: field_str(item, "artistName")?,
                album: field_str(item, "albumName")?,
                title: field_str(item, "songName")?,
                audio_url,
                audio_format,
                cover_art: item.get("albumArtUrl").and_then(Value::as_str).map(str::to_string),
                detail_url: item.get("songDetailUrl").and_then(Value::as_str).map(str::to_string),
                file_gain_db: item.get("fileGain").and_then(Value::as_f64).unwrap_or(0.0),
                length_seconds: item.get("trackLength").and_then(Value::as_u64).unwrap_or(0) as u32,
                rating: Rating::None,
                music_id: item.get("musicId").and_then(Value::as_str).map(str::to_string),
                seed_id: item.get("seedId").and_then(Value::as_str).map(str::to_string),
                feedback_id: item.get("feedbackId").and_then(Value::as_str).map(str::to_string),
            });
        }

        // A zero-item response leaves the playlist empty (spec.md §8
        // boundary behavior); the next-station pointer lives in the
        // dispatcher, not here.
        self.catalog.set_playlist(songs);
        Ok(())
    }

    // ---- Feedback / rating ----

    pub fn add_feedback(&mut self, station_id: &str, track_token: &str, rating: Rating) -> Result<()> {
        let sid = station_id.to_string();
        let tt = track_token.to_string();
        let is_positive = matches!(rating, Rating::Love);
        self.call_authed("station.addFeedback", move |_| {
            Ok(json!({
                "stationToken": sid,
                "trackToken": tt,
                "isPositive": is_positive,
            }))
        })?;
        Ok(())
    }

    /// A convenience over `addFeedback`; its only catalog effect is to
    /// update the song's in-memory rating on success (spec.md §4.6).
    pub fn rate_song(&mut self, track_token: &str, rating: Rating) -> Result<()> {
        let station_id = self
            .catalog
            .playlist
            .iter()
            .find(|s| s.track_token == track_token)
            .map(|s| s.station_id.clone())
            .ok_or(Error::Precondition("song not found in playlist"))?;

        self.add_feedback(&station_id, track_token, rating)?;

        if let Some(song) = self
            .catalog
            .playlist
            .iter_mut()
            .find(|s| s.track_token == track_token)
        {
            song.rating = rating;
        }
        Ok(())
    }

    /// `moveSong(from,to,song)` = ban on `from`, then -- only on success --
    /// love on `to` (spec.md §4.6).
    pub fn move_song(&mut self, from_station: &str, to_station: &str, track_token: &str) -> Result<()> {
        self.add_feedback(from_station, track_token, Rating::Ban)?;
        self.add_feedback(to_station, track_token, Rating::Love)
    }

    pub fn add_tired_song(&mut self, track_token: &str) -> Result<()> {
        let tt = track_token.to_string();
        self.call_authed("user.sleepSong", move |_| Ok(json!({ "trackToken": tt })))?;
        if let Some(song) = self
            .catalog
            .playlist
            .iter_mut()
            .find(|s| s.track_token == track_token)
        {
            song.rating = Rating::Tired;
        }
        Ok(())
    }

    pub fn delete_feedback(&mut self, feedback_id: &str) -> Result<()> {
        let fid = feedback_id.to_string();
        self.call_authed("station.deleteFeedback", move |_| Ok(json!({ "feedbackId": fid })))?;
        Ok(())
    }

    // ---- Stations management ----

    pub fn rename_station(&mut self, station_id: &str, new_name: &str) -> Result<()> {
        let sid = station_id.to_string();
        let name = new_name.to_string();
        self.call_authed("station.renameStation", move |_| {
            Ok(json!({ "stationToken": sid, "stationName": name }))
        })?;
        // Local name only updates after server success (spec.md §4.6).
        if let Some(station) = self.catalog.find_station_mut(station_id) {
            station.name = new_name.to_string();
        }
        Ok(())
    }

    pub fn delete_station(&mut self, station_id: &str) -> Result<()> {
        let sid = station_id.to_string();
        self.call_authed("station.deleteStation", move |_| {
            Ok(json!({ "stationToken": sid }))
        })?;
        self.catalog.delete_station(station_id);
        Ok(())
    }

    pub fn create_station(&mut self, token: &str, seed_type: StationSeedType) -> Result<Station> {
        let t = token.to_string();
        let body = match seed_type {
            StationSeedType::Music => json!({ "musicToken": t }),
            StationSeedType::Song => json!({ "trackToken": t, "musicType": "song" }),
            StationSeedType::Artist => json!({ "trackToken": t, "musicType": "artist" }),
        };
        let result = self.call_authed("station.createStation", move |_| Ok(body.clone()))?;

        let station = Station {
            id: field_str(&result, "stationId")?,
            name: field_str(&result, "stationName")?,
            is_creator: true,
            is_quick_mix: false,
            use_quick_mix: false,
            seed_id: result.get("seedId").and_then(Value::as_str).map(str::to_string),
        };
        self.catalog.create_station(station.clone());
        Ok(station)
    }

    pub fn add_seed(&mut self, station_id: &str, music_id: &str) -> Result<()> {
        let sid = station_id.to_string();
        let mid = music_id.to_string();
        self.call_authed("station.addMusic", move |_| {
            Ok(json!({ "stationToken": sid, "musicToken": mid }))
        })?;
        Ok(())
    }

    pub fn delete_seed(&mut self, target: DeleteSeedTarget) -> Result<()> {
        let (method, seed_id) = match target {
            DeleteSeedTarget::Song(id) => ("station.deleteMusic", id),
            DeleteSeedTarget::Artist(id) => ("station.deleteMusic", id),
            DeleteSeedTarget::Station(id) => ("station.deleteMusic", id),
        };
        self.call_authed(method, move |_| Ok(json!({ "seedId": seed_id })))?;
        Ok(())
    }

    pub fn set_quick_mix(&mut self) -> Result<()> {
        let member_ids = self.catalog.quick_mix_member_ids();
        let ids_for_call = member_ids.clone();
        self.call_authed("user.setQuickMix", move |_| {
            Ok(json!({ "quickMixStationIds": ids_for_call }))
        })?;
        // Re-apply the server's authoritative list once accepted.
        self.catalog.apply_quick_mix_membership(&member_ids);
        Ok(())
    }

    pub fn transform_station(&mut self, station_id: &str) -> Result<()> {
        let sid = station_id.to_string();
        self.call_authed("station.transformSharedStation", move |_| {
            Ok(json!({ "stationToken": sid }))
        })?;
        Ok(())
    }

    pub fn get_station_info(&mut self, station_id: &str) -> Result<StationInfo> {
        let sid = station_id.to_string();
        let result = self.call_authed("station.getStation", move |_| {
            Ok(json!({ "stationToken": sid, "includeExtendedAttributes": true }))
        })?;

        let mut info = StationInfo::default();
        if let Some(seeds) = result.get("music").and_then(|m| m.get("artists")).and_then(Value::as_array) {
            for s in seeds {
                info.artist_seeds.push((field_str(s, "artistName")?, field_str(s, "seedId")?));
            }
        }
        if let Some(seeds) = result.get("music").and_then(|m| m.get("songs")).and_then(Value::as_array) {
            for s in seeds {
                info.song_seeds.push((field_str(s, "songName")?, field_str(s, "seedId")?));
            }
        }
        // Feedback is keyed by thumbsUp/thumbsDown rather than a flat list.
        if let Some(feedback) = result.get("feedback") {
            for (key, rating) in [("thumbsUp", Rating::Love), ("thumbsDown", Rating::Ban)] {
                let Some(items) = feedback.get(key).and_then(Value::as_array) else {
                    continue;
                };
                for s in items {
                    info.feedback.push(Song {
                        track_token: String::new(),
                        station_id: station_id.to_string(),
                        artist: field_str(s, "artistName")?,
                        album: String::new(),
                        title: field_str(s, "songName")?,
                        audio_url: String::new(),
                        audio_format: AudioFormat::Unknown,
                        cover_art: None,
                        detail_url: None,
                        file_gain_db: 0.0,
                        length_seconds: s.get("trackLength").and_then(Value::as_u64).unwrap_or(0) as u32,
                        rating,
                        music_id: None,
                        seed_id: None,
                        feedback_id: s.get("feedbackId").and_then(Value::as_str).map(str::to_string),
                    });
                }
            }
        }
        // `station_seeds` has no JSON representation in the current
        // (non-legacy-XML) response shape -- left empty, same as the
        // url-tail decryption path (spec.md §9).
        Ok(info)
    }

    pub fn explain(&mut self, track_token: &str) -> Result<String> {
        let tt = track_token.to_string();
        let result = self.call_authed("track.explainTrack", move |_| {
            Ok(json!({ "trackToken": tt }))
        })?;
        Ok(result
            .get("explanations")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default())
    }

    // ---- Search / genres / bookmarks ----

    pub fn search(&mut self, text: &str) -> Result<SearchResult> {
        let q = text.to_string();
        let result = self.call_authed("music.search", move |_| Ok(json!({ "searchText": q })))?;

        let mut out = SearchResult::default();
        if let Some(artists) = result.get("artists").and_then(Value::as_array) {
            for a in artists {
                out.artists.push((field_str(a, "artistName")?, field_str(a, "musicToken")?));
            }
        }
        if let Some(songs) = result.get("songs").and_then(Value::as_array) {
            for s in songs {
                out.songs.push((field_str(s, "songName")?, field_str(s, "musicToken")?));
            }
        }
        Ok(out)
    }

    pub fn get_genre_stations(&mut self) -> Result<()> {
        let result = self.call_authed("station.getGenreStations", |_| Ok(json!({})))?;
        let categories = result
            .get("categories")
            .and_then(Value::as_array)
            .ok_or(Error::MissingField("categories"))?;

        self.catalog.genres.clear();
        for cat in categories {
            let name = field_str(cat, "categoryName")?;
            let mut genres = Vec::new();
            if let Some(arr) = cat.get("stations").and_then(Value::as_array) {
                for g in arr {
                    genres.push(Genre {
                        name: field_str(g, "stationName")?,
                        music_token: field_str(g, "stationToken")?,
                    });
                }
            }
            self.catalog.genres.push(GenreCategory { category: name, genres });
        }
        Ok(())
    }

    pub fn bookmark_song(&mut self, track_token: &str) -> Result<()> {
        let tt = track_token.to_string();
        self.call_authed("bookmark.addSongBookmark", move |_| Ok(json!({ "trackToken": tt })))?;
        Ok(())
    }

    pub fn bookmark_artist(&mut self, track_token: &str) -> Result<()> {
        let tt = track_token.to_string();
        self.call_authed("bookmark.addArtistBookmark", move |_| Ok(json!({ "trackToken": tt })))?;
        Ok(())
    }

    pub fn get_settings(&mut self) -> Result<Value> {
        self.call_authed("user.getSettings", |_| Ok(json!({})))
    }

    pub fn change_settings(&mut self, settings: Value) -> Result<()> {
        // changeSettings is a pre-auth-style plaintext call per spec.md §4.4
        // design notes ("the first partner step and the change-settings
        // call" are sent in plaintext JSON).
        self.session.require_user_auth()?;
        let body = codec::authed_envelope(&self.session, settings, json!({}))?;
        self.send_plaintext("user.changeSettings", true, &body, false)?;
        Ok(())
    }
}

fn field_str(value: &Value, field: &'static str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(Error::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::atomic::AtomicU8;
    use std::sync::Arc;

    /// A scripted in-memory transport: each call pops the next canned
    /// outcome, letting tests drive exact server-response sequences
    /// (including the re-auth retry scenario) without a live server.
    struct FakeTransport {
        responses: RefCell<Vec<rb_http::Outcome>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        fn new(responses: Vec<rb_http::Outcome>) -> Self {
            Self {
                responses: RefCell::new(responses),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for FakeTransport {
        fn post(&self, url: &str, _body: Vec<u8>, _content_type: &str, _interrupted: &InterruptFlag) -> rb_http::Outcome {
            self.calls.borrow_mut().push(url.to_string());
            self.responses.borrow_mut().remove(0)
        }
    }

    fn ok(json: Value) -> rb_http::Outcome {
        rb_http::Outcome::Ok(serde_json::to_vec(&json!({"stat": "ok", "result": json})).unwrap())
    }

    fn fail(code: i64) -> rb_http::Outcome {
        rb_http::Outcome::Ok(serde_json::to_vec(&json!({"stat": "fail", "code": code})).unwrap())
    }

    fn engine(responses: Vec<rb_http::Outcome>) -> RpcEngine<FakeTransport> {
        let mut session = Session::new("example.com", "/services/json/", 443);
        session.key_ciphers("inkey123", "outkey12");
        session.partner.user = "android".into();
        session.partner.password = crate::session::Secret::new("pw".into());
        session.partner.device = "android-generic".into();

        RpcEngine::new(
            session,
            Catalog::new(50),
            FakeTransport::new(responses),
            Arc::new(AtomicU8::new(0)),
        )
    }

    fn logged_in_engine(extra_responses: Vec<rb_http::Outcome>) -> RpcEngine<FakeTransport> {
        let cipher = rb_cipher::KeyedCipher::new(b"inkey123");
        let mut sync_payload = vec![0u8, 0, 0, 0];
        sync_payload.extend_from_slice(b"1700000000");
        let sync_hex = cipher.encrypt_to_hex(&sync_payload).unwrap();

        let mut responses = vec![
            ok(json!({"partnerAuthToken": "ptok", "partnerId": 7, "syncTime": sync_hex})),
            ok(json!({"userAuthToken": "utok", "userId": "listener-1"})),
        ];
        responses.extend(extra_responses);
        let mut e = engine(responses);
        e.login("user@example.com", "hunter2").unwrap();
        e
    }

    #[test]
    fn login_populates_session_tokens_and_offset() {
        let e = logged_in_engine(vec![]);
        assert_eq!(e.session.partner.id, 7);
        assert_eq!(e.session.user.listener_id, "listener-1");
        assert_eq!(e.session.state, crate::session::AuthState::UserAuthed);
    }

    #[test]
    fn get_stations_preserves_server_order() {
        let mut e = logged_in_engine(vec![ok(json!({
            "stations": [
                {"stationId": "1", "stationName": "Rock"},
                {"stationId": "2", "stationName": "Jazz"},
            ]
        }))]);
        e.get_stations().unwrap();
        assert_eq!(e.catalog.stations[0].id, "1");
        assert_eq!(e.catalog.stations[1].id, "2");
    }

    #[test]
    fn rate_song_updates_rating_on_success() {
        let mut e = logged_in_engine(vec![ok(json!({}))]);
        e.catalog.set_playlist(vec![crate::catalog::Song {
            track_token: "tt1".into(),
            station_id: "1".into(),
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
        }]);
        e.rate_song("tt1", Rating::Ban).unwrap();
        assert_eq!(e.catalog.playlist[0].rating, Rating::Ban);
    }

    #[test]
    fn token_refresh_retries_once_and_succeeds() {
        // spec.md end-to-end scenario 3.
        let cipher = rb_cipher::KeyedCipher::new(b"inkey123");
        let mut sync_payload = vec![0u8, 0, 0, 0];
        sync_payload.extend_from_slice(b"1700000000");
        let sync_hex = cipher.encrypt_to_hex(&sync_payload).unwrap();

        let mut e = logged_in_engine(vec![
            fail(1001), // first attempt: expired token
            ok(json!({"partnerAuthToken": "ptok2", "partnerId": 7, "syncTime": sync_hex})),
            ok(json!({"userAuthToken": "utok2", "userId": "listener-1"})),
            ok(json!({"stations": []})), // retried call succeeds
        ]);
        e.get_stations().unwrap();
        assert_eq!(e.session.user.auth_token.as_str(), "utok2");
    }

    #[test]
    fn token_refresh_persistent_failure_surfaces_invalid_auth_token() {
        let cipher = rb_cipher::KeyedCipher::new(b"inkey123");
        let mut sync_payload = vec![0u8, 0, 0, 0];
        sync_payload.extend_from_slice(b"1700000000");
        let sync_hex = cipher.encrypt_to_hex(&sync_payload).unwrap();

        let mut e = logged_in_engine(vec![
            fail(1001),
            ok(json!({"partnerAuthToken": "ptok2", "partnerId": 7, "syncTime": sync_hex})),
            ok(json!({"userAuthToken": "utok2", "userId": "listener-1"})),
            fail(1001), // retry also fails
        ]);
        let err = e.get_stations().unwrap_err();
        assert!(matches!(err, Error::Server(ServerError::InvalidAuthToken)));
    }

    #[test]
    fn get_station_info_populates_seeds_and_feedback() {
        let mut e = logged_in_engine(vec![ok(json!({
            "music": {
                "artists": [{"artistName": "Artist A", "seedId": "seed-a"}],
                "songs": [{"songName": "Song B", "seedId": "seed-b"}],
            },
            "feedback": {
                "thumbsUp": [{"artistName": "Artist C", "songName": "Song C", "feedbackId": "fb1", "trackLength": 200}],
                "thumbsDown": [{"artistName": "Artist D", "songName": "Song D", "feedbackId": "fb2", "trackLength": 180}],
            },
        }))]);
        let info = e.get_station_info("1").unwrap();
        assert_eq!(info.artist_seeds, vec![("Artist A".to_string(), "seed-a".to_string())]);
        assert_eq!(info.song_seeds, vec![("Song B".to_string(), "seed-b".to_string())]);
        assert_eq!(info.feedback.len(), 2);
        assert_eq!(info.feedback[0].rating, Rating::Love);
        assert_eq!(info.feedback[0].feedback_id.as_deref(), Some("fb1"));
        assert_eq!(info.feedback[1].rating, Rating::Ban);
        assert!(info.station_seeds.is_empty());
    }

    #[test]
    fn delete_station_clears_current_and_playlist() {
        let mut e = logged_in_engine(vec![ok(json!({}))]);
        e.catalog.create_station(Station {
            id: "1".into(),
            name: "Rock".into(),
            is_creator: true,
            is_quick_mix: false,
            use_quick_mix: false,
            seed_id: None,
        });
        e.catalog.set_playlist(vec![]);
        e.delete_station("1").unwrap();
        assert!(e.catalog.find_station("1").is_none());
        assert!(e.catalog.playlist.is_empty());
    }
}
