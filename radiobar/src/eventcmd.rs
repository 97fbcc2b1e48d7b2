//! External event-hook subprocess invocation: `/bin/sh -c "<command>"
//! <eventType>`, fed a stable key=value block on stdin. Grounded in
//! `examples/original_source/src/ui.c`'s `BarUiStartEventCmd` for the exact
//! field set and ordering.

use std::io::Write as _;
use std::process::{Command, Stdio};

use rb_protocol::{Catalog, Song, Station};

/// One lifecycle event name, matching the original's literal event strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    UserLogin,
    UserGetStations,
    StationFetchPlaylist,
    SongStart,
    SongFinish,
    SongLove,
    SongBan,
    SongShelf,
    SongBookmark,
    ArtistBookmark,
    StationCreate,
    StationDelete,
    StationRename,
    StationAddMusic,
    StationAddShared,
    StationAddGenre,
    StationFetchGenre,
    StationQuickMixToggle,
    StationFetchInfo,
    StationDeleteArtistSeed,
    StationDeleteSongSeed,
    StationDeleteStationSeed,
    StationDeleteFeedback,
    SongExplain,
    SettingsGet,
    SettingsChange,
}

impl Event {
    fn name(self) -> &'static str {
        match self {
            Event::UserLogin => "userlogin",
            Event::UserGetStations => "usergetstations",
            Event::StationFetchPlaylist => "stationfetchplaylist",
            Event::SongStart => "songstart",
            Event::SongFinish => "songfinish",
            Event::SongLove => "songlove",
            Event::SongBan => "songban",
            Event::SongShelf => "songshelf",
            Event::SongBookmark => "songbookmark",
            Event::ArtistBookmark => "artistbookmark",
            Event::StationCreate => "stationcreate",
            Event::StationDelete => "stationdelete",
            Event::StationRename => "stationrename",
            Event::StationAddMusic => "stationaddmusic",
            Event::StationAddShared => "stationaddshared",
            Event::StationAddGenre => "stationaddgenre",
            Event::StationFetchGenre => "stationfetchgenre",
            Event::StationQuickMixToggle => "stationquickmixtoggle",
            Event::StationFetchInfo => "stationfetchinfo",
            Event::StationDeleteArtistSeed => "stationdeleteartistseed",
            Event::StationDeleteSongSeed => "stationdeletesongseed",
            Event::StationDeleteStationSeed => "stationdeletestationseed",
            Event::StationDeleteFeedback => "stationdeletefeedback",
            Event::SongExplain => "songexplain",
            Event::SettingsGet => "settingsget",
            Event::SettingsChange => "settingschange",
        }
    }
}

/// Process/wait outcome of a completed RPC or player action, rendered into
/// the `pRet`/`pRetStr`/`wRet`/`wRetStr` lines.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub proto_ret: i32,
    pub proto_ret_str: String,
    pub wire_ret: i32,
    pub wire_ret_str: String,
}

fn kv_line(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(" = ");
    out.push_str(value);
    out.push('\n');
}

/// Builds the exact stdin block the original writes: current song fields,
/// the two outcome pairs, then the full station list.
fn build_block(song: Option<&Song>, station: Option<&Station>, outcome: &Outcome, catalog: &Catalog, song_played_secs: u64) -> String {
    let mut out = String::new();
    kv_line(&mut out, "artist", song.map(|s| s.artist.as_str()).unwrap_or(""));
    kv_line(&mut out, "title", song.map(|s| s.title.as_str()).unwrap_or(""));
    kv_line(&mut out, "album", song.map(|s| s.album.as_str()).unwrap_or(""));
    kv_line(
        &mut out,
        "coverArt",
        song.and_then(|s| s.cover_art.as_deref()).unwrap_or(""),
    );
    kv_line(&mut out, "stationName", station.map(|s| s.name.as_str()).unwrap_or(""));
    kv_line(
        &mut out,
        "songStationName",
        song.and_then(|s| catalog.find_station(&s.station_id))
            .map(|s| s.name.as_str())
            .unwrap_or(""),
    );
    kv_line(&mut out, "pRet", &outcome.proto_ret.to_string());
    kv_line(&mut out, "pRetStr", &outcome.proto_ret_str);
    kv_line(&mut out, "wRet", &outcome.wire_ret.to_string());
    kv_line(&mut out, "wRetStr", &outcome.wire_ret_str);
    kv_line(
        &mut out,
        "songDuration",
        &song.map(|s| s.length_seconds).unwrap_or(0).to_string(),
    );
    kv_line(&mut out, "songPlayed", &song_played_secs.to_string());
    kv_line(
        &mut out,
        "rating",
        song.map(|s| format!("{:?}", s.rating)).unwrap_or_default().as_str(),
    );
    kv_line(&mut out, "detailUrl", song.and_then(|s| s.detail_url.as_deref()).unwrap_or(""));
    kv_line(&mut out, "stationCount", &catalog.stations.len().to_string());
    for (i, s) in catalog.stations.iter().enumerate() {
        kv_line(&mut out, &format!("station{i}"), &s.name);
    }
    out
}

/// Forks `/bin/sh -c "<command>" <eventType>` and writes the event block to
/// its stdin, discarding the child's own stdout/stderr pass-through (they
/// inherit the terminal, same as the original).
pub fn run(
    command: &str,
    event: Event,
    song: Option<&Song>,
    station: Option<&Station>,
    outcome: &Outcome,
    catalog: &Catalog,
    song_played_secs: u64,
) {
    let block = build_block(song, station, outcome, catalog, song_played_secs);
    let child = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .arg(event.name())
        .stdin(Stdio::piped())
        .spawn();
    let mut child = match child {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to spawn event command");
            return;
        }
    };
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(block.as_bytes()) {
            tracing::warn!(error = %e, "failed to write event command stdin");
        }
    }
    if let Err(e) = child.wait() {
        tracing::warn!(error = %e, "event command wait failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_protocol::catalog::{AudioFormat, Rating};

    fn sample_song() -> Song {
        Song {
            track_token: "tok".into(),
            station_id: "st1".into(),
            artist: "Artist".into(),
            album: "Album".into(),
            title: "Title".into(),
            audio_url: "https://example.test/a.mp3".into(),
            audio_format: AudioFormat::Mp3,
            cover_art: None,
            detail_url: None,
            file_gain_db: 0.0,
            length_seconds: 200,
            rating: Rating::None,
            music_id: None,
            seed_id: None,
            feedback_id: None,
        }
    }

    #[test]
    fn block_includes_station_count_and_listing() {
        let mut catalog = Catalog::default();
        catalog.stations.push(Station {
            id: "st1".into(),
            name: "My Station".into(),
            is_creator: true,
            is_quick_mix: false,
            use_quick_mix: true,
            seed_id: None,
        });
        let song = sample_song();
        let outcome = Outcome::default();
        let block = build_block(Some(&song), catalog.find_station("st1"), &outcome, &catalog, 42);
        assert!(block.contains("stationCount = 1\n"));
        assert!(block.contains("station0 = My Station\n"));
        assert!(block.contains("artist = Artist\n"));
        assert!(block.contains("songPlayed = 42\n"));
    }

    #[test]
    fn missing_song_renders_empty_fields_not_panic() {
        let catalog = Catalog::default();
        let outcome = Outcome::default();
        let block = build_block(None, None, &outcome, &catalog, 0);
        assert!(block.contains("artist = \n"));
        assert!(block.contains("songDuration = 0\n"));
    }
}
