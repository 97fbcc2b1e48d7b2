//! Main loop: owns the `RpcEngine`, `Player`, `Config` and drives the
//! dispatcher. Grounded in `examples/original_source/src/main.c`'s
//! `BarMainLoop` shape (login, station selection, playlist refill, dispatch
//! poll) translated into the teacher's style of a single `App` struct
//! driving a `run` method, as `pmoapp`/`pmocontrol` wire their CLI entry
//! points.

use std::io::Write as _;
use std::sync::Arc;
use std::thread::JoinHandle;

use rb_audio::{FakeDecoder, NullSink, Player, PlayerOutcome};
use rb_config::format::MsgType;
use rb_config::{Config, State};
use rb_http::{HttpClient, InterruptFlag};
use rb_protocol::catalog::Rating;
use rb_protocol::rpc::StationSeedType;
use rb_protocol::{Error, RpcEngine};

use crate::dispatch::{self, Context, Resolved};
use crate::eventcmd::{self, Event};
use crate::term::{InputMux, Ready};
use crate::ui;

pub struct App {
    pub config: Config,
    pub rpc: RpcEngine<HttpClient>,
    pub player: Arc<Player>,
    pub http: Arc<HttpClient>,
    pub interrupted: InterruptFlag,
    current_station: Option<String>,
    player_thread: Option<JoinHandle<PlayerOutcome>>,
    player_errors: u32,
}

impl App {
    pub fn new(config: Config, rpc: RpcEngine<HttpClient>, player: Player, http: Arc<HttpClient>, interrupted: InterruptFlag) -> Self {
        Self {
            config,
            rpc,
            player: Arc::new(player),
            http,
            interrupted,
            current_station: None,
            player_thread: None,
            player_errors: 0,
        }
    }

    fn ctx(&self) -> Context {
        Context {
            has_station: self.current_station.is_some(),
            has_song: self.rpc.catalog.current_song().is_some(),
        }
    }

    fn say(&self, ty: MsgType, body: &str) {
        ui::msg(&self.config.msg_formats, ty, body);
    }

    fn fire_event(&self, event: Event, outcome: &eventcmd::Outcome) {
        let Some(command) = &self.config.event_command else { return };
        let song = self.rpc.catalog.current_song();
        let station = self.current_station.as_deref().and_then(|id| self.rpc.catalog.find_station(id));
        let played_secs = self.player.song_played_ms() / 1000;
        eventcmd::run(command, event, song, station, outcome, &self.rpc.catalog, played_secs);
    }

    fn ok_outcome() -> eventcmd::Outcome {
        eventcmd::Outcome { proto_ret: 1, proto_ret_str: "ok".into(), wire_ret: 0, wire_ret_str: "ok".into() }
    }

    fn err_outcome(e: &Error) -> eventcmd::Outcome {
        eventcmd::Outcome { proto_ret: 0, proto_ret_str: e.to_string(), wire_ret: 0, wire_ret_str: String::new() }
    }

    /// Logs in, fetches the station list, and either autostarts the
    /// configured station or prompts the user to pick one.
    pub fn bootstrap(&mut self, username: &str, password: &str, state: &State) -> anyhow::Result<()> {
        self.say(MsgType::Info, "Login...");
        self.rpc.login(username, password)?;
        self.fire_event(Event::UserLogin, &Self::ok_outcome());

        self.rpc.get_stations()?;
        self.fire_event(Event::UserGetStations, &Self::ok_outcome());

        let wanted = self.config.autostart_station.clone().or_else(|| state.autostart_station.clone());
        let station_id = match wanted.and_then(|id| self.rpc.catalog.find_station(&id).map(|s| s.id.clone())) {
            Some(id) => id,
            None => self.prompt_station_select()?,
        };
        self.select_station(&station_id)?;
        Ok(())
    }

    fn prompt_station_select(&mut self) -> anyhow::Result<String> {
        let stations = self.rpc.catalog.sorted_stations(self.config.sort_order);
        for (i, station) in stations.iter().enumerate() {
            ui::list_item(&self.config.msg_formats, i, &station.name);
        }
        let answer = ui::prompt(&self.config.msg_formats, "Select station: ");
        let index: usize = answer.parse().map_err(|_| anyhow::anyhow!("not a number"))?;
        stations
            .get(index)
            .map(|s| s.id.clone())
            .ok_or_else(|| anyhow::anyhow!("station index out of range"))
    }

    fn select_station(&mut self, station_id: &str) -> anyhow::Result<()> {
        self.current_station = Some(station_id.to_string());
        self.rpc.get_playlist(station_id, self.config.audio_quality)?;
        self.fire_event(Event::StationFetchPlaylist, &Self::ok_outcome());
        self.start_current_song();
        Ok(())
    }

    fn start_current_song(&mut self) {
        let Some(song) = self.rpc.catalog.current_song().cloned() else { return };
        self.fire_event(Event::SongStart, &Self::ok_outcome());
        let player = Arc::clone(&self.player);
        let http = Arc::clone(&self.http);
        let interrupted = Arc::clone(&self.interrupted);
        let url = song.audio_url.clone();
        let file_gain = song.file_gain_db;
        self.player_thread = Some(std::thread::spawn(move || {
            let decoder = Box::new(FakeDecoder::new(44100, 2, 4096));
            let sink = Box::new(NullSink);
            player.run_track(&url, file_gain, http, decoder, sink, interrupted)
        }));
    }

    /// Polls for track completion without blocking the dispatch loop;
    /// called once per redraw tick.
    fn poll_player(&mut self) {
        let Some(handle) = &self.player_thread else { return };
        if !handle.is_finished() {
            return;
        }
        let handle = self.player_thread.take().unwrap();
        let outcome = handle.join().unwrap_or(PlayerOutcome::HardFail);
        self.fire_event(Event::SongFinish, &Self::ok_outcome());
        self.rpc.catalog.finish_current_song();

        match outcome {
            PlayerOutcome::Ok => self.player_errors = 0,
            PlayerOutcome::SoftFail => {
                self.player_errors += 1;
                if self.player_errors >= self.config.max_player_errors {
                    self.say(MsgType::Err, "Too many player errors, stopping station");
                    self.current_station = None;
                    return;
                }
            }
            PlayerOutcome::HardFail => {
                self.say(MsgType::Err, "Playback device/filter unavailable, stopping station");
                self.current_station = None;
                return;
            }
        }

        if self.rpc.catalog.current_song().is_none() {
            if let Some(station_id) = self.current_station.clone() {
                if let Err(e) = self.rpc.get_playlist(&station_id, self.config.audio_quality) {
                    self.say(MsgType::Err, &e.to_string());
                    return;
                }
                self.fire_event(Event::StationFetchPlaylist, &Self::ok_outcome());
            }
        }
        self.start_current_song();
    }

    /// Runs the interactive loop until the user quits. `control_fifo` is
    /// the opened FIFO handle, if any (spec.md §6).
    pub fn run(&mut self, mut input: InputMux) -> anyhow::Result<State> {
        loop {
            self.poll_player();
            self.redraw_clock();

            match input.wait(1000) {
                Ok(Ready::Timeout) => continue,
                Ok(Ready::Stdin) => {
                    if let Some(key) = input.read_stdin_key()? {
                        if self.handle_key(key) {
                            break;
                        }
                    }
                }
                Ok(Ready::Fifo) => {
                    if let Some(key) = input.read_fifo_key()? {
                        if self.handle_key(key) {
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "input poll failed");
                }
            }
        }

        self.player.skip();
        if let Some(handle) = self.player_thread.take() {
            let _ = handle.join();
        }

        Ok(State {
            volume: self.config.volume,
            autostart_station: self.current_station.clone(),
        })
    }

    fn redraw_clock(&self) {
        if let Some(song) = self.rpc.catalog.current_song() {
            let played = self.player.song_played_ms() / 1000;
            ui::msg_inplace(
                &self.config.msg_formats,
                MsgType::Time,
                &format!("{}:{:02} \"{}\" by \"{}\"", played / 60, played % 60, song.title, song.artist),
            );
        }
    }

    /// Returns `true` if the user requested quit.
    fn handle_key(&mut self, key: char) -> bool {
        let ctx = self.ctx();
        match dispatch::resolve(&self.config.keys, &ctx, key) {
            Resolved::Unbound => false,
            Resolved::WrongContext(action) => {
                self.say(MsgType::Err, dispatch::context_error(action, &ctx));
                false
            }
            Resolved::Action(action) => self.run_action(action),
        }
    }

    fn run_action(&mut self, action: rb_config::keys::Action) -> bool {
        use rb_config::keys::Action::*;
        let result: anyhow::Result<()> = (|| match action {
            Help => {
                self.say(MsgType::Info, "? help, q quit, p pause, n next, + love, - ban");
                Ok(())
            }
            Quit => return Ok(()),
            TogglePause => {
                self.player.toggle_pause();
                Ok(())
            }
            Play => {
                self.player.resume();
                Ok(())
            }
            Pause => {
                self.player.pause();
                Ok(())
            }
            SkipSong => {
                self.player.skip();
                Ok(())
            }
            VolUp => {
                self.config.volume = (self.config.volume + 5).min(0);
                self.player.set_base_volume_db(self.config.volume as f64);
                Ok(())
            }
            VolDown => {
                self.config.volume = (self.config.volume - 5).max(-60);
                self.player.set_base_volume_db(self.config.volume as f64);
                Ok(())
            }
            VolReset => {
                self.config.volume = 0;
                self.player.set_base_volume_db(self.config.volume as f64);
                Ok(())
            }
            LoveSong => self.rate_current(Rating::Love, Event::SongLove),
            BanSong => self.rate_current(Rating::Ban, Event::SongBan),
            TempBanSong => {
                let token = self.rpc.catalog.current_song().map(|s| s.track_token.clone());
                if let Some(token) = token {
                    self.rpc.add_tired_song(&token)?;
                    self.fire_event(Event::SongShelf, &Self::ok_outcome());
                    self.say(MsgType::Info, "Song marked tired");
                }
                Ok(())
            }
            Bookmark => {
                let token = self.rpc.catalog.current_song().map(|s| s.track_token.clone());
                if let Some(token) = token {
                    self.rpc.bookmark_song(&token)?;
                    self.fire_event(Event::SongBookmark, &Self::ok_outcome());
                    self.say(MsgType::Info, "Bookmarked");
                }
                Ok(())
            }
            Explain => {
                let token = self.rpc.catalog.current_song().map(|s| s.track_token.clone());
                if let Some(token) = token {
                    let explanation = self.rpc.explain(&token)?;
                    self.fire_event(Event::SongExplain, &Self::ok_outcome());
                    self.say(MsgType::Info, &explanation);
                }
                Ok(())
            }
            History => {
                for (i, song) in self.rpc.catalog.history.iter().enumerate() {
                    ui::list_item(&self.config.msg_formats, i, &format!("{} - {}", song.artist, song.title));
                }
                Ok(())
            }
            PrintUpcoming => {
                for (i, song) in self.rpc.catalog.playlist.iter().enumerate() {
                    ui::list_item(&self.config.msg_formats, i, &format!("{} - {}", song.artist, song.title));
                }
                Ok(())
            }
            SongInfo => {
                if let Some(song) = self.rpc.catalog.current_song() {
                    self.say(MsgType::Info, &format!("{} - {} ({})", song.artist, song.title, song.album));
                } else if let Some(station) = self.current_station.as_deref().and_then(|id| self.rpc.catalog.find_station(id)) {
                    self.say(MsgType::Info, &station.name);
                }
                Ok(())
            }
            SelectStation => {
                let id = self.prompt_station_select()?;
                self.select_station(&id)?;
                Ok(())
            }
            CreateStation => {
                let seed = ui::prompt(&self.config.msg_formats, "Create station from music id: ");
                let station = self.rpc.create_station(&seed, StationSeedType::Music)?;
                self.fire_event(Event::StationCreate, &Self::ok_outcome());
                self.say(MsgType::Info, &format!("Created station \"{}\"", station.name));
                Ok(())
            }
            DeleteStation => {
                if let Some(id) = self.current_station.clone() {
                    self.rpc.delete_station(&id)?;
                    self.fire_event(Event::StationDelete, &Self::ok_outcome());
                    // Deleting the current station cancels playback and
                    // drains the playlist (spec.md §4.6/§8).
                    self.player.skip();
                    if let Some(handle) = self.player_thread.take() {
                        let _ = handle.join();
                    }
                    self.current_station = None;
                    self.say(MsgType::Info, "Station deleted");
                }
                Ok(())
            }
            RenameStation => {
                if let Some(id) = self.current_station.clone() {
                    let name = ui::prompt(&self.config.msg_formats, "New station name: ");
                    self.rpc.rename_station(&id, &name)?;
                    self.fire_event(Event::StationRename, &Self::ok_outcome());
                }
                Ok(())
            }
            AddMusic => {
                if let Some(id) = self.current_station.clone() {
                    let music_id = ui::prompt(&self.config.msg_formats, "Add music id: ");
                    self.rpc.add_seed(&id, &music_id)?;
                    self.fire_event(Event::StationAddMusic, &Self::ok_outcome());
                }
                Ok(())
            }
            AddSharedStation => {
                let text = ui::prompt(&self.config.msg_formats, "Search: ");
                let results = self.rpc.search(&text)?;
                for (i, (name, id)) in results.artists.iter().enumerate() {
                    ui::list_item(&self.config.msg_formats, i, &format!("{name} ({id})"));
                }
                self.fire_event(Event::StationAddShared, &Self::ok_outcome());
                Ok(())
            }
            StationFromGenre => {
                self.rpc.get_genre_stations()?;
                self.fire_event(Event::StationFetchGenre, &Self::ok_outcome());
                for (i, category) in self.rpc.catalog.genres.iter().enumerate() {
                    ui::list_item(&self.config.msg_formats, i, &category.category);
                }
                Ok(())
            }
            SelectQuickMix => {
                self.rpc.set_quick_mix()?;
                self.fire_event(Event::StationQuickMixToggle, &Self::ok_outcome());
                Ok(())
            }
            ManageStation => {
                if let Some(id) = self.current_station.clone() {
                    let info = self.rpc.get_station_info(&id)?;
                    self.fire_event(Event::StationFetchInfo, &Self::ok_outcome());
                    for (i, (name, seed_id)) in info.artist_seeds.iter().enumerate() {
                        ui::list_item(&self.config.msg_formats, i, &format!("artist: {name} ({seed_id})"));
                    }
                    for (i, (title, seed_id)) in info.song_seeds.iter().enumerate() {
                        ui::list_item(&self.config.msg_formats, i, &format!("song: {title} ({seed_id})"));
                    }
                }
                Ok(())
            }
            CreateStationFromSong => {
                let token = self.rpc.catalog.current_song().map(|s| s.track_token.clone());
                if let Some(token) = token {
                    let station = self.rpc.create_station(&token, StationSeedType::Song)?;
                    self.fire_event(Event::StationCreate, &Self::ok_outcome());
                    self.say(MsgType::Info, &format!("Created station \"{}\"", station.name));
                }
                Ok(())
            }
        })();

        if action == Quit {
            return true;
        }
        if let Err(e) = result {
            self.say(MsgType::Err, &e.to_string());
        }
        false
    }

    /// Banning the currently-playing song skips it immediately: the player
    /// is told to quit, which unwinds both its threads without a fresh
    /// `getPlaylist` call (spec.md §8 scenario 2).
    fn rate_current(&mut self, rating: Rating, event: Event) -> anyhow::Result<()> {
        let token = self.rpc.catalog.current_song().map(|s| s.track_token.clone());
        if let Some(token) = token {
            match self.rpc.rate_song(&token, rating) {
                Ok(()) => {
                    self.fire_event(event, &Self::ok_outcome());
                    if rating == Rating::Ban {
                        self.player.skip();
                    }
                }
                Err(e) => {
                    self.fire_event(event, &Self::err_outcome(&e));
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

/// Writes the cross-run state file, zeroing nothing here -- `volume` and
/// `autostart_station` are not secrets.
pub fn save_state(path: &std::path::Path, state: &State) -> anyhow::Result<()> {
    state.save_to_file(path)?;
    std::io::stdout().flush().ok();
    Ok(())
}
