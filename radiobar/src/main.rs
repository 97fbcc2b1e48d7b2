//! `radiobar`: a terminal client for a proprietary internet-radio service
//! (login, stations, streaming playback, keyboard dispatch). Entry point
//! wiring mirrors `pmoapp`/`pmocontrol`'s CLI setup: config load, logging
//! init, session construction, then handing off to the main loop.

mod app;
mod dispatch;
mod eventcmd;
mod term;
mod ui;

use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use rb_audio::{Player, PlayerConfig};
use rb_config::{Config, State};
use rb_http::{HttpClient, HttpConfig};
use rb_protocol::catalog::Catalog;
use rb_protocol::rpc::RpcEngine;
use rb_protocol::session::Session;

const PACKAGE_NAME: &str = "radiobar";
const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging() {
    let channel_filter = std::env::var("PIANOBAR_DEBUG")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .map(decode_debug_mask)
        .unwrap_or_default();

    let filter = if !channel_filter.is_empty() {
        tracing_subscriber::EnvFilter::new(channel_filter)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// `PIANOBAR_DEBUG` is a bitmask over the same four channels the player,
/// dispatcher and RPC engine log under: bit0=net, bit1=rpc, bit2=player,
/// bit3=dispatch.
fn decode_debug_mask(mask: u32) -> String {
    let mut targets = Vec::new();
    if mask & 0b0001 != 0 {
        targets.push("rb_http=debug");
    }
    if mask & 0b0010 != 0 {
        targets.push("rb_protocol=debug");
    }
    if mask & 0b0100 != 0 {
        targets.push("rb_audio=debug");
    }
    if mask & 0b1000 != 0 {
        targets.push("radiobar=debug");
    }
    targets.join(",")
}

fn load_config() -> anyhow::Result<Config> {
    let path = rb_config::default_config_path()?;
    match Config::load_from_file(&path) {
        Ok(config) => Ok(config),
        Err(rb_config::ConfigError::Read { .. }) => {
            tracing::warn!(path = %path.display(), "no config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn load_state() -> State {
    rb_config::default_state_path()
        .ok()
        .and_then(|path| State::load_from_file(&path).ok())
        .unwrap_or_default()
}

fn main() -> anyhow::Result<()> {
    init_logging();

    println!("{PACKAGE_NAME} {PACKAGE_VERSION} - press ? for help");

    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: failed to load config: {e}");
            std::process::exit(1);
        }
    };
    let state = load_state();

    let username = config.username.clone().unwrap_or_else(|| {
        ui::prompt(&config.msg_formats, "Username: ")
    });
    let password = match config.resolve_password() {
        Some(p) => p,
        None => ui::prompt(&config.msg_formats, "Password: "),
    };

    let interrupted: rb_http::InterruptFlag = Arc::new(AtomicU8::new(0));

    let http_config = HttpConfig {
        proxy: config.proxy.clone(),
        control_proxy: config.control_proxy.clone(),
        ca_bundle: config.ca_bundle.clone(),
        ..HttpConfig::default()
    };
    // Two lightweight `HttpClient`s sharing the same config: one owned by
    // the RpcEngine (serialized per spec.md §5), one shared with the
    // player's producer thread for the concurrent audio-stream GET.
    let http_for_rpc = match HttpClient::new(http_config.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: crypto/TLS init failed: {e}");
            std::process::exit(1);
        }
    };
    let http_for_audio = match HttpClient::new(http_config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("fatal: crypto/TLS init failed: {e}");
            std::process::exit(1);
        }
    };

    let mut session = Session::new(config.rpc_host.clone(), "/services/json/", config.rpc_tls_port);
    session.partner.user = config.partner_user.clone();
    session.partner.password = rb_protocol::Secret::new(config.partner_password.clone());
    session.partner.device = config.device.clone();
    session.partner.in_key = config.inkey.clone();
    session.partner.out_key = config.outkey.clone();
    session.http_proxy = config.proxy.clone();
    session.control_proxy = config.control_proxy.clone();
    session.ca_bundle = config.ca_bundle.clone();
    session.key_ciphers(&config.inkey, &config.outkey);

    let catalog = Catalog::new(config.history);
    let rpc = RpcEngine::new(session, catalog, http_for_rpc, Arc::clone(&interrupted));

    let player = Player::new(PlayerConfig {
        buffer_seconds: 10,
        target_sample_rate: 44100,
        base_volume_db: config.volume as f64,
        gain_mul: 1.0,
    });

    let mut app = app::App::new(config, rpc, player, http_for_audio, interrupted);
    if let Err(e) = app.bootstrap(&username, &password, &state) {
        eprintln!("fatal: login failed: {e}");
        std::process::exit(1);
    }

    let _raw_term = term::RawTerm::enable().ok();
    let fifo = app
        .config
        .fifo
        .as_deref()
        .and_then(term::open_control_fifo);
    let input = term::InputMux::new(fifo);

    let final_state = app.run(input)?;

    if let Ok(path) = rb_config::default_state_path() {
        if let Err(e) = app::save_state(&path, &final_state) {
            tracing::warn!(error = %e, "failed to write state file");
        }
    }

    Ok(())
}
