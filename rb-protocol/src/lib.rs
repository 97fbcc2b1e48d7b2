//! JSON-RPC client for the streaming service's control-plane API: Blowfish
//! payload encryption, the partner/user login handshake, typed server
//! errors, and the in-memory catalog the RPC responses populate.

pub mod catalog;
pub mod codec;
pub mod error;
pub mod rpc;
pub mod session;

pub use catalog::{
    AudioFormat, Catalog, Genre, GenreCategory, Rating, SearchResult, SortOrder, Song, Station,
    StationInfo,
};
pub use codec::Quality;
pub use error::{Error, Result, ServerError};
pub use rpc::{DeleteSeedTarget, RpcEngine, StationSeedType, Transport};
pub use session::{AuthState, Partner, Secret, Session, User};
