pub mod audio;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod console;
pub mod ids;
pub mod library;
pub mod linked;
pub mod media;
pub mod model;
pub mod player;
pub mod playlist;
pub mod sequencer;
pub mod store;
pub mod users;
