pub mod app;
pub mod config;
pub mod db;
pub mod entries;
pub mod espn;
pub mod protocol;
pub mod ws_server;
