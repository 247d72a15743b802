// Pick'em contest scoring and live ranking.
//
// Everything in this crate is a pure projection over game results supplied
// by a `GameLookup`; nothing here performs I/O or holds state between runs.

pub mod alignment;
pub mod contest;
pub mod game;
pub mod lookup;
pub mod ranking;
pub mod scoring;
