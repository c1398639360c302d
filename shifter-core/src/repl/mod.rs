//! REPL tooling shared by bench front-ends.
//!
//! The REPL grammar lives in [`grammar`] and is parsed straight from `&str`
//! with `winnow`, so it stays compatible with `no_std`. [`commands`] applies
//! parsed commands to a [`BenchHarness`](crate::bench::BenchHarness).

pub mod commands;
pub mod grammar;
pub mod status;
