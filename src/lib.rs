//! # Discussion Mirror
//!
//! Periodically pulls discussions from a configured set of GitHub
//! repositories through the GraphQL API and stores each one as a local
//! record, tagged by repository under its organization.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │  Query   │──▶│  Client  │──▶│  Mapper  │──▶│  Store   │
//! │ builder  │   │ (GraphQL)│   │+sanitize │   │ (SQLite) │
//! └──────────┘   └──────────┘   └──────────┘   └────┬─────┘
//!       ▲                                           │
//!       │ pipeline (schedule / manual)   ┌──────────┤
//!                                        ▼          ▼
//!                                   ┌────────┐ ┌────────┐
//!                                   │  CLI   │ │  HTTP  │
//!                                   │(mirror)│ │ (axum) │
//!                                   └────────┘ └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mirror init              # create database
//! mirror run               # fetch and store once
//! mirror list --repo docs  # browse what was stored
//! mirror serve             # HTML surfaces + scheduled runs
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and per-run settings |
//! | [`query`] | GraphQL request construction |
//! | [`client`] | Authenticated GraphQL transport |
//! | [`mapper`] | Response projection into records |
//! | [`sanitize`] | Markup stripping, URL checks, HTML escaping |
//! | [`persist`] | Writing records and repository tags |
//! | [`store`] | Storage trait with SQLite and in-memory backends |
//! | [`pipeline`] | Per-repository orchestration and the run lock |
//! | [`schedule`] | Recurring runs |
//! | [`render`] | HTML fragments |
//! | [`server`] | HTTP surfaces and the manual trigger |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod get;
pub mod mapper;
pub mod migrate;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod preview;
pub mod query;
pub mod render;
pub mod sanitize;
pub mod schedule;
pub mod server;
pub mod sources;
pub mod store;
