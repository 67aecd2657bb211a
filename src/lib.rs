//! GeoPlan Ciudad Viva - climate-action planning backend for Santa Cruz de la Sierra.
//!
//! # Overview
//!
//! Citizens simulate urban climate strategies (reforestation, renewable
//! energy, public transport, waste management, water conservation) against
//! a fixed city profile, earn points and rewards for taking part, and
//! receive environmental notifications backed by NASA POWER and FIRMS data.
//!
//! # Modules
//!
//! - [`simulation`]: Impact, cost, feasibility and timeline calculators
//! - [`gamification`]: Points ledger, levels, certificates and achievements
//! - [`rewards`]: Reward catalog and per-user eligibility
//! - [`notifications`]: In-process notification broker and scheduler
//! - [`data_sources`]: NASA POWER and FIRMS clients with simulated fallback
//! - [`alerts`]: Environmental alerts derived from NASA data
//! - [`users`]: User registration
//! - [`storage`]: SQLite storage layer
//! - [`api`]: HTTP API handlers

pub mod alerts;
pub mod api;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod gamification;
pub mod model;
pub mod notifications;
pub mod random;
pub mod rewards;
pub mod simulation;
pub mod storage;
pub mod users;
