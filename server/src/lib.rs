//! Planet Scribbles storefront backend: catalog, offers, orders, payments,
//! events, and meetups over actix-web and PostgreSQL.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod state;
pub mod web;
