pub mod auth;
pub mod boundary;
pub mod broadcast;
pub mod cli;
pub mod config;
pub mod durable;
pub mod error;
pub mod hotstore;
pub mod http;
pub mod ingress;
pub mod spatial;
pub mod validator;
pub mod websocket;
