// src/handlers/mod.rs

pub mod admin;
pub mod attempts;
pub mod auth;
pub mod chat;
pub mod courses;
pub mod doubts;
pub mod mocks;
pub mod payments;
pub mod profile;
