// src/models/mod.rs

pub mod attempt;
pub mod content;
pub mod course;
pub mod doubt;
pub mod enrollment;
pub mod mock;
pub mod payment;
pub mod user;
