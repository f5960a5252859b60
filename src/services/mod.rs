// src/services/mod.rs

pub mod access;
pub mod attempt_timing;
pub mod checkout;
pub mod doubts;
pub mod scoring;
pub mod storage;
