pub mod export;
pub mod rest;
pub mod ws;
