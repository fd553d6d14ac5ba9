// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service description and health probing only.

pub mod health;
