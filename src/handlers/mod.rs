// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT auth). The WebSocket channel sits
// beside them: it authenticates the upgrade request itself, because
// browsers cannot set headers on a WebSocket handshake.
pub mod protected;
pub mod public;
pub mod socket;
