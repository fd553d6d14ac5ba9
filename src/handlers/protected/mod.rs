// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here runs behind `jwt_auth_middleware`, so handlers receive
// an `AuthUser` extension. Role checks happen in the handler, next to the
// operation they guard.

pub mod bag_lifts;
pub mod journeys;
pub mod kyc;
pub mod masons;
pub mod redemptions;
pub mod sync;
