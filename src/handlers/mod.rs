// handlers/mod.rs - Two-tier handler architecture
//
// Public (no session) → Protected (session cookie or Bearer token required),
// plus the unauthenticated system endpoints.
//
// Every handler follows the same shape: validate input → authenticate and
// authorize → resolve the tenant store → one service call → JSON envelope.
// Input is checked before the tenant store is resolved, so a rejected
// request never opens a connection.

pub mod protected; // Tier 2: session required (/api/*)
pub mod public; // Tier 1: no session (/api/auth/login, /api/site/*)
pub mod system; // /, /health
