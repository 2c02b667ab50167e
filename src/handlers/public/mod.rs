// handlers/public/mod.rs - Public handlers (no session required)
//
// Security Level: None
// Tenant: x-domain header (or the login body's domain)

pub mod auth; // POST /api/auth/login, POST /api/auth/logout
pub mod site; // GET /api/site/pages/:slug
