pub mod server;
pub mod tenants;
pub mod token;
