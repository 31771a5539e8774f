pub mod ping;
pub mod identities;
