//! OAuth core for the Fyers authorization-code flow: anti-CSRF state
//! handling and the code-for-token exchange.

pub mod exchange;
pub mod state_store;
