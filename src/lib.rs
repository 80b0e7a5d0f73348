pub mod assets;
pub mod config;
pub mod editionguard;
pub mod extract;
pub mod logging;
pub mod notify;
pub mod reconcile;
pub mod shopify;

pub mod util {
    pub mod env;
}
