#![allow(dead_code, non_snake_case, non_upper_case_globals)]

//! Lindblad dynamics of a resonator–transmon–…–transmon–resonator chain
//! coupled to two thermal baths at its ends.

pub mod error;
pub mod utils;
pub mod sparse;
pub mod hilbert;
pub mod chain;
pub mod config;
pub mod dynamics;
pub mod integrate;
pub mod simulate;

pub use error::{ Error, Result };
pub use chain::{ Chain, lowering_ops };
pub use config::{ ChainConfig, bose_einstein };
pub use simulate::{
    SimParams,
    Trajectories,
    simulate,
    simulate_config,
    simulate_with,
};
