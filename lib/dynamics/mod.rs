//! Constructs to build the generators of the chain's open-system dynamics from
//! its elementary operators.

pub mod hamiltonian;
pub use hamiltonian::{ HBuilderChain, HParams, hamiltonian };

pub mod lindbladian;
pub use lindbladian::{ JumpParams, LOperator, jumps };
