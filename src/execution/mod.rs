pub mod bet_flow;
pub mod journal;
pub mod types;
pub mod validation;
