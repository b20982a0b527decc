pub mod delivery;
pub mod run;
