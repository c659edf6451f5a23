pub mod capture;
pub mod dedup;
pub mod hash;
pub mod orchestrator;
pub mod organizer;
pub mod scanner;
