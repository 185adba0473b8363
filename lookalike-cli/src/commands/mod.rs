pub mod compare;
pub mod ingest;
pub mod search;
pub mod sign;
