pub mod kratos;
pub mod memory_identities;
pub mod storage;
