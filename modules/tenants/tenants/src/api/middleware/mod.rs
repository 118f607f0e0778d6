pub mod transaction;

pub use transaction::transaction_middleware;
