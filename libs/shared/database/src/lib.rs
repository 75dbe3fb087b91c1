pub mod error;
pub mod retry;
pub mod supabase;

pub use error::DbError;
pub use retry::{with_retry, RetryPolicy};
pub use supabase::SupabaseClient;
