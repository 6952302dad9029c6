pub mod record;
pub mod batch;
pub mod store_row;

pub use record::Record;
pub use batch::Batch;
pub use store_row::{ColumnId, StoreRow};
