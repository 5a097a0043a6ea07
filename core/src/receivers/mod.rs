pub mod directory;
pub mod table;

pub use directory::{locate_receiver_table, DirectoryConfig, ReceiverDirectory, ReceiverEntry};
pub use table::{column_index, Cell, MemoryTable, TableSource, XlsxTable};
