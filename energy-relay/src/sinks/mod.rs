pub mod http_path;
pub mod questdb;
pub mod questdb_ilp;

pub use http_path::HttpPathStore;
pub use questdb::QuestDbStore;
pub use questdb_ilp::QuestDbIlpStore;
